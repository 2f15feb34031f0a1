//! Follow-up questions about results the agent already talked about,
//! e.g. "what's its phone number?".

use tracing::debug;

use crate::ast::{Confirm, DialogueAct, DialogueState, Expression, Filter, Type, Value};
use crate::context::{AgentProposal, ContextInfo};
use crate::error::Result;
use crate::refinement::{query_refinement, refine_filter_to_answer_question, RefineFn};
use crate::slot_bag::SlotBag;
use crate::state::add_query;

/// A parameter the user asks about, with the type it was asked as, if known.
pub type Question = (String, Option<Type>);

/// Whether the questions are outputs of the current function worth
/// projecting on.
pub fn are_questions_valid_for_context(ctx: &ContextInfo, questions: &[Question]) -> Result<bool> {
    if ctx.require_result_info()?.is_aggregation {
        return Ok(false);
    }
    let schema = ctx.require_current_function()?;
    // a single output needs no projection
    if schema.outputs().count() == 1 {
        return Ok(false);
    }
    Ok(questions.iter().all(|(name, ty)| match schema.argument(name) {
        Some(arg) if arg.is_output() => ty.as_ref().map(|ty| *ty == arg.ty).unwrap_or(true),
        _ => false,
    }))
}

/// Questions must be about something the agent did not already say.
fn are_questions_new_for_info(ctx: &ContextInfo, info: &SlotBag, questions: &[Question]) -> bool {
    let Some(function) = info.function.as_deref().and_then(|name| ctx.registry().function(name)) else {
        return false;
    };
    questions.iter().all(|(name, ty)| {
        if info.has(name) {
            return false;
        }
        match function.argument(name) {
            Some(arg) => ty.as_ref().map(|ty| *ty == arg.ty).unwrap_or(true),
            None => false,
        }
    })
}

fn project(ctx: &ContextInfo, id: Option<&Value>, questions: &[Question]) -> Result<Option<DialogueState>> {
    let current = ctx.require_current()?;
    let names: Vec<String> = questions.iter().map(|(name, _)| name.clone()).collect();
    let id_filter = id.map(|id| Filter::eq("id", id.clone()));
    let refine = id_filter.as_ref().map(|_| refine_filter_to_answer_question as RefineFn);
    let Some(new_table) =
        query_refinement(&current.stmt.expression, id_filter.as_ref(), refine, Some(&names), ctx.registry())?
    else {
        return Ok(None);
    };
    add_query(ctx, DialogueAct::Execute, new_table, Confirm::Accepted).map(Some)
}

/// A question about the recommended result.
pub fn recommendation_search_question_reply(ctx: &ContextInfo, questions: &[Question]) -> Result<Option<DialogueState>> {
    let Some(rec) = ctx.aux.as_ref().and_then(AgentProposal::as_recommendation) else { return Ok(None) };
    if let Some(info) = &rec.info {
        if !are_questions_new_for_info(ctx, info, questions) {
            debug!("questions already answered by the recommendation");
            return Ok(None);
        }
    }
    if !are_questions_valid_for_context(ctx, questions)? {
        return Ok(None);
    }
    let Some(id) = rec.top_result.id() else { return Ok(None) };
    project(ctx, Some(id), questions)
}

/// A question after "what would you like to know?", about the top result.
pub fn learn_more_search_question_reply(ctx: &ContextInfo, questions: &[Question]) -> Result<Option<DialogueState>> {
    let Some(id) = ctx.require_results()?.first().and_then(|r| r.id()) else { return Ok(None) };
    if !are_questions_valid_for_context(ctx, questions)? {
        return Ok(None);
    }
    project(ctx, Some(id), questions)
}

/// A question about the single result on display.
pub fn display_result_search_question_reply(ctx: &ContextInfo, questions: &[Question]) -> Result<Option<DialogueState>> {
    if !are_questions_valid_for_context(ctx, questions)? {
        return Ok(None);
    }
    project(ctx, None, questions)
}

/// A question about one listed result (`name`), or all of them.
pub fn list_proposal_search_question_reply(
    ctx: &ContextInfo,
    name: Option<&Value>,
    questions: &[Question],
) -> Result<Option<DialogueState>> {
    let Some(proposal) = ctx.aux.as_ref().and_then(AgentProposal::as_list_proposal) else { return Ok(None) };
    if let Some(name) = name {
        if !proposal.contains_id(name) {
            return Ok(None);
        }
    }
    if let Some(info) = &proposal.info {
        if !are_questions_new_for_info(ctx, info, questions) {
            return Ok(None);
        }
    }
    if !are_questions_valid_for_context(ctx, questions)? {
        return Ok(None);
    }
    project(ctx, name, questions)
}

/// `param` of the first result in the previous domain, when `base` belongs
/// to the same device, e.g. the address of the restaurant for a taxi.
pub fn coref_constant(ctx: &ContextInfo, base: &Expression, param: &str) -> Result<Option<Value>> {
    let Some(previous) = ctx.previous_domain() else { return Ok(None) };
    let Some(first) = previous.results.as_ref().and_then(|r| r.results.first()) else { return Ok(None) };
    let previous_schema = ctx.registry().resolve(&previous.stmt.expression)?;
    let base_schema = ctx.registry().resolve(base)?;
    if previous_schema.class != base_schema.class {
        return Ok(None);
    }
    Ok(first.get(param).cloned())
}
