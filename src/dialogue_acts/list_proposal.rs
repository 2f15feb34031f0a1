//! The agent lists a few results ("there's A, B and C") and the user picks
//! one, asks about one, or rejects them all.

use tracing::debug;

use super::common::{find_chain_param, is_info_phrase_compatible_with_result};
use crate::ast::{
    is_same_function, Confirm, ConfirmPolicy, DialogueAct, DialogueState, Expression, Filter, Invocation, ResultItem,
    Value,
};
use crate::context::{AgentProposal, ContextInfo, ListProposal};
use crate::error::{DialogueError, Result};
use crate::refinement::{
    combine_preamble_and_request, proposal_reply, query_refinement, refine_filter_to_answer_question_or_change_filter,
};
use crate::slot_bag::SlotBag;
use crate::state::{add_action, add_action_param, add_query, make_agent_reply, make_simple_state, AgentReply, AgentReplyOptions};

fn id_type_of(results: &[ResultItem]) -> Option<crate::ast::Type> {
    results.first().and_then(ResultItem::id).map(Value::get_type)
}

/// Lists `results`, optionally saying `info` about all of them.
pub fn check_list_proposal(
    ctx: &ContextInfo,
    results: &[ResultItem],
    info: Option<&SlotBag>,
    has_learn_more: bool,
) -> Result<Option<ListProposal>> {
    let Some(result_type) = id_type_of(results) else { return Ok(None) };
    match info {
        Some(info) => {
            let Some(function) = info.function.as_deref().and_then(|name| ctx.registry().function(name)) else {
                return Ok(None);
            };
            if function.id_type() != Some(&result_type) {
                return Ok(None);
            }
            if !results.iter().all(|r| is_info_phrase_compatible_with_result(r, info)) {
                return Ok(None);
            }
        }
        None => {
            // a question was asked; listing names alone does not answer it
            if ctx.require_result_info()?.projection.is_some() {
                return Ok(None);
            }
        }
    }
    Ok(Some(ListProposal {
        results: results.to_vec(),
        info: info.cloned(),
        action: ctx.next_action()?.cloned(),
        has_learn_more,
    }))
}

/// Lists `results` together with an action the user could take on one.
pub fn add_action_to_list_proposal(
    ctx: &ContextInfo,
    results: &[ResultItem],
    action: &Invocation,
) -> Result<Option<ListProposal>> {
    if ctx.require_result_info()?.projection.is_some() {
        return Ok(None);
    }
    let Some(result_type) = id_type_of(results) else { return Ok(None) };
    let action_schema = ctx.registry().resolve_invocation(action)?;
    if !action_schema.has_argument_of_type(&result_type) {
        return Ok(None);
    }
    if let Some(pending) = ctx.next_action()? {
        if !is_same_function(&*ctx.registry().resolve_invocation(pending)?, &action_schema) {
            return Ok(None);
        }
    }
    Ok(Some(ListProposal { results: results.to_vec(), info: None, action: Some(action.clone()), has_learn_more: false }))
}

pub fn make_list_proposal_reply(ctx: &ContextInfo, proposal: &ListProposal) -> Result<Option<AgentReply>> {
    let act = match proposal.results.len() {
        2 => DialogueAct::SysRecommendTwo,
        3 => DialogueAct::SysRecommendThree,
        4 => DialogueAct::SysRecommendFour,
        n => {
            debug!("cannot list {} results", n);
            return Ok(None);
        }
    };
    let options = AgentReplyOptions {
        end: (proposal.action.is_some() || proposal.has_learn_more).then_some(false),
        num_results: proposal.results.len(),
        ..AgentReplyOptions::default()
    };
    let state = match &proposal.action {
        None => make_simple_state(ctx, act, None),
        Some(action) => add_action(ctx, act, action, Confirm::Proposed)?,
    };
    let aux = Some(AgentProposal::ListProposal(proposal.clone()));
    make_agent_reply(ctx, state, aux, None, options).map(Some)
}

fn list_proposal(ctx: &ContextInfo) -> Option<&ListProposal> {
    ctx.aux.as_ref().and_then(AgentProposal::as_list_proposal)
}

fn and_refine(old: &Filter, new: &Filter) -> Option<Filter> {
    Some(Filter::And(vec![old.clone(), new.clone()]).optimize())
}

/// The current search narrowed to the result named `name`.
fn select_by_name(ctx: &ContextInfo, name: &Value) -> Result<Option<DialogueState>> {
    let current = ctx.require_current()?;
    let name_filter = Filter::eq("id", name.clone());
    let Some(new_table) =
        query_refinement(&current.stmt.expression, Some(&name_filter), Some(and_refine), None, ctx.registry())?
    else {
        return Ok(None);
    };
    add_query(ctx, DialogueAct::Execute, new_table, Confirm::Accepted).map(Some)
}

/// "I like B." With an action proposed or given, runs it on B; without,
/// narrows the search to B, unless `must_have_action`.
pub fn positive_list_proposal_reply(
    ctx: &ContextInfo,
    name: &Value,
    accepted_action: Option<&Invocation>,
    must_have_action: bool,
) -> Result<Option<DialogueState>> {
    let Some(proposal) = list_proposal(ctx) else { return Ok(None) };
    if !proposal.contains_id(name) {
        debug!("{} was not listed", name);
        return Ok(None);
    }

    let Some(action) = accepted_action.or(proposal.action.as_ref()) else {
        if must_have_action {
            return Ok(None);
        }
        return select_by_name(ctx, name);
    };

    let action_schema = ctx.registry().resolve_invocation(action)?;
    if let Some(proposed) = &proposal.action {
        if !is_same_function(&*ctx.registry().resolve_invocation(proposed)?, &action_schema) {
            return Ok(None);
        }
    }
    // "play B" on an auto-confirmed action is a new command, not a choice
    if action_schema.confirm_policy() == ConfirmPolicy::Auto {
        return Ok(None);
    }
    let Some(chain_param) = find_chain_param(&proposal.results[0], &action_schema) else { return Ok(None) };
    add_action_param(ctx, DialogueAct::Execute, action, &chain_param, name.clone(), Confirm::Accepted).map(Some)
}

/// "Book B": the listed result is named inside the action itself.
pub fn positive_list_proposal_reply_action_by_name(ctx: &ContextInfo, action: &Invocation) -> Result<Option<DialogueState>> {
    let Some(proposal) = list_proposal(ctx) else { return Ok(None) };
    let Some(id_type) = id_type_of(&proposal.results) else { return Ok(None) };
    let action_schema = ctx.registry().resolve_invocation(action)?;

    let mut accepted = action.clone();
    let mut name = None;
    for param in accepted.in_params.iter_mut() {
        let arg = action_schema
            .argument(&param.name)
            .ok_or_else(|| DialogueError::malformed_expression(format!("{} has no input `{}`", action, param.name)))?;
        if arg.ty == id_type {
            name = Some(std::mem::replace(&mut param.value, Value::Undefined));
            break;
        }
    }
    let Some(name) = name else { return Ok(None) };
    positive_list_proposal_reply(ctx, &name, Some(&accepted), false)
}

/// "None of those, I want ..."
pub fn negative_list_proposal_reply(
    ctx: &ContextInfo,
    preamble: Option<&Expression>,
    request: Option<&Expression>,
) -> Result<Option<DialogueState>> {
    let is_filter_or_none = |e: Option<&Expression>| matches!(e, None | Some(Expression::Filter { .. }));
    if !is_filter_or_none(preamble) || !is_filter_or_none(request) {
        return Ok(None);
    }
    let Some(proposal) = list_proposal(ctx) else { return Ok(None) };
    let proposal_type = proposal.id_type();
    let Some(request) =
        combine_preamble_and_request(preamble, request, proposal.info.as_ref(), proposal_type.as_ref(), ctx.registry())?
    else {
        return Ok(None);
    };
    proposal_reply(ctx, &request, refine_filter_to_answer_question_or_change_filter)
}

/// "Tell me more about B." Unlike a recommendation, this narrows the search
/// to B.
pub fn list_proposal_learn_more_reply(ctx: &ContextInfo, name: &Value) -> Result<Option<DialogueState>> {
    let Some(proposal) = list_proposal(ctx) else { return Ok(None) };
    if !proposal.contains_id(name) {
        return Ok(None);
    }
    select_by_name(ctx, name)
}
