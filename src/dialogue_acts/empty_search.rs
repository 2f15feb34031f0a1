use tracing::debug;

use super::common::is_simple_filter_expression;
use crate::ast::manip::last_query;
use crate::ast::{is_same_function, Confirm, DialogueAct, DialogueState, Expression, FunctionDef};
use crate::context::{AgentProposal, ContextInfo};
use crate::error::Result;
use crate::refinement::{query_refinement, refine_filter_to_change_filter};
use crate::state::{add_query, make_agent_reply, make_simple_state, AgentReply, AgentReplyOptions};

/// The search came back empty, and `question` is one of the constraints
/// that caused it.
pub fn is_good_empty_search_question(ctx: &ContextInfo, question: &str) -> Result<bool> {
    let Some(current) = ctx.current() else { return Ok(false) };
    let Some(query) = last_query(&current.stmt, ctx.registry())? else { return Ok(false) };
    let schema = ctx.registry().resolve(query)?;
    match schema.argument(question) {
        Some(arg) if arg.is_output() && arg.filterable() => {}
        _ => return Ok(false),
    }
    Ok(current.stmt.expression.find_filter().map(|f| f.uses_param(question)).unwrap_or(false))
}

/// "Sorry, I cannot find any ..." optionally followed by "would you like a
/// different `question`?".
pub fn make_empty_search_error(
    ctx: &ContextInfo,
    base: Option<&FunctionDef>,
    question: Option<&str>,
) -> Result<Option<AgentReply>> {
    let current_function = ctx.require_current_function()?;
    if let Some(base) = base {
        if !is_same_function(base, current_function) {
            return Ok(None);
        }
    }
    let expect = match question {
        Some(question) => {
            if !is_good_empty_search_question(ctx, question)? {
                debug!("cannot ask to change {}", question);
                return Ok(None);
            }
            current_function.argument(question).map(|arg| arg.ty.clone())
        }
        None => None,
    };

    let state = make_simple_state(ctx, DialogueAct::SysEmptySearch, question.map(|q| vec![q.to_string()]));
    let aux = AgentProposal::EmptySearch(question.map(str::to_string));
    make_agent_reply(ctx, state, Some(aux), expect, AgentReplyOptions::default()).map(Some)
}

/// The user changes one of the constraints of the empty search.
pub fn empty_search_change_phrase(ctx: &ContextInfo, request: &Expression) -> Result<Option<DialogueState>> {
    let Expression::Filter { filter, .. } = request else { return Ok(None) };
    if !is_simple_filter_expression(request) {
        return Ok(None);
    }
    let current_function = ctx.require_current_function()?;
    if !is_same_function(&*ctx.registry().resolve(request)?, current_function) {
        return Ok(None);
    }
    if let Some([question]) = ctx.state.dialogue_act_param.as_deref() {
        if !filter.uses_param(question) {
            debug!("change does not touch {}", question);
            return Ok(None);
        }
    }

    let current = ctx.require_current()?;
    let Some(new_table) = query_refinement(
        &current.stmt.expression,
        Some(filter),
        Some(refine_filter_to_change_filter),
        None,
        ctx.registry(),
    )?
    else {
        return Ok(None);
    };
    add_query(ctx, DialogueAct::Execute, new_table, Confirm::Accepted).map(Some)
}
