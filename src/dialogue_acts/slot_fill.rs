use tracing::debug;

use super::common::{ParamAnswer, ParamSlot};
use crate::ast::manip::get_invocation;
use crate::ast::{is_same_function, ArgumentDef, Confirm, DialogueAct, DialogueHistoryItem, DialogueState, Invocation, Type, Value};
use crate::context::ContextInfo;
use crate::error::{DialogueError, Result};
use crate::state::{
    add_new_item, make_agent_reply, make_simple_state, merge_parameters, set_or_add_invocation_param, AgentReply,
    AgentReplyOptions,
};

const FREE_TEXT_VALUES: [&str; 2] = ["tt:short_free_text", "tt:long_free_text"];

/// Each question is an unset input of the pending action, other than the
/// chain parameter.
pub fn is_good_slot_fill_question(ctx: &ContextInfo, questions: &[ParamSlot]) -> Result<bool> {
    let (Some(next), Some(next_info), Some(next_function)) = (ctx.next(), &ctx.next_info, &ctx.next_function) else {
        return Ok(false);
    };
    let action = get_invocation(next)?;
    for q in questions {
        if next_info.chain_parameter.as_deref() == Some(q.name.as_str()) {
            return Ok(false);
        }
        if !is_same_function(&q.function, next_function) {
            return Ok(false);
        }
        match next_function.argument(&q.name) {
            Some(arg) if arg.is_input => {}
            _ => return Ok(false),
        }
        if action.param(&q.name).map(|v| !v.is_undefined()).unwrap_or(false) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Free-text string inputs are answered verbatim instead of parsed.
pub fn use_raw_mode_for_slot_fill(arg: &ArgumentDef) -> bool {
    if arg.ty != Type::String {
        return false;
    }
    if let Some(raw) = arg.raw_mode() {
        return raw;
    }
    arg.string_values().map(|v| FREE_TEXT_VALUES.contains(&v)).unwrap_or(false)
}

pub fn make_slot_fill_question(ctx: &ContextInfo, questions: &[ParamSlot]) -> Result<Option<AgentReply>> {
    if questions.is_empty() || !is_good_slot_fill_question(ctx, questions)? {
        debug!("slot fill question not applicable");
        return Ok(None);
    }

    let names = questions.iter().map(|q| q.name.clone()).collect();
    let state = make_simple_state(ctx, DialogueAct::SysSlotFill, Some(names));
    let reply = match questions {
        [question] => {
            let raw = question.function.argument(&question.name).map(use_raw_mode_for_slot_fill).unwrap_or(false);
            let options = AgentReplyOptions { raw, ..AgentReplyOptions::default() };
            make_agent_reply(ctx, state, None, Some(question.ty.clone()), options)?
        }
        _ => make_agent_reply(ctx, state, None, None, AgentReplyOptions::default())?,
    };
    Ok(Some(reply))
}

fn fills_unfilled_chain_parameter(ctx: &ContextInfo, name: &str) -> bool {
    match &ctx.next_info {
        Some(info) => info.chain_parameter.as_deref() == Some(name) && !info.chain_parameter_filled,
        None => false,
    }
}

fn pending_item_with(ctx: &ContextInfo, f: impl FnOnce(&mut Invocation)) -> Result<DialogueHistoryItem> {
    let (next, _) = ctx.require_next()?;
    let mut item = DialogueHistoryItem::new(next.stmt.clone(), Confirm::Accepted);
    let invocation = item
        .stmt
        .expression
        .invocation_mut()
        .ok_or_else(|| DialogueError::malformed_expression(format!("no invocation in {}", next.stmt)))?;
    f(invocation);
    Ok(item)
}

/// The user answered with the whole action, e.g. "book it for 7pm".
pub fn precise_slot_fill_answer(ctx: &ContextInfo, answer: &Invocation) -> Result<Option<DialogueState>> {
    let Some(questions) = &ctx.state.dialogue_act_param else { return Ok(None) };
    let answers_all = questions
        .iter()
        .all(|q| answer.param(q).map(|v| !v.is_undefined()).unwrap_or(false));
    if !answers_all {
        debug!("answer leaves some of {:?} unset", questions);
        return Ok(None);
    }
    let Some(next_function) = &ctx.next_function else { return Ok(None) };
    if !is_same_function(&*ctx.registry().resolve_invocation(answer)?, next_function) {
        return Ok(None);
    }
    if answer.in_params.iter().any(|p| fills_unfilled_chain_parameter(ctx, &p.name)) {
        debug!("answer fills the chain parameter");
        return Ok(None);
    }

    let item = pending_item_with(ctx, |invocation| merge_parameters(invocation, answer))?;
    add_new_item(ctx, DialogueAct::Execute, None, Confirm::Accepted, vec![item]).map(Some)
}

/// The user answered the single question with just a value.
pub fn imprecise_slot_fill_answer(ctx: &ContextInfo, answer: &ParamAnswer) -> Result<Option<DialogueState>> {
    let Some([question]) = ctx.state.dialogue_act_param.as_deref() else {
        debug!("imprecise answer needs exactly one question");
        return Ok(None);
    };
    let Some(next_function) = &ctx.next_function else { return Ok(None) };
    let Some(arg) = next_function.argument(question) else { return Ok(None) };

    let value = match answer {
        ParamAnswer::Named(name, _) if name != question => return Ok(None),
        ParamAnswer::Named(_, value) => value.clone(),
        ParamAnswer::Value(value) if arg.ty.is_array() && !matches!(value, Value::Array(_)) => {
            Value::Array(vec![value.clone()])
        }
        ParamAnswer::Value(value) => value.clone(),
    };
    if !arg.ty.is_assignable(&value) {
        return Ok(None);
    }
    if fills_unfilled_chain_parameter(ctx, question) {
        return Ok(None);
    }

    let item = pending_item_with(ctx, |invocation| set_or_add_invocation_param(invocation, question, value))?;
    add_new_item(ctx, DialogueAct::Execute, None, Confirm::Accepted, vec![item]).map(Some)
}
