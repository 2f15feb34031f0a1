//! "Do you want me to book ...?" and the user's yes, no or change.

use tracing::debug;

use super::common::ParamSlot;
use crate::ast::manip::get_invocation;
use crate::ast::{is_same_function, Confirm, DialogueAct, DialogueHistoryItem, DialogueState, Invocation, Value};
use crate::context::ContextInfo;
use crate::error::{DialogueError, Result};
use crate::state::{add_new_item, make_agent_reply, make_simple_state, set_or_add_invocation_param, AgentReply, AgentReplyOptions};

/// Asks to confirm the pending action, which must be exactly `action`.
pub fn make_action_confirmation_phrase(ctx: &ContextInfo, action: &Invocation) -> Result<Option<AgentReply>> {
    let (next, next_info) = ctx.require_next()?;
    if !next_info.is_complete {
        debug!("pending action is not complete");
        return Ok(None);
    }
    if get_invocation(next)? != action {
        return Ok(None);
    }
    let state = make_simple_state(ctx, DialogueAct::SysConfirmAction, None);
    let options = AgentReplyOptions { end: Some(false), ..AgentReplyOptions::default() };
    make_agent_reply(ctx, state, None, None, options).map(Some)
}

/// "Yes, go ahead."
pub fn action_confirm_accept_phrase(ctx: &ContextInfo) -> Result<DialogueState> {
    let (next, _) = ctx.require_next()?;
    let confirmed = DialogueHistoryItem::new(next.stmt.clone(), Confirm::Confirmed);
    add_new_item(ctx, DialogueAct::Execute, None, Confirm::Confirmed, vec![confirmed])
}

/// "No, don't."
pub fn action_confirm_reject_phrase(ctx: &ContextInfo) -> DialogueState {
    make_simple_state(ctx, DialogueAct::Cancel, None)
}

/// "Make it for 8pm instead." The chain parameter can only change by
/// picking another result.
pub fn action_confirm_change_param(ctx: &ContextInfo, slot: &ParamSlot, value: Value) -> Result<Option<DialogueState>> {
    let (next, next_info) = ctx.require_next()?;
    if next_info.chain_parameter.as_deref() == Some(slot.name.as_str()) {
        debug!("cannot change the chain parameter {}", slot.name);
        return Ok(None);
    }
    let Some(next_function) = &ctx.next_function else { return Ok(None) };
    if !is_same_function(&slot.function, next_function) {
        return Ok(None);
    }
    match next_function.argument(&slot.name) {
        Some(arg) if arg.is_input && arg.ty.is_assignable(&value) => {}
        _ => return Ok(None),
    }

    let mut item = DialogueHistoryItem::new(next.stmt.clone(), Confirm::Accepted);
    let invocation = item
        .stmt
        .expression
        .invocation_mut()
        .ok_or_else(|| DialogueError::malformed_expression(format!("no invocation in {}", next.stmt)))?;
    set_or_add_invocation_param(invocation, &slot.name, value);
    add_new_item(ctx, DialogueAct::Execute, None, Confirm::Accepted, vec![item]).map(Some)
}
