//! Reporting what happened after an action ran, and follow-ups on it.

use tracing::debug;

use super::common::{is_info_phrase_compatible_with_result, ParamAnswer, ParamSlot};
use crate::ast::manip::get_invocation;
use crate::ast::{is_same_function, Confirm, DialogueAct, DialogueState, Invocation, Value};
use crate::context::{AgentProposal, ContextInfo};
use crate::error::Result;
use crate::slot_bag::SlotBag;
use crate::state::{
    make_agent_reply, make_simple_state, replace_action, set_or_add_invocation_param, AgentReply, AgentReplyOptions,
};

/// "Your table is booked", optionally restating `info` about the single
/// result row of the action.
pub fn make_action_success_phrase(ctx: &ContextInfo, info: Option<&SlotBag>) -> Result<Option<AgentReply>> {
    let current_function = ctx.require_current_function()?;
    if !current_function.is_action() {
        return Ok(None);
    }
    let info = match info {
        Some(info) => {
            let results = ctx.require_results()?;
            let [top_result] = results else {
                debug!("action success info needs exactly one result, got {}", results.len());
                return Ok(None);
            };
            if info.function.as_deref() != Some(current_function.qualified_name().as_str()) {
                return Ok(None);
            }
            if !is_info_phrase_compatible_with_result(top_result, info) {
                return Ok(None);
            }
            info.clone()
        }
        None => SlotBag::new(Some(current_function.qualified_name())),
    };

    let state = make_simple_state(ctx, DialogueAct::SysActionSuccess, None);
    let aux = Some(AgentProposal::ActionSuccess(info));
    make_agent_reply(ctx, state, aux, None, AgentReplyOptions::default()).map(Some)
}

/// The agent's description of a failure must match the error code
/// reported and the parameters the action actually ran with.
pub fn check_action_error_message(ctx: &ContextInfo, code: &str, action: &Invocation) -> Result<bool> {
    let current_function = ctx.require_current_function()?;
    if !is_same_function(&*ctx.registry().resolve_invocation(action)?, current_function) {
        return Ok(false);
    }
    match ctx.error() {
        Some(Value::Enum(error)) if error == code => {}
        Some(Value::String(error)) if error == code => {}
        _ => return Ok(false),
    }
    let executed = get_invocation(ctx.require_current()?)?;
    for param in action.in_params.iter().filter(|p| !p.value.is_undefined()) {
        if executed.param(&param.name) != Some(&param.value) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// "Sorry, that failed", optionally asking for new values of `questions`.
pub fn make_action_error_phrase(ctx: &ContextInfo, questions: &[ParamSlot]) -> Result<Option<AgentReply>> {
    let current_function = ctx.require_current_function()?;
    for q in questions {
        if !is_same_function(&q.function, current_function) {
            return Ok(None);
        }
        match current_function.argument(&q.name) {
            Some(arg) if arg.is_input => {}
            _ => return Ok(None),
        }
    }

    let (state, expect) = match questions {
        [] => (make_simple_state(ctx, DialogueAct::SysActionError, None), None),
        _ => {
            let names = questions.iter().map(|q| q.name.clone()).collect();
            let expect = match questions {
                [question] => Some(question.ty.clone()),
                _ => None,
            };
            (make_simple_state(ctx, DialogueAct::SysActionErrorQuestion, Some(names)), expect)
        }
    };
    make_agent_reply(ctx, state, Some(AgentProposal::ActionError), expect, AgentReplyOptions::default()).map(Some)
}

/// The user supplies a new value after the failure; the action runs again.
pub fn action_error_change_param(ctx: &ContextInfo, answer: &ParamAnswer) -> Result<Option<DialogueState>> {
    let current_function = ctx.require_current_function()?;
    let (name, value) = match answer {
        ParamAnswer::Value(value) => {
            let Some([question]) = ctx.state.dialogue_act_param.as_deref() else {
                debug!("bare value needs exactly one question");
                return Ok(None);
            };
            match current_function.argument(question) {
                Some(arg) if arg.is_input && arg.ty.is_assignable(value) => {}
                _ => return Ok(None),
            }
            (question.clone(), value.clone())
        }
        ParamAnswer::Named(name, value) => {
            match current_function.argument(name) {
                Some(arg) if arg.is_input && arg.ty.is_assignable(value) => {}
                _ => return Ok(None),
            }
            (name.clone(), value.clone())
        }
    };

    let mut action = get_invocation(ctx.require_current()?)?.clone();
    set_or_add_invocation_param(&mut action, &name, value);
    replace_action(ctx, DialogueAct::Execute, action, Confirm::Accepted).map(Some)
}

/// "What's the confirmation number?": a question about outputs of the
/// action that just ran.
pub fn action_success_question(ctx: &ContextInfo, questions: &[ParamSlot]) -> Result<Option<DialogueState>> {
    let current_function = ctx.require_current_function()?;
    for q in questions {
        if !is_same_function(&q.function, current_function) {
            return Ok(None);
        }
        match current_function.argument(&q.name) {
            Some(arg) if arg.is_output() => {}
            _ => return Ok(None),
        }
    }
    let names = questions.iter().map(|q| q.name.clone()).collect();
    Ok(Some(make_simple_state(ctx, DialogueAct::ActionQuestion, Some(names))))
}
