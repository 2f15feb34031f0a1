//! Entry points of the transaction policy: the first state of a
//! conversation, the contexts the generator picks templates from, and
//! answers coming from UI buttons rather than parsed utterances.

use std::sync::Arc;

use tracing::{debug, info};

use crate::ast::{Confirm, DialogueAct, DialogueHistoryItem, DialogueState, Expression, Statement, Value};
use crate::config::DialogueEnv;
use crate::context::{get_context_info, get_context_phrases, initial_context_info, tag_context_for_agent, ContextPhrase, ContextTag};
use crate::dialogue_acts::{
    action_confirm_accept_phrase, action_confirm_reject_phrase, imprecise_search_question_answer,
    imprecise_slot_fill_answer, ParamAnswer, SearchAnswer,
};
use crate::error::{DialogueError, Result};
use crate::state::{accept_all_proposed_statements, make_simple_state};

/// The `init` state: the configured initial function, about to run, with
/// its required inputs left as `$?` so it reads as not executable.
pub fn initial_state(env: &DialogueEnv) -> Result<Option<DialogueState>> {
    let Some(name) = env.config.initial_function.as_deref() else { return Ok(None) };
    let function = env.registry.function(name).ok_or_else(|| DialogueError::UnknownFunction(name.to_string()))?;

    let mut invocation = function.invocation();
    for arg in function.inputs().filter(|arg| arg.required) {
        invocation = invocation.with_param(arg.name.clone(), Value::Undefined);
    }
    let item = DialogueHistoryItem::new(Statement::new(Expression::Invocation(invocation)), Confirm::Accepted);
    info!(function = %name, "initial state");
    Ok(Some(DialogueState::new(env.config.policy_name.clone(), DialogueAct::Init, None, vec![item])))
}

/// Every context phrase of `state`: its main tags first, then the
/// auxiliary phrases. `None` for a state of some other policy.
pub fn get_context_phrases_for_state(env: &DialogueEnv, state: Option<&DialogueState>) -> Result<Option<Vec<ContextPhrase>>> {
    let Some(state) = state else {
        let ctx = Arc::new(initial_context_info(env)?);
        return Ok(Some(vec![ContextPhrase::new(ContextTag::Init, &ctx)]));
    };
    if state.policy != env.config.policy_name {
        debug!(policy = %state.policy, "state belongs to another policy");
        return Ok(None);
    }

    let ctx = Arc::new(get_context_info(env, state.clone())?);
    let mut phrases: Vec<ContextPhrase> =
        tag_context_for_agent(&ctx)?.into_iter().map(|tag| ContextPhrase::new(tag, &ctx)).collect();
    phrases.extend(get_context_phrases(&ctx)?);
    Ok(Some(phrases))
}

/// Turns a button press (a yes/no, or a value picked from a list) into the
/// next state. `Ok(None)` when the answer makes no sense here.
pub fn interpret_answer(env: &DialogueEnv, state: &DialogueState, answer: &Value) -> Result<Option<DialogueState>> {
    let ctx = get_context_info(env, state.clone())?;

    let ends_in_proposal = state.history.last().map(|item| item.confirm == Confirm::Proposed).unwrap_or(false);
    if let (true, Value::Boolean(yes)) = (ends_in_proposal, answer) {
        return Ok(if *yes {
            accept_all_proposed_statements(&ctx)
        } else {
            Some(make_simple_state(&ctx, DialogueAct::Cancel, None))
        });
    }

    let simple = |act: DialogueAct| -> Result<Option<DialogueState>> { Ok(Some(make_simple_state(&ctx, act, None))) };
    match (&state.dialogue_act, answer) {
        (DialogueAct::SysRecordCommand, _) => simple(DialogueAct::End),
        (DialogueAct::SysAnythingElse, Value::Boolean(true)) => simple(DialogueAct::Reinit),
        (DialogueAct::SysAnythingElse, Value::Boolean(false)) => simple(DialogueAct::End),
        (act, Value::Boolean(true)) if act.is_recommendation() => simple(DialogueAct::LearnMore),
        (act, Value::Boolean(false)) if act.is_recommendation() || *act == DialogueAct::SysDisplayResult => {
            simple(DialogueAct::Cancel)
        }
        (DialogueAct::SysSlotFill, answer) => imprecise_slot_fill_answer(&ctx, &ParamAnswer::Value(answer.clone())),
        (DialogueAct::SysSearchQuestion, answer) => {
            imprecise_search_question_answer(&ctx, &SearchAnswer::Value(answer.clone()))
        }
        (DialogueAct::SysConfirmAction, Value::Boolean(true)) => action_confirm_accept_phrase(&ctx).map(Some),
        (DialogueAct::SysConfirmAction, Value::Boolean(false)) => Ok(Some(action_confirm_reject_phrase(&ctx))),
        (act, answer) => {
            debug!(%act, ?answer, "answer does not apply");
            Ok(None)
        }
    }
}
