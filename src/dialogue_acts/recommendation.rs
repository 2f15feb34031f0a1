//! The agent offers the top result ("how about Thai Basil?"), optionally
//! with an action on it, and the user reacts.

use tracing::debug;

use super::common::{check_info_phrase, find_chain_param, is_info_phrase_compatible_with_result, ParamSlot};
use crate::ast::{
    is_same_function, Confirm, ConfirmPolicy, DialogueAct, DialogueHistoryItem, DialogueState, Expression, FunctionDef,
    Invocation, SchemaRegistry, SortDirection, Value,
};
use crate::context::{AgentProposal, ContextInfo, Recommendation};
use crate::error::Result;
use crate::refinement::{combine_preamble_and_request, proposal_reply, refine_filter_to_answer_question_or_change_filter};
use crate::slot_bag::SlotBag;
use crate::state::{add_action_param, add_new_item, make_agent_reply, make_simple_state, AgentReply, AgentReplyOptions};

/// A slice of more than one row cannot be talked about as "the" result.
fn is_single_result_table(ctx: &ContextInfo) -> Result<bool> {
    let current = ctx.require_current()?;
    Ok(match current.stmt.last() {
        Expression::Slice { limit, .. } => limit.as_number() == Some(1.0),
        _ => true,
    })
}

fn pending_action(ctx: &ContextInfo) -> Result<Option<Invocation>> {
    Ok(ctx.next_action()?.cloned())
}

/// Recommends the top result, which the agent names as `name`.
pub fn make_recommendation(ctx: &ContextInfo, name: &Value) -> Result<Option<Recommendation>> {
    let results = ctx.require_results()?;
    if !is_single_result_table(ctx)? {
        return Ok(None);
    }
    let Some(top_result) = results.first() else { return Ok(None) };
    if top_result.id() != Some(name) {
        return Ok(None);
    }
    Ok(Some(Recommendation::new(top_result.clone(), None, pending_action(ctx)?)))
}

/// Recommends the top result described only by what the agent says about it.
pub fn make_thingpedia_recommendation(ctx: &ContextInfo, info: &SlotBag) -> Result<Option<Recommendation>> {
    let results = ctx.require_results()?;
    if !is_single_result_table(ctx)? {
        return Ok(None);
    }
    let Some(top_result) = results.first() else { return Ok(None) };
    if !is_info_phrase_compatible_with_result(top_result, info) {
        return Ok(None);
    }
    Ok(Some(Recommendation::new(top_result.clone(), Some(info.clone()), pending_action(ctx)?)))
}

/// "The highest rated is ...": only when the query really sorts by `param`
/// in `direction` and takes the first.
pub fn make_arg_min_max_recommendation(
    ctx: &ContextInfo,
    name: &Value,
    base: &FunctionDef,
    param: &ParamSlot,
    direction: SortDirection,
) -> Result<Option<Recommendation>> {
    let result_info = ctx.require_result_info()?;
    let current_function = ctx.require_current_function()?;
    let Some((field, sort_direction)) = &result_info.arg_min_max_field else { return Ok(None) };
    if !is_same_function(base, current_function) || !is_same_function(&param.function, current_function) {
        return Ok(None);
    }
    if *sort_direction != direction || *field != param.name {
        return Ok(None);
    }
    make_recommendation(ctx, name)
}

/// Recommends the top result by proposing `action` on it; the action must
/// take nothing but that result.
pub fn make_action_recommendation(ctx: &ContextInfo, action: &Invocation) -> Result<Option<Recommendation>> {
    let results = ctx.require_results()?;
    if !is_single_result_table(ctx)? {
        return Ok(None);
    }
    let Some(top_result) = results.first() else { return Ok(None) };
    let Some(id) = top_result.id() else { return Ok(None) };
    match action.in_params.as_slice() {
        [param] if param.value == *id => Ok(Some(Recommendation::new(top_result.clone(), None, Some(action.clone())))),
        _ => Ok(None),
    }
}

/// Attaches what the agent says about the result, if it is true of it.
pub fn check_recommendation(
    rec: &Recommendation,
    info: &SlotBag,
    registry: &dyn SchemaRegistry,
) -> Option<Recommendation> {
    let result_type = rec.id_type()?;
    let function = registry.function(info.function.as_deref()?)?;
    if function.id_type() != Some(&result_type) {
        return None;
    }
    if !is_info_phrase_compatible_with_result(&rec.top_result, info) {
        return None;
    }
    Some(Recommendation { info: Some(info.clone()), ..rec.clone() })
}

/// Attaches `action`, if it can take the recommended result.
pub fn check_action_for_recommendation(
    rec: &Recommendation,
    action: &Invocation,
    registry: &dyn SchemaRegistry,
) -> Result<Option<Recommendation>> {
    let Some(result_type) = rec.id_type() else { return Ok(None) };
    let action_schema = registry.resolve_invocation(action)?;
    if let Some(proposed) = &rec.action {
        if !is_same_function(&*registry.resolve_invocation(proposed)?, &action_schema) {
            return Ok(None);
        }
    }
    if !action_schema.has_argument_of_type(&result_type) {
        return Ok(None);
    }
    Ok(Some(Recommendation { action: Some(action.clone()), ..rec.clone() }))
}

/// Shows the single result of a non-list query.
pub fn make_display_result(ctx: &ContextInfo, info: &SlotBag) -> Result<Option<Recommendation>> {
    let results = ctx.require_results()?;
    let current_function = ctx.require_current_function()?;
    let Some(top_result) = results.first() else { return Ok(None) };
    if current_function.is_list {
        return Ok(None);
    }
    if info.function.as_deref() != Some(current_function.qualified_name().as_str()) {
        return Ok(None);
    }
    if !is_info_phrase_compatible_with_result(top_result, info) || !check_info_phrase(ctx, info) {
        return Ok(None);
    }
    Ok(Some(Recommendation::new(top_result.clone(), Some(info.clone()), pending_action(ctx)?)))
}

/// Adds more details to a displayed result.
pub fn combine_display_result(rec: &Recommendation, new_info: &SlotBag) -> Option<Recommendation> {
    let info = match &rec.info {
        Some(old) => old.merge(new_info)?,
        None => new_info.clone(),
    };
    Some(Recommendation { info: Some(info), ..rec.clone() })
}

pub fn make_recommendation_reply(ctx: &ContextInfo, rec: &Recommendation) -> Result<Option<AgentReply>> {
    let options = AgentReplyOptions {
        end: (rec.action.is_some() || rec.has_learn_more).then_some(false),
        num_results: 1,
        ..AgentReplyOptions::default()
    };
    let aux = Some(AgentProposal::Recommendation(rec.clone()));

    let state = match &rec.action {
        None => make_simple_state(ctx, DialogueAct::SysRecommendOne, None),
        Some(action) => {
            let action_schema = ctx.registry().resolve_invocation(action)?;
            let (Some(chain_param), Some(id)) = (find_chain_param(&rec.top_result, &action_schema), rec.top_result.id()) else {
                debug!("{} cannot take the recommended result", action);
                return Ok(None);
            };
            add_action_param(ctx, DialogueAct::SysRecommendOne, action, &chain_param, id.clone(), Confirm::Proposed)?
        }
    };
    make_agent_reply(ctx, state, aux, None, options).map(Some)
}

pub fn make_display_result_reply(ctx: &ContextInfo, rec: &Recommendation) -> Result<AgentReply> {
    let options = AgentReplyOptions {
        end: (rec.action.is_some() || rec.has_anything_else).then_some(false),
        num_results: 1,
        ..AgentReplyOptions::default()
    };
    let state = make_simple_state(ctx, DialogueAct::SysDisplayResult, None);
    make_agent_reply(ctx, state, Some(AgentProposal::Recommendation(rec.clone())), None, options)
}

fn recommendation(ctx: &ContextInfo) -> Option<&Recommendation> {
    ctx.aux.as_ref().and_then(AgentProposal::as_recommendation)
}

/// "No, I want something ..." in reply to a recommendation.
pub fn negative_recommendation_reply(
    ctx: &ContextInfo,
    preamble: Option<&Expression>,
    request: Option<&Expression>,
) -> Result<Option<DialogueState>> {
    let is_filter_or_none = |e: Option<&Expression>| matches!(e, None | Some(Expression::Filter { .. }));
    if !is_filter_or_none(preamble) || !is_filter_or_none(request) {
        return Ok(None);
    }
    let Some(rec) = recommendation(ctx) else { return Ok(None) };
    let proposal_type = rec.id_type();
    let Some(request) =
        combine_preamble_and_request(preamble, request, rec.info.as_ref(), proposal_type.as_ref(), ctx.registry())?
    else {
        return Ok(None);
    };
    proposal_reply(ctx, &request, refine_filter_to_answer_question_or_change_filter)
}

/// "Yes, book it": accepts the proposed action, or `accepted_action`, on
/// the recommended result. `name` is set when the user named the result.
pub fn positive_recommendation_reply(
    ctx: &ContextInfo,
    accepted_action: Option<&Invocation>,
    name: Option<&Value>,
) -> Result<Option<DialogueState>> {
    let Some(rec) = recommendation(ctx) else { return Ok(None) };
    let Some(id) = rec.top_result.id() else { return Ok(None) };

    // "sure, I like that" with no action anywhere leads nowhere
    let Some(action) = accepted_action.or(rec.action.as_ref()) else {
        debug!("nothing to accept");
        return Ok(None);
    };
    let action_schema = ctx.registry().resolve_invocation(action)?;
    if let Some(proposed) = &rec.action {
        if !is_same_function(&*ctx.registry().resolve_invocation(proposed)?, &action_schema) {
            return Ok(None);
        }
    }
    if let Some(name) = name {
        if id != name {
            return Ok(None);
        }
        // "play X" on an auto-confirmed action is a new command, not an acceptance
        if action_schema.confirm_policy() == ConfirmPolicy::Auto {
            return Ok(None);
        }
    }

    let Some(chain_param) = find_chain_param(&rec.top_result, &action_schema) else { return Ok(None) };
    add_action_param(ctx, DialogueAct::Execute, action, &chain_param, id.clone(), Confirm::Accepted).map(Some)
}

/// "Thanks, that's all." Not while something is still pending.
pub fn recommendation_cancel_reply(ctx: &ContextInfo, valid: bool) -> Option<DialogueState> {
    if !valid || ctx.next().is_some() {
        return None;
    }
    Some(make_simple_state(ctx, DialogueAct::Cancel, None))
}

/// "Tell me more about it."
pub fn recommendation_learn_more_reply(ctx: &ContextInfo, name: Option<&Value>) -> Option<DialogueState> {
    let rec = recommendation(ctx)?;
    if let Some(name) = name {
        if rec.top_result.id() != Some(name) {
            return None;
        }
    }
    Some(make_simple_state(ctx, DialogueAct::LearnMore, None))
}

/// "Do it again."
pub fn repeat_command_reply(ctx: &ContextInfo) -> Result<Option<DialogueState>> {
    if ctx.next().is_some() {
        return Ok(None);
    }
    let current_function = ctx.require_current_function()?;
    if current_function.is_monitorable {
        return Ok(None);
    }
    let current = ctx.require_current()?;
    let again = DialogueHistoryItem::new(current.stmt.clone(), Confirm::Accepted);
    add_new_item(ctx, DialogueAct::Execute, None, Confirm::Accepted, vec![again]).map(Some)
}
