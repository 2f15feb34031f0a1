//! The agent suggests narrowing the current search, e.g. "how about cheap
//! ones?", and the user takes it or asks for something else.

use tracing::debug;

use super::common::is_simple_filter_expression;
use crate::ast::{is_same_function, Confirm, DialogueAct, DialogueState, Expression, Filter, Operator};
use crate::context::{AgentProposal, ContextInfo};
use crate::error::Result;
use crate::refinement::{
    combine_preamble_and_request, filter_to_slots, proposal_reply, query_refinement, refine_filter_to_answer_question,
    refine_filter_to_answer_question_or_change_filter,
};
use crate::slot_bag::SlotBag;
use crate::state::{add_query, make_agent_reply, AgentReply, AgentReplyOptions};

/// Proposes the current search narrowed by the filter of `proposal`.
pub fn make_refinement_proposal(ctx: &ContextInfo, proposal: &Expression) -> Result<Option<AgentReply>> {
    let Expression::Filter { filter, .. } = proposal else { return Ok(None) };
    if !is_simple_filter_expression(proposal) {
        return Ok(None);
    }
    let current_function = ctx.require_current_function()?;
    if !is_same_function(&*ctx.registry().resolve(proposal)?, current_function) {
        return Ok(None);
    }
    let current = ctx.require_current()?;
    if current.stmt.expression.find_filter().is_none() {
        return Ok(None);
    }

    let Some(refined) = query_refinement(
        &current.stmt.expression,
        Some(filter),
        Some(refine_filter_to_answer_question),
        None,
        ctx.registry(),
    )?
    else {
        debug!("proposal {} is not a refinement", proposal);
        return Ok(None);
    };

    let state = add_query(ctx, DialogueAct::SysProposeRefinedQuery, refined.clone(), Confirm::Proposed)?;
    let aux = AgentProposal::RefinedQuery(refined);
    make_agent_reply(ctx, state, Some(aux), None, AgentReplyOptions::default()).map(Some)
}

/// "Yes, show me those."
pub fn positive_proposal_reply(ctx: &ContextInfo) -> Result<Option<DialogueState>> {
    let Some(refined) = ctx.aux.as_ref().and_then(AgentProposal::as_refined_query) else { return Ok(None) };
    add_query(ctx, DialogueAct::Execute, refined.clone(), Confirm::Accepted).map(Some)
}

/// "No, I want ... instead."
pub fn negative_proposal_reply(
    ctx: &ContextInfo,
    preamble: Option<&Expression>,
    request: Option<&Expression>,
) -> Result<Option<DialogueState>> {
    let Some(refined) = ctx.aux.as_ref().and_then(AgentProposal::as_refined_query) else { return Ok(None) };
    let info = proposal_info(ctx, refined);
    let Some(combined) = combine_preamble_and_request(preamble, request, Some(&info), None, ctx.registry())? else {
        return Ok(None);
    };
    proposal_reply(ctx, &combined, refine_filter_to_answer_question_or_change_filter)
}

/// The equalities of the proposed filter, as if the agent had mentioned them.
fn proposal_info(ctx: &ContextInfo, refined: &Expression) -> SlotBag {
    let mut info = SlotBag::new(refined.qualified_name());
    if let Some(filter) = refined.find_filter() {
        for (name, slot) in filter_to_slots(filter) {
            if let Filter::Atom { operator: Operator::Eq, value, .. } = slot {
                info.set(name, value);
            }
        }
    }
    if info.function.is_none() {
        info.function = ctx.current_function.as_ref().map(|f| f.qualified_name());
    }
    info
}
