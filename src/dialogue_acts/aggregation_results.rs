use tracing::debug;

use crate::ast::{DialogueAct, Expression, Value};
use crate::context::ContextInfo;
use crate::error::Result;
use crate::state::{make_agent_reply, make_simple_state, AgentReply, AgentReplyOptions};

/// The single row of the current aggregation, if the current statement ends
/// in `operator` over `field`.
fn aggregation_row_value<'a>(ctx: &'a ContextInfo, operator: &str, field: &str) -> Result<Option<&'a Value>> {
    let current = ctx.require_current()?;
    match current.stmt.last() {
        Expression::Aggregation { operator: op, field: f, .. } if op == operator && f == field => {}
        other => {
            debug!("{} is not a {} aggregation over {}", other, operator, field);
            return Ok(None);
        }
    }
    let results = ctx.require_results()?;
    let [row] = results else { return Ok(None) };
    // count rows carry the count under `count`, others under the field
    let key = if operator == "count" { "count" } else { field };
    Ok(row.get(key))
}

fn display_aggregation(ctx: &ContextInfo) -> Result<Option<AgentReply>> {
    let state = make_simple_state(ctx, DialogueAct::SysDisplayResult, None);
    let options = AgentReplyOptions { num_results: 1, ..AgentReplyOptions::default() };
    make_agent_reply(ctx, state, None, None, options).map(Some)
}

/// "There are 12 of them."
pub fn make_count_aggregation_reply(ctx: &ContextInfo, count: &Value) -> Result<Option<AgentReply>> {
    let field = match ctx.require_current()?.stmt.last() {
        Expression::Aggregation { field, .. } => field.clone(),
        _ => return Ok(None),
    };
    match aggregation_row_value(ctx, "count", &field)? {
        Some(value) if value.as_number().is_some() && value.as_number() == count.as_number() => display_aggregation(ctx),
        _ => Ok(None),
    }
}

/// "The average rating is 4.2."
pub fn make_other_aggregation_reply(
    ctx: &ContextInfo,
    operator: &str,
    field: &str,
    value: &Value,
) -> Result<Option<AgentReply>> {
    if !matches!(operator, "min" | "max" | "sum" | "avg") {
        return Ok(None);
    }
    match aggregation_row_value(ctx, operator, field)? {
        Some(result) if result == value => display_aggregation(ctx),
        _ => Ok(None),
    }
}
