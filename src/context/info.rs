//! The view of a dialogue state that every handler reasons about: which
//! statement was executed last, which one is pending, and what came back.

use serde::Serialize;
use std::sync::Arc;
use tracing::trace;

use super::proposal::AgentProposal;
use crate::ast::manip::{get_invocation, is_executable, last_query, table_is_list};
use crate::ast::{
    ArgumentDef, Confirm, DialogueAct, DialogueHistoryItem, DialogueState, Expression, FunctionDef, ResultItem,
    SchemaRegistry, SortDirection, Type, Value,
};
use crate::config::{DialogueConfig, DialogueEnv};
use crate::error::{DialogueError, Result};

/// Summary of the executed statement the conversation is about.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultInfo {
    pub is_table: bool,
    /// Projection, index or aggregation at the top of the query.
    pub is_question: bool,
    pub is_aggregation: bool,
    pub is_list: bool,
    /// Sort field and direction when the query picks the first of a sort.
    pub arg_min_max_field: Option<(String, SortDirection)>,
    /// Sorted projected columns.
    pub projection: Option<Vec<String>>,
    pub has_error: bool,
    pub has_empty_result: bool,
    pub has_single_result: bool,
    pub has_large_result: bool,
    pub id_type: Option<Type>,
}

impl ResultInfo {
    pub fn new(
        state: &DialogueState,
        item: &DialogueHistoryItem,
        registry: &dyn SchemaRegistry,
        large_result_threshold: usize,
    ) -> Result<Self> {
        let results = item
            .results
            .as_ref()
            .ok_or_else(|| DialogueError::malformed_state(format!("no results for executed item {}", item.stmt)))?;
        let last = item.stmt.last();
        let schema = registry.resolve(last)?;

        let mut info = ResultInfo {
            is_table: schema.is_query(),
            is_question: false,
            is_aggregation: false,
            is_list: false,
            arg_min_max_field: None,
            projection: None,
            has_error: results.error.is_some(),
            has_empty_result: results.results.is_empty(),
            has_single_result: results.results.len() == 1,
            has_large_result: is_large_result_set(results.more, &results.count, large_result_threshold),
            id_type: schema.argument("id").map(|arg| arg.ty.clone()),
        };

        if info.is_table {
            info.is_question = matches!(
                last,
                Expression::Projection { .. } | Expression::Index { .. } | Expression::Aggregation { .. }
            );
            info.is_aggregation = matches!(last, Expression::Aggregation { .. });
            info.is_list = table_is_list(last, &schema);
            info.arg_min_max_field = get_table_arg_min_max(last);
            if let Expression::Projection { .. } = last {
                info.projection = last.projection_args();
            }
        } else if state.dialogue_act == DialogueAct::ActionQuestion {
            info.projection = state.dialogue_act_param.clone().map(|mut names| {
                names.sort();
                names
            });
        }

        Ok(info)
    }
}

fn is_large_result_set(more: bool, count: &Value, threshold: usize) -> bool {
    match count {
        _ if more => true,
        Value::Number(n) => *n >= threshold as f64,
        _ => true,
    }
}

/// `(field, direction)` when `table` selects the top result of a sort,
/// e.g. `sort(rating desc of @restaurant())[1]`. Index `-1` flips the direction.
pub fn get_table_arg_min_max(table: &Expression) -> Option<(String, SortDirection)> {
    let (inner, position) = match table.without_projection() {
        Expression::Index { expression, indices } if indices.len() == 1 => (expression, &indices[0]),
        Expression::Slice { expression, base, limit } if limit.as_number() == Some(1.0) => (expression, base),
        _ => return None,
    };
    let Expression::Sort { field, direction, .. } = inner.as_ref() else { return None };
    match position.as_number() {
        Some(n) if n == 1.0 => Some((field.clone(), *direction)),
        Some(n) if n == -1.0 => Some((field.clone(), direction.reverse())),
        _ => None,
    }
}

/// An input of the pending statement still holding `$?`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingSlot {
    /// Qualified name of the function the input belongs to.
    pub function: String,
    pub name: String,
    pub ty: Type,
    pub arg: ArgumentDef,
}

/// Summary of the statement waiting to be executed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextStatementInfo {
    pub is_action: bool,
    /// Input of the pending action that can take the `id` of the current results.
    pub chain_parameter: Option<String>,
    pub chain_parameter_filled: bool,
    pub is_complete: bool,
    pub missing_slots: Vec<MissingSlot>,
}

impl NextStatementInfo {
    pub fn new(
        current: Option<&DialogueHistoryItem>,
        result_info: Option<&ResultInfo>,
        next: &DialogueHistoryItem,
        registry: &dyn SchemaRegistry,
    ) -> Result<Self> {
        let mut info = NextStatementInfo {
            is_action: last_query(&next.stmt, registry)?.is_none(),
            chain_parameter: None,
            chain_parameter_filled: false,
            is_complete: is_executable(&next.stmt, registry)?,
            missing_slots: missing_slots(next, registry)?,
        };
        if !info.is_action {
            return Ok(info);
        }

        let steps = next.stmt.steps();
        let [Expression::Invocation(action)] = steps else {
            return Err(DialogueError::malformed_state(format!("pending action is not a single call: {}", next.stmt)));
        };

        let (Some(current), Some(result_info)) = (current, result_info) else { return Ok(info) };
        if !result_info.is_table {
            return Ok(info);
        }
        let table_schema = registry.resolve(&current.stmt.expression)?;
        let Some(id_type) = table_schema.argument("id").map(|arg| &arg.ty) else { return Ok(info) };

        let action_schema = registry.resolve_invocation(action)?;
        // first match wins when several inputs share the id type
        if let Some(arg) = action_schema.inputs().find(|arg| &arg.ty == id_type) {
            info.chain_parameter_filled = action.param(&arg.name).map(|v| !v.is_undefined()).unwrap_or(false);
            info.chain_parameter = Some(arg.name.clone());
        }
        Ok(info)
    }
}

fn missing_slots(item: &DialogueHistoryItem, registry: &dyn SchemaRegistry) -> Result<Vec<MissingSlot>> {
    let mut slots = Vec::new();
    for step in item.stmt.steps() {
        let Some(invocation) = step.invocation() else { continue };
        let schema = registry.resolve_invocation(invocation)?;
        for param in invocation.in_params.iter().filter(|p| p.value.is_undefined()) {
            let Some(arg) = schema.argument(&param.name) else { continue };
            slots.push(MissingSlot {
                function: schema.qualified_name(),
                name: param.name.clone(),
                ty: arg.ty.clone(),
                arg: arg.clone(),
            });
        }
    }
    Ok(slots)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ResultId {
    Number(i64),
    Text(String),
}

impl ResultId {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) if n.fract() == 0.0 => ResultId::Number(*n as i64),
            other => ResultId::Text(other.to_plain_string()),
        }
    }
}

/// Fingerprint of a context. Contexts with equal keys are interchangeable
/// for generation, so anything a template can branch on must show up here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Default)]
pub struct ContextKey {
    pub current_function: Option<String>,
    pub next_function: Option<String>,
    pub current_table_function: Option<String>,
    pub id_type: Option<Type>,
    pub id0: Option<ResultId>,
    pub id1: Option<ResultId>,
    pub id2: Option<ResultId>,
    pub result_length: usize,
}

#[derive(Debug, Clone)]
pub struct ContextInfo {
    env: DialogueEnv,
    pub state: DialogueState,
    pub current_function: Option<Arc<FunctionDef>>,
    pub current_table_function: Option<Arc<FunctionDef>>,
    pub next_function: Option<Arc<FunctionDef>>,
    pub result_info: Option<ResultInfo>,
    pub is_multi_domain: bool,
    pub previous_domain_idx: Option<usize>,
    pub current_idx: Option<usize>,
    pub next_idx: Option<usize>,
    pub next_info: Option<NextStatementInfo>,
    pub aux: Option<AgentProposal>,
    pub key: ContextKey,
}

impl ContextInfo {
    pub fn env(&self) -> &DialogueEnv {
        &self.env
    }

    pub fn registry(&self) -> &dyn SchemaRegistry {
        self.env.registry.as_ref()
    }

    pub fn config(&self) -> &DialogueConfig {
        &self.env.config
    }

    pub fn current(&self) -> Option<&DialogueHistoryItem> {
        self.current_idx.map(|idx| &self.state.history[idx])
    }

    pub fn next(&self) -> Option<&DialogueHistoryItem> {
        self.next_idx.map(|idx| &self.state.history[idx])
    }

    pub fn previous_domain(&self) -> Option<&DialogueHistoryItem> {
        self.previous_domain_idx.map(|idx| &self.state.history[idx])
    }

    /// Rows of the current item.
    pub fn results(&self) -> Option<&[ResultItem]> {
        self.current().and_then(|item| item.results.as_ref()).map(|r| r.results.as_slice())
    }

    pub fn error(&self) -> Option<&Value> {
        self.current().and_then(|item| item.results.as_ref()).and_then(|r| r.error.as_ref())
    }

    pub fn with_aux(mut self, aux: Option<AgentProposal>) -> Self {
        self.aux = aux;
        self
    }

    /// The current item, for handlers that cannot run without one.
    pub fn require_current(&self) -> Result<&DialogueHistoryItem> {
        self.current()
            .ok_or_else(|| DialogueError::malformed_state(format!("`{}` has no executed statement", self.state.dialogue_act)))
    }

    pub fn require_current_function(&self) -> Result<&Arc<FunctionDef>> {
        self.current_function
            .as_ref()
            .ok_or_else(|| DialogueError::malformed_state(format!("`{}` has no current function", self.state.dialogue_act)))
    }

    pub fn require_results(&self) -> Result<&[ResultItem]> {
        self.results()
            .ok_or_else(|| DialogueError::MissingResultInfo(self.state.dialogue_act.to_string()))
    }

    pub fn require_result_info(&self) -> Result<&ResultInfo> {
        self.result_info
            .as_ref()
            .ok_or_else(|| DialogueError::MissingResultInfo(self.state.dialogue_act.to_string()))
    }

    /// The pending item and its summary, for handlers that act on it.
    pub fn require_next(&self) -> Result<(&DialogueHistoryItem, &NextStatementInfo)> {
        match (self.next(), &self.next_info) {
            (Some(next), Some(info)) => Ok((next, info)),
            _ => Err(DialogueError::malformed_state(format!("`{}` has no pending statement", self.state.dialogue_act))),
        }
    }

    /// The invocation of the pending item when it is a bare action.
    pub fn next_action(&self) -> Result<Option<&crate::ast::Invocation>> {
        match (self.next(), &self.next_info) {
            (Some(next), Some(info)) if info.is_action => Ok(Some(get_invocation(next)?)),
            _ => Ok(None),
        }
    }

    fn compute_key(&mut self) {
        let mut key = ContextKey {
            current_function: self.current_function.as_ref().map(|f| f.qualified_name()),
            next_function: self.next_function.as_ref().map(|f| f.qualified_name()),
            current_table_function: self.current_table_function.as_ref().map(|f| f.qualified_name()),
            ..ContextKey::default()
        };
        if let Some(result_info) = &self.result_info {
            key.id_type = result_info.id_type.clone();
            let results = self.results().unwrap_or_default();
            key.result_length = results.len();
            let id = |i: usize| results.get(i).and_then(ResultItem::id).map(ResultId::from_value);
            key.id0 = id(0);
            key.id1 = id(1);
            key.id2 = id(2);
        }
        self.key = key;
    }
}

/// Scans the history once, front to back.
///
/// The current item is the last executed one; the scan stops at the first
/// unexecuted, non-proposed item, which becomes the next item. Proposed
/// items are skipped but must not precede the current item.
pub fn get_context_info(env: &DialogueEnv, state: DialogueState) -> Result<ContextInfo> {
    let registry = env.registry.as_ref();
    let threshold = env.config.large_result_threshold;

    let mut current_idx: Option<usize> = None;
    let mut next_idx: Option<usize> = None;
    let mut previous_domain_idx: Option<usize> = None;
    let mut current_device: Option<String> = None;
    let mut current_function = None;
    let mut current_table_function = None;
    let mut next_function = None;
    let mut result_info: Option<ResultInfo> = None;
    let mut next_info = None;
    let mut proposed_skip = 0usize;

    for (idx, item) in state.history.iter().enumerate() {
        let schema = registry.resolve(&item.stmt.expression)?;
        if let Some(device) = &current_device {
            if *device != schema.class {
                previous_domain_idx = current_idx;
            }
        }
        if item.confirm == Confirm::Proposed {
            proposed_skip += 1;
            continue;
        }
        if item.results.is_none() {
            let current = current_idx.map(|i| &state.history[i]);
            next_info = Some(NextStatementInfo::new(current, result_info.as_ref(), item, registry)?);
            next_idx = Some(idx);
            next_function = Some(schema);
            break;
        }

        if proposed_skip > 0 {
            return Err(DialogueError::malformed_state(format!(
                "executed item {} follows a proposed item",
                idx
            )));
        }

        current_device = Some(schema.class.clone());
        if let Some(query) = last_query(&item.stmt, registry)? {
            current_table_function = Some(registry.resolve(query)?);
        }
        current_function = Some(schema);
        current_idx = Some(idx);
        result_info = Some(ResultInfo::new(&state, item, registry, threshold)?);
    }

    if let (Some(next), Some(current)) = (next_idx, current_idx) {
        if next != current + 1 + proposed_skip {
            return Err(DialogueError::malformed_state(format!(
                "pending item {} is not right after current item {}",
                next, current
            )));
        }
    }

    let mut ctx = ContextInfo {
        env: env.clone(),
        state,
        current_function,
        current_table_function,
        next_function,
        result_info,
        is_multi_domain: previous_domain_idx.is_some(),
        previous_domain_idx,
        current_idx,
        next_idx,
        next_info,
        aux: None,
        key: ContextKey::default(),
    };
    ctx.compute_key();
    trace!(act = %ctx.state.dialogue_act, current = ?ctx.current_idx, next = ?ctx.next_idx, "built context");
    Ok(ctx)
}

/// Context of a conversation that has not started yet.
pub fn initial_context_info(env: &DialogueEnv) -> Result<ContextInfo> {
    let state = DialogueState::new(env.config.policy_name.clone(), DialogueAct::SysInit, None, Vec::new());
    get_context_info(env, state)
}

/// Whether the user asked about the result (or a specific result) rather
/// than refining the search.
pub fn is_user_asking_result_question(ctx: &ContextInfo) -> Result<bool> {
    if ctx.state.dialogue_act == DialogueAct::ActionQuestion {
        return Ok(true);
    }
    let Some(current_idx) = ctx.current_idx else { return Ok(false) };
    let current = &ctx.state.history[current_idx];
    let Some(table) = last_query(&current.stmt, ctx.registry())? else { return Ok(false) };
    if table.has_computed_projection() {
        return Ok(true);
    }

    if current_idx == 0 {
        // first turn: a question iff it names a specific result
        return Ok(current.stmt.expression.find_filter().map(|f| f.uses_param("id")).unwrap_or(false));
    }

    let Some(current_projection) = ctx.result_info.as_ref().and_then(|info| info.projection.as_ref()) else {
        return Ok(false);
    };
    let previous = &ctx.state.history[current_idx - 1];
    let previous_info = ResultInfo::new(&ctx.state, previous, ctx.registry(), ctx.config().large_result_threshold)?;
    let Some(previous_projection) = previous_info.projection else { return Ok(true) };
    Ok(!current_projection.iter().all(|name| previous_projection.contains(name)))
}
