//! Constructors for the next dialogue state.
//!
//! These never touch the input context: every operation clones what it
//! keeps from `ctx.state` and returns a whole new state, so a rejected or
//! cancelled turn leaves nothing behind.

use crate::ast::manip::{adjust_default_parameters, get_invocation};
use crate::ast::{
    Confirm, DialogueAct, DialogueHistoryItem, DialogueState, Expression, InputParam, Invocation, Statement, Value,
};
use crate::context::ContextInfo;
use crate::error::{DialogueError, Result};

fn new_state(ctx: &ContextInfo, act: DialogueAct, param: Option<Vec<String>>, history: Vec<DialogueHistoryItem>) -> DialogueState {
    DialogueState::new(ctx.config().policy_name.clone(), act, param, history)
}

/// Appends `items` with the given confirmation.
///
/// A proposal replaces any earlier proposal but keeps everything committed
/// before it. Anything else commits to a new course: the history is cut
/// right after the current item and the new items follow.
pub fn add_new_item(
    ctx: &ContextInfo,
    act: DialogueAct,
    param: Option<Vec<String>>,
    confirm: Confirm,
    items: Vec<DialogueHistoryItem>,
) -> Result<DialogueState> {
    let mut new_items = Vec::with_capacity(items.len());
    for item in items {
        let stmt = adjust_default_parameters(&item.stmt, ctx.registry())?;
        new_items.push(DialogueHistoryItem::new(stmt, confirm));
    }

    let mut history: Vec<DialogueHistoryItem> = if confirm == Confirm::Proposed {
        ctx.state.history.iter().take_while(|item| item.confirm != Confirm::Proposed).cloned().collect()
    } else {
        match ctx.current_idx {
            Some(idx) => ctx.state.history[..=idx].to_vec(),
            None => Vec::new(),
        }
    };
    history.extend(new_items);
    Ok(new_state(ctx, act, param, history))
}

/// Wraps each expression in an item and hands them to [`add_new_item`].
pub fn add_new_statement(
    ctx: &ContextInfo,
    act: DialogueAct,
    param: Option<Vec<String>>,
    confirm: Confirm,
    expressions: Vec<Expression>,
) -> Result<DialogueState> {
    let items = expressions
        .into_iter()
        .map(|expr| DialogueHistoryItem::new(Statement::new(expr), confirm))
        .collect();
    add_new_item(ctx, act, param, confirm, items)
}

/// Same history minus any pending proposals.
pub fn make_simple_state(ctx: &ContextInfo, act: DialogueAct, param: Option<Vec<String>>) -> DialogueState {
    let history = ctx
        .state
        .history
        .iter()
        .take_while(|item| item.confirm != Confirm::Proposed)
        .cloned()
        .collect();
    new_state(ctx, act, param, history)
}

/// Overwrites `pname` if present, otherwise adds it keeping parameters sorted by name.
pub fn set_or_add_invocation_param(invocation: &mut Invocation, pname: &str, value: Value) {
    match invocation.in_params.iter_mut().find(|p| p.name == pname) {
        Some(param) => param.value = value,
        None => {
            invocation.in_params.push(InputParam::new(pname, value));
            invocation.in_params.sort_by(|a, b| a.name.cmp(&b.name));
        }
    }
}

/// Copies every defined parameter of `from` into `to`.
pub fn merge_parameters(to: &mut Invocation, from: &Invocation) {
    for param in from.in_params.iter().filter(|p| !p.value.is_undefined()) {
        set_or_add_invocation_param(to, &param.name, param.value.clone());
    }
}

fn invocation_mut(item: &mut DialogueHistoryItem) -> Result<&mut Invocation> {
    let stmt = item.stmt.to_string();
    item.stmt
        .expression
        .invocation_mut()
        .ok_or_else(|| DialogueError::malformed_expression(format!("no invocation in {}", stmt)))
}

/// Whether the pending item invokes the same function as `action`.
fn pending_same_function<'a>(ctx: &'a ContextInfo, action: &Invocation) -> Result<Option<&'a DialogueHistoryItem>> {
    if ctx.next_info.is_none() {
        return Ok(None);
    }
    let Some(next) = ctx.next() else { return Ok(None) };
    let next_invocation = get_invocation(next)?;
    Ok((next_invocation.qualified_name() == action.qualified_name()).then_some(next))
}

/// Sets `pname = value` on `action` and schedules it.
///
/// If the pending item already calls the same function, it is reused, so
/// agent and user never end up with two copies of one action. A fresh
/// invocation gets `$?` for every required input left unset, so it does
/// not look executable before it is.
pub fn add_action_param(
    ctx: &ContextInfo,
    act: DialogueAct,
    action: &Invocation,
    pname: &str,
    value: Value,
    confirm: Confirm,
) -> Result<DialogueState> {
    let item = match pending_same_function(ctx, action)? {
        Some(next) => {
            let mut item = next.clone();
            let invocation = invocation_mut(&mut item)?;
            set_or_add_invocation_param(invocation, pname, value);
            merge_parameters(invocation, action);
            item.confirm = confirm;
            item
        }
        None => {
            let schema = ctx.registry().resolve_invocation(action)?;
            let mut in_params = vec![InputParam::new(pname, value)];
            for param in action.in_params.iter().filter(|p| !p.value.is_undefined() && p.name != pname) {
                in_params.push(param.clone());
            }
            for arg in schema.inputs().filter(|a| a.required) {
                if !in_params.iter().any(|p| p.name == arg.name) && action.param(&arg.name).map(Value::is_undefined) != Some(false) {
                    in_params.push(InputParam::new(arg.name.clone(), Value::Undefined));
                }
            }
            let invocation = Invocation { kind: action.kind.clone(), channel: action.channel.clone(), in_params };
            DialogueHistoryItem::new(Statement::new(Expression::Invocation(invocation)), confirm)
        }
    };
    add_new_item(ctx, act, None, confirm, vec![item])
}

/// Schedules `action` without parameters.
///
/// When the pending item is already that function and nothing would change
/// (a proposal of something already there, or the same confirmation
/// again), the history is kept as is.
pub fn add_action(ctx: &ContextInfo, act: DialogueAct, action: &Invocation, confirm: Confirm) -> Result<DialogueState> {
    let item = match pending_same_function(ctx, action)? {
        Some(next) => {
            if next.results.is_some() {
                return Err(DialogueError::malformed_state("pending item already has results"));
            }
            if confirm == Confirm::Proposed || confirm == next.confirm {
                return Ok(new_state(ctx, act, None, ctx.state.history.clone()));
            }
            DialogueHistoryItem::new(next.stmt.clone(), confirm)
        }
        None => {
            let bare = Invocation::new(action.kind.clone(), action.channel.clone());
            DialogueHistoryItem::new(Statement::new(Expression::Invocation(bare)), confirm)
        }
    };
    add_new_item(ctx, act, None, confirm, vec![item])
}

/// Swaps whatever is pending for `action`.
pub fn replace_action(ctx: &ContextInfo, act: DialogueAct, action: Invocation, confirm: Confirm) -> Result<DialogueState> {
    let item = DialogueHistoryItem::new(Statement::new(Expression::Invocation(action)), confirm);
    add_new_item(ctx, act, None, confirm, vec![item])
}

/// Inserts a query right after the current item. Later committed items
/// survive; pending proposals do not.
pub fn add_query(ctx: &ContextInfo, act: DialogueAct, table: Expression, confirm: Confirm) -> Result<DialogueState> {
    let current_idx = ctx
        .current_idx
        .ok_or_else(|| DialogueError::malformed_state("cannot add a query without a current statement"))?;
    let stmt = adjust_default_parameters(&Statement::new(table), ctx.registry())?;

    let mut history = ctx.state.history[..=current_idx].to_vec();
    history.push(DialogueHistoryItem::new(stmt, confirm));
    history.extend(
        ctx.state.history[current_idx + 1..]
            .iter()
            .filter(|item| item.confirm != Confirm::Proposed)
            .cloned(),
    );
    Ok(new_state(ctx, act, None, history))
}

/// A query and an action answered in the same turn.
pub fn add_query_and_action(
    ctx: &ContextInfo,
    act: DialogueAct,
    table: Expression,
    action: Invocation,
    confirm: Confirm,
) -> Result<DialogueState> {
    let items = vec![
        DialogueHistoryItem::new(Statement::new(table), confirm),
        DialogueHistoryItem::new(Statement::new(Expression::Invocation(action)), confirm),
    ];
    add_new_item(ctx, act, None, confirm, items)
}

/// "Yes" to everything the agent proposed: executed items are dropped and
/// the proposals become accepted. `None` if nothing is proposed.
pub fn accept_all_proposed_statements(ctx: &ContextInfo) -> Option<DialogueState> {
    ctx.state.first_proposed_idx()?;
    let history = ctx
        .state
        .history
        .iter()
        .filter(|item| item.results.is_none())
        .map(|item| match item.confirm {
            Confirm::Proposed => DialogueHistoryItem::new(item.stmt.clone(), Confirm::Accepted),
            _ => item.clone(),
        })
        .collect();
    Some(new_state(ctx, DialogueAct::Execute, None, history))
}
