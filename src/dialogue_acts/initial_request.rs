//! A fresh command from the user, at the start of the conversation or in
//! the middle of another one.

use tracing::debug;

use super::common::FilterSlot;
use crate::ast::manip::{adjust_default_parameters, check_valid_query, last_query};
use crate::ast::{
    is_same_function, Confirm, ConfirmPolicy, DialogueAct, DialogueHistoryItem, DialogueState, Expression, Filter,
    SchemaRegistry, Statement, Type, Value,
};
use crate::config::DialogueEnv;
use crate::context::ContextInfo;
use crate::error::{DialogueError, Result};
use crate::refinement::{find_or_make_filter_expression, replace_at};
use crate::state::{add_new_item, set_or_add_invocation_param};

/// Prefix of var-refs standing for constants lifted out of the command.
const CONST_PREFIX: &str = "__const_";

fn uses_id_filter(table: &Expression) -> bool {
    table.find_filter().map(|f| f.uses_param("id")).unwrap_or(false)
}

/// Splits the command into the statements the dialogue will track.
///
/// A `query => action` chain becomes two statements unless the action runs
/// without confirmation, and an action on an entity gets the query that
/// lists those entities in front of it. `None` if the command names the
/// entity directly or passes anything but `id` into the action.
pub fn adjust_statements_for_initial_request(
    stmt: &Statement,
    registry: &dyn SchemaRegistry,
) -> Result<Option<Vec<Statement>>> {
    if !check_valid_query(stmt) {
        debug!("{} selects a result by id", stmt);
        return Ok(None);
    }

    let mut statements = Vec::new();
    match stmt.steps() {
        [table, action] => {
            let Expression::Invocation(invocation) = action else {
                return Err(DialogueError::malformed_expression(format!("{} does not end in an action", stmt)));
            };
            let schema = registry.resolve(action)?;
            if schema.confirm_policy() == ConfirmPolicy::Auto {
                let table = match table {
                    Expression::Index { .. } | Expression::Slice { .. } => table.clone(),
                    _ if uses_id_filter(table) => Expression::index(table.clone(), vec![Value::Number(1.0)]),
                    _ => table.clone(),
                };
                statements.push(Statement::new(Expression::Chain(vec![table, action.clone()])));
            } else {
                let mut invocation = invocation.clone();
                for param in invocation.in_params.iter_mut() {
                    let Value::VarRef(name) = &param.value else { continue };
                    if name.starts_with(CONST_PREFIX) {
                        continue;
                    }
                    if name != "id" {
                        debug!("cannot pass {} into {}", name, schema.qualified_name());
                        return Ok(None);
                    }
                    param.value = Value::Undefined;
                }
                statements.push(Statement::new(table.clone()));
                statements.push(Statement::new(Expression::Invocation(invocation)));
            }
        }
        [first] if registry.resolve(first)?.is_action() => {
            let Expression::Invocation(invocation) = first else {
                return Err(DialogueError::malformed_expression(format!("action {} is not a bare invocation", stmt)));
            };
            let schema = registry.resolve(first)?;

            let mut id_arg = None;
            for arg in schema.inputs() {
                let Type::Entity(kind) = &arg.ty else { continue };
                let Some(query) = registry.id_query(kind) else { continue };
                let value = invocation.param(&arg.name);
                if value.is_none() && !arg.required {
                    continue;
                }
                if matches!(value, Some(Value::Entity { .. })) {
                    debug!("{} names the {} directly", stmt, kind);
                    return Ok(None);
                }
                if id_arg.is_some() {
                    return Err(DialogueError::malformed_expression(format!(
                        "{} takes more than one entity with an id query",
                        schema.qualified_name()
                    )));
                }
                id_arg = Some((arg.name.clone(), query));
            }

            match id_arg {
                None => statements.push(stmt.clone()),
                Some((name, query)) => {
                    let table = Expression::Invocation(query.invocation());
                    if schema.confirm_policy() == ConfirmPolicy::Auto {
                        let mut invocation = invocation.clone();
                        set_or_add_invocation_param(&mut invocation, &name, Value::VarRef("id".to_string()));
                        statements.push(Statement::new(Expression::Chain(vec![table, Expression::Invocation(invocation)])));
                    } else {
                        statements.push(Statement::new(table));
                        statements.push(stmt.clone());
                    }
                }
            }
        }
        [_] => statements.push(stmt.clone()),
        _ => {
            return Err(DialogueError::malformed_expression(format!("{} has more than two steps", stmt)));
        }
    }

    statements.iter().map(|s| adjust_default_parameters(s, registry)).collect::<Result<Vec<_>>>().map(Some)
}

/// The first state of a conversation opened with `stmt`.
pub fn initial_request(env: &DialogueEnv, stmt: &Statement) -> Result<Option<DialogueState>> {
    let Some(statements) = adjust_statements_for_initial_request(stmt, env.registry.as_ref())? else {
        return Ok(None);
    };
    let history = statements.into_iter().map(|s| DialogueHistoryItem::new(s, Confirm::Accepted)).collect();
    Ok(Some(DialogueState::new(env.config.policy_name.clone(), DialogueAct::Execute, None, history)))
}

/// A new command in the middle of the conversation, dropping whatever was
/// still pending.
pub fn start_new_request(ctx: &ContextInfo, stmt: &Statement) -> Result<Option<DialogueState>> {
    if ctx.config().strict_multidomain {
        if let Some(current) = ctx.current() {
            let current_class = &ctx.registry().resolve(current.stmt.last())?.class;
            if *current_class == ctx.registry().resolve(stmt.last())?.class {
                debug!("strict multidomain: {} stays on {}", stmt, current_class);
                return Ok(None);
            }
        }
    }
    let Some(statements) = adjust_statements_for_initial_request(stmt, ctx.registry())? else {
        return Ok(None);
    };
    let items = statements.into_iter().map(|s| DialogueHistoryItem::new(s, Confirm::Accepted)).collect();
    add_new_item(ctx, DialogueAct::Execute, None, Confirm::Accepted, items).map(Some)
}

/// "Any cuisine is fine": adds `dontcare` to the search of a fresh request.
pub fn add_initial_dont_care(
    stmt: &Statement,
    dontcare: &FilterSlot,
    registry: &dyn SchemaRegistry,
) -> Result<Option<Statement>> {
    let Filter::DontCare { name } = &dontcare.filter else {
        return Err(DialogueError::malformed_expression(format!("{} is not a don't-care", dontcare.filter)));
    };
    let Some(table) = last_query(stmt, registry)? else { return Ok(None) };
    let schema = registry.resolve(table)?;
    if !is_same_function(&schema, &dontcare.function) || !schema.is_list {
        return Ok(None);
    }
    match schema.argument(name) {
        Some(arg) if arg.is_output() && arg.filterable() => {}
        _ => return Ok(None),
    }

    let Some(location) = find_or_make_filter_expression(&stmt.expression, registry)? else { return Ok(None) };
    let replaced = replace_at(stmt.expression.clone(), &location.path, |node| match node {
        Expression::Filter { expression, filter } => {
            if !matches!(*expression, Expression::Invocation(_)) || filter.uses_param(name) {
                return None;
            }
            let filter = Filter::And(vec![filter, dontcare.filter.clone()]).optimize();
            Some(Expression::Filter { expression, filter })
        }
        invocation @ Expression::Invocation(_) => Some(Expression::filter(invocation, dontcare.filter.clone())),
        _ => None,
    })?;
    Ok(replaced.map(Statement::new))
}
