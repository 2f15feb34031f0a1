//! Schema-aware helpers over statements and filters.

use super::dialogue::DialogueHistoryItem;
use super::expression::{Expression, Invocation, Statement};
use super::filter::{Filter, Operator};
use super::schema::{ArgumentDef, FunctionDef, SchemaRegistry};
use super::value::{Type, Value};
use crate::error::{DialogueError, Result};

/// The last step of the statement that is a query, if any.
pub fn last_query<'a>(stmt: &'a Statement, registry: &dyn SchemaRegistry) -> Result<Option<&'a Expression>> {
    for step in stmt.steps().iter().rev() {
        if registry.resolve(step)?.is_query() {
            return Ok(Some(step));
        }
    }
    Ok(None)
}

/// The invocation that a history item ultimately performs.
pub fn get_invocation(item: &DialogueHistoryItem) -> Result<&Invocation> {
    item.stmt
        .last()
        .invocation()
        .ok_or_else(|| DialogueError::MalformedExpression(format!("no invocation in {}", item.stmt)))
}

/// No placeholder left anywhere, and every `require_either` group satisfied.
pub fn is_executable(stmt: &Statement, registry: &dyn SchemaRegistry) -> Result<bool> {
    if stmt.has_undefined() {
        return Ok(false);
    }
    for step in stmt.steps() {
        let schema = registry.resolve(step)?;
        let Some(invocation) = step.invocation() else { continue };
        for group in schema.require_either() {
            if !group.iter().any(|name| invocation.param(name).is_some()) {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

/// Drops input parameters that merely restate the declared default.
pub fn adjust_default_parameters(stmt: &Statement, registry: &dyn SchemaRegistry) -> Result<Statement> {
    let mut adjusted = stmt.clone();
    let steps: Vec<&mut Expression> = match &mut adjusted.expression {
        Expression::Chain(steps) => steps.iter_mut().collect(),
        other => vec![other],
    };
    for step in steps {
        let Some(invocation) = step.invocation_mut() else { continue };
        let schema = registry.resolve_invocation(invocation)?;
        invocation.in_params.retain(|p| {
            match schema.argument(&p.name).and_then(ArgumentDef::default_value) {
                Some(default) => default != p.value,
                None => true,
            }
        });
    }
    Ok(adjusted)
}

/// A fresh request must not name a result by id.
pub fn check_valid_query(stmt: &Statement) -> bool {
    !stmt.steps().iter().any(|step| step.find_filter().map(has_id_equality).unwrap_or(false))
}

fn has_id_equality(filter: &Filter) -> bool {
    match filter {
        Filter::Atom { .. } => filter.is_id_equality(),
        Filter::Not(inner) => has_id_equality(inner),
        Filter::And(operands) | Filter::Or(operands) => operands.iter().any(has_id_equality),
        _ => false,
    }
}

/// Whether `filter` narrows `schema` down to a fixed set of results, e.g.
/// `id == "r1"` or `id == "r1" || id == "r2"`.
pub fn check_filter_uniqueness(filter: &Filter, schema: &FunctionDef) -> bool {
    match filter {
        Filter::And(operands) => operands.iter().any(|f| check_filter_uniqueness(f, schema)),
        Filter::Or(operands) => !operands.is_empty() && operands.iter().all(|f| check_filter_uniqueness(f, schema)),
        Filter::Atom { name, operator: Operator::Eq | Operator::InArray, .. } => {
            schema.argument(name).map(ArgumentDef::unique).unwrap_or(false)
        }
        _ => false,
    }
}

/// List-ness of a table: a list function stops being one once a unique
/// filter is applied anywhere below the top.
pub fn table_is_list(table: &Expression, schema: &FunctionDef) -> bool {
    if !schema.is_list {
        return false;
    }
    let mut current = table;
    loop {
        match current {
            Expression::Filter { filter, .. } if check_filter_uniqueness(filter, schema) => return false,
            Expression::Invocation(_) | Expression::Chain(_) => return true,
            other => match other.inner() {
                Some(inner) => current = inner,
                None => return true,
            },
        }
    }
}

/// Whether `filter` is well-typed against the outputs of `schema`.
pub fn check_filter(filter: &Filter, schema: &FunctionDef) -> bool {
    match filter {
        Filter::True | Filter::False | Filter::External { .. } | Filter::Compute { .. } => true,
        Filter::DontCare { name } => schema
            .argument(name)
            .map(|arg| arg.is_output() && arg.filterable())
            .unwrap_or(false),
        Filter::Atom { name, operator, value } => check_atom_filter(name, *operator, value, schema),
        Filter::Not(inner) => check_filter(inner, schema),
        Filter::And(operands) | Filter::Or(operands) => operands.iter().all(|f| check_filter(f, schema)),
    }
}

fn check_atom_filter(name: &str, operator: Operator, value: &Value, schema: &FunctionDef) -> bool {
    let Some(arg) = schema.argument(name) else { return false };
    if arg.is_input || !arg.filterable() {
        return false;
    }
    let ty = &arg.ty;
    match operator {
        Operator::Contains | Operator::ContainsLike => match ty {
            Type::Array(elem) => elem.is_assignable(value) || matches!(value, Value::String(_)),
            _ => false,
        },
        Operator::InArray | Operator::InArrayLike => match value {
            Value::Array(values) => values.iter().all(|v| ty.is_assignable(v)),
            _ => false,
        },
        Operator::Ge | Operator::Le => {
            matches!(ty, Type::Number | Type::Measure(_) | Type::Date) && ty.is_assignable(value)
        }
        Operator::Like | Operator::StartsWith | Operator::EndsWith => {
            matches!(ty, Type::String | Type::Entity(_)) && matches!(value, Value::String(_) | Value::Undefined)
        }
        Operator::Eq => ty.is_assignable(value),
    }
}
