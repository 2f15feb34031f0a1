//! Rewriting the filter and projection of a query pipeline.
//!
//! The filter to refine is located as a path of steps from the root; the
//! pipeline is then rebuilt around the replaced node, so no node is ever
//! mutated through a parent reference.

use tracing::debug;

use super::slots::refine_filter_to_change_filter;
use crate::ast::{is_same_function, Confirm, DialogueAct, DialogueState, Expression, Filter, SchemaRegistry, Type};
use crate::context::ContextInfo;
use crate::dialogue_acts::common::{is_filter_compatible_with_info, is_simple_filter_expression};
use crate::error::{DialogueError, Result};
use crate::slot_bag::SlotBag;
use crate::state::add_query;

/// Combines the filter in the context with the filter the user offered.
pub type RefineFn = fn(&Filter, &Filter) -> Option<Filter>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStep {
    /// Into the operand of a single-input stage.
    Inner,
    /// Into the given step of a chain.
    ChainStep(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterLocation {
    pub path: Vec<PathStep>,
    /// `false` when the path ends at the bare invocation, where a `true`
    /// filter has to be synthesized.
    pub exists: bool,
}

/// Where the filter of a pipeline is, or where it would go. `None` when the
/// filter would end up under an aggregation, or the chain has no query.
pub fn find_or_make_filter_expression(root: &Expression, registry: &dyn SchemaRegistry) -> Result<Option<FilterLocation>> {
    let mut path = Vec::new();
    let mut expr = root;
    loop {
        match expr {
            Expression::Filter { .. } => return Ok(Some(FilterLocation { path, exists: true })),
            Expression::Invocation(_) => return Ok(Some(FilterLocation { path, exists: false })),
            Expression::Aggregation { .. } => return Ok(None),
            Expression::Sort { expression, .. }
            | Expression::Index { expression, .. }
            | Expression::Slice { expression, .. }
            | Expression::Projection { expression, .. } => {
                path.push(PathStep::Inner);
                expr = expression;
            }
            Expression::Chain(steps) => {
                // the right-most query; never the action
                let mut last_query = None;
                for (i, step) in steps.iter().enumerate().rev() {
                    if registry.resolve(step)?.is_query() {
                        last_query = Some(i);
                        break;
                    }
                }
                let Some(i) = last_query else { return Ok(None) };
                path.push(PathStep::ChainStep(i));
                expr = &steps[i];
            }
        }
    }
}

/// Rebuilds `expr` with the node at `path` replaced by `f(node)`. `Ok(None)`
/// if `f` rejects the node.
pub fn replace_at(
    expr: Expression,
    path: &[PathStep],
    f: impl FnOnce(Expression) -> Option<Expression>,
) -> Result<Option<Expression>> {
    let Some((step, rest)) = path.split_first() else {
        return Ok(f(expr));
    };
    match (step, expr) {
        (PathStep::ChainStep(i), Expression::Chain(mut steps)) if *i < steps.len() => {
            let node = std::mem::replace(&mut steps[*i], Expression::Chain(Vec::new()));
            match replace_at(node, rest, f)? {
                Some(replaced) => {
                    steps[*i] = replaced;
                    Ok(Some(Expression::Chain(steps)))
                }
                None => Ok(None),
            }
        }
        (PathStep::Inner, mut expr) => {
            let slot = match &mut expr {
                Expression::Filter { expression, .. }
                | Expression::Projection { expression, .. }
                | Expression::Sort { expression, .. }
                | Expression::Index { expression, .. }
                | Expression::Slice { expression, .. }
                | Expression::Aggregation { expression, .. } => expression,
                other => {
                    return Err(DialogueError::MalformedExpression(format!("no operand to descend into at {}", other)))
                }
            };
            let node = std::mem::replace(slot.as_mut(), Expression::Chain(Vec::new()));
            match replace_at(node, rest, f)? {
                Some(replaced) => {
                    **slot = replaced;
                    Ok(Some(expr))
                }
                None => Ok(None),
            }
        }
        (step, expr) => Err(DialogueError::MalformedExpression(format!("path step {:?} does not apply to {}", step, expr))),
    }
}

fn map_last(expr: Expression, f: impl FnOnce(Expression) -> Expression) -> Expression {
    match expr {
        Expression::Chain(mut steps) => {
            if let Some(last) = steps.pop() {
                steps.push(f(last));
            }
            Expression::Chain(steps)
        }
        other => f(other),
    }
}

/// Refines the filter of `ctx_expression` with `new_filter` through `refine`,
/// and replaces or narrows its projection.
///
/// With `new_projection`, any existing projection is replaced. Without it,
/// columns the refined filter now constrains are dropped from the existing
/// projection, and an emptied projection is removed.
pub fn query_refinement(
    ctx_expression: &Expression,
    new_filter: Option<&Filter>,
    refine: Option<RefineFn>,
    new_projection: Option<&[String]>,
    registry: &dyn SchemaRegistry,
) -> Result<Option<Expression>> {
    let mut expression = ctx_expression.clone();
    let mut refined_filter: Option<Filter> = None;

    if let Some(new_filter) = new_filter {
        let refine = refine.ok_or_else(|| {
            DialogueError::MalformedExpression("a filter refinement needs a refinement function".to_string())
        })?;
        let Some(location) = find_or_make_filter_expression(&expression, registry)? else {
            debug!("no place for a filter in {}", expression);
            return Ok(None);
        };

        let rebuilt = replace_at(expression, &location.path, |node| {
            let (inner, old_filter) = match node {
                Expression::Filter { expression, filter } => (*expression, filter),
                invocation @ Expression::Invocation(_) => (invocation, Filter::True),
                _ => return None,
            };
            // TODO push the filter down through joins instead of giving up
            if !matches!(inner, Expression::Invocation(_)) {
                return None;
            }
            let refined = refine(&old_filter, new_filter)?;
            refined_filter = Some(refined.clone());
            Some(Expression::filter(inner, refined))
        })?;
        let Some(rebuilt) = rebuilt else {
            debug!("filter refinement rejected");
            return Ok(None);
        };
        expression = rebuilt;
    }

    let expression = match new_projection {
        Some(args) => map_last(expression, |last| {
            let base = match last {
                Expression::Projection { expression, .. } => *expression,
                other => other,
            };
            Expression::projection(base, args.to_vec())
        }),
        None => {
            let refined = refined_filter.ok_or_else(|| {
                DialogueError::MalformedExpression("refinement needs a new filter or a new projection".to_string())
            })?;
            map_last(expression, |last| match last {
                Expression::Projection { expression, args, computations } => {
                    let narrowed: Vec<String> = args.into_iter().filter(|a| !refined.uses_param(a)).collect();
                    if narrowed.is_empty() {
                        *expression
                    } else {
                        Expression::Projection { expression, args: narrowed, computations }
                    }
                }
                other => other,
            })
        }
    };

    Ok(Some(expression))
}

/// The user answered a proposal of any kind with a search of their own.
pub fn proposal_reply(ctx: &ContextInfo, request: &Expression, refine: RefineFn) -> Result<Option<DialogueState>> {
    let Some(current_function) = &ctx.current_function else { return Ok(None) };
    let request_function = ctx.registry().resolve(request)?;
    if !is_same_function(current_function, &request_function) {
        return Ok(None);
    }
    let Expression::Filter { filter, .. } = request else { return Ok(None) };
    if !is_simple_filter_expression(request) {
        return Ok(None);
    }
    let Some(current) = ctx.current() else { return Ok(None) };

    let Some(new_table) = query_refinement(&current.stmt.expression, Some(filter), Some(refine), None, ctx.registry())? else {
        return Ok(None);
    };
    add_query(ctx, DialogueAct::Execute, new_table, Confirm::Accepted).map(Some)
}

/// Folds "not that one" (`preamble`) and "I want ..." (`request`) into one
/// request. The preamble has to describe what the agent offered (`info`).
pub fn combine_preamble_and_request(
    preamble: Option<&Expression>,
    request: Option<&Expression>,
    info: Option<&SlotBag>,
    proposal_type: Option<&Type>,
    registry: &dyn SchemaRegistry,
) -> Result<Option<Expression>> {
    if let Some(preamble) = preamble {
        let Some(info) = info else { return Ok(None) };
        if !is_filter_compatible_with_info(info, split_filter(preamble)?.1) {
            return Ok(None);
        }
    }

    let combined = match (preamble, request) {
        (Some(preamble), Some(request)) => {
            if !is_same_function(&*registry.resolve(preamble)?, &*registry.resolve(request)?) {
                return Ok(None);
            }
            let (_, preamble_filter) = split_filter(preamble)?;
            let (inner, request_filter) = split_filter(request)?;
            if refine_filter_to_change_filter(preamble_filter, request_filter).is_none() {
                return Ok(None);
            }
            Expression::filter(
                inner.clone(),
                Filter::And(vec![Filter::negate(preamble_filter.clone()), request_filter.clone()]),
            )
        }
        (Some(preamble), None) => {
            let (inner, filter) = split_filter(preamble)?;
            Expression::filter(inner.clone(), Filter::negate(filter.clone()))
        }
        (None, Some(request)) => request.clone(),
        (None, None) => return Err(DialogueError::MalformedExpression("neither preamble nor request".to_string())),
    };

    if let Some(proposal_type) = proposal_type {
        let schema = registry.resolve(&combined)?;
        if schema.id_type() != Some(proposal_type) {
            return Ok(None);
        }
    }
    Ok(Some(combined))
}

fn split_filter(expr: &Expression) -> Result<(&Expression, &Filter)> {
    match expr {
        Expression::Filter { expression, filter } => Ok((expression, filter)),
        other => Err(DialogueError::MalformedExpression(format!("expected a filter expression, got {}", other))),
    }
}
