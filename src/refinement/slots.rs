//! Slot maps and the three ways an old filter can be combined with a new one.

use std::collections::BTreeMap;
use tracing::trace;

use crate::ast::Filter;

/// Name → top-level clause of a flattened conjunction.
pub type SlotMap = BTreeMap<String, Filter>;

/// Top-level atoms and don't-cares; anything nested under `or`, `not` or a
/// get-predicate is ignored.
pub fn filter_to_slots(filter: &Filter) -> SlotMap {
    let mut slots = SlotMap::new();
    for operand in filter.clone().optimize().into_conjuncts() {
        match &operand {
            Filter::Atom { name, .. } | Filter::DontCare { name } => {
                slots.insert(name.clone(), operand.clone());
            }
            _ => {}
        }
    }
    slots
}

/// Top-level `not(atom)` and `not(dontcare)` clauses, keyed by the negated name.
pub fn filter_to_negated_slots(filter: &Filter) -> SlotMap {
    let mut slots = SlotMap::new();
    for operand in filter.clone().optimize().into_conjuncts() {
        if let Filter::Not(inner) = &operand {
            if let Filter::Atom { name, .. } | Filter::DontCare { name } = inner.as_ref() {
                slots.insert(name.clone(), operand.clone());
            }
        }
    }
    slots
}

/// Replaces every `id == v` atom with `true`, so that a previously picked
/// entity does not pin down the next search.
pub fn neutralize_id_filter(filter: &Filter) -> Filter {
    match filter {
        Filter::Not(inner) => Filter::Not(Box::new(neutralize_id_filter(inner))),
        Filter::And(operands) => Filter::And(operands.iter().map(neutralize_id_filter).collect()),
        Filter::Or(operands) => Filter::Or(operands.iter().map(neutralize_id_filter).collect()),
        atom if atom.is_id_equality() => Filter::True,
        other => other.clone(),
    }
}

/// The user answered exactly what was asked (or accepted a refinement as is).
/// Fails if any parameter is already constrained by the context.
pub fn refine_filter_to_answer_question(ctx_filter: &Filter, refined_filter: &Filter) -> Option<Filter> {
    let ctx_params = ctx_filter.params();
    let refined_params = refined_filter.params();
    if let Some(overlap) = ctx_params.intersection(&refined_params).next() {
        trace!("refinement rejected: `{}` already constrained", overlap);
        return None;
    }

    Some(Filter::And(vec![neutralize_id_filter(ctx_filter), refined_filter.clone()]).optimize())
}

/// The user replied to a proposal with new constraints: new parameters are
/// fine, and at most one existing parameter may change value.
pub fn refine_filter_to_answer_question_or_change_filter(ctx_filter: &Filter, refined_filter: &Filter) -> Option<Filter> {
    let ctx_filter = ctx_filter.clone().optimize();
    let refined_filter = refined_filter.clone().optimize();

    let ctx_slots = filter_to_slots(&ctx_filter);
    let refined_slots = filter_to_slots(&refined_filter);
    let negated_refined_slots = filter_to_negated_slots(&refined_filter);

    let mut changed_param: Option<&str> = None;
    for (key, ctx_clause) in &ctx_slots {
        if negated_refined_slots.contains_key(key) {
            return None;
        }
        let Some(refined_clause) = refined_slots.get(key) else { continue };
        // a don't-care can only be overridden by an explicit change
        if matches!(ctx_clause, Filter::DontCare { .. }) {
            return None;
        }
        if refined_clause == ctx_clause {
            return None;
        }
        if changed_param.is_some() {
            return None;
        }
        changed_param = Some(key);
    }

    let mut clauses: Vec<Filter> = ctx_filter
        .into_conjuncts()
        .into_iter()
        .filter(|clause| match clause {
            Filter::Atom { name, .. } | Filter::DontCare { name } => !refined_slots.contains_key(name),
            _ => true,
        })
        .map(|clause| neutralize_id_filter(&clause))
        .collect();
    clauses.push(refined_filter);
    Some(Filter::And(clauses).optimize())
}

/// Zero-result recovery and "no, something else": every parameter in the new
/// filter must already be in the context, and at least one must change.
///
/// Context clauses holding a get-predicate are always dropped.
pub fn refine_filter_to_change_filter(ctx_filter: &Filter, refined_filter: &Filter) -> Option<Filter> {
    let ctx_filter = ctx_filter.clone().optimize();
    let refined_filter = refined_filter.clone().optimize();

    let ctx_slots = filter_to_slots(&ctx_filter);
    let refined_slots = filter_to_slots(&refined_filter);

    for (key, ctx_clause) in &ctx_slots {
        if refined_slots.get(key) == Some(ctx_clause) {
            return None;
        }
    }
    if refined_slots.keys().any(|key| !ctx_slots.contains_key(key)) {
        return None;
    }

    let mut clauses: Vec<Filter> = ctx_filter
        .into_conjuncts()
        .into_iter()
        .filter(|clause| is_good_clause_for_change(clause, &refined_filter))
        .collect();
    clauses.push(refined_filter);
    Some(Filter::And(clauses).optimize())
}

fn is_good_clause_for_change(clause: &Filter, refined: &Filter) -> bool {
    match clause {
        Filter::External { .. } => false,
        Filter::Atom { name, .. } | Filter::DontCare { name } => !refined.uses_param(name),
        Filter::Not(inner) => is_good_clause_for_change(inner, refined),
        Filter::And(operands) | Filter::Or(operands) => {
            operands.iter().all(|op| is_good_clause_for_change(op, refined))
        }
        Filter::True | Filter::False | Filter::Compute { .. } => true,
    }
}
