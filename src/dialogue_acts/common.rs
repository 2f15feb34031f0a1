//! Checks shared by the dialogue act handlers.
//!
//! The compatibility checks over-approximate: anything they cannot evaluate
//! (get-predicates, computations, unknown operators) counts as compatible.

use std::sync::Arc;

use crate::ast::{is_same_function, Expression, Filter, FunctionDef, Invocation, Operator, ResultItem, Type, Value};
use crate::context::ContextInfo;
use crate::slot_bag::SlotBag;
use crate::state::set_or_add_invocation_param;

/// A parameter of a specific function the agent or user refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSlot {
    pub function: Arc<FunctionDef>,
    pub name: String,
    pub ty: Type,
}

impl ParamSlot {
    /// The slot for `name` in `function`, if it has such an argument.
    pub fn new(function: &Arc<FunctionDef>, name: &str) -> Option<Self> {
        let arg = function.argument(name)?;
        Some(Self { function: function.clone(), name: name.to_string(), ty: arg.ty.clone() })
    }
}

/// A filter offered by the user, with the function it was parsed against.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSlot {
    pub function: Arc<FunctionDef>,
    pub filter: Filter,
}

/// Answers carrying a single value, with or without the parameter it is for.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamAnswer {
    Value(Value),
    Named(String, Value),
}

/// Whether what the agent said about an entity (`info`) can satisfy `filter`.
pub fn is_filter_compatible_with_info(info: &SlotBag, filter: &Filter) -> bool {
    match filter {
        Filter::True | Filter::DontCare { .. } => true,
        Filter::False => false,
        Filter::Or(operands) => operands.iter().any(|f| is_filter_compatible_with_info(info, f)),
        Filter::And(operands) => operands.iter().all(|f| is_filter_compatible_with_info(info, f)),
        Filter::Not(inner) => !is_filter_compatible_with_info(info, inner),
        Filter::External { .. } | Filter::Compute { .. } => true,
        Filter::Atom { name, operator, value } => {
            let Some(known) = info.get(name) else { return false };
            if !value.is_constant() {
                return true;
            }
            match operator {
                Operator::Eq | Operator::Like => value == known,
                Operator::Contains | Operator::ContainsLike => match known {
                    Value::Array(items) => items.iter().any(|v| v == value),
                    _ => false,
                },
                Operator::InArray | Operator::InArrayLike => match value {
                    Value::Array(items) => items.iter().any(|v| v == known),
                    _ => false,
                },
                Operator::Ge => compare_numbers(known, value, |a, b| a >= b),
                Operator::Le => compare_numbers(known, value, |a, b| a <= b),
                Operator::StartsWith | Operator::EndsWith => true,
            }
        }
    }
}

fn compare_numbers(known: &Value, value: &Value, cmp: fn(f64, f64) -> bool) -> bool {
    match (known.as_number(), value.as_number()) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => true,
    }
}

/// Whether the row `result` can satisfy `filter`. A value the row does not
/// carry never matches.
pub fn is_filter_compatible_with_result(result: &ResultItem, filter: &Filter) -> bool {
    match filter {
        Filter::True | Filter::DontCare { .. } => true,
        Filter::False => false,
        Filter::And(operands) => operands.iter().all(|f| is_filter_compatible_with_result(result, f)),
        Filter::Or(operands) => operands.iter().any(|f| is_filter_compatible_with_result(result, f)),
        Filter::Not(inner) => !is_filter_compatible_with_result(result, inner),
        Filter::External { .. } | Filter::Compute { .. } => true,
        Filter::Atom { name, operator, value } => {
            let Some(result_value) = result.get(name) else { return false };
            if let Value::Entity { display, .. } = result_value {
                return if *operator == Operator::Like {
                    display.as_deref() == Some(value.to_plain_string().as_str())
                } else {
                    result_value.to_plain_string() == value.to_plain_string()
                };
            }
            match operator {
                Operator::Eq | Operator::Like => result_value.to_plain_string() == value.to_plain_string(),
                _ => true,
            }
        }
    }
}

/// Arrays match when the mentioned values are a subset of the row's.
pub fn is_slot_compatible_with_result(result: &ResultItem, pname: &str, info_value: &Value) -> bool {
    let Some(result_value) = result.get(pname) else { return false };
    match (result_value, info_value) {
        (Value::Array(row), Value::Array(mentioned)) => mentioned.iter().all(|v| row.contains(v)),
        _ => result_value == info_value,
    }
}

pub fn is_info_phrase_compatible_with_result(result: &ResultItem, info: &SlotBag) -> bool {
    info.iter().all(|(pname, value)| is_slot_compatible_with_result(result, pname, value))
}

/// `info` describes outputs of the current function.
pub fn check_info_phrase(ctx: &ContextInfo, info: &SlotBag) -> bool {
    let Some(current_function) = &ctx.current_function else { return false };
    if info.function.as_deref() != Some(current_function.qualified_name().as_str()) {
        return false;
    }
    info.keys().all(|key| current_function.argument(key).map(|arg| arg.is_output()).unwrap_or(false))
}

/// Every question is a filterable output of `function`.
pub fn is_valid_search_question(function: &FunctionDef, questions: &[ParamSlot]) -> bool {
    questions.iter().all(|q| {
        if !is_same_function(&q.function, function) {
            return false;
        }
        match function.argument(&q.name) {
            Some(arg) => arg.is_output() && arg.filterable(),
            None => false,
        }
    })
}

/// Fills in whatever `to` leaves unset from `from`.
pub fn add_parameters_from_context(to: &Invocation, from: &Invocation) -> Invocation {
    let mut merged = to.clone();
    for param in from.in_params.iter().filter(|p| !p.value.is_undefined()) {
        let set = to.param(&param.name).map(|v| !v.is_undefined()).unwrap_or(false);
        if !set {
            set_or_add_invocation_param(&mut merged, &param.name, param.value.clone());
        }
    }
    merged
}

/// The input of `action` that takes the `id` of `top_result`.
pub fn find_chain_param(top_result: &ResultItem, action: &FunctionDef) -> Option<String> {
    let result_type = top_result.id()?.get_type();
    action.inputs().find(|arg| arg.ty == result_type).map(|arg| arg.name.clone())
}

/// A filter sitting directly on an invocation.
pub fn is_simple_filter_expression(table: &Expression) -> bool {
    matches!(table, Expression::Filter { expression, .. } if matches!(**expression, Expression::Invocation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thai_place() -> SlotBag {
        let mut info = SlotBag::new(Some("com.yelp:restaurant".into()));
        info.set("cuisine", Value::string("thai"));
        info.set("rating", Value::Number(4.5));
        info
    }

    #[test]
    fn test_info_compatibility_approximates_unknowns() {
        let info = thai_place();
        assert!(is_filter_compatible_with_info(&info, &Filter::eq("cuisine", Value::string("thai"))));
        assert!(!is_filter_compatible_with_info(&info, &Filter::eq("cuisine", Value::string("lao"))));
        assert!(is_filter_compatible_with_info(&info, &Filter::atom("rating", Operator::Ge, Value::Number(4.0))));
        // not mentioned: cannot be claimed
        assert!(!is_filter_compatible_with_info(&info, &Filter::eq("price", Value::string("cheap"))));
        assert!(is_filter_compatible_with_info(&info, &Filter::negate(Filter::eq("price", Value::string("cheap")))));
    }

    #[test]
    fn test_result_compatibility_uses_entity_display() {
        let row = ResultItem::new([
            ("id".to_string(), Value::entity("r1", "com.yelp:restaurant", Some("Thai Basil"))),
            ("cuisine".to_string(), Value::string("thai")),
        ]);
        assert!(is_filter_compatible_with_result(&row, &Filter::atom("id", Operator::Like, Value::string("Thai Basil"))));
        assert!(is_filter_compatible_with_result(&row, &Filter::eq("cuisine", Value::string("thai"))));
        assert!(!is_filter_compatible_with_result(&row, &Filter::eq("rating", Value::Number(3.0))));
    }
}
