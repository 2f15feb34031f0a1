use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::expression::Invocation;
use super::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "=~")]
    Like,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "contains~")]
    ContainsLike,
    #[serde(rename = "in_array")]
    InArray,
    #[serde(rename = "in_array~")]
    InArrayLike,
    #[serde(rename = "starts_with")]
    StartsWith,
    #[serde(rename = "ends_with")]
    EndsWith,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Like => "=~",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Contains => "contains",
            Operator::ContainsLike => "contains~",
            Operator::InArray => "in_array",
            Operator::InArrayLike => "in_array~",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar computation over parameters, e.g. `distance(geo, here)` or `count(reviews)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Computation {
    pub op: String,
    pub operands: Vec<Value>,
}

impl fmt::Display for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.op)?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", operand)?;
        }
        write!(f, ")")
    }
}

/// Boolean filter expression attached to a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    True,
    False,
    /// The user explicitly does not care about `name`.
    DontCare { name: String },
    Atom { name: String, operator: Operator, value: Value },
    Not(Box<Filter>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    /// Get-predicate: a filter evaluated over another function's output.
    External { invocation: Invocation, filter: Box<Filter> },
    Compute { lhs: Computation, operator: Operator, value: Value },
}

impl Filter {
    pub fn atom(name: impl Into<String>, operator: Operator, value: Value) -> Self {
        Filter::Atom { name: name.into(), operator, value }
    }

    pub fn eq(name: impl Into<String>, value: Value) -> Self {
        Filter::atom(name, Operator::Eq, value)
    }

    pub fn dont_care(name: impl Into<String>) -> Self {
        Filter::DontCare { name: name.into() }
    }

    pub fn negate(inner: Filter) -> Self {
        Filter::Not(Box::new(inner))
    }

    pub fn is_id_equality(&self) -> bool {
        matches!(self, Filter::Atom { name, operator: Operator::Eq, .. } if name == "id")
    }

    /// Canonical form: nested conjunctions and disjunctions are flattened,
    /// constants folded, duplicates and double negations removed.
    pub fn optimize(self) -> Filter {
        match self {
            Filter::Not(inner) => match inner.optimize() {
                Filter::True => Filter::False,
                Filter::False => Filter::True,
                Filter::Not(x) => *x,
                other => Filter::Not(Box::new(other)),
            },
            Filter::And(operands) => {
                let mut flat: Vec<Filter> = Vec::new();
                for operand in operands {
                    match operand.optimize() {
                        Filter::True => {}
                        Filter::False => return Filter::False,
                        Filter::And(nested) => {
                            for n in nested {
                                push_unique(&mut flat, n);
                            }
                        }
                        other => push_unique(&mut flat, other),
                    }
                }
                collapse(flat, Filter::True, Filter::And)
            }
            Filter::Or(operands) => {
                let mut flat: Vec<Filter> = Vec::new();
                for operand in operands {
                    match operand.optimize() {
                        Filter::False => {}
                        Filter::True => return Filter::True,
                        Filter::Or(nested) => {
                            for n in nested {
                                push_unique(&mut flat, n);
                            }
                        }
                        other => push_unique(&mut flat, other),
                    }
                }
                collapse(flat, Filter::False, Filter::Or)
            }
            Filter::External { invocation, filter } => match filter.optimize() {
                Filter::False => Filter::False,
                Filter::True => Filter::True,
                filter => Filter::External { invocation, filter: Box::new(filter) },
            },
            other => other,
        }
    }

    /// Top-level operands of a conjunction; anything else is a conjunction of one.
    pub fn conjuncts(&self) -> Vec<&Filter> {
        match self {
            Filter::And(operands) => operands.iter().collect(),
            other => vec![other],
        }
    }

    pub fn into_conjuncts(self) -> Vec<Filter> {
        match self {
            Filter::And(operands) => operands,
            other => vec![other],
        }
    }

    /// Whether an atom or don't-care on `pname` appears anywhere outside
    /// get-predicates.
    pub fn uses_param(&self, pname: &str) -> bool {
        match self {
            Filter::True | Filter::False | Filter::External { .. } | Filter::Compute { .. } => false,
            Filter::DontCare { name } | Filter::Atom { name, .. } => name == pname,
            Filter::Not(inner) => inner.uses_param(pname),
            Filter::And(operands) | Filter::Or(operands) => operands.iter().any(|f| f.uses_param(pname)),
        }
    }

    /// Names constrained by this filter, ignoring `id ==` atoms and anything
    /// inside get-predicates.
    pub fn params(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_params(&mut names);
        names
    }

    fn collect_params(&self, names: &mut BTreeSet<String>) {
        match self {
            Filter::Atom { name, .. } => {
                if !self.is_id_equality() {
                    names.insert(name.clone());
                }
            }
            Filter::DontCare { name } => {
                names.insert(name.clone());
            }
            Filter::Not(inner) => inner.collect_params(names),
            Filter::And(operands) | Filter::Or(operands) => {
                for operand in operands {
                    operand.collect_params(names);
                }
            }
            Filter::True | Filter::False | Filter::External { .. } | Filter::Compute { .. } => {}
        }
    }

    pub fn contains_external(&self) -> bool {
        match self {
            Filter::External { .. } => true,
            Filter::Not(inner) => inner.contains_external(),
            Filter::And(operands) | Filter::Or(operands) => operands.iter().any(Filter::contains_external),
            _ => false,
        }
    }

    pub fn visit_values<'a>(&'a self, f: &mut dyn FnMut(&'a Value)) {
        match self {
            Filter::True | Filter::False | Filter::DontCare { .. } => {}
            Filter::Atom { value, .. } => f(value),
            Filter::Not(inner) => inner.visit_values(f),
            Filter::And(operands) | Filter::Or(operands) => {
                for operand in operands {
                    operand.visit_values(f);
                }
            }
            Filter::External { invocation, filter } => {
                for param in &invocation.in_params {
                    f(&param.value);
                }
                filter.visit_values(f);
            }
            Filter::Compute { lhs, value, .. } => {
                for operand in &lhs.operands {
                    f(operand);
                }
                f(value);
            }
        }
    }
}

fn push_unique(into: &mut Vec<Filter>, filter: Filter) {
    if !into.contains(&filter) {
        into.push(filter);
    }
}

fn collapse(mut operands: Vec<Filter>, empty: Filter, wrap: fn(Vec<Filter>) -> Filter) -> Filter {
    match operands.len() {
        0 => empty,
        1 => operands.remove(0),
        _ => wrap(operands),
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::True => write!(f, "true"),
            Filter::False => write!(f, "false"),
            Filter::DontCare { name } => write!(f, "true({})", name),
            Filter::Atom { name, operator, value } => write!(f, "{} {} {}", name, operator, value),
            Filter::Not(inner) => write!(f, "!({})", inner),
            Filter::And(operands) => write_joined(f, operands, " && "),
            Filter::Or(operands) => write_joined(f, operands, " || "),
            Filter::External { invocation, filter } => write!(f, "{} {{ {} }}", invocation, filter),
            Filter::Compute { lhs, operator, value } => write!(f, "{} {} {}", lhs, operator, value),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, operands: &[Filter], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", operand)?;
    }
    write!(f, ")")
}
