use serde::{Deserialize, Serialize};
use std::fmt;

use super::filter::{Computation, Filter};
use super::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputParam {
    pub name: String,
    pub value: Value,
}

impl InputParam {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value }
    }
}

/// Call of one function (query or action) on one device class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    /// Device class, e.g. `com.yelp`.
    pub kind: String,
    pub channel: String,
    pub in_params: Vec<InputParam>,
}

impl Invocation {
    pub fn new(kind: impl Into<String>, channel: impl Into<String>) -> Self {
        Self { kind: kind.into(), channel: channel.into(), in_params: Vec::new() }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.in_params.push(InputParam::new(name, value));
        self
    }

    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.kind, self.channel)
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.in_params.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}.{}(", self.kind, self.channel)?;
        for (i, p) in self.in_params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", p.name, p.value)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn reverse(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Query pipeline or action call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    Invocation(Invocation),
    Filter {
        expression: Box<Expression>,
        filter: Filter,
    },
    Projection {
        expression: Box<Expression>,
        args: Vec<String>,
        #[serde(default)]
        computations: Vec<Computation>,
    },
    Sort {
        expression: Box<Expression>,
        field: String,
        direction: SortDirection,
    },
    /// 1-based; negative indices count from the end.
    Index {
        expression: Box<Expression>,
        indices: Vec<Value>,
    },
    Slice {
        expression: Box<Expression>,
        base: Value,
        limit: Value,
    },
    Aggregation {
        expression: Box<Expression>,
        field: String,
        operator: String,
    },
    /// `query => action`; results of each step flow into the next one.
    Chain(Vec<Expression>),
}

impl Expression {
    pub fn filter(inner: Expression, filter: Filter) -> Self {
        Expression::Filter { expression: Box::new(inner), filter }
    }

    pub fn projection(inner: Expression, args: Vec<String>) -> Self {
        Expression::Projection { expression: Box::new(inner), args, computations: Vec::new() }
    }

    pub fn index(inner: Expression, indices: Vec<Value>) -> Self {
        Expression::Index { expression: Box::new(inner), indices }
    }

    /// Operand of a single-input pipeline stage.
    pub fn inner(&self) -> Option<&Expression> {
        match self {
            Expression::Filter { expression, .. }
            | Expression::Projection { expression, .. }
            | Expression::Sort { expression, .. }
            | Expression::Index { expression, .. }
            | Expression::Slice { expression, .. }
            | Expression::Aggregation { expression, .. } => Some(expression),
            Expression::Invocation(_) | Expression::Chain(_) => None,
        }
    }

    /// The invocation whose function gives this expression its schema; for a
    /// chain, the invocation of the last step.
    pub fn invocation(&self) -> Option<&Invocation> {
        match self {
            Expression::Invocation(invocation) => Some(invocation),
            Expression::Chain(steps) => steps.last().and_then(Expression::invocation),
            other => other.inner().and_then(Expression::invocation),
        }
    }

    pub fn invocation_mut(&mut self) -> Option<&mut Invocation> {
        match self {
            Expression::Invocation(invocation) => Some(invocation),
            Expression::Chain(steps) => steps.last_mut().and_then(Expression::invocation_mut),
            Expression::Filter { expression, .. }
            | Expression::Projection { expression, .. }
            | Expression::Sort { expression, .. }
            | Expression::Index { expression, .. }
            | Expression::Slice { expression, .. }
            | Expression::Aggregation { expression, .. } => expression.invocation_mut(),
        }
    }

    pub fn qualified_name(&self) -> Option<String> {
        self.invocation().map(Invocation::qualified_name)
    }

    pub fn steps(&self) -> &[Expression] {
        match self {
            Expression::Chain(steps) => steps,
            other => std::slice::from_ref(other),
        }
    }

    /// Drops any projection at the top of the pipeline.
    pub fn without_projection(&self) -> &Expression {
        match self {
            Expression::Projection { expression, .. } => expression.without_projection(),
            other => other,
        }
    }

    /// Projected columns reachable through index, slice and sort stages, sorted.
    pub fn projection_args(&self) -> Option<Vec<String>> {
        match self {
            Expression::Projection { args, computations, .. } => {
                let mut names = args.clone();
                names.extend(computations.iter().map(|c| c.op.clone()));
                names.sort();
                names.dedup();
                Some(names)
            }
            Expression::Index { expression, .. }
            | Expression::Slice { expression, .. }
            | Expression::Sort { expression, .. } => expression.projection_args(),
            _ => None,
        }
    }

    pub fn has_computed_projection(&self) -> bool {
        matches!(self, Expression::Projection { computations, .. } if !computations.is_empty())
    }

    /// The first filter found walking down from the top of the pipeline.
    pub fn find_filter(&self) -> Option<&Filter> {
        match self {
            Expression::Filter { filter, .. } => Some(filter),
            Expression::Invocation(_) | Expression::Aggregation { .. } => None,
            Expression::Chain(steps) => steps.iter().rev().find_map(Expression::find_filter),
            other => other.inner().and_then(Expression::find_filter),
        }
    }

    pub fn visit_values<'a>(&'a self, f: &mut dyn FnMut(&'a Value)) {
        match self {
            Expression::Invocation(invocation) => {
                for p in &invocation.in_params {
                    f(&p.value);
                }
            }
            Expression::Filter { expression, filter } => {
                expression.visit_values(f);
                filter.visit_values(f);
            }
            Expression::Index { expression, indices } => {
                expression.visit_values(f);
                for v in indices {
                    f(v);
                }
            }
            Expression::Slice { expression, base, limit } => {
                expression.visit_values(f);
                f(base);
                f(limit);
            }
            Expression::Projection { expression, .. }
            | Expression::Sort { expression, .. }
            | Expression::Aggregation { expression, .. } => expression.visit_values(f),
            Expression::Chain(steps) => {
                for step in steps {
                    step.visit_values(f);
                }
            }
        }
    }

    pub fn has_undefined(&self) -> bool {
        let mut found = false;
        self.visit_values(&mut |v| found = found || v.is_undefined());
        found
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Invocation(invocation) => write!(f, "{}", invocation),
            Expression::Filter { expression, filter } => write!(f, "{} filter {}", expression, filter),
            Expression::Projection { expression, args, computations } => {
                let mut cols: Vec<String> = args.clone();
                cols.extend(computations.iter().map(|c| c.to_string()));
                write!(f, "[{}] of {}", cols.join(", "), expression)
            }
            Expression::Sort { expression, field, direction } => {
                let dir = match direction {
                    SortDirection::Asc => "asc",
                    SortDirection::Desc => "desc",
                };
                write!(f, "sort({} {} of {})", field, dir, expression)
            }
            Expression::Index { expression, indices } => {
                let idx: Vec<String> = indices.iter().map(|v| v.to_string()).collect();
                write!(f, "({})[{}]", expression, idx.join(", "))
            }
            Expression::Slice { expression, base, limit } => write!(f, "({})[{} : {}]", expression, base, limit),
            Expression::Aggregation { expression, field, operator } => {
                write!(f, "{}({} of {})", operator, field, expression)
            }
            Expression::Chain(steps) => {
                for (i, step) in steps.iter().enumerate() {
                    if i > 0 {
                        write!(f, " => ")?;
                    }
                    write!(f, "{}", step)?;
                }
                Ok(())
            }
        }
    }
}

/// One executable command: a query, an action, or a query chained into an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub expression: Expression,
}

impl Statement {
    pub fn new(expression: Expression) -> Self {
        Self { expression }
    }

    pub fn steps(&self) -> &[Expression] {
        self.expression.steps()
    }

    pub fn first(&self) -> &Expression {
        self.steps().first().unwrap_or(&self.expression)
    }

    pub fn last(&self) -> &Expression {
        self.steps().last().unwrap_or(&self.expression)
    }

    pub fn has_undefined(&self) -> bool {
        self.expression.has_undefined()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};", self.expression)
    }
}
