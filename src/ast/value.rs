use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic types of arguments and values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Any,
    Boolean,
    Number,
    Measure(String),
    String,
    Enum(Vec<String>),
    Entity(String),
    Date,
    Location,
    Array(Box<Type>),
}

impl Type {
    pub fn is_string(&self) -> bool {
        matches!(self, Type::String)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    pub fn element(&self) -> &Type {
        match self {
            Type::Array(elem) => elem,
            other => other,
        }
    }

    /// Lenient assignability: entity kinds must match, measures must share a
    /// unit, `Any` and undefined values fit anywhere.
    pub fn is_assignable(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Undefined) | (_, Value::VarRef(_)) | (Type::Any, _) => true,
            (Type::Boolean, Value::Boolean(_)) => true,
            (Type::Number, Value::Number(_)) => true,
            (Type::Measure(unit), Value::Measure { unit: u, .. }) => unit == u,
            (Type::String, Value::String(_)) => true,
            (Type::Enum(variants), Value::Enum(v)) => variants.is_empty() || variants.contains(v),
            (Type::Entity(kind), Value::Entity { kind: k, .. }) => kind == k,
            // free-form text can always be coerced to an entity lookup
            (Type::Entity(_), Value::String(_)) => true,
            (Type::Date, Value::Date(_)) => true,
            (Type::Location, Value::Location { .. }) => true,
            (Type::Array(elem), Value::Array(values)) => values.iter().all(|v| elem.is_assignable(v)),
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "Any"),
            Type::Boolean => write!(f, "Boolean"),
            Type::Number => write!(f, "Number"),
            Type::Measure(unit) => write!(f, "Measure({})", unit),
            Type::String => write!(f, "String"),
            Type::Enum(variants) => write!(f, "Enum({})", variants.join(",")),
            Type::Entity(kind) => write!(f, "Entity({})", kind),
            Type::Date => write!(f, "Date"),
            Type::Location => write!(f, "Location"),
            Type::Array(elem) => write!(f, "Array({})", elem),
        }
    }
}

/// Constant and placeholder values appearing in programs and results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Slot not filled yet (`$?`); a statement holding one is not executable.
    Undefined,
    Boolean(bool),
    Number(f64),
    Measure { value: f64, unit: String },
    String(String),
    Enum(String),
    Entity {
        value: Option<String>,
        kind: String,
        display: Option<String>,
    },
    /// ISO-8601 timestamp.
    Date(String),
    Location {
        latitude: f64,
        longitude: f64,
        display: Option<String>,
    },
    Array(Vec<Value>),
    /// Reference to an output of an earlier part of the same statement.
    VarRef(String),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn entity(value: impl Into<String>, kind: impl Into<String>, display: Option<&str>) -> Self {
        Value::Entity {
            value: Some(value.into()),
            kind: kind.into(),
            display: display.map(str::to_string),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_constant(&self) -> bool {
        !matches!(self, Value::VarRef(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Measure { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        match self {
            Value::Entity { display, .. } | Value::Location { display, .. } => display.as_deref(),
            _ => None,
        }
    }

    pub fn get_type(&self) -> Type {
        match self {
            Value::Undefined | Value::VarRef(_) => Type::Any,
            Value::Boolean(_) => Type::Boolean,
            Value::Number(_) => Type::Number,
            Value::Measure { unit, .. } => Type::Measure(unit.clone()),
            Value::String(_) => Type::String,
            Value::Enum(_) => Type::Enum(Vec::new()),
            Value::Entity { kind, .. } => Type::Entity(kind.clone()),
            Value::Date(_) => Type::Date,
            Value::Location { .. } => Type::Location,
            Value::Array(values) => Type::Array(Box::new(values.first().map(Value::get_type).unwrap_or(Type::Any))),
        }
    }

    /// Plain rendering used when results are compared as strings: the entity
    /// id for entities, the bare text for strings and enums.
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::String(s) | Value::Enum(s) | Value::Date(s) => s.clone(),
            Value::Entity { value: Some(v), .. } => v.clone(),
            Value::Entity { value: None, display, .. } => display.clone().unwrap_or_default(),
            Value::Array(values) => values.iter().map(Value::to_plain_string).collect::<Vec<_>>().join(","),
            other => other.to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Measure { value: a, unit: ua }, Value::Measure { value: b, unit: ub }) => a == b && ua == ub,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            // entities are identified by id; unresolved ones by their name
            (
                Value::Entity { value: va, kind: ka, display: da },
                Value::Entity { value: vb, kind: kb, display: db },
            ) => ka == kb && if va.is_none() && vb.is_none() { da == db } else { va == vb },
            (Value::Date(a), Value::Date(b)) => a == b,
            (
                Value::Location { latitude: la, longitude: oa, display: da },
                Value::Location { latitude: lb, longitude: ob, display: db },
            ) => la == lb && oa == ob && da == db,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::VarRef(a), Value::VarRef(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "$?"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Measure { value, unit } => write!(f, "{}{}", value, unit),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Enum(e) => write!(f, "enum {}", e),
            Value::Entity { value, kind, display } => {
                match value {
                    Some(v) => write!(f, "{:?}^^{}", v, kind)?,
                    None => write!(f, "null^^{}", kind)?,
                }
                if let Some(d) = display {
                    write!(f, "({:?})", d)?;
                }
                Ok(())
            }
            Value::Date(d) => write!(f, "new Date({:?})", d),
            Value::Location { latitude, longitude, display } => match display {
                Some(d) => write!(f, "new Location({}, {}, {:?})", latitude, longitude, d),
                None => write!(f, "new Location({}, {})", latitude, longitude),
            },
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::VarRef(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_equality_ignores_display() {
        let a = Value::entity("r1", "com.yelp:restaurant", Some("Taco Bell"));
        let b = Value::entity("r1", "com.yelp:restaurant", None);
        let c = Value::entity("r2", "com.yelp:restaurant", Some("Taco Bell"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_assignability() {
        let kind = Type::Entity("com.yelp:restaurant".to_string());
        assert!(kind.is_assignable(&Value::entity("r1", "com.yelp:restaurant", None)));
        assert!(!kind.is_assignable(&Value::entity("m1", "imdb:movie", None)));
        assert!(Type::Number.is_assignable(&Value::Undefined));
        assert!(!Type::Number.is_assignable(&Value::string("five")));
    }
}
