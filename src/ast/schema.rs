use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::expression::{Expression, Invocation};
use super::value::{Type, Value};
use crate::error::{DialogueError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionType {
    Query,
    Action,
}

/// How a statement using this function is confirmed before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmPolicy {
    Auto,
    DisplayResult,
    Confirm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
    pub is_input: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub annotations: BTreeMap<String, Json>,
}

impl ArgumentDef {
    pub fn input(name: impl Into<String>, ty: Type, required: bool) -> Self {
        Self { name: name.into(), ty, is_input: true, required, annotations: BTreeMap::new() }
    }

    pub fn output(name: impl Into<String>, ty: Type) -> Self {
        Self { name: name.into(), ty, is_input: false, required: false, annotations: BTreeMap::new() }
    }

    pub fn with_annotation(mut self, key: &str, value: Json) -> Self {
        self.annotations.insert(key.to_string(), value);
        self
    }

    pub fn is_output(&self) -> bool {
        !self.is_input
    }

    /// Outputs are filterable unless annotated otherwise.
    pub fn filterable(&self) -> bool {
        self.annotations.get("filterable").and_then(Json::as_bool).unwrap_or(true)
    }

    /// An equality on this output picks out one result. `id` is unique
    /// unless annotated otherwise.
    pub fn unique(&self) -> bool {
        self.annotations.get("unique").and_then(Json::as_bool).unwrap_or(self.name == "id")
    }

    pub fn raw_mode(&self) -> Option<bool> {
        self.annotations.get("raw_mode").and_then(Json::as_bool)
    }

    pub fn string_values(&self) -> Option<&str> {
        self.annotations.get("string_values").and_then(Json::as_str)
    }

    pub fn default_value(&self) -> Option<Value> {
        self.annotations
            .get("default")
            .and_then(|json| serde_json::from_value(json.clone()).ok())
    }
}

/// Signature of one query or action, as published by the device class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub class: String,
    pub name: String,
    pub function_type: FunctionType,
    #[serde(default)]
    pub is_list: bool,
    #[serde(default)]
    pub is_monitorable: bool,
    pub args: Vec<ArgumentDef>,
    #[serde(default)]
    pub annotations: BTreeMap<String, Json>,
}

impl FunctionDef {
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.class, self.name)
    }

    pub fn is_query(&self) -> bool {
        self.function_type == FunctionType::Query
    }

    pub fn is_action(&self) -> bool {
        self.function_type == FunctionType::Action
    }

    pub fn argument(&self, name: &str) -> Option<&ArgumentDef> {
        self.args.iter().find(|a| a.name == name)
    }

    pub fn has_argument(&self, name: &str) -> bool {
        self.argument(name).is_some()
    }

    pub fn inputs(&self) -> impl Iterator<Item = &ArgumentDef> {
        self.args.iter().filter(|a| a.is_input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &ArgumentDef> {
        self.args.iter().filter(|a| !a.is_input)
    }

    pub fn has_outputs(&self) -> bool {
        self.outputs().next().is_some()
    }

    /// Type of the `id` output, when results are identifiable entities.
    pub fn id_type(&self) -> Option<&Type> {
        self.argument("id").filter(|a| a.is_output()).map(|a| &a.ty)
    }

    pub fn has_argument_of_type(&self, ty: &Type) -> bool {
        self.args.iter().any(|a| &a.ty == ty)
    }

    /// Functions whose results are worth a follow-up question.
    pub fn related(&self) -> Vec<String> {
        match self.annotations.get("related") {
            Some(Json::Array(items)) => items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            _ => Vec::new(),
        }
    }

    /// Groups of inputs of which at least one must be set.
    pub fn require_either(&self) -> Vec<Vec<String>> {
        match self.annotations.get("require_either") {
            Some(json) => serde_json::from_value(json.clone()).unwrap_or_default(),
            None => Vec::new(),
        }
    }

    /// Queries default to showing their result, actions to asking first.
    pub fn confirm_policy(&self) -> ConfirmPolicy {
        match self.annotations.get("confirm") {
            Some(Json::Bool(true)) => ConfirmPolicy::Confirm,
            Some(Json::Bool(false)) => ConfirmPolicy::DisplayResult,
            Some(Json::String(s)) if s == "auto" => ConfirmPolicy::Auto,
            Some(Json::String(s)) if s == "display_result" => ConfirmPolicy::DisplayResult,
            Some(Json::String(s)) if s == "confirm" => ConfirmPolicy::Confirm,
            _ if self.is_action() => ConfirmPolicy::Confirm,
            _ => ConfirmPolicy::DisplayResult,
        }
    }

    pub fn invocation(&self) -> Invocation {
        Invocation::new(self.class.clone(), self.name.clone())
    }
}

pub fn is_same_function(a: &FunctionDef, b: &FunctionDef) -> bool {
    a.class == b.class && a.name == b.name
}

/// Lookup of function signatures by qualified name.
pub trait SchemaRegistry: std::fmt::Debug + Send + Sync {
    fn function(&self, qualified_name: &str) -> Option<Arc<FunctionDef>>;

    /// List query that enumerates entities of `entity_type`, used to resolve
    /// entities mentioned by name.
    fn id_query(&self, entity_type: &str) -> Option<Arc<FunctionDef>>;

    fn resolve_invocation(&self, invocation: &Invocation) -> Result<Arc<FunctionDef>> {
        let name = invocation.qualified_name();
        self.function(&name).ok_or(DialogueError::UnknownFunction(name))
    }

    fn resolve(&self, expression: &Expression) -> Result<Arc<FunctionDef>> {
        let invocation = expression
            .invocation()
            .ok_or_else(|| DialogueError::MalformedExpression(format!("no invocation in {}", expression)))?;
        self.resolve_invocation(invocation)
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemorySchemaRegistry {
    functions: HashMap<String, Arc<FunctionDef>>,
    id_queries: HashMap<String, Arc<FunctionDef>>,
}

impl InMemorySchemaRegistry {
    pub fn new(functions: Vec<FunctionDef>) -> Self {
        let mut registry = Self::default();
        for f in functions {
            registry.insert(f);
        }
        registry
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let functions: Vec<FunctionDef> = serde_json::from_str(json)?;
        Ok(Self::new(functions))
    }

    pub fn insert(&mut self, function: FunctionDef) {
        let function = Arc::new(function);
        let qualified = function.qualified_name();
        // `@com.yelp.restaurant` lists entities of type `com.yelp:restaurant`
        if function.is_query() && function.is_list {
            if let Some(Type::Entity(kind)) = function.id_type() {
                if *kind == qualified {
                    self.id_queries.insert(kind.clone(), function.clone());
                }
            }
        }
        self.functions.insert(qualified, function);
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl SchemaRegistry for InMemorySchemaRegistry {
    fn function(&self, qualified_name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.get(qualified_name).cloned()
    }

    fn id_query(&self, entity_type: &str) -> Option<Arc<FunctionDef>> {
        self.id_queries.get(entity_type).cloned()
    }
}
