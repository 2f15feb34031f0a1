use serde::{Deserialize, Serialize};

use crate::ast::Value;

/// Attribute values the agent mentioned about a proposed entity, in the
/// order they were mentioned.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SlotBag {
    /// Qualified name of the function the values belong to.
    pub function: Option<String>,
    entries: Vec<(String, Value)>,
}

impl SlotBag {
    pub fn new(function: Option<String>) -> Self {
        Self { function, entries: Vec::new() }
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Overwrites in place, otherwise appends.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of two bags about the same function; `other` wins on conflicts.
    /// `None` if they describe different functions.
    pub fn merge(&self, other: &SlotBag) -> Option<SlotBag> {
        if self.function.is_some() && other.function.is_some() && self.function != other.function {
            return None;
        }
        let mut merged = self.clone();
        if merged.function.is_none() {
            merged.function = other.function.clone();
        }
        for (k, v) in other.iter() {
            merged.set(k, v.clone());
        }
        Some(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_preserves_order() {
        let mut bag = SlotBag::new(Some("com.yelp:restaurant".into()));
        bag.set("cuisine", Value::string("thai"));
        bag.set("rating", Value::Number(4.5));
        bag.set("cuisine", Value::string("lao"));

        let keys: Vec<_> = bag.keys().collect();
        assert_eq!(keys, vec!["cuisine", "rating"]);
        assert_eq!(bag.get("cuisine"), Some(&Value::string("lao")));
    }

    #[test]
    fn test_merge_rejects_other_function() {
        let a = SlotBag::new(Some("com.yelp:restaurant".into()));
        let b = SlotBag::new(Some("imdb:movie".into()));
        assert!(a.merge(&b).is_none());
    }
}
