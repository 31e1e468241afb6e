// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph tokens: named, typed variables owned by one graph.

use crate::cell::ValueCell;
use crate::value::{DataType, FlowValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Declaration of a graph token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphToken {
    /// Token name, unique within the graph
    pub name: String,
    /// Value type
    pub data_type: DataType,
}

/// Token declarations and their current values
#[derive(Debug, Clone, Default)]
pub struct GraphTokens {
    tokens: IndexMap<String, (GraphToken, ValueCell)>,
}

impl GraphTokens {
    /// Create an empty token table
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a token, resetting it to its type's default.
    ///
    /// Redeclaring an existing name replaces its type.
    pub fn add(&mut self, token: GraphToken) {
        let cell = ValueCell::default_for(token.data_type, true);
        self.tokens.insert(token.name.clone(), (token, cell));
    }

    /// Remove a token by name
    pub fn remove(&mut self, name: &str) -> bool {
        self.tokens.shift_remove(name).is_some()
    }

    /// Remove every token
    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Number of tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no token is declared
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Token at `index`, in declaration order
    pub fn get(&self, index: usize) -> Option<&GraphToken> {
        self.tokens.get_index(index).map(|(_, (token, _))| token)
    }

    /// Iterate over declarations
    pub fn iter(&self) -> impl Iterator<Item = &GraphToken> {
        self.tokens.values().map(|(token, _)| token)
    }

    /// Current value of a token
    pub fn value(&self, name: &str) -> Option<&FlowValue> {
        self.tokens.get(name).map(|(_, cell)| cell.value())
    }

    /// Store a value, converting into the declared type
    pub fn set_value(&mut self, name: &str, value: &FlowValue) -> bool {
        match self.tokens.get_mut(name) {
            Some((_, cell)) => cell.assign_with_conversion(value),
            None => false,
        }
    }

    /// Reset every value to its type's default
    pub fn reset_all(&mut self) {
        for (token, cell) in self.tokens.values_mut() {
            *cell = ValueCell::default_for(token.data_type, true);
        }
    }

    /// Name under which a token of graph `graph_id` is published globally
    pub fn global_name(graph_id: u32, name: &str) -> String {
        format!("GraphToken.Graph{graph_id}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(name: &str, data_type: DataType) -> GraphToken {
        GraphToken {
            name: name.to_owned(),
            data_type,
        }
    }

    #[test]
    fn test_values_keep_declared_type() {
        let mut tokens = GraphTokens::new();
        tokens.add(token("score", DataType::Int));

        assert_eq!(tokens.value("score"), Some(&FlowValue::Int(0)));
        assert!(tokens.set_value("score", &FlowValue::String("41".into())));
        assert_eq!(tokens.value("score"), Some(&FlowValue::Int(41)));
        assert!(!tokens.set_value("missing", &FlowValue::Int(1)));

        tokens.reset_all();
        assert_eq!(tokens.value("score"), Some(&FlowValue::Int(0)));
    }

    #[test]
    fn test_order_and_removal() {
        let mut tokens = GraphTokens::new();
        tokens.add(token("a", DataType::Bool));
        tokens.add(token("b", DataType::Float));
        tokens.add(token("c", DataType::String));

        assert!(tokens.remove("a"));
        assert!(!tokens.remove("a"));
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens.get(0).map(|t| t.name.as_str()), Some("b"));
        assert_eq!(GraphTokens::global_name(7, "b"), "GraphToken.Graph7.b");

        tokens.clear();
        assert!(tokens.is_empty());
    }
}
