//! Positional record layouts for packed master data tables
//!
//! The registry is parsed once from JSON and never mutated afterwards. In the
//! JSON form a plain string is a field, `{"list": name, "fields": [...]}` is a
//! nested list of records and `{"tuple": name, "fields": [...]}` is a nested
//! fixed record.

use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{MasterError, Result};

const BUILTIN: &str = include_str!("../data/structures.json");

/// One slot of a positional record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawNode")]
pub enum SchemaNode {
    /// Slot holds a scalar stored under this name
    Field(String),
    /// Slot holds a list of positional records with the nested layout
    NestedList(String, Vec<SchemaNode>),
    /// Slot holds a fixed positional tuple zipped against these names
    NestedTuple(String, Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNode {
    Field(String),
    List { list: String, fields: Vec<SchemaNode> },
    Tuple { tuple: String, fields: Vec<String> },
}

impl From<RawNode> for SchemaNode {
    fn from(raw: RawNode) -> Self {
        match raw {
            RawNode::Field(name) => Self::Field(name),
            RawNode::List { list, fields } => Self::NestedList(list, fields),
            RawNode::Tuple { tuple, fields } => Self::NestedTuple(tuple, fields),
        }
    }
}

impl SchemaNode {
    pub fn name(&self) -> &str {
        match self {
            Self::Field(name) | Self::NestedList(name, _) | Self::NestedTuple(name, _) => name,
        }
    }
}

/// Table name to record layout
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, Vec<SchemaNode>>,
}

impl SchemaRegistry {
    /// Layouts shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let tables = serde_json::from_str(json).map_err(|e| MasterError::Schema(e.to_string()))?;
        Ok(Self { tables })
    }

    pub fn insert(&mut self, table: impl Into<String>, layout: Vec<SchemaNode>) {
        self.tables.insert(table.into(), layout);
    }

    pub fn get(&self, table: &str) -> Option<&[SchemaNode]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_node_forms() {
        let registry = SchemaRegistry::from_json(
            r#"{"t": ["id", {"list": "children", "fields": ["a", {"tuple": "pair", "fields": ["x", "y"]}]}]}"#,
        )
        .unwrap();

        assert_eq!(
            registry.get("t").unwrap(),
            &[
                SchemaNode::Field("id".to_string()),
                SchemaNode::NestedList(
                    "children".to_string(),
                    vec![
                        SchemaNode::Field("a".to_string()),
                        SchemaNode::NestedTuple(
                            "pair".to_string(),
                            vec!["x".to_string(), "y".to_string()]
                        ),
                    ]
                ),
            ]
        );
    }

    #[test]
    fn test_builtin_registry() {
        let registry = SchemaRegistry::builtin().unwrap();
        assert!(registry.len() > 40);

        let gachas = registry.get("gachas").unwrap();
        assert_eq!(gachas[0].name(), "id");
        assert!(
            gachas
                .iter()
                .any(|node| matches!(node, SchemaNode::NestedTuple(name, _) if name == "gachaInformation"))
        );
        assert!(!registry.contains("eventCards"));
    }

    #[test]
    fn test_malformed_schema() {
        assert!(matches!(
            SchemaRegistry::from_json(r#"{"t": [1]}"#),
            Err(MasterError::Schema(_))
        ));
    }
}
