//! Test identity: the (test id × variants) join key and the row/column
//! identifications used to place verdicts in the report matrix.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Connects a unique test id to the variant combination it ran under.
///
/// The canonical string form is the map key used to join base and sample
/// status maps; `BTreeMap` keeps variant keys sorted so the encoding is
/// stable regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestKey {
    pub test_id: String,
    pub variants: BTreeMap<String, String>,
}

impl TestKey {
    pub fn new(test_id: impl Into<String>, variants: BTreeMap<String, String>) -> Self {
        Self {
            test_id: test_id.into(),
            variants,
        }
    }

    /// Canonical serialized form, usable as a map key.
    pub fn canonical(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn parse(raw: &str) -> Option<TestKey> {
        serde_json::from_str(raw).ok()
    }
}

fn is_empty(s: &str) -> bool {
    s.is_empty()
}

/// Identifies a row of the report matrix. Field order drives the derived
/// ordering: components ascending, then capabilities, then test names.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RowIdentification {
    pub component: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub capability: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub test_name: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub test_suite: String,
    #[serde(default, skip_serializing_if = "is_empty")]
    pub test_id: String,
}

/// Identifies a column: the variant values the column is grouped by.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ColumnIdentification {
    pub variants: BTreeMap<String, String>,
}

/// Full placement of a single test in the matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identification {
    #[serde(flatten)]
    pub row: RowIdentification,
    #[serde(flatten)]
    pub column: ColumnIdentification,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_is_stable_under_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("Platform".to_string(), "aws".to_string());
        a.insert("Network".to_string(), "ovn".to_string());
        let mut b = BTreeMap::new();
        b.insert("Network".to_string(), "ovn".to_string());
        b.insert("Platform".to_string(), "aws".to_string());
        assert_eq!(
            TestKey::new("1", a).canonical(),
            TestKey::new("1", b).canonical()
        );
    }

    #[test]
    fn canonical_round_trips() {
        let mut variants = BTreeMap::new();
        variants.insert("Architecture".to_string(), "amd64".to_string());
        let key = TestKey::new("42", variants);
        assert_eq!(TestKey::parse(&key.canonical()), Some(key));
    }

    #[test]
    fn rows_order_by_component_then_capability() {
        let mut rows = vec![
            RowIdentification {
                component: "b".into(),
                ..Default::default()
            },
            RowIdentification {
                component: "a".into(),
                capability: "z".into(),
                ..Default::default()
            },
            RowIdentification {
                component: "a".into(),
                capability: "c".into(),
                ..Default::default()
            },
        ];
        rows.sort();
        assert_eq!(rows[0].component, "a");
        assert_eq!(rows[0].capability, "c");
        assert_eq!(rows[2].component, "b");
    }
}
