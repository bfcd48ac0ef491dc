use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(test)]
use mockall::automock;

/// A typed attribute value, encoded the way the metadata store expects it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum AttributeValue {
    S(String),
    N(String),
    M(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        AttributeValue::S(value.into())
    }

    pub fn number(value: impl ToString) -> Self {
        AttributeValue::N(value.to_string())
    }

    pub fn string_map(map: &BTreeMap<String, String>) -> Self {
        AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), AttributeValue::S(v.clone())))
                .collect(),
        )
    }
}

pub type Item = BTreeMap<String, AttributeValue>;

/// Attribute every job record is keyed by.
pub const KEY_ATTRIBUTE: &str = "training_job_name";

/// A single-attribute write. `once` fields are only written if absent.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub name: String,
    pub value: AttributeValue,
    pub once: bool,
}

impl FieldUpdate {
    pub fn set(name: &str, value: AttributeValue) -> Self {
        Self { name: name.to_string(), value, once: false }
    }

    pub fn set_once(name: &str, value: AttributeValue) -> Self {
        Self { name: name.to_string(), value, once: true }
    }
}

/// Record store keyed by a single string attribute.
///
/// `put_item` creates a record and must fail if one already exists under the
/// key. `update_item` only touches the named attributes.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn put_item(&self, table: &str, key: &str, item: Item) -> Result<()>;

    async fn update_item(&self, table: &str, key: &str, updates: Vec<FieldUpdate>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attribute_values_encode_with_type_tags() {
        let manifest = BTreeMap::from([("input/data/training/a.csv".to_string(), "v1".to_string())]);
        let value = AttributeValue::M(BTreeMap::from([
            ("count".to_string(), AttributeValue::number(2)),
            ("manifest".to_string(), AttributeValue::string_map(&manifest)),
        ]));

        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"M": {
                "count": {"N": "2"},
                "manifest": {"M": {"input/data/training/a.csv": {"S": "v1"}}}
            }})
        );
    }
}
