//! Table schemas: how domain items map to DynamoDB attribute maps.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use ruststack_dynamodb_model::types::{
    AttributeDefinition, KeySchemaElement, KeyType, ScalarAttributeType,
};
use ruststack_dynamodb_model::{AttributeValue, Item};
use serde::Serialize;
use serde::de::DeserializeOwned;
use typed_builder::TypedBuilder;

use crate::error::{EnhancedError, EnhancedResult};
use crate::ttl::TimeToLive;

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// Key layout and special attributes of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, TypedBuilder)]
pub struct TableMetadata {
    #[builder(setter(into))]
    partition_key: String,
    #[builder(default, setter(strip_option, into))]
    sort_key: Option<String>,
    /// Scalar type of the partition key, `S` unless set.
    #[builder(default)]
    partition_key_type: ScalarAttributeType,
    /// Scalar type of the sort key, `S` unless set.
    #[builder(default)]
    sort_key_type: ScalarAttributeType,
    /// Attribute maintained by the versioned record extension.
    #[builder(default, setter(strip_option, into))]
    version_attribute: Option<String>,
    /// Expiry attribute maintained by the time-to-live extension.
    #[builder(default, setter(strip_option))]
    time_to_live: Option<TimeToLive>,
}

impl TableMetadata {
    /// Partition key attribute name.
    #[must_use]
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Sort key attribute name, if the table has one.
    #[must_use]
    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    /// Version attribute name, if the table is versioned.
    #[must_use]
    pub fn version_attribute(&self) -> Option<&str> {
        self.version_attribute.as_deref()
    }

    /// Expiry settings, if the table has a time-to-live attribute.
    #[must_use]
    pub fn time_to_live(&self) -> Option<&TimeToLive> {
        self.time_to_live.as_ref()
    }

    /// Whether `attribute` is part of the primary key.
    #[must_use]
    pub fn is_key_attribute(&self, attribute: &str) -> bool {
        self.partition_key == attribute || self.sort_key.as_deref() == Some(attribute)
    }

    /// Key schema of a `CreateTable` request: the partition key, then the
    /// sort key if any.
    #[must_use]
    pub fn key_schema(&self) -> Vec<KeySchemaElement> {
        let mut schema = vec![KeySchemaElement {
            attribute_name: self.partition_key.clone(),
            key_type: KeyType::Hash,
        }];
        if let Some(sort_key) = &self.sort_key {
            schema.push(KeySchemaElement {
                attribute_name: sort_key.clone(),
                key_type: KeyType::Range,
            });
        }
        schema
    }

    /// Attribute definitions of the key attributes.
    #[must_use]
    pub fn attribute_definitions(&self) -> Vec<AttributeDefinition> {
        let mut definitions = vec![AttributeDefinition {
            attribute_name: self.partition_key.clone(),
            attribute_type: self.partition_key_type,
        }];
        if let Some(sort_key) = &self.sort_key {
            definitions.push(AttributeDefinition {
                attribute_name: sort_key.clone(),
                attribute_type: self.sort_key_type,
            });
        }
        definitions
    }
}

// ---------------------------------------------------------------------------
// Key
// ---------------------------------------------------------------------------

/// Primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    partition_value: AttributeValue,
    sort_value: Option<AttributeValue>,
}

impl Key {
    /// A key with only a partition value.
    #[must_use]
    pub fn partition(value: impl Into<AttributeValue>) -> Self {
        Self {
            partition_value: value.into(),
            sort_value: None,
        }
    }

    /// Add a sort value.
    #[must_use]
    pub fn with_sort(mut self, value: impl Into<AttributeValue>) -> Self {
        self.sort_value = Some(value.into());
        self
    }

    /// Partition value.
    #[must_use]
    pub fn partition_value(&self) -> &AttributeValue {
        &self.partition_value
    }

    /// Sort value.
    #[must_use]
    pub fn sort_value(&self) -> Option<&AttributeValue> {
        self.sort_value.as_ref()
    }

    /// Attribute map identifying the item in a table with `metadata`.
    pub fn key_map(&self, metadata: &TableMetadata) -> EnhancedResult<Item> {
        let mut map = HashMap::from([(
            metadata.partition_key().to_owned(),
            self.partition_value.clone(),
        )]);
        match (metadata.sort_key(), &self.sort_value) {
            (Some(name), Some(value)) => {
                map.insert(name.to_owned(), value.clone());
            }
            (Some(name), None) => {
                return Err(EnhancedError::Schema(format!(
                    "key is missing a value for sort key '{name}'"
                )));
            }
            (None, Some(_)) => {
                return Err(EnhancedError::Schema(
                    "key has a sort value but the table has no sort key".to_owned(),
                ));
            }
            (None, None) => {}
        }
        Ok(map)
    }

    /// Extract the key attributes from an attribute map.
    pub fn from_item(item: &Item, metadata: &TableMetadata) -> EnhancedResult<Self> {
        let attribute = |name: &str| {
            item.get(name)
                .filter(|v| !v.is_null())
                .cloned()
                .ok_or_else(|| {
                    EnhancedError::Schema(format!("item has no value for key attribute '{name}'"))
                })
        };
        let mut key = Self::partition(attribute(metadata.partition_key())?);
        if let Some(sort_key) = metadata.sort_key() {
            key.sort_value = Some(attribute(sort_key)?);
        }
        Ok(key)
    }
}

// ---------------------------------------------------------------------------
// Schema trait
// ---------------------------------------------------------------------------

/// Converts between domain items and attribute maps.
pub trait TableSchema<T>: Send + Sync + fmt::Debug {
    /// Key layout of the table.
    fn table_metadata(&self) -> &TableMetadata;

    /// Attribute map of `item`. With `ignore_nulls`, null attributes are left
    /// out instead of being mapped to `NULL`.
    fn item_to_map(&self, item: &T, ignore_nulls: bool) -> EnhancedResult<Item>;

    /// Domain item for an attribute map.
    fn map_to_item(&self, map: &Item) -> EnhancedResult<T>;

    /// Value of a single attribute of `item`.
    fn attribute_value(&self, item: &T, attribute: &str) -> EnhancedResult<Option<AttributeValue>> {
        Ok(self.item_to_map(item, true)?.remove(attribute))
    }

    /// Attribute maintained by the versioned record extension.
    fn version_attribute_name(&self) -> Option<&str> {
        self.table_metadata().version_attribute()
    }
}

/// Schema for raw attribute maps.
#[derive(Debug, Clone)]
pub struct DocumentTableSchema {
    metadata: TableMetadata,
}

impl DocumentTableSchema {
    /// Create a schema for a table with `metadata`.
    #[must_use]
    pub fn new(metadata: TableMetadata) -> Self {
        Self { metadata }
    }
}

impl TableSchema<Item> for DocumentTableSchema {
    fn table_metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    fn item_to_map(&self, item: &Item, ignore_nulls: bool) -> EnhancedResult<Item> {
        Ok(item
            .iter()
            .filter(|(_, v)| !(ignore_nulls && v.is_null()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn map_to_item(&self, map: &Item) -> EnhancedResult<Item> {
        Ok(map.clone())
    }
}

/// Schema for any serde-serializable struct.
///
/// Struct fields become top-level attributes; nested structs and maps become
/// `M`, sequences become `L`, numbers `N`, `None` becomes `NULL`.
pub struct SerdeTableSchema<T> {
    metadata: TableMetadata,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeTableSchema<T> {
    /// Create a schema for a table with `metadata`.
    #[must_use]
    pub fn new(metadata: TableMetadata) -> Self {
        Self {
            metadata,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for SerdeTableSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerdeTableSchema")
            .field("item_type", &std::any::type_name::<T>())
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl<T> TableSchema<T> for SerdeTableSchema<T>
where
    T: Serialize + DeserializeOwned,
{
    fn table_metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    fn item_to_map(&self, item: &T, ignore_nulls: bool) -> EnhancedResult<Item> {
        let value = serde_json::to_value(item).map_err(|e| EnhancedError::Schema(e.to_string()))?;
        let serde_json::Value::Object(fields) = value else {
            return Err(EnhancedError::Schema(format!(
                "{} does not serialize to a map",
                std::any::type_name::<T>()
            )));
        };
        Ok(fields
            .into_iter()
            .filter(|(_, v)| !(ignore_nulls && v.is_null()))
            .map(|(k, v)| (k, json_to_attribute(v)))
            .collect())
    }

    fn map_to_item(&self, map: &Item) -> EnhancedResult<T> {
        let fields = map
            .iter()
            .map(|(k, v)| Ok((k.clone(), attribute_to_json(v)?)))
            .collect::<EnhancedResult<serde_json::Map<_, _>>>()?;
        serde_json::from_value(serde_json::Value::Object(fields))
            .map_err(|e| EnhancedError::Schema(e.to_string()))
    }
}

fn json_to_attribute(value: serde_json::Value) -> AttributeValue {
    use serde_json::Value;
    match value {
        Value::Null => AttributeValue::null(),
        Value::Bool(b) => AttributeValue::Bool(b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s),
        Value::Array(values) => AttributeValue::L(values.into_iter().map(json_to_attribute).collect()),
        Value::Object(fields) => AttributeValue::M(
            fields
                .into_iter()
                .map(|(k, v)| (k, json_to_attribute(v)))
                .collect(),
        ),
    }
}

fn number_to_json(n: &str) -> EnhancedResult<serde_json::Value> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(i.into());
    }
    if let Ok(u) = n.parse::<u64>() {
        return Ok(u.into());
    }
    n.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .ok_or_else(|| EnhancedError::Schema(format!("'{n}' is not a valid number")))
}

fn attribute_to_json(value: &AttributeValue) -> EnhancedResult<serde_json::Value> {
    use serde_json::Value;
    Ok(match value {
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(n) => number_to_json(n)?,
        AttributeValue::B(b) => Value::Array(b.iter().map(|byte| Value::from(*byte)).collect()),
        AttributeValue::Ss(values) => Value::Array(values.iter().cloned().map(Value::String).collect()),
        AttributeValue::Ns(values) => Value::Array(
            values
                .iter()
                .map(|n| number_to_json(n))
                .collect::<EnhancedResult<_>>()?,
        ),
        AttributeValue::Bs(values) => Value::Array(
            values
                .iter()
                .map(|b| Value::Array(b.iter().map(|byte| Value::from(*byte)).collect()))
                .collect(),
        ),
        AttributeValue::L(values) => Value::Array(
            values
                .iter()
                .map(attribute_to_json)
                .collect::<EnhancedResult<_>>()?,
        ),
        AttributeValue::M(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| Ok((k.clone(), attribute_to_json(v)?)))
                .collect::<EnhancedResult<_>>()?,
        ),
    })
}
