//! Single-item, query and scan requests of the enhanced client.

use ruststack_dynamodb_model::AttributeValue;
use ruststack_dynamodb_model::types::ProvisionedThroughput;
use typed_builder::TypedBuilder;

use crate::error::{EnhancedError, EnhancedResult};
use crate::expression::{AND, Expression, key_ref, value_ref};
use crate::schema::{Key, TableMetadata};

/// Placeholder bound to the expected version of an optimistic-locking delete.
pub const VERSION_VALUE_PLACEHOLDER: &str = ":version_value";

/// Condition `{attribute} = :version_value` with `version` bound.
#[must_use]
pub fn optimistic_locking_condition(version: AttributeValue, attribute: &str) -> Expression {
    Expression::new(format!("{attribute} = {VERSION_VALUE_PLACEHOLDER}"))
        .with_value(VERSION_VALUE_PLACEHOLDER, version)
}

/// Put an item, optionally under a condition.
#[derive(Debug, Clone, PartialEq)]
pub struct PutItemEnhancedRequest<T> {
    pub(crate) item: T,
    pub(crate) condition: Option<Expression>,
}

impl<T> PutItemEnhancedRequest<T> {
    /// Put `item` unconditionally.
    #[must_use]
    pub fn new(item: T) -> Self {
        Self {
            item,
            condition: None,
        }
    }

    /// Require `condition` to hold on the stored item.
    #[must_use]
    pub fn condition(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Item to put.
    #[must_use]
    pub fn item(&self) -> &T {
        &self.item
    }

    /// Condition supplied by the caller.
    #[must_use]
    pub fn condition_expression(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }
}

impl<T> From<T> for PutItemEnhancedRequest<T> {
    fn from(item: T) -> Self {
        Self::new(item)
    }
}

/// Update an item from its full representation.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItemEnhancedRequest<T> {
    pub(crate) item: T,
    pub(crate) ignore_nulls: bool,
    pub(crate) condition: Option<Expression>,
}

impl<T> UpdateItemEnhancedRequest<T> {
    /// Update with `item`; null attributes are removed from the stored item.
    #[must_use]
    pub fn new(item: T) -> Self {
        Self {
            item,
            ignore_nulls: false,
            condition: None,
        }
    }

    /// Leave attributes that are null in the item untouched.
    #[must_use]
    pub fn ignore_nulls(mut self, ignore_nulls: bool) -> Self {
        self.ignore_nulls = ignore_nulls;
        self
    }

    /// Require `condition` to hold on the stored item.
    #[must_use]
    pub fn condition(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Item to update with.
    #[must_use]
    pub fn item(&self) -> &T {
        &self.item
    }
}

impl<T> From<T> for UpdateItemEnhancedRequest<T> {
    fn from(item: T) -> Self {
        Self::new(item)
    }
}

/// Read a single item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GetItemEnhancedRequest {
    pub(crate) key: Key,
    pub(crate) consistent_read: Option<bool>,
}

impl GetItemEnhancedRequest {
    /// Read the item with `key`.
    #[must_use]
    pub fn new(key: Key) -> Self {
        Self {
            key,
            consistent_read: None,
        }
    }

    /// Request a strongly consistent read.
    #[must_use]
    pub fn consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = Some(consistent_read);
        self
    }

    /// Key of the item.
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Consistency requested by the caller.
    #[must_use]
    pub fn consistent_read_setting(&self) -> Option<bool> {
        self.consistent_read
    }
}

impl From<Key> for GetItemEnhancedRequest {
    fn from(key: Key) -> Self {
        Self::new(key)
    }
}

/// Delete a single item, optionally under a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteItemEnhancedRequest {
    pub(crate) key: Key,
    pub(crate) condition: Option<Expression>,
}

impl DeleteItemEnhancedRequest {
    /// Delete the item with `key` unconditionally.
    #[must_use]
    pub fn new(key: Key) -> Self {
        Self {
            key,
            condition: None,
        }
    }

    /// Require `condition` to hold on the stored item, replacing any
    /// condition set before.
    #[must_use]
    pub fn condition(mut self, condition: Expression) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Only delete when the stored `attribute` still equals `version`. The
    /// check is AND-merged into an existing condition.
    pub fn with_optimistic_locking(
        self,
        version: AttributeValue,
        attribute: &str,
    ) -> EnhancedResult<Self> {
        self.and_condition(optimistic_locking_condition(version, attribute))
    }

    /// AND-merge `condition` into the current condition.
    pub fn and_condition(mut self, condition: Expression) -> EnhancedResult<Self> {
        self.condition = Expression::join(self.condition.take(), Some(condition), AND)?;
        Ok(self)
    }

    /// Key of the item.
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Condition the delete must satisfy.
    #[must_use]
    pub fn condition_expression(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }
}

impl From<Key> for DeleteItemEnhancedRequest {
    fn from(key: Key) -> Self {
        Self::new(key)
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Create the table a mapped resource points at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, TypedBuilder)]
pub struct CreateTableEnhancedRequest {
    /// Fixed capacity. The table is billed per request when unset.
    #[builder(default, setter(strip_option))]
    pub provisioned_throughput: Option<ProvisionedThroughput>,
}

// ---------------------------------------------------------------------------
// Query & Scan
// ---------------------------------------------------------------------------

/// Key condition of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryConditional {
    /// Partition value equals, and sort value equals when the key has one.
    KeyEqualTo(Key),
    /// Partition value equals and the sort value starts with a prefix.
    SortBeginsWith {
        /// Partition value to match.
        partition_value: AttributeValue,
        /// Required sort value prefix.
        prefix: String,
    },
    /// Partition value equals and the sort value is greater than the key's.
    SortGreaterThan(Key),
    /// Partition value equals and the sort value is at least the key's.
    SortGreaterThanOrEqualTo(Key),
    /// Partition value equals and the sort value is less than the key's.
    SortLessThan(Key),
    /// Partition value equals and the sort value is at most the key's.
    SortLessThanOrEqualTo(Key),
    /// Partition value of `from` equals and the sort value lies in
    /// `[from, to]`.
    SortBetween {
        /// Lower bound, inclusive.
        from: Key,
        /// Upper bound, inclusive.
        to: Key,
    },
}

/// Placeholder of the upper bound of a `BETWEEN` sort key condition.
fn upper_value_ref(attribute: &str) -> String {
    format!("{}2", value_ref(attribute))
}

impl QueryConditional {
    /// Key condition expression against a table with `metadata`.
    pub fn expression(&self, metadata: &TableMetadata) -> EnhancedResult<Expression> {
        let partition = metadata.partition_key();
        let partition_condition = |value: &AttributeValue| {
            if value.is_null() {
                return Err(EnhancedError::InvalidArgument(
                    "a query needs a non-null partition value".to_owned(),
                ));
            }
            Ok(
                Expression::new(format!("{} = {}", key_ref(partition), value_ref(partition)))
                    .with_name(key_ref(partition), partition)
                    .with_value(value_ref(partition), value.clone()),
            )
        };

        match self {
            Self::KeyEqualTo(key) => {
                let condition = partition_condition(key.partition_value())?;
                let Some(value) = key.sort_value().filter(|value| !value.is_null()) else {
                    return Ok(condition);
                };
                let sort = required_sort_key(metadata)?;
                let (text, mut names, mut values) = condition.into_parts();
                names.insert(key_ref(sort), sort.to_owned());
                values.insert(value_ref(sort), value.clone());
                Ok(Expression::from_parts(
                    format!("{text}{AND}{} = {}", key_ref(sort), value_ref(sort)),
                    names,
                    values,
                ))
            }
            Self::SortBeginsWith {
                partition_value,
                prefix,
            } => {
                let sort = required_sort_key(metadata)?;
                let (text, mut names, mut values) =
                    partition_condition(partition_value)?.into_parts();
                names.insert(key_ref(sort), sort.to_owned());
                values.insert(value_ref(sort), AttributeValue::S(prefix.clone()));
                Ok(Expression::from_parts(
                    format!(
                        "{text}{AND}begins_with({}, {})",
                        key_ref(sort),
                        value_ref(sort)
                    ),
                    names,
                    values,
                ))
            }
            Self::SortGreaterThan(key)
            | Self::SortGreaterThanOrEqualTo(key)
            | Self::SortLessThan(key)
            | Self::SortLessThanOrEqualTo(key) => {
                let operator = match self {
                    Self::SortGreaterThan(_) => ">",
                    Self::SortGreaterThanOrEqualTo(_) => ">=",
                    Self::SortLessThan(_) => "<",
                    _ => "<=",
                };
                let sort = required_sort_key(metadata)?;
                let value = comparable_sort_value(key)?;
                let (text, mut names, mut values) =
                    partition_condition(key.partition_value())?.into_parts();
                names.insert(key_ref(sort), sort.to_owned());
                values.insert(value_ref(sort), value.clone());
                Ok(Expression::from_parts(
                    format!(
                        "{text}{AND}{} {operator} {}",
                        key_ref(sort),
                        value_ref(sort)
                    ),
                    names,
                    values,
                ))
            }
            Self::SortBetween { from, to } => {
                let sort = required_sort_key(metadata)?;
                let lower = comparable_sort_value(from)?;
                let upper = comparable_sort_value(to)?;
                let (text, mut names, mut values) =
                    partition_condition(from.partition_value())?.into_parts();
                names.insert(key_ref(sort), sort.to_owned());
                values.insert(value_ref(sort), lower.clone());
                values.insert(upper_value_ref(sort), upper.clone());
                Ok(Expression::from_parts(
                    format!(
                        "{text}{AND}{} BETWEEN {} AND {}",
                        key_ref(sort),
                        value_ref(sort),
                        upper_value_ref(sort)
                    ),
                    names,
                    values,
                ))
            }
        }
    }
}

fn required_sort_key(metadata: &TableMetadata) -> EnhancedResult<&str> {
    metadata.sort_key().ok_or_else(|| {
        EnhancedError::InvalidArgument(
            "a sort key condition needs a table with a sort key".to_owned(),
        )
    })
}

fn comparable_sort_value(key: &Key) -> EnhancedResult<&AttributeValue> {
    match key.sort_value() {
        Some(value) if !value.is_null() => Ok(value),
        Some(_) => Err(EnhancedError::InvalidArgument(
            "a relative sort key condition cannot compare against null".to_owned(),
        )),
        None => Err(EnhancedError::InvalidArgument(
            "a relative sort key condition needs a sort value".to_owned(),
        )),
    }
}

/// Query a table or index page by page.
#[derive(Debug, Clone, TypedBuilder)]
pub struct QueryEnhancedRequest {
    /// Key condition.
    pub query_conditional: QueryConditional,
    /// Filter applied after the key condition.
    #[builder(default, setter(strip_option))]
    pub filter_expression: Option<Expression>,
    /// Maximum items evaluated per page.
    #[builder(default, setter(strip_option))]
    pub limit: Option<i32>,
    /// Ascending sort order when `true` (the default).
    #[builder(default, setter(strip_option))]
    pub scan_index_forward: Option<bool>,
    /// Strongly consistent reads.
    #[builder(default, setter(strip_option))]
    pub consistent_read: Option<bool>,
    /// Secondary index to query instead of the table.
    #[builder(default, setter(strip_option, into))]
    pub index_name: Option<String>,
    /// Key to resume after.
    #[builder(default, setter(strip_option))]
    pub exclusive_start_key: Option<Key>,
}

/// Scan a table or index page by page.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct ScanEnhancedRequest {
    /// Filter applied to every scanned item.
    #[builder(default, setter(strip_option))]
    pub filter_expression: Option<Expression>,
    /// Maximum items evaluated per page.
    #[builder(default, setter(strip_option))]
    pub limit: Option<i32>,
    /// Strongly consistent reads.
    #[builder(default, setter(strip_option))]
    pub consistent_read: Option<bool>,
    /// Secondary index to scan instead of the table.
    #[builder(default, setter(strip_option, into))]
    pub index_name: Option<String>,
    /// Key to resume after.
    #[builder(default, setter(strip_option))]
    pub exclusive_start_key: Option<Key>,
}
