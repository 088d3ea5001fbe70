//! Transactional reads and writes across tables.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use ruststack_dynamodb_model::input::{TransactGetItemsInput, TransactWriteItemsInput};
use ruststack_dynamodb_model::output::{TransactGetItemsOutput, TransactWriteItemsOutput};
use ruststack_dynamodb_model::types::{
    ConditionCheck, ConsumedCapacity, Delete, Get, ItemCollectionMetrics, Put, TransactGetItem,
    TransactWriteItem, Update,
};
use ruststack_dynamodb_model::{DynamoDBOperation, Item};

use crate::error::{EnhancedError, EnhancedResult};
use crate::expression::{Expression, condition_parts};
use crate::optimistic_locking::conditionally_apply_optimistic_locking;
use crate::request::{DeleteItemEnhancedRequest, PutItemEnhancedRequest, UpdateItemEnhancedRequest};
use crate::schema::Key;
use crate::table::MappedTableResource;

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// An ordered list of writes applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactWriteItemsEnhancedRequest {
    transact_items: Vec<TransactWriteItem>,
    client_request_token: Option<String>,
}

impl TransactWriteItemsEnhancedRequest {
    /// Start an empty builder.
    #[must_use]
    pub fn builder() -> TransactWriteItemsEnhancedRequestBuilder {
        TransactWriteItemsEnhancedRequestBuilder::default()
    }

    /// Actions in the order they were added.
    #[must_use]
    pub fn transact_items(&self) -> &[TransactWriteItem] {
        &self.transact_items
    }

    /// Idempotency token.
    #[must_use]
    pub fn client_request_token(&self) -> Option<&str> {
        self.client_request_token.as_deref()
    }

    /// Wire request.
    #[must_use]
    pub fn to_input(&self) -> TransactWriteItemsInput {
        TransactWriteItemsInput {
            transact_items: self.transact_items.clone(),
            client_request_token: self.client_request_token.clone(),
            ..Default::default()
        }
    }
}

/// Builder for [`TransactWriteItemsEnhancedRequest`]. Actions that derive
/// data from items run the table's extension and fail on mapping errors.
#[derive(Debug, Default)]
pub struct TransactWriteItemsEnhancedRequestBuilder {
    transact_items: Vec<TransactWriteItem>,
    client_request_token: Option<String>,
}

impl TransactWriteItemsEnhancedRequestBuilder {
    /// Put an item into `resource`'s table.
    pub fn add_put_item<T>(
        mut self,
        resource: &MappedTableResource<T>,
        request: impl Into<PutItemEnhancedRequest<T>>,
    ) -> EnhancedResult<Self> {
        let (item, condition) =
            resource.put_parts(request.into(), DynamoDBOperation::TransactWriteItems)?;
        let (condition_expression, names, values) = condition_parts(condition);
        self.transact_items.push(TransactWriteItem {
            put: Some(Put {
                table_name: resource.table_name().to_owned(),
                item,
                condition_expression,
                expression_attribute_names: names,
                expression_attribute_values: values,
                ..Default::default()
            }),
            ..Default::default()
        });
        Ok(self)
    }

    /// Delete an item of `resource`'s table.
    pub fn add_delete_item<T>(
        mut self,
        resource: &MappedTableResource<T>,
        request: impl Into<DeleteItemEnhancedRequest>,
    ) -> EnhancedResult<Self> {
        let request = request.into();
        let key = resource.key_map(&request.key)?;
        let (condition_expression, names, values) = condition_parts(request.condition);
        self.transact_items.push(TransactWriteItem {
            delete: Some(Delete {
                table_name: resource.table_name().to_owned(),
                key,
                condition_expression,
                expression_attribute_names: names,
                expression_attribute_values: values,
                ..Default::default()
            }),
            ..Default::default()
        });
        Ok(self)
    }

    /// Delete the item identified by `key_item`, optionally guarded by its
    /// version.
    pub fn add_delete_key_item<T>(
        self,
        resource: &MappedTableResource<T>,
        key_item: &T,
        optimistic_locking: bool,
    ) -> EnhancedResult<Self> {
        let request = DeleteItemEnhancedRequest::new(resource.key_from(key_item)?);
        let request = conditionally_apply_optimistic_locking(
            request,
            key_item,
            resource.schema(),
            optimistic_locking,
        )?;
        self.add_delete_item(resource, request)
    }

    /// Update an item of `resource`'s table.
    pub fn add_update_item<T>(
        mut self,
        resource: &MappedTableResource<T>,
        request: impl Into<UpdateItemEnhancedRequest<T>>,
    ) -> EnhancedResult<Self> {
        let parts = resource.update_parts(request.into(), DynamoDBOperation::TransactWriteItems)?;
        let update_expression = parts.update_expression.ok_or_else(|| {
            EnhancedError::InvalidArgument(format!(
                "a transactional update of table {} needs at least one non-key attribute",
                resource.table_name()
            ))
        })?;
        self.transact_items.push(TransactWriteItem {
            update: Some(Update {
                table_name: resource.table_name().to_owned(),
                key: parts.key,
                update_expression,
                condition_expression: parts.condition_expression,
                expression_attribute_names: parts.names,
                expression_attribute_values: parts.values,
                ..Default::default()
            }),
            ..Default::default()
        });
        Ok(self)
    }

    /// Require `condition` to hold on the item with `key` without writing it.
    pub fn add_condition_check<T>(
        mut self,
        resource: &MappedTableResource<T>,
        key: &Key,
        condition: Expression,
    ) -> EnhancedResult<Self> {
        let key = resource.key_map(key)?;
        let (condition_expression, names, values) = condition.into_parts();
        self.transact_items.push(TransactWriteItem {
            condition_check: Some(ConditionCheck {
                table_name: resource.table_name().to_owned(),
                key,
                condition_expression,
                expression_attribute_names: names,
                expression_attribute_values: values,
                ..Default::default()
            }),
            ..Default::default()
        });
        Ok(self)
    }

    /// Idempotency token for the transaction.
    #[must_use]
    pub fn client_request_token(mut self, token: impl Into<String>) -> Self {
        self.client_request_token = Some(token.into());
        self
    }

    /// Finish the request.
    #[must_use]
    pub fn build(self) -> TransactWriteItemsEnhancedRequest {
        TransactWriteItemsEnhancedRequest {
            transact_items: self.transact_items,
            client_request_token: self.client_request_token,
        }
    }
}

/// Outcome of a committed transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactWriteItemsEnhancedResponse {
    consumed_capacity: Vec<ConsumedCapacity>,
    item_collection_metrics: HashMap<String, Vec<ItemCollectionMetrics>>,
}

impl From<TransactWriteItemsOutput> for TransactWriteItemsEnhancedResponse {
    fn from(output: TransactWriteItemsOutput) -> Self {
        Self {
            consumed_capacity: output.consumed_capacity,
            item_collection_metrics: output.item_collection_metrics,
        }
    }
}

impl Hash for TransactWriteItemsEnhancedResponse {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.consumed_capacity.hash(state);
        let mut metrics: Vec<_> = self.item_collection_metrics.iter().collect();
        metrics.sort_unstable_by(|a, b| a.0.cmp(b.0));
        metrics.hash(state);
    }
}

impl TransactWriteItemsEnhancedResponse {
    /// Capacity consumed per table.
    #[must_use]
    pub fn consumed_capacity(&self) -> &[ConsumedCapacity] {
        &self.consumed_capacity
    }

    /// Item collection metrics per table.
    #[must_use]
    pub fn item_collection_metrics(&self) -> &HashMap<String, Vec<ItemCollectionMetrics>> {
        &self.item_collection_metrics
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// An ordered list of gets served from one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactGetItemsEnhancedRequest {
    transact_items: Vec<TransactGetItem>,
}

impl TransactGetItemsEnhancedRequest {
    /// Start an empty builder.
    #[must_use]
    pub fn builder() -> TransactGetItemsEnhancedRequestBuilder {
        TransactGetItemsEnhancedRequestBuilder::default()
    }

    /// Gets in the order they were added.
    #[must_use]
    pub fn transact_items(&self) -> &[TransactGetItem] {
        &self.transact_items
    }

    /// Wire request.
    #[must_use]
    pub fn to_input(&self) -> TransactGetItemsInput {
        TransactGetItemsInput {
            transact_items: self.transact_items.clone(),
            ..Default::default()
        }
    }
}

/// Builder for [`TransactGetItemsEnhancedRequest`].
#[derive(Debug, Default)]
pub struct TransactGetItemsEnhancedRequestBuilder {
    transact_items: Vec<TransactGetItem>,
}

impl TransactGetItemsEnhancedRequestBuilder {
    /// Read the item with `key` from `resource`'s table.
    pub fn add_get_item<T>(
        mut self,
        resource: &MappedTableResource<T>,
        key: &Key,
    ) -> EnhancedResult<Self> {
        self.transact_items.push(TransactGetItem {
            get: Get {
                table_name: resource.table_name().to_owned(),
                key: resource.key_map(key)?,
                ..Default::default()
            },
        });
        Ok(self)
    }

    /// Read the item identified by `key_item`.
    pub fn add_get_key_item<T>(
        self,
        resource: &MappedTableResource<T>,
        key_item: &T,
    ) -> EnhancedResult<Self> {
        let key = resource.key_from(key_item)?;
        self.add_get_item(resource, &key)
    }

    /// Finish the request.
    #[must_use]
    pub fn build(self) -> TransactGetItemsEnhancedRequest {
        TransactGetItemsEnhancedRequest {
            transact_items: self.transact_items,
        }
    }
}

/// One item of a transactional read, positioned like its get.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactGetResultPage {
    item: Option<Item>,
}

impl TransactGetResultPage {
    /// Raw attributes, if the item exists.
    #[must_use]
    pub fn raw_item(&self) -> Option<&Item> {
        self.item.as_ref()
    }

    /// The item mapped through `resource`; absent and empty items map to
    /// `None`.
    pub fn get_item<T>(&self, resource: &MappedTableResource<T>) -> EnhancedResult<Option<T>> {
        match &self.item {
            Some(raw) => resource.read_item(raw.clone(), DynamoDBOperation::TransactGetItems),
            None => Ok(None),
        }
    }

    pub(crate) fn from_output(output: TransactGetItemsOutput) -> Vec<Self> {
        output
            .responses
            .into_iter()
            .map(|response| Self {
                item: response.item,
            })
            .collect()
    }
}
