//! Batch reads and writes across tables.
//!
//! A [`WriteBatch`] or [`ReadBatch`] holds the requests for one table; the
//! enhanced batch requests group batches per table into a single call.
//! Unprocessed items come back as data and are never retried here.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use ruststack_dynamodb_model::input::{BatchGetItemInput, BatchWriteItemInput};
use ruststack_dynamodb_model::output::{BatchGetItemOutput, BatchWriteItemOutput};
use ruststack_dynamodb_model::types::{
    ConsumedCapacity, ItemCollectionMetrics, KeysAndAttributes, WriteRequest,
};
use ruststack_dynamodb_model::{DynamoDBOperation, Item};
use tracing::debug;

use crate::error::{EnhancedError, EnhancedResult, TableResourcePurpose};
use crate::request::GetItemEnhancedRequest;
use crate::schema::Key;
use crate::table::MappedTableResource;

const CONDITIONAL_BATCH_PUT: &str = "A mapper extension inserted a conditionExpression in a \
     PutItem request as part of a BatchWriteItemRequest. This is not supported by DynamoDb. \
     An extension known to do this is the VersionedRecordExtension. To fix this use a table \
     schema that does not have a versioned attribute in it or do not load the offending \
     extensions.";

const INCONSISTENT_READS: &str = "All batchable read requests for the same table must have the \
     same 'consistentRead' setting.";

// ---------------------------------------------------------------------------
// WriteBatch
// ---------------------------------------------------------------------------

enum PendingWrite<T> {
    Put(T),
    Delete(Key),
}

/// Puts and deletes for one table.
///
/// Equality and hashing are structural over the table name and the write
/// requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WriteBatch {
    table_name: String,
    write_requests: Vec<WriteRequest>,
}

impl WriteBatch {
    /// Start an empty builder.
    #[must_use]
    pub fn builder<T>() -> WriteBatchBuilder<T> {
        WriteBatchBuilder {
            resource: None,
            pending: Vec::new(),
        }
    }

    /// Build a batch for `resource`, adding requests in `configure`.
    pub fn create<T, F>(resource: &MappedTableResource<T>, configure: F) -> EnhancedResult<Self>
    where
        F: FnOnce(WriteBatchBuilder<T>) -> EnhancedResult<WriteBatchBuilder<T>>,
    {
        configure(Self::builder().mapped_table_resource(resource.clone()))?.build()
    }

    /// Target table.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Write requests in insertion order.
    #[must_use]
    pub fn write_requests(&self) -> &[WriteRequest] {
        &self.write_requests
    }
}

/// Builder for [`WriteBatch`].
pub struct WriteBatchBuilder<T> {
    resource: Option<MappedTableResource<T>>,
    pending: Vec<PendingWrite<T>>,
}

impl<T> fmt::Debug for WriteBatchBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteBatchBuilder")
            .field("resource", &self.resource)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl<T> WriteBatchBuilder<T> {
    /// Table the requests target.
    #[must_use]
    pub fn mapped_table_resource(mut self, resource: MappedTableResource<T>) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Put `item`.
    #[must_use]
    pub fn add_put_item(mut self, item: T) -> Self {
        self.pending.push(PendingWrite::Put(item));
        self
    }

    /// Delete the item with `key`.
    #[must_use]
    pub fn add_delete_key(mut self, key: Key) -> Self {
        self.pending.push(PendingWrite::Delete(key));
        self
    }

    /// Delete the item identified by `key_item`. Needs the table resource to
    /// derive the key.
    pub fn add_delete_item(self, key_item: &T) -> EnhancedResult<Self> {
        let resource = self.resource.as_ref().ok_or(EnhancedError::MissingTableResource(
            TableResourcePurpose::KeyDerivation,
        ))?;
        let key = resource.key_from(key_item)?;
        Ok(self.add_delete_key(key))
    }

    /// Materialize the write requests.
    pub fn build(self) -> EnhancedResult<WriteBatch> {
        let resource = self.resource.ok_or(EnhancedError::MissingTableResource(
            TableResourcePurpose::WriteBatchRequests,
        ))?;
        let write_requests = self
            .pending
            .into_iter()
            .map(|pending| match pending {
                PendingWrite::Put(item) => {
                    let (map, condition) =
                        resource.prepare_write(&item, true, DynamoDBOperation::BatchWriteItem)?;
                    if condition.is_some() {
                        return Err(EnhancedError::InvalidArgument(
                            CONDITIONAL_BATCH_PUT.to_owned(),
                        ));
                    }
                    Ok(WriteRequest::put(map))
                }
                PendingWrite::Delete(key) => Ok(WriteRequest::delete(resource.key_map(&key)?)),
            })
            .collect::<EnhancedResult<Vec<_>>>()?;
        Ok(WriteBatch {
            table_name: resource.table_name().to_owned(),
            write_requests,
        })
    }
}

/// One `BatchWriteItem` call made of write batches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWriteItemEnhancedRequest {
    write_batches: Vec<WriteBatch>,
}

impl BatchWriteItemEnhancedRequest {
    /// A request of `write_batches`.
    #[must_use]
    pub fn new(write_batches: Vec<WriteBatch>) -> Self {
        Self { write_batches }
    }

    /// Add one more batch.
    #[must_use]
    pub fn add_write_batch(mut self, batch: WriteBatch) -> Self {
        self.write_batches.push(batch);
        self
    }

    /// Batches in insertion order.
    #[must_use]
    pub fn write_batches(&self) -> &[WriteBatch] {
        &self.write_batches
    }

    /// Wire request; batches of the same table are concatenated in order.
    #[must_use]
    pub fn to_input(&self) -> BatchWriteItemInput {
        let mut request_items: HashMap<String, Vec<WriteRequest>> = HashMap::new();
        for batch in &self.write_batches {
            request_items
                .entry(batch.table_name.clone())
                .or_default()
                .extend(batch.write_requests.iter().cloned());
        }
        BatchWriteItemInput {
            request_items,
            ..Default::default()
        }
    }
}

/// Outcome of a batch write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteResult {
    unprocessed_requests: HashMap<String, Vec<WriteRequest>>,
    consumed_capacity: Vec<ConsumedCapacity>,
    item_collection_metrics: HashMap<String, Vec<ItemCollectionMetrics>>,
}

impl From<BatchWriteItemOutput> for BatchWriteResult {
    fn from(output: BatchWriteItemOutput) -> Self {
        Self {
            unprocessed_requests: output.unprocessed_items,
            consumed_capacity: output.consumed_capacity,
            item_collection_metrics: output.item_collection_metrics,
        }
    }
}

impl Hash for BatchWriteResult {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut tables: Vec<_> = self.unprocessed_requests.iter().collect();
        tables.sort_unstable_by(|a, b| a.0.cmp(b.0));
        tables.hash(state);
        self.consumed_capacity.hash(state);
        let mut metrics: Vec<_> = self.item_collection_metrics.iter().collect();
        metrics.sort_unstable_by(|a, b| a.0.cmp(b.0));
        metrics.hash(state);
    }
}

/// Capacity values reported by the service are never NaN, so equality is total.
impl Eq for BatchWriteResult {}

impl BatchWriteResult {
    /// Table name to write requests the service did not process.
    #[must_use]
    pub fn unprocessed_requests(&self) -> &HashMap<String, Vec<WriteRequest>> {
        &self.unprocessed_requests
    }

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

    /// Unprocessed puts of `resource`'s table, as items.
    pub fn unprocessed_put_items_for_table<T>(
        &self,
        resource: &MappedTableResource<T>,
    ) -> EnhancedResult<Vec<T>> {
        let puts = self
            .requests_for(resource.table_name())
            .iter()
            .filter_map(|request| request.put_request.as_ref())
            .map(|put| put.item.clone())
            .collect();
        resource.read_items(puts, DynamoDBOperation::BatchWriteItem)
    }

    /// Unprocessed deletes of `resource`'s table, as keys.
    pub fn unprocessed_delete_items_for_table<T>(
        &self,
        resource: &MappedTableResource<T>,
    ) -> EnhancedResult<Vec<Key>> {
        self.requests_for(resource.table_name())
            .iter()
            .filter_map(|request| request.delete_request.as_ref())
            .map(|delete| Key::from_item(&delete.key, resource.table_metadata()))
            .collect()
    }

    fn requests_for(&self, table_name: &str) -> &[WriteRequest] {
        self.unprocessed_requests
            .get(table_name)
            .map_or(&[], Vec::as_slice)
    }
}

// ---------------------------------------------------------------------------
// ReadBatch
// ---------------------------------------------------------------------------

fn merge_consistent_read(current: Option<bool>, next: Option<bool>) -> EnhancedResult<Option<bool>> {
    if current.unwrap_or(false) == next.unwrap_or(false) {
        Ok(current.or(next))
    } else {
        Err(EnhancedError::InvalidArgument(INCONSISTENT_READS.to_owned()))
    }
}

/// Gets for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadBatch {
    table_name: String,
    keys_and_attributes: KeysAndAttributes,
}

impl ReadBatch {
    /// Start an empty builder.
    #[must_use]
    pub fn builder<T>() -> ReadBatchBuilder<T> {
        ReadBatchBuilder {
            resource: None,
            gets: Vec::new(),
        }
    }

    /// Build a batch for `resource`, adding requests in `configure`.
    pub fn create<T, F>(resource: &MappedTableResource<T>, configure: F) -> EnhancedResult<Self>
    where
        F: FnOnce(ReadBatchBuilder<T>) -> EnhancedResult<ReadBatchBuilder<T>>,
    {
        configure(Self::builder().mapped_table_resource(resource.clone()))?.build()
    }

    /// Source table.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Keys and read settings.
    #[must_use]
    pub fn keys_and_attributes(&self) -> &KeysAndAttributes {
        &self.keys_and_attributes
    }
}

/// Builder for [`ReadBatch`].
pub struct ReadBatchBuilder<T> {
    resource: Option<MappedTableResource<T>>,
    gets: Vec<GetItemEnhancedRequest>,
}

impl<T> fmt::Debug for ReadBatchBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadBatchBuilder")
            .field("resource", &self.resource)
            .field("gets", &self.gets)
            .finish()
    }
}

impl<T> ReadBatchBuilder<T> {
    /// Table the requests read from.
    #[must_use]
    pub fn mapped_table_resource(mut self, resource: MappedTableResource<T>) -> Self {
        self.resource = Some(resource);
        self
    }

    /// Get the item with the requested key.
    #[must_use]
    pub fn add_get_item(mut self, request: impl Into<GetItemEnhancedRequest>) -> Self {
        self.gets.push(request.into());
        self
    }

    /// Get the item identified by `key_item`. Needs the table resource to
    /// derive the key.
    pub fn add_get_key_item(self, key_item: &T) -> EnhancedResult<Self> {
        let resource = self.resource.as_ref().ok_or(EnhancedError::MissingTableResource(
            TableResourcePurpose::KeyDerivation,
        ))?;
        let key = resource.key_from(key_item)?;
        Ok(self.add_get_item(key))
    }

    /// Materialize the read requests. All gets must agree on
    /// `consistent_read`.
    pub fn build(self) -> EnhancedResult<ReadBatch> {
        let resource = self.resource.ok_or(EnhancedError::MissingTableResource(
            TableResourcePurpose::ReadBatchRequests,
        ))?;
        let mut keys_and_attributes = KeysAndAttributes::default();
        for (i, get) in self.gets.into_iter().enumerate() {
            keys_and_attributes.consistent_read = if i == 0 {
                get.consistent_read
            } else {
                merge_consistent_read(keys_and_attributes.consistent_read, get.consistent_read)?
            };
            keys_and_attributes.keys.push(resource.key_map(&get.key)?);
        }
        Ok(ReadBatch {
            table_name: resource.table_name().to_owned(),
            keys_and_attributes,
        })
    }
}

/// One `BatchGetItem` call made of read batches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetItemEnhancedRequest {
    read_batches: Vec<ReadBatch>,
}

impl BatchGetItemEnhancedRequest {
    /// A request of `read_batches`.
    #[must_use]
    pub fn new(read_batches: Vec<ReadBatch>) -> Self {
        Self { read_batches }
    }

    /// Add one more batch.
    #[must_use]
    pub fn add_read_batch(mut self, batch: ReadBatch) -> Self {
        self.read_batches.push(batch);
        self
    }

    /// Batches in insertion order.
    #[must_use]
    pub fn read_batches(&self) -> &[ReadBatch] {
        &self.read_batches
    }

    /// Wire request; keys of the same table are merged, which requires
    /// matching `consistent_read` settings.
    pub fn to_input(&self) -> EnhancedResult<BatchGetItemInput> {
        let mut request_items: HashMap<String, KeysAndAttributes> = HashMap::new();
        for batch in &self.read_batches {
            match request_items.get_mut(&batch.table_name) {
                Some(merged) => {
                    merged.consistent_read = merge_consistent_read(
                        merged.consistent_read,
                        batch.keys_and_attributes.consistent_read,
                    )?;
                    merged
                        .keys
                        .extend(batch.keys_and_attributes.keys.iter().cloned());
                }
                None => {
                    request_items
                        .insert(batch.table_name.clone(), batch.keys_and_attributes.clone());
                }
            }
        }
        Ok(BatchGetItemInput {
            request_items,
            ..Default::default()
        })
    }
}

/// One response of a batch get.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetResultPage {
    responses: HashMap<String, Vec<Item>>,
    unprocessed_keys: HashMap<String, KeysAndAttributes>,
    consumed_capacity: Vec<ConsumedCapacity>,
}

impl From<BatchGetItemOutput> for BatchGetResultPage {
    fn from(output: BatchGetItemOutput) -> Self {
        Self {
            responses: output.responses,
            unprocessed_keys: output.unprocessed_keys,
            consumed_capacity: output.consumed_capacity,
        }
    }
}

impl BatchGetResultPage {
    /// Items read from `resource`'s table.
    pub fn results_for_table<T>(&self, resource: &MappedTableResource<T>) -> EnhancedResult<Vec<T>> {
        let raw = self
            .responses
            .get(resource.table_name())
            .cloned()
            .unwrap_or_default();
        resource.read_items(raw, DynamoDBOperation::BatchGetItem)
    }

    /// Keys of `resource`'s table the service did not read.
    pub fn unprocessed_keys_for_table<T>(
        &self,
        resource: &MappedTableResource<T>,
    ) -> EnhancedResult<Vec<Key>> {
        self.unprocessed_keys
            .get(resource.table_name())
            .map_or(&[][..], |k| k.keys.as_slice())
            .iter()
            .map(|key| Key::from_item(key, resource.table_metadata()))
            .collect()
    }

    /// Unprocessed keys as returned by the service.
    #[must_use]
    pub fn unprocessed_keys(&self) -> &HashMap<String, KeysAndAttributes> {
        &self.unprocessed_keys
    }

    /// Capacity consumed per table.
    #[must_use]
    pub fn consumed_capacity(&self) -> &[ConsumedCapacity] {
        &self.consumed_capacity
    }

    /// Whether the service left keys unread.
    #[must_use]
    pub fn has_unprocessed_keys(&self) -> bool {
        self.unprocessed_keys.values().any(|k| !k.keys.is_empty())
    }

    pub(crate) fn follow_up_input(&self) -> Option<BatchGetItemInput> {
        if !self.has_unprocessed_keys() {
            return None;
        }
        let request_items: HashMap<String, KeysAndAttributes> = self
            .unprocessed_keys
            .iter()
            .filter(|(_, keys)| !keys.keys.is_empty())
            .map(|(table, keys)| (table.clone(), keys.clone()))
            .collect();
        debug!(tables = request_items.len(), "requesting unprocessed keys");
        Some(BatchGetItemInput {
            request_items,
            ..Default::default()
        })
    }
}
