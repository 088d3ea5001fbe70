//! The enhanced client: typed tables plus batch and transactional calls.

use std::sync::Arc;

use futures::Stream;
use ruststack_client_core::ServiceDefaults;
use ruststack_dynamodb_model::input::BatchGetItemInput;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::api::DynamoDbApi;
use crate::batch::{
    BatchGetItemEnhancedRequest, BatchGetResultPage, BatchWriteItemEnhancedRequest,
    BatchWriteResult,
};
use crate::error::{EnhancedError, EnhancedResult};
use crate::extension::{ChainExtension, Extension};
use crate::schema::TableSchema;
use crate::table::{DynamoDbTable, MappedTableResource};
use crate::transact::{
    TransactGetItemsEnhancedRequest, TransactGetResultPage, TransactWriteItemsEnhancedRequest,
    TransactWriteItemsEnhancedResponse,
};
use crate::versioned::VersionedRecordExtension;

/// Service defaults of DynamoDB clients.
#[must_use]
pub fn dynamodb_service_defaults() -> ServiceDefaults {
    ServiceDefaults::builder()
        .service_name("DynamoDB")
        .signing_name("dynamodb")
        .endpoint_prefix("dynamodb")
        .build()
}

fn default_extensions() -> Vec<Arc<dyn Extension>> {
    vec![Arc::new(VersionedRecordExtension::default())]
}

enum BatchGetCursor {
    Start(BatchGetItemEnhancedRequest),
    Next(BatchGetItemInput),
    Done,
}

/// Entry point of the object mapper.
///
/// Extensions default to a [`VersionedRecordExtension`]; several extensions
/// are chained in the order given.
#[derive(Debug, Clone, TypedBuilder)]
pub struct EnhancedClient {
    api: Arc<dyn DynamoDbApi>,
    #[builder(default = default_extensions())]
    extensions: Vec<Arc<dyn Extension>>,
}

impl EnhancedClient {
    /// A client over `api` with the default extensions.
    #[must_use]
    pub fn create(api: Arc<dyn DynamoDbApi>) -> Self {
        Self::builder().api(api).build()
    }

    /// The low-level API.
    #[must_use]
    pub fn api(&self) -> &Arc<dyn DynamoDbApi> {
        &self.api
    }

    /// Extension applied to every table of this client.
    #[must_use]
    pub fn extension(&self) -> Option<Arc<dyn Extension>> {
        match self.extensions.as_slice() {
            [] => None,
            [single] => Some(Arc::clone(single)),
            many => Some(Arc::new(ChainExtension::new(many.to_vec()))),
        }
    }

    /// Typed handle on `table_name`.
    pub fn table<T>(
        &self,
        table_name: impl Into<String>,
        schema: Arc<dyn TableSchema<T>>,
    ) -> DynamoDbTable<T> {
        let mut resource = MappedTableResource::new(table_name, schema);
        if let Some(extension) = self.extension() {
            resource = resource.with_extension(extension);
        }
        DynamoDbTable::new(resource, Arc::clone(&self.api))
    }

    /// Write several batches in one call. Unprocessed requests are part of
    /// the result and are not retried.
    pub async fn batch_write_item(
        &self,
        request: BatchWriteItemEnhancedRequest,
    ) -> EnhancedResult<BatchWriteResult> {
        let input = request.to_input();
        debug!(tables = input.request_items.len(), "writing batch");
        let result = BatchWriteResult::from(self.api.batch_write_item(input).await?);
        let unprocessed: usize = result.unprocessed_requests().values().map(Vec::len).sum();
        if unprocessed > 0 {
            info!(unprocessed, "batch write left unprocessed requests");
        }
        Ok(result)
    }

    /// Read several batches. Each page is one call; a further page requests
    /// the keys the previous one left unprocessed.
    pub fn batch_get_item(
        &self,
        request: BatchGetItemEnhancedRequest,
    ) -> impl Stream<Item = EnhancedResult<BatchGetResultPage>> + '_ {
        futures::stream::try_unfold(BatchGetCursor::Start(request), move |cursor| {
            self.batch_get_page(cursor)
        })
    }

    /// Apply every write of `request` or none of them.
    pub async fn transact_write_items(
        &self,
        request: TransactWriteItemsEnhancedRequest,
    ) -> EnhancedResult<TransactWriteItemsEnhancedResponse> {
        let input = request.to_input();
        debug!(actions = input.transact_items.len(), "writing transaction");
        match self.api.transact_write_items(input).await {
            Ok(output) => Ok(output.into()),
            Err(err) => {
                if !err.cancellation_reasons.is_empty() {
                    warn!(code = %err.code, reasons = err.cancellation_reasons.len(), "transaction canceled");
                }
                Err(EnhancedError::Service(err))
            }
        }
    }

    /// Read every item of `request` from one snapshot. Results are positioned
    /// like the gets of the request.
    pub async fn transact_get_items(
        &self,
        request: TransactGetItemsEnhancedRequest,
    ) -> EnhancedResult<Vec<TransactGetResultPage>> {
        let input = request.to_input();
        debug!(gets = input.transact_items.len(), "reading transaction");
        let output = self.api.transact_get_items(input).await?;
        Ok(TransactGetResultPage::from_output(output))
    }

    async fn batch_get_page(
        &self,
        cursor: BatchGetCursor,
    ) -> EnhancedResult<Option<(BatchGetResultPage, BatchGetCursor)>> {
        let input = match cursor {
            BatchGetCursor::Start(request) => request.to_input()?,
            BatchGetCursor::Next(input) => input,
            BatchGetCursor::Done => return Ok(None),
        };
        let page = BatchGetResultPage::from(self.api.batch_get_item(input).await?);
        let next = page
            .follow_up_input()
            .map_or(BatchGetCursor::Done, BatchGetCursor::Next);
        Ok(Some((page, next)))
    }
}
