//! Retries of DynamoDB calls driven by the client's retry strategy.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use ruststack_client_core::ClientConfiguration;
use ruststack_client_core::retry::{RetryFailure, RetryStrategy};
use ruststack_dynamodb_model::input::{
    BatchGetItemInput, BatchWriteItemInput, CreateTableInput, DeleteItemInput, DescribeTableInput,
    GetItemInput, PutItemInput, QueryInput, ScanInput, TransactGetItemsInput,
    TransactWriteItemsInput, UpdateItemInput,
};
use ruststack_dynamodb_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, CreateTableOutput, DeleteItemOutput,
    DescribeTableOutput, GetItemOutput, PutItemOutput, QueryOutput, ScanOutput,
    TransactGetItemsOutput, TransactWriteItemsOutput, UpdateItemOutput,
};
use ruststack_dynamodb_model::{DynamoDBError, DynamoDBOperation};
use tracing::{debug, warn};

use crate::api::DynamoDbApi;

/// Describe `err` for retry classification.
#[must_use]
pub fn retry_failure(err: &DynamoDBError) -> RetryFailure {
    RetryFailure::builder()
        .status_code(err.status_code.as_u16())
        .error_code(err.code.as_str())
        .throttling(err.code.is_throttling())
        .message(err.message.clone())
        .build()
}

/// A [`DynamoDbApi`] that retries failed calls of an inner API.
///
/// Failures the strategy refuses to retry are returned as the service
/// reported them.
#[derive(Debug, Clone)]
pub struct RetryingDynamoDbApi {
    inner: Arc<dyn DynamoDbApi>,
    strategy: RetryStrategy,
    scope: String,
}

impl RetryingDynamoDbApi {
    /// Retry calls of `inner` with `strategy`; retries share the quota of
    /// `scope`.
    #[must_use]
    pub fn new(inner: Arc<dyn DynamoDbApi>, strategy: RetryStrategy, scope: impl Into<String>) -> Self {
        Self {
            inner,
            strategy,
            scope: scope.into(),
        }
    }

    /// Retry with the strategy of `configuration`, scoped to its endpoint.
    #[must_use]
    pub fn from_configuration(inner: Arc<dyn DynamoDbApi>, configuration: &ClientConfiguration) -> Self {
        Self::new(
            inner,
            configuration.retry_strategy().clone(),
            configuration.endpoint().to_string(),
        )
    }

    /// The strategy in use.
    #[must_use]
    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    async fn call<O, F, Fut>(&self, operation: DynamoDBOperation, attempt: F) -> Result<O, DynamoDBError>
    where
        F: Fn() -> Fut + Send,
        Fut: Future<Output = Result<O, DynamoDBError>> + Send,
    {
        let mut token = self.strategy.acquire_initial_token(&self.scope);
        loop {
            let err = match attempt().await {
                Ok(output) => {
                    let token = self.strategy.record_success(token);
                    if token.attempt() > 1 {
                        debug!(
                            operation = operation.as_str(),
                            attempt = token.attempt(),
                            capacity_remaining = token.capacity_remaining(),
                            "call succeeded after retries"
                        );
                    }
                    return Ok(output);
                }
                Err(err) => err,
            };
            match self.strategy.refresh_retry_token(token, retry_failure(&err), None) {
                Ok(refreshed) => {
                    debug!(
                        operation = operation.as_str(),
                        code = %err.code,
                        attempt = refreshed.token.attempt(),
                        "retrying call"
                    );
                    tokio::time::sleep(refreshed.delay).await;
                    token = refreshed.token;
                }
                Err(refused) => {
                    if refused.token().attempt() > 1 {
                        warn!(operation = operation.as_str(), reason = %refused, "giving up on call");
                    }
                    return Err(err);
                }
            }
        }
    }
}

#[async_trait]
impl DynamoDbApi for RetryingDynamoDbApi {
    async fn create_table(
        &self,
        input: CreateTableInput,
    ) -> Result<CreateTableOutput, DynamoDBError> {
        self.call(DynamoDBOperation::CreateTable, || {
            self.inner.create_table(input.clone())
        })
        .await
    }

    async fn describe_table(
        &self,
        input: DescribeTableInput,
    ) -> Result<DescribeTableOutput, DynamoDBError> {
        self.call(DynamoDBOperation::DescribeTable, || {
            self.inner.describe_table(input.clone())
        })
        .await
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError> {
        self.call(DynamoDBOperation::PutItem, || self.inner.put_item(input.clone()))
            .await
    }

    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, DynamoDBError> {
        self.call(DynamoDBOperation::GetItem, || self.inner.get_item(input.clone()))
            .await
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, DynamoDBError> {
        self.call(DynamoDBOperation::DeleteItem, || {
            self.inner.delete_item(input.clone())
        })
        .await
    }

    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, DynamoDBError> {
        self.call(DynamoDBOperation::UpdateItem, || {
            self.inner.update_item(input.clone())
        })
        .await
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        self.call(DynamoDBOperation::Query, || self.inner.query(input.clone()))
            .await
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        self.call(DynamoDBOperation::Scan, || self.inner.scan(input.clone()))
            .await
    }

    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, DynamoDBError> {
        self.call(DynamoDBOperation::BatchGetItem, || {
            self.inner.batch_get_item(input.clone())
        })
        .await
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, DynamoDBError> {
        self.call(DynamoDBOperation::BatchWriteItem, || {
            self.inner.batch_write_item(input.clone())
        })
        .await
    }

    async fn transact_get_items(
        &self,
        input: TransactGetItemsInput,
    ) -> Result<TransactGetItemsOutput, DynamoDBError> {
        self.call(DynamoDBOperation::TransactGetItems, || {
            self.inner.transact_get_items(input.clone())
        })
        .await
    }

    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, DynamoDBError> {
        self.call(DynamoDBOperation::TransactWriteItems, || {
            self.inner.transact_write_items(input.clone())
        })
        .await
    }
}
