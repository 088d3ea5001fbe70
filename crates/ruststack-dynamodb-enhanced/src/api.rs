//! The low-level DynamoDB operations the enhanced client is built on.

use async_trait::async_trait;
use ruststack_dynamodb_model::DynamoDBError;
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

/// DynamoDB operations, one method per API call.
///
/// Implementations perform the actual I/O (HTTP transport, an in-memory
/// store in tests). Errors are service errors as the caller sees them.
#[async_trait]
pub trait DynamoDbApi: Send + Sync + std::fmt::Debug {
    /// Create a table.
    async fn create_table(
        &self,
        input: CreateTableInput,
    ) -> Result<CreateTableOutput, DynamoDBError>;

    /// Describe a table.
    async fn describe_table(
        &self,
        input: DescribeTableInput,
    ) -> Result<DescribeTableOutput, DynamoDBError>;

    /// Create or replace an item.
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError>;

    /// Read an item.
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, DynamoDBError>;

    /// Delete an item.
    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, DynamoDBError>;

    /// Update an item.
    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, DynamoDBError>;

    /// Read one page of items sharing a partition key.
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError>;

    /// Read one page of a full table scan.
    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError>;

    /// Read items from several tables.
    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, DynamoDBError>;

    /// Put and delete items across several tables.
    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, DynamoDBError>;

    /// Read items atomically.
    async fn transact_get_items(
        &self,
        input: TransactGetItemsInput,
    ) -> Result<TransactGetItemsOutput, DynamoDBError>;

    /// Write items atomically.
    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, DynamoDBError>;
}
