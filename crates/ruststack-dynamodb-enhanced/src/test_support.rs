//! Scripted `DynamoDbApi` for unit tests.

use std::collections::VecDeque;
use std::sync::Once;

use async_trait::async_trait;
use parking_lot::Mutex;
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

use crate::api::DynamoDbApi;

static INIT: Once = Once::new();

pub(crate) fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Records inputs of one operation and replays queued outputs. An empty
/// queue answers with the default output.
#[derive(Debug)]
pub(crate) struct Script<I, O> {
    inputs: Mutex<Vec<I>>,
    outputs: Mutex<VecDeque<Result<O, DynamoDBError>>>,
}

impl<I, O> Default for Script<I, O> {
    fn default() -> Self {
        Self {
            inputs: Mutex::new(Vec::new()),
            outputs: Mutex::new(VecDeque::new()),
        }
    }
}

impl<I: Clone, O: Default> Script<I, O> {
    pub(crate) fn push(&self, output: O) {
        self.outputs.lock().push_back(Ok(output));
    }

    pub(crate) fn push_err(&self, err: DynamoDBError) {
        self.outputs.lock().push_back(Err(err));
    }

    pub(crate) fn inputs(&self) -> Vec<I> {
        self.inputs.lock().clone()
    }

    fn respond(&self, input: I) -> Result<O, DynamoDBError> {
        self.inputs.lock().push(input);
        self.outputs
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(O::default()))
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedApi {
    pub(crate) create_table: Script<CreateTableInput, CreateTableOutput>,
    pub(crate) describe_table: Script<DescribeTableInput, DescribeTableOutput>,
    pub(crate) put_item: Script<PutItemInput, PutItemOutput>,
    pub(crate) get_item: Script<GetItemInput, GetItemOutput>,
    pub(crate) delete_item: Script<DeleteItemInput, DeleteItemOutput>,
    pub(crate) update_item: Script<UpdateItemInput, UpdateItemOutput>,
    pub(crate) query: Script<QueryInput, QueryOutput>,
    pub(crate) scan: Script<ScanInput, ScanOutput>,
    pub(crate) batch_get_item: Script<BatchGetItemInput, BatchGetItemOutput>,
    pub(crate) batch_write_item: Script<BatchWriteItemInput, BatchWriteItemOutput>,
    pub(crate) transact_get_items: Script<TransactGetItemsInput, TransactGetItemsOutput>,
    pub(crate) transact_write_items: Script<TransactWriteItemsInput, TransactWriteItemsOutput>,
}

#[async_trait]
impl DynamoDbApi for ScriptedApi {
    async fn create_table(
        &self,
        input: CreateTableInput,
    ) -> Result<CreateTableOutput, DynamoDBError> {
        self.create_table.respond(input)
    }

    async fn describe_table(
        &self,
        input: DescribeTableInput,
    ) -> Result<DescribeTableOutput, DynamoDBError> {
        self.describe_table.respond(input)
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError> {
        self.put_item.respond(input)
    }

    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, DynamoDBError> {
        self.get_item.respond(input)
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, DynamoDBError> {
        self.delete_item.respond(input)
    }

    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, DynamoDBError> {
        self.update_item.respond(input)
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        self.query.respond(input)
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        self.scan.respond(input)
    }

    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, DynamoDBError> {
        self.batch_get_item.respond(input)
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, DynamoDBError> {
        self.batch_write_item.respond(input)
    }

    async fn transact_get_items(
        &self,
        input: TransactGetItemsInput,
    ) -> Result<TransactGetItemsOutput, DynamoDBError> {
        self.transact_get_items.respond(input)
    }

    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, DynamoDBError> {
        self.transact_write_items.respond(input)
    }
}
