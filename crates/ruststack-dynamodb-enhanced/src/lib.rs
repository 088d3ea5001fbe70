//! Enhanced DynamoDB client for RustStack.
//!
//! Maps typed items onto DynamoDB tables through a [`TableSchema`], runs
//! [`Extension`] hooks around every write and read, and packages per-item
//! operations into batch and transactional requests. All I/O goes through
//! the [`DynamoDbApi`] trait; [`RetryingDynamoDbApi`] adds the retry
//! strategy of a resolved client configuration.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod batch;
pub mod client;
mod error;
pub mod expression;
pub mod extension;
pub mod optimistic_locking;
pub mod page;
pub mod request;
pub mod retry;
pub mod schema;
pub mod table;
pub mod transact;
pub mod ttl;
pub mod update;
pub mod versioned;

#[cfg(test)]
mod test_support;

pub use api::DynamoDbApi;
pub use batch::{
    BatchGetItemEnhancedRequest, BatchGetResultPage, BatchWriteItemEnhancedRequest,
    BatchWriteResult, ReadBatch, WriteBatch,
};
pub use client::{EnhancedClient, dynamodb_service_defaults};
pub use error::{EnhancedError, EnhancedResult, TableResourcePurpose};
pub use expression::Expression;
pub use extension::{
    ChainExtension, Extension, ReadContext, ReadModification, WriteContext, WriteModification,
};
pub use optimistic_locking::conditionally_apply_optimistic_locking;
pub use page::Page;
pub use request::{
    CreateTableEnhancedRequest, DeleteItemEnhancedRequest, GetItemEnhancedRequest,
    PutItemEnhancedRequest, QueryConditional, QueryEnhancedRequest, ScanEnhancedRequest,
    UpdateItemEnhancedRequest,
};
pub use retry::RetryingDynamoDbApi;
pub use schema::{DocumentTableSchema, Key, SerdeTableSchema, TableMetadata, TableSchema};
pub use table::{DynamoDbTable, MappedTableResource};
pub use transact::{
    TransactGetItemsEnhancedRequest, TransactGetResultPage, TransactWriteItemsEnhancedRequest,
    TransactWriteItemsEnhancedResponse,
};
pub use ttl::{TimeToLive, TimeToLiveExtension};
pub use versioned::VersionedRecordExtension;
