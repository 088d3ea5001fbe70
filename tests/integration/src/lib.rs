//! End-to-end scenarios for the enhanced DynamoDB client.
//!
//! The client runs against [`memory::InMemoryDynamoDb`], which evaluates the
//! condition and update expressions the client generates, so optimistic
//! locking, pagination, batches and transactions are exercised without a
//! server.
//!
//! ```text
//! cargo test -p ruststack-integration
//! ```

use std::sync::{Arc, Once};

use ruststack_dynamodb_enhanced::{
    DynamoDbApi, DynamoDbTable, EnhancedClient, SerdeTableSchema, TableMetadata,
};
use serde::{Deserialize, Serialize};

pub mod memory;

use memory::InMemoryDynamoDb;

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
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

/// Table of [`Order`]s: partition key `customer`, sort key `id`.
pub const ORDERS: &str = "orders";

/// Table of [`Customer`]s: partition key `id`.
pub const CUSTOMERS: &str = "customers";

/// A versioned order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Owning customer.
    pub customer: String,
    /// Order id, unique per customer.
    pub id: String,
    /// Workflow status.
    pub status: String,
    /// Total in cents.
    pub total: i64,
    /// Maintained by the versioned record extension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

impl Order {
    /// A new, unversioned order.
    #[must_use]
    pub fn new(customer: &str, id: &str, total: i64) -> Self {
        Self {
            customer: customer.to_owned(),
            id: id.to_owned(),
            status: "open".to_owned(),
            total,
            version: None,
        }
    }
}

/// An unversioned customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// An in-memory backend with the [`ORDERS`] and [`CUSTOMERS`] tables.
#[must_use]
pub fn backend() -> Arc<InMemoryDynamoDb> {
    init_tracing();
    let backend = Arc::new(InMemoryDynamoDb::default());
    backend.define_table(ORDERS, "customer", Some("id"));
    backend.define_table(CUSTOMERS, "id", None);
    backend
}

/// An enhanced client with the default extensions over `api`.
#[must_use]
pub fn client(api: Arc<dyn DynamoDbApi>) -> EnhancedClient {
    EnhancedClient::create(api)
}

/// Typed handle on [`ORDERS`].
#[must_use]
pub fn orders(client: &EnhancedClient) -> DynamoDbTable<Order> {
    let metadata = TableMetadata::builder()
        .partition_key("customer")
        .sort_key("id")
        .version_attribute("version")
        .build();
    client.table(ORDERS, Arc::new(SerdeTableSchema::new(metadata)))
}

/// Typed handle on [`CUSTOMERS`].
#[must_use]
pub fn customers(client: &EnhancedClient) -> DynamoDbTable<Customer> {
    let metadata = TableMetadata::builder().partition_key("id").build();
    client.table(CUSTOMERS, Arc::new(SerdeTableSchema::new(metadata)))
}

mod test_batch;
mod test_client_config;
mod test_table;
mod test_transact;
