//! DynamoDB wire shapes for RustStack clients.
//!
//! Hand-written request, response and error types for the operations the
//! enhanced client issues. DynamoDB's JSON protocol maps directly onto serde
//! derives.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod types;

pub use attribute_value::AttributeValue;
pub use error::{DynamoDBError, DynamoDBErrorCode};
pub use operations::DynamoDBOperation;
pub use types::{Item, Key};
