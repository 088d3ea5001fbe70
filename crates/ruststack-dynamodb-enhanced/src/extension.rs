//! Extension hooks run before items are written and after they are read.

use std::sync::Arc;

use ruststack_dynamodb_model::{DynamoDBOperation, Item};
use tracing::trace;

use crate::error::EnhancedResult;
use crate::expression::{AND, Expression};
use crate::schema::TableMetadata;

/// What an extension sees before an item is written.
#[derive(Debug, Clone, Copy)]
pub struct WriteContext<'a> {
    /// Attribute map about to be written.
    pub item: &'a Item,
    /// Target table.
    pub table_name: &'a str,
    /// Key layout of the target table.
    pub table_metadata: &'a TableMetadata,
    /// Operation carrying the write.
    pub operation: DynamoDBOperation,
}

/// What an extension sees after an item is read.
#[derive(Debug, Clone, Copy)]
pub struct ReadContext<'a> {
    /// Attribute map as returned by the service.
    pub item: &'a Item,
    /// Source table.
    pub table_name: &'a str,
    /// Key layout of the source table.
    pub table_metadata: &'a TableMetadata,
    /// Operation that returned the item.
    pub operation: DynamoDBOperation,
}

/// Outcome of [`Extension::before_write`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WriteModification {
    /// Leave the write as it is.
    #[default]
    NoChange,
    /// Write a different item.
    Transform(Item),
    /// Make the write conditional.
    Condition(Expression),
    /// Write a different item, conditionally.
    TransformWithCondition {
        /// Item to write instead.
        item: Item,
        /// Condition the write must satisfy.
        condition: Expression,
    },
}

impl WriteModification {
    /// Assemble a modification from its optional parts.
    #[must_use]
    pub fn from_parts(item: Option<Item>, condition: Option<Expression>) -> Self {
        match (item, condition) {
            (None, None) => Self::NoChange,
            (Some(item), None) => Self::Transform(item),
            (None, Some(condition)) => Self::Condition(condition),
            (Some(item), Some(condition)) => Self::TransformWithCondition { item, condition },
        }
    }

    /// Split into the transformed item and the additional condition.
    #[must_use]
    pub fn into_parts(self) -> (Option<Item>, Option<Expression>) {
        match self {
            Self::NoChange => (None, None),
            Self::Transform(item) => (Some(item), None),
            Self::Condition(condition) => (None, Some(condition)),
            Self::TransformWithCondition { item, condition } => (Some(item), Some(condition)),
        }
    }

    /// Item to write instead, if any.
    #[must_use]
    pub fn transformed_item(&self) -> Option<&Item> {
        match self {
            Self::Transform(item) | Self::TransformWithCondition { item, .. } => Some(item),
            Self::NoChange | Self::Condition(_) => None,
        }
    }

    /// Additional condition, if any.
    #[must_use]
    pub fn additional_condition(&self) -> Option<&Expression> {
        match self {
            Self::Condition(condition) | Self::TransformWithCondition { condition, .. } => {
                Some(condition)
            }
            Self::NoChange | Self::Transform(_) => None,
        }
    }
}

/// Outcome of [`Extension::after_read`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReadModification {
    /// Use the item as read.
    #[default]
    NoChange,
    /// Use a different item.
    Transform(Item),
}

impl ReadModification {
    /// Item to use instead, if any.
    #[must_use]
    pub fn transformed_item(&self) -> Option<&Item> {
        match self {
            Self::Transform(item) => Some(item),
            Self::NoChange => None,
        }
    }
}

/// Hook into the item lifecycle of a mapped table.
pub trait Extension: Send + Sync + std::fmt::Debug {
    /// Called before an item is written.
    fn before_write(&self, _context: &WriteContext<'_>) -> EnhancedResult<WriteModification> {
        Ok(WriteModification::NoChange)
    }

    /// Called after an item is read.
    fn after_read(&self, _context: &ReadContext<'_>) -> EnhancedResult<ReadModification> {
        Ok(ReadModification::NoChange)
    }
}

/// Runs several extensions as one.
///
/// `before_write` runs in registration order, each extension seeing the item
/// produced by the previous one; conditions are AND-joined. `after_read` runs
/// in reverse order.
#[derive(Debug, Clone, Default)]
pub struct ChainExtension {
    extensions: Vec<Arc<dyn Extension>>,
}

impl ChainExtension {
    /// Chain `extensions` in order.
    #[must_use]
    pub fn new(extensions: Vec<Arc<dyn Extension>>) -> Self {
        Self { extensions }
    }

    /// Number of chained extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Extension for ChainExtension {
    fn before_write(&self, context: &WriteContext<'_>) -> EnhancedResult<WriteModification> {
        let mut transformed: Option<Item> = None;
        let mut condition: Option<Expression> = None;

        for extension in &self.extensions {
            let current = transformed.as_ref().unwrap_or(context.item);
            let modification = extension.before_write(&WriteContext {
                item: current,
                ..*context
            })?;
            let (item, additional) = modification.into_parts();
            if item.is_some() {
                transformed = item;
            }
            condition = Expression::join(condition, additional, AND)?;
        }

        trace!(
            table = context.table_name,
            transformed = transformed.is_some(),
            conditional = condition.is_some(),
            "before_write chain finished"
        );
        Ok(WriteModification::from_parts(transformed, condition))
    }

    fn after_read(&self, context: &ReadContext<'_>) -> EnhancedResult<ReadModification> {
        let mut transformed: Option<Item> = None;

        for extension in self.extensions.iter().rev() {
            let current = transformed.as_ref().unwrap_or(context.item);
            let modification = extension.after_read(&ReadContext {
                item: current,
                ..*context
            })?;
            if let ReadModification::Transform(item) = modification {
                transformed = Some(item);
            }
        }

        Ok(transformed.map_or(ReadModification::NoChange, ReadModification::Transform))
    }
}
