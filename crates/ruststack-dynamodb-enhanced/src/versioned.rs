//! Version counter with optimistic locking on every write.

use ruststack_dynamodb_model::AttributeValue;
use tracing::debug;

use crate::error::{EnhancedError, EnhancedResult};
use crate::expression::{Expression, key_ref};
use crate::extension::{Extension, WriteContext, WriteModification};

/// Placeholder bound to the version the client expects to overwrite.
pub const OLD_VERSION_PLACEHOLDER: &str = ":old_version_value";

/// Maintains a numeric version attribute.
///
/// A write of an item without a version (or with a version equal to
/// `start_at`) sets the version to `start_at + increment_by` and requires
/// that the stored item has no version. Any other write bumps the version by
/// `increment_by` and requires that the stored version is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionedRecordExtension {
    start_at: i64,
    increment_by: i64,
}

impl Default for VersionedRecordExtension {
    fn default() -> Self {
        Self {
            start_at: 0,
            increment_by: 1,
        }
    }
}

impl VersionedRecordExtension {
    /// Start a builder with `start_at = 0` and `increment_by = 1`.
    #[must_use]
    pub fn builder() -> VersionedRecordExtensionBuilder {
        VersionedRecordExtensionBuilder::default()
    }

    /// Version an item is considered new at.
    #[must_use]
    pub fn start_at(&self) -> i64 {
        self.start_at
    }

    /// Step between consecutive versions.
    #[must_use]
    pub fn increment_by(&self) -> i64 {
        self.increment_by
    }
}

/// Builder for [`VersionedRecordExtension`].
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionedRecordExtensionBuilder {
    start_at: Option<i64>,
    increment_by: Option<i64>,
}

impl VersionedRecordExtensionBuilder {
    /// Version an item is considered new at. Must not be negative.
    #[must_use]
    pub fn start_at(mut self, start_at: i64) -> Self {
        self.start_at = Some(start_at);
        self
    }

    /// Step between consecutive versions. Must be at least 1.
    #[must_use]
    pub fn increment_by(mut self, increment_by: i64) -> Self {
        self.increment_by = Some(increment_by);
        self
    }

    /// Validate and build.
    pub fn build(self) -> EnhancedResult<VersionedRecordExtension> {
        let defaults = VersionedRecordExtension::default();
        let start_at = self.start_at.unwrap_or(defaults.start_at);
        let increment_by = self.increment_by.unwrap_or(defaults.increment_by);
        if start_at < 0 {
            return Err(EnhancedError::InvalidArgument(format!(
                "startAt must not be negative, got {start_at}"
            )));
        }
        if increment_by < 1 {
            return Err(EnhancedError::InvalidArgument(format!(
                "incrementBy must be greater than 0, got {increment_by}"
            )));
        }
        Ok(VersionedRecordExtension {
            start_at,
            increment_by,
        })
    }
}

impl Extension for VersionedRecordExtension {
    fn before_write(&self, context: &WriteContext<'_>) -> EnhancedResult<WriteModification> {
        let Some(attribute) = context.table_metadata.version_attribute() else {
            return Ok(WriteModification::NoChange);
        };
        let name_ref = key_ref(attribute);

        let current = match context.item.get(attribute).filter(|v| !v.is_null()) {
            None => None,
            Some(AttributeValue::N(n)) => Some(n.parse::<i64>().map_err(|_| {
                EnhancedError::InvalidArgument(format!(
                    "Version attribute '{attribute}' holds a non-integer value '{n}'"
                ))
            })?),
            Some(other) => {
                return Err(EnhancedError::InvalidArgument(format!(
                    "Version attribute appears to be the wrong type. N is required, found {}",
                    other.type_descriptor()
                )));
            }
        };

        let (next, condition) = match current {
            Some(version) if version != self.start_at => (
                version.checked_add(self.increment_by),
                Expression::new(format!("{name_ref} = {OLD_VERSION_PLACEHOLDER}"))
                    .with_name(name_ref.clone(), attribute)
                    .with_value(OLD_VERSION_PLACEHOLDER, AttributeValue::number(version)),
            ),
            _ => (
                self.start_at.checked_add(self.increment_by),
                Expression::new(format!("attribute_not_exists({name_ref})"))
                    .with_name(name_ref.clone(), attribute),
            ),
        };
        let next = next.ok_or_else(|| {
            EnhancedError::InvalidArgument(format!("Version attribute '{attribute}' overflowed"))
        })?;

        debug!(
            table = context.table_name,
            attribute,
            ?current,
            next,
            "versioning item"
        );
        let mut item = context.item.clone();
        item.insert(attribute.to_owned(), AttributeValue::number(next));
        Ok(WriteModification::TransformWithCondition { item, condition })
    }
}
