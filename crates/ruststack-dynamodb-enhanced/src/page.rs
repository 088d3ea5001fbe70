//! One page of query or scan results.

use std::fmt;

use ruststack_dynamodb_model::Key as KeyMap;
use ruststack_dynamodb_model::types::ConsumedCapacity;

/// Items of one page plus the key to continue after.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    items: Vec<T>,
    last_evaluated_key: Option<KeyMap>,
    consumed_capacity: Option<ConsumedCapacity>,
    count: Option<i32>,
    scanned_count: Option<i32>,
}

impl<T> Page<T> {
    /// A page of `items`. `None` marks the final page.
    #[must_use]
    pub fn create(items: Vec<T>, last_evaluated_key: Option<KeyMap>) -> Self {
        Self {
            items,
            last_evaluated_key,
            consumed_capacity: None,
            count: None,
            scanned_count: None,
        }
    }

    /// Attach the capacity the page consumed.
    #[must_use]
    pub fn with_consumed_capacity(mut self, consumed_capacity: Option<ConsumedCapacity>) -> Self {
        self.consumed_capacity = consumed_capacity;
        self
    }

    /// Attach the matched and evaluated item counts.
    #[must_use]
    pub fn with_counts(mut self, count: i32, scanned_count: i32) -> Self {
        self.count = Some(count);
        self.scanned_count = Some(scanned_count);
        self
    }

    /// Items of this page.
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Take the items.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    /// Key to continue after, as returned by the service.
    #[must_use]
    pub fn last_evaluated_key(&self) -> Option<&KeyMap> {
        self.last_evaluated_key.as_ref()
    }

    /// Whether no further page follows.
    #[must_use]
    pub fn is_last_page(&self) -> bool {
        self.last_evaluated_key.as_ref().is_none_or(KeyMap::is_empty)
    }

    /// Capacity consumed by the request.
    #[must_use]
    pub fn consumed_capacity(&self) -> Option<&ConsumedCapacity> {
        self.consumed_capacity.as_ref()
    }

    /// Items matching the filter.
    #[must_use]
    pub fn count(&self) -> Option<i32> {
        self.count
    }

    /// Items evaluated before filtering.
    #[must_use]
    pub fn scanned_count(&self) -> Option<i32> {
        self.scanned_count
    }
}

impl<T: fmt::Debug> fmt::Display for Page<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page(items={:?}, lastEvaluatedKey=", self.items)?;
        match &self.last_evaluated_key {
            None => f.write_str("None")?,
            Some(key) => {
                let mut entries: Vec<_> = key.iter().collect();
                entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
                f.write_str("{")?;
                for (i, (name, value)) in entries.into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}={value}")?;
                }
                f.write_str("}")?;
            }
        }
        f.write_str(")")
    }
}
