//! Retry quota token buckets.
//!
//! Every retry costs capacity from a bucket shared by all requests of the same
//! scope; successful requests give capacity back. An empty bucket stops retries
//! so that a struggling service is not flooded.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Default bucket capacity.
pub const DEFAULT_TOKEN_BUCKET_CAPACITY: u32 = 500;

/// Outcome of a capacity acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireResponse {
    /// Capacity requested by the caller.
    pub capacity_requested: u32,
    /// Capacity actually taken from the bucket.
    pub capacity_acquired: u32,
    /// Capacity left in the bucket afterwards.
    pub capacity_remaining: u32,
    /// Whether the request could not be satisfied.
    pub acquisition_failed: bool,
}

/// A bounded capacity counter.
#[derive(Debug)]
pub struct TokenBucket {
    max_capacity: u32,
    capacity: Mutex<u32>,
}

impl TokenBucket {
    /// Create a full bucket.
    #[must_use]
    pub fn new(max_capacity: u32) -> Self {
        Self {
            max_capacity,
            capacity: Mutex::new(max_capacity),
        }
    }

    /// Try to take `amount` from the bucket. Nothing is taken on failure.
    pub fn try_acquire(&self, amount: u32) -> AcquireResponse {
        let mut capacity = self.capacity.lock();
        if amount > *capacity {
            return AcquireResponse {
                capacity_requested: amount,
                capacity_acquired: 0,
                capacity_remaining: *capacity,
                acquisition_failed: true,
            };
        }
        *capacity -= amount;
        AcquireResponse {
            capacity_requested: amount,
            capacity_acquired: amount,
            capacity_remaining: *capacity,
            acquisition_failed: false,
        }
    }

    /// Return `amount` to the bucket, never exceeding the maximum capacity.
    pub fn release(&self, amount: u32) -> u32 {
        let mut capacity = self.capacity.lock();
        *capacity = capacity.saturating_add(amount).min(self.max_capacity);
        *capacity
    }

    /// Capacity currently available.
    #[must_use]
    pub fn current_capacity(&self) -> u32 {
        *self.capacity.lock()
    }

    /// Capacity of a full bucket.
    #[must_use]
    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }
}

/// Buckets partitioned by scope.
#[derive(Debug)]
pub struct TokenBucketStore {
    capacity: u32,
    buckets: DashMap<String, Arc<TokenBucket>>,
}

impl TokenBucketStore {
    /// Create a store whose buckets hold `capacity` tokens.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            buckets: DashMap::new(),
        }
    }

    /// Get or create the bucket for `scope`.
    #[must_use]
    pub fn token_bucket(&self, scope: &str) -> Arc<TokenBucket> {
        if let Some(bucket) = self.buckets.get(scope) {
            return Arc::clone(&bucket);
        }
        Arc::clone(
            &self
                .buckets
                .entry(scope.to_owned())
                .or_insert_with(|| Arc::new(TokenBucket::new(self.capacity))),
        )
    }

    /// Capacity of newly created buckets.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

impl Default for TokenBucketStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_BUCKET_CAPACITY)
    }
}
