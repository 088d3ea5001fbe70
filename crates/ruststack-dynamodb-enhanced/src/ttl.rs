//! Expiry timestamps derived from another attribute of the item.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};
use ruststack_dynamodb_model::AttributeValue;
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::error::{EnhancedError, EnhancedResult};
use crate::extension::{Extension, WriteContext, WriteModification};

/// Time-to-live settings of a table.
///
/// The expiry attribute holds epoch seconds (type `N`), which is what
/// DynamoDB's TTL sweeper reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, TypedBuilder)]
pub struct TimeToLive {
    /// Attribute holding the expiry time.
    #[builder(setter(into))]
    attribute: String,
    /// Attribute the expiry time is computed from.
    #[builder(setter(into))]
    base_attribute: String,
    /// Offset added to the base time. Zero unless set.
    #[builder(default = TimeDelta::zero())]
    duration: TimeDelta,
}

impl TimeToLive {
    /// Attribute holding the expiry time.
    #[must_use]
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Attribute the expiry time is computed from.
    #[must_use]
    pub fn base_attribute(&self) -> &str {
        &self.base_attribute
    }

    /// Offset added to the base time.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.duration
    }
}

/// Fills in the expiry attribute of written items.
///
/// An item that already carries an expiry, or has no base value, is
/// written unchanged. The base value may be epoch seconds (`N`), an RFC 3339
/// timestamp, a `YYYY-MM-DDTHH:MM:SS` date-time in UTC or a `YYYY-MM-DD`
/// date taken at midnight UTC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeToLiveExtension;

impl TimeToLiveExtension {
    /// Create the extension.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn base_time(attribute: &str, value: &AttributeValue) -> EnhancedResult<DateTime<Utc>> {
    let invalid = || {
        EnhancedError::InvalidArgument(format!(
            "TTL base attribute '{attribute}' does not hold a supported time value"
        ))
    };
    match value {
        AttributeValue::N(n) => {
            let seconds = n.parse::<i64>().map_err(|_| invalid())?;
            DateTime::from_timestamp(seconds, 0).ok_or_else(invalid)
        }
        AttributeValue::S(s) => {
            if let Ok(time) = DateTime::parse_from_rfc3339(s) {
                return Ok(time.with_timezone(&Utc));
            }
            if let Ok(time) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Ok(time.and_utc());
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|time| time.and_utc())
                .ok_or_else(invalid)
        }
        other => Err(EnhancedError::InvalidArgument(format!(
            "TTL base attribute '{attribute}' must be N or S, found {}",
            other.type_descriptor()
        ))),
    }
}

impl Extension for TimeToLiveExtension {
    fn before_write(&self, context: &WriteContext<'_>) -> EnhancedResult<WriteModification> {
        let Some(ttl) = context.table_metadata.time_to_live() else {
            return Ok(WriteModification::NoChange);
        };
        if context.item.get(ttl.attribute()).is_some_and(|v| !v.is_null()) {
            return Ok(WriteModification::NoChange);
        }
        let Some(base) = context
            .item
            .get(ttl.base_attribute())
            .filter(|v| !v.is_null())
        else {
            return Ok(WriteModification::NoChange);
        };

        let expires_at = base_time(ttl.base_attribute(), base)?
            .checked_add_signed(ttl.duration())
            .ok_or_else(|| {
                EnhancedError::InvalidArgument(format!(
                    "TTL attribute '{}' overflowed",
                    ttl.attribute()
                ))
            })?
            .timestamp();

        debug!(
            table = context.table_name,
            attribute = ttl.attribute(),
            expires_at,
            "setting time to live"
        );
        let mut item = context.item.clone();
        item.insert(ttl.attribute().to_owned(), AttributeValue::number(expires_at));
        Ok(WriteModification::Transform(item))
    }
}
