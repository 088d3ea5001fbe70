//! Optimistic locking for deletes of versioned items.

use tracing::trace;

use crate::error::EnhancedResult;
use crate::request::DeleteItemEnhancedRequest;
use crate::schema::TableSchema;

/// Make `request` conditional on the stored version matching the version of
/// `key_item`.
///
/// The request is returned untouched when `enabled` is false, when the schema
/// has no version attribute, or when `key_item` carries no (or a null)
/// version. Otherwise `{version_attribute} = :version_value` is AND-merged
/// into the request's condition.
pub fn conditionally_apply_optimistic_locking<T>(
    request: DeleteItemEnhancedRequest,
    key_item: &T,
    schema: &dyn TableSchema<T>,
    enabled: bool,
) -> EnhancedResult<DeleteItemEnhancedRequest> {
    if !enabled {
        return Ok(request);
    }
    let Some(attribute) = schema.version_attribute_name() else {
        return Ok(request);
    };
    let Some(version) = schema
        .attribute_value(key_item, attribute)?
        .filter(|v| !v.is_null())
    else {
        return Ok(request);
    };

    trace!(attribute, version = %version, "applying optimistic locking");
    request.with_optimistic_locking(version, attribute)
}
