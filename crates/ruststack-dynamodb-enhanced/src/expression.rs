//! Condition and update expressions with their placeholder maps.
//!
//! Placeholders generated for mapped attributes follow the
//! `#AMZN_MAPPED_<name>` / `:AMZN_MAPPED_<name>` convention so that
//! expressions produced by different extensions can be merged safely.

use std::collections::HashMap;

use ruststack_dynamodb_model::AttributeValue;
use ruststack_dynamodb_model::types::{ExpressionAttributeNames, ExpressionAttributeValues};

use crate::error::{EnhancedError, EnhancedResult};

/// Prefix of generated attribute-name placeholders.
pub const NAME_PLACEHOLDER_PREFIX: &str = "#AMZN_MAPPED_";
/// Prefix of generated attribute-value placeholders.
pub const VALUE_PLACEHOLDER_PREFIX: &str = ":AMZN_MAPPED_";
/// Token used when AND-combining two conditions.
pub const AND: &str = " AND ";

/// Replace characters DynamoDB does not accept in placeholders.
#[must_use]
pub fn clean_attribute_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// `#AMZN_MAPPED_<name>` placeholder for an attribute name.
#[must_use]
pub fn key_ref(attribute: &str) -> String {
    format!("{NAME_PLACEHOLDER_PREFIX}{}", clean_attribute_name(attribute))
}

/// `:AMZN_MAPPED_<name>` placeholder for an attribute value.
#[must_use]
pub fn value_ref(attribute: &str) -> String {
    format!("{VALUE_PLACEHOLDER_PREFIX}{}", clean_attribute_name(attribute))
}

/// An expression string with the placeholders it references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expression {
    expression: String,
    names: ExpressionAttributeNames,
    values: ExpressionAttributeValues,
}

impl Expression {
    /// An expression without placeholders.
    #[must_use]
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            names: HashMap::new(),
            values: HashMap::new(),
        }
    }

    /// An expression with its placeholder maps.
    #[must_use]
    pub fn from_parts(
        expression: impl Into<String>,
        names: ExpressionAttributeNames,
        values: ExpressionAttributeValues,
    ) -> Self {
        Self {
            expression: expression.into(),
            names,
            values,
        }
    }

    /// Bind an attribute-name placeholder.
    #[must_use]
    pub fn with_name(mut self, placeholder: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(placeholder.into(), name.into());
        self
    }

    /// Bind an attribute-value placeholder.
    #[must_use]
    pub fn with_value(mut self, placeholder: impl Into<String>, value: AttributeValue) -> Self {
        self.values.insert(placeholder.into(), value);
        self
    }

    /// Expression text.
    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Attribute-name placeholders.
    #[must_use]
    pub fn names(&self) -> &ExpressionAttributeNames {
        &self.names
    }

    /// Attribute-value placeholders.
    #[must_use]
    pub fn values(&self) -> &ExpressionAttributeValues {
        &self.values
    }

    /// Split into text, names and values.
    #[must_use]
    pub fn into_parts(self) -> (String, ExpressionAttributeNames, ExpressionAttributeValues) {
        (self.expression, self.names, self.values)
    }

    /// `(self) AND (other)`, merging placeholders.
    pub fn and(self, other: Self) -> EnhancedResult<Self> {
        Self::combine(self, other, AND)
    }

    /// Join two optional expressions with `token`. A missing side yields the
    /// other one unchanged.
    pub fn join(
        first: Option<Self>,
        second: Option<Self>,
        token: &str,
    ) -> EnhancedResult<Option<Self>> {
        match (first, second) {
            (None, None) => Ok(None),
            (Some(only), None) | (None, Some(only)) => Ok(Some(only)),
            (Some(first), Some(second)) => Self::combine(first, second, token).map(Some),
        }
    }

    fn combine(first: Self, second: Self, token: &str) -> EnhancedResult<Self> {
        Ok(Self {
            expression: format!("({}){token}({})", first.expression, second.expression),
            names: join_names(first.names, second.names)?,
            values: join_values(first.values, second.values)?,
        })
    }
}

/// Split an optional condition into the fields of a request.
#[must_use]
pub fn condition_parts(
    condition: Option<Expression>,
) -> (Option<String>, ExpressionAttributeNames, ExpressionAttributeValues) {
    match condition {
        Some(condition) => {
            let (text, names, values) = condition.into_parts();
            (Some(text), names, values)
        }
        None => (None, HashMap::new(), HashMap::new()),
    }
}

/// Merge name maps; a placeholder bound to two different names is an error.
pub fn join_names(
    mut first: ExpressionAttributeNames,
    second: ExpressionAttributeNames,
) -> EnhancedResult<ExpressionAttributeNames> {
    for (placeholder, name) in second {
        if let Some(existing) = first.get(&placeholder) {
            if *existing != name {
                return Err(EnhancedError::ExpressionConflict(format!(
                    "Attempt to coalesce two expressions with conflicting expression names. \
                     Expression name key = '{placeholder}'"
                )));
            }
        }
        first.insert(placeholder, name);
    }
    Ok(first)
}

/// Merge value maps; a placeholder bound to two different values is an error.
pub fn join_values(
    mut first: ExpressionAttributeValues,
    second: ExpressionAttributeValues,
) -> EnhancedResult<ExpressionAttributeValues> {
    for (placeholder, value) in second {
        if let Some(existing) = first.get(&placeholder) {
            if *existing != value {
                return Err(EnhancedError::ExpressionConflict(format!(
                    "Attempt to coalesce two expressions with conflicting expression values. \
                     Expression value key = '{placeholder}'"
                )));
            }
        }
        first.insert(placeholder, value);
    }
    Ok(first)
}
