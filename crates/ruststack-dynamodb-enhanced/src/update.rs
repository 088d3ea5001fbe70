//! Update expressions generated from a full item.

use std::collections::HashMap;

use ruststack_dynamodb_model::Item;

use crate::expression::{Expression, key_ref, value_ref};
use crate::schema::TableMetadata;

/// Build `SET ... REMOVE ...` for every non-key attribute of `item`.
///
/// Non-null attributes are set; null attributes are removed. Callers that
/// ignore nulls drop them from `item` beforehand. Returns `None` when the item
/// has no non-key attributes.
#[must_use]
pub fn update_expression(item: &Item, metadata: &TableMetadata) -> Option<Expression> {
    let mut attributes: Vec<_> = item
        .iter()
        .filter(|(name, _)| !metadata.is_key_attribute(name))
        .collect();
    if attributes.is_empty() {
        return None;
    }
    attributes.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let mut set_clauses = Vec::new();
    let mut remove_clauses = Vec::new();
    let mut names = HashMap::new();
    let mut values = HashMap::new();
    for (name, value) in attributes {
        let name_ref = key_ref(name);
        names.insert(name_ref.clone(), name.clone());
        if value.is_null() {
            remove_clauses.push(name_ref);
        } else {
            let placeholder = value_ref(name);
            set_clauses.push(format!("{name_ref} = {placeholder}"));
            values.insert(placeholder, value.clone());
        }
    }

    let mut clauses = Vec::with_capacity(2);
    if !set_clauses.is_empty() {
        clauses.push(format!("SET {}", set_clauses.join(", ")));
    }
    if !remove_clauses.is_empty() {
        clauses.push(format!("REMOVE {}", remove_clauses.join(", ")));
    }
    Some(Expression::from_parts(clauses.join(" "), names, values))
}
