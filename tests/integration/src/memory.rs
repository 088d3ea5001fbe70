//! An in-memory DynamoDB used by the scenarios.
//!
//! Supports the expression shapes the enhanced client generates:
//! `attribute_exists`, `attribute_not_exists`, `begins_with`, comparisons,
//! `BETWEEN` and `AND` (with or without parentheses) in conditions, and
//! `SET`/`REMOVE` in update expressions.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;
use ruststack_dynamodb_enhanced::DynamoDbApi;
use ruststack_dynamodb_model::input::{
    BatchGetItemInput, BatchWriteItemInput, CreateTableInput, DeleteItemInput, DescribeTableInput,
    GetItemInput, PutItemInput, QueryInput, ScanInput, TransactGetItemsInput,
    TransactWriteItemsInput, UpdateItemInput,
};
use ruststack_dynamodb_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, CreateTableOutput, DeleteItemOutput,
    DescribeTableOutput, GetItemOutput, PutItemOutput, QueryOutput, ScanOutput,
    TransactGetItemsOutput, TransactWriteItemsOutput, UpdateItemOutput,
};
use ruststack_dynamodb_model::types::{
    CancellationReason, ExpressionAttributeNames, ExpressionAttributeValues, ItemResponse,
    KeySchemaElement, KeyType, ReturnValue, TableDescription, TableStatus, TransactWriteItem,
    WriteRequest,
};
use ruststack_dynamodb_model::{
    AttributeValue, DynamoDBError, DynamoDBErrorCode, DynamoDBOperation, Item,
};
use tracing::debug;

const CONDITION_FAILED: &str = "The conditional request failed";

#[derive(Debug)]
struct MemoryTable {
    partition_key: String,
    sort_key: Option<String>,
    items: BTreeMap<String, Item>,
}

impl MemoryTable {
    fn storage_key(&self, item: &Item) -> Result<String, DynamoDBError> {
        let value = |name: &str| {
            item.get(name).map(ToString::to_string).ok_or_else(|| {
                DynamoDBError::validation("One of the required keys was not given a value")
            })
        };
        let mut key = value(&self.partition_key)?;
        if let Some(sort_key) = &self.sort_key {
            key.push('|');
            key.push_str(&value(sort_key)?);
        }
        Ok(key)
    }

    fn description(&self, table_name: String) -> TableDescription {
        let mut key_schema = vec![KeySchemaElement {
            attribute_name: self.partition_key.clone(),
            key_type: KeyType::Hash,
        }];
        if let Some(sort_key) = &self.sort_key {
            key_schema.push(KeySchemaElement {
                attribute_name: sort_key.clone(),
                key_type: KeyType::Range,
            });
        }
        TableDescription {
            table_name: Some(table_name),
            table_status: Some(TableStatus::Active),
            key_schema,
            item_count: i64::try_from(self.items.len()).ok(),
            ..Default::default()
        }
    }

    fn key_of(&self, item: &Item) -> Item {
        item.iter()
            .filter(|(name, _)| {
                **name == self.partition_key || self.sort_key.as_deref() == Some(name.as_str())
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// One page of items in key order. Items failing `key_condition` are
    /// never read; `filter` only drops items from the returned page.
    fn page(
        &self,
        key_condition: Option<Condition<'_>>,
        filter: Option<Condition<'_>>,
        exclusive_start_key: Option<&Item>,
        limit: Option<i32>,
    ) -> Result<(Vec<Item>, i32, Option<Item>), DynamoDBError> {
        let start = exclusive_start_key
            .map(|key| self.storage_key(key))
            .transpose()?;
        let limit = limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);

        let mut candidates = Vec::new();
        for (key, item) in &self.items {
            if start.as_ref().is_some_and(|start| key <= start) {
                continue;
            }
            if let Some(condition) = &key_condition {
                if !condition.matches(item)? {
                    continue;
                }
            }
            candidates.push(item);
        }
        let more = candidates.len() > limit;
        candidates.truncate(limit);
        let last_evaluated_key = if more {
            candidates.last().map(|item| self.key_of(item))
        } else {
            None
        };
        let scanned = i32::try_from(candidates.len()).unwrap_or(i32::MAX);

        let mut items = Vec::new();
        for item in candidates {
            let keep = match &filter {
                Some(condition) => condition.matches(item)?,
                None => true,
            };
            if keep {
                items.push(item.clone());
            }
        }
        Ok((items, scanned, last_evaluated_key))
    }
}

struct Condition<'a> {
    expression: &'a str,
    names: &'a ExpressionAttributeNames,
    values: &'a ExpressionAttributeValues,
}

impl Condition<'_> {
    fn matches(&self, item: &Item) -> Result<bool, DynamoDBError> {
        evaluate(self.expression, Some(item), self.names, self.values)
    }
}

/// DynamoDB tables kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryDynamoDb {
    tables: Mutex<HashMap<String, MemoryTable>>,
    batch_write_capacity: Mutex<Option<usize>>,
    injected_failures: Mutex<Vec<DynamoDBErrorCode>>,
    calls: Mutex<Vec<DynamoDBOperation>>,
}

impl InMemoryDynamoDb {
    /// Add an empty table without going through `CreateTable`.
    pub fn define_table(&self, name: &str, partition_key: &str, sort_key: Option<&str>) {
        self.tables.lock().insert(
            name.to_owned(),
            MemoryTable {
                partition_key: partition_key.to_owned(),
                sort_key: sort_key.map(ToOwned::to_owned),
                items: BTreeMap::new(),
            },
        );
    }

    /// Process at most `capacity` requests per `BatchWriteItem` call; the
    /// rest is returned as unprocessed.
    pub fn limit_batch_writes(&self, capacity: usize) {
        *self.batch_write_capacity.lock() = Some(capacity);
    }

    /// Fail the next calls with `codes`, one call per code.
    pub fn fail_next_calls(&self, codes: &[DynamoDBErrorCode]) {
        self.injected_failures.lock().extend(codes.iter().rev());
    }

    /// Operations received so far, including failed ones.
    #[must_use]
    pub fn calls(&self) -> Vec<DynamoDBOperation> {
        self.calls.lock().clone()
    }

    /// Stored item with `key`.
    #[must_use]
    pub fn stored_item(&self, table: &str, key: &Item) -> Option<Item> {
        let tables = self.tables.lock();
        let table = tables.get(table)?;
        let storage_key = table.storage_key(key).ok()?;
        table.items.get(&storage_key).cloned()
    }

    /// Number of items in `table`.
    #[must_use]
    pub fn item_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, |t| t.items.len())
    }

    fn begin(&self, operation: DynamoDBOperation) -> Result<(), DynamoDBError> {
        self.calls.lock().push(operation);
        match self.injected_failures.lock().pop() {
            Some(code) => {
                debug!(operation = operation.as_str(), %code, "injecting failure");
                Err(DynamoDBError::with_message(code, "injected failure"))
            }
            None => Ok(()),
        }
    }
}

fn table_mut<'a>(
    tables: &'a mut HashMap<String, MemoryTable>,
    name: &str,
) -> Result<&'a mut MemoryTable, DynamoDBError> {
    tables
        .get_mut(name)
        .ok_or_else(|| DynamoDBError::resource_not_found("Requested resource not found"))
}

fn check(
    condition: Option<&str>,
    existing: Option<&Item>,
    names: &ExpressionAttributeNames,
    values: &ExpressionAttributeValues,
) -> Result<bool, DynamoDBError> {
    match condition {
        Some(condition) => evaluate(condition, existing, names, values),
        None => Ok(true),
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// Split on top-level `AND`, leaving the `AND` of `BETWEEN a AND b` alone.
fn split_top_level_and(expression: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut start = 0;
    let mut in_between = false;
    let bytes = expression.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            b' ' if depth == 0 && expression[i..].starts_with(" BETWEEN ") => {
                in_between = true;
                i += " BETWEEN ".len();
                continue;
            }
            b' ' if depth == 0 && expression[i..].starts_with(" AND ") => {
                i += " AND ".len();
                if in_between {
                    in_between = false;
                } else {
                    parts.push(expression[start..i - " AND ".len()].trim());
                    start = i;
                }
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(expression[start..].trim());
    parts
}

fn strip_outer_parens(expression: &str) -> &str {
    let Some(inner) = expression
        .strip_prefix('(')
        .and_then(|e| e.strip_suffix(')'))
    else {
        return expression;
    };
    let mut depth = 0_i32;
    for c in inner.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return expression;
        }
    }
    inner
}

fn resolve_name(token: &str, names: &ExpressionAttributeNames) -> Result<String, DynamoDBError> {
    if token.starts_with('#') {
        names.get(token).cloned().ok_or_else(|| {
            DynamoDBError::validation(format!(
                "An expression attribute name used in the document path is not defined; \
                 attribute name: {token}"
            ))
        })
    } else {
        Ok(token.to_owned())
    }
}

fn resolve_value(
    token: &str,
    values: &ExpressionAttributeValues,
) -> Result<AttributeValue, DynamoDBError> {
    values.get(token).cloned().ok_or_else(|| {
        DynamoDBError::validation(format!(
            "An expression attribute value used in expression is not defined; attribute value: {token}"
        ))
    })
}

fn function_args<'a>(expression: &'a str, name: &str) -> Option<Vec<&'a str>> {
    expression
        .strip_prefix(name)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.strip_suffix(')'))
        .map(|args| args.split(',').map(str::trim).collect())
}

/// Comparison operators, longest first so `>=` is not read as `>`.
const COMPARISONS: [(&str, fn(Ordering) -> bool); 4] = [
    (" >= ", Ordering::is_ge),
    (" <= ", Ordering::is_le),
    (" > ", Ordering::is_gt),
    (" < ", Ordering::is_lt),
];

/// Order of two scalars of the same type; numbers compare numerically.
fn compare(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    match (left, right) {
        (AttributeValue::S(left), AttributeValue::S(right)) => Some(left.cmp(right)),
        (AttributeValue::N(left), AttributeValue::N(right)) => {
            let left = left.parse::<f64>().ok()?;
            let right = right.parse::<f64>().ok()?;
            left.partial_cmp(&right)
        }
        _ => None,
    }
}

fn evaluate(
    expression: &str,
    item: Option<&Item>,
    names: &ExpressionAttributeNames,
    values: &ExpressionAttributeValues,
) -> Result<bool, DynamoDBError> {
    let parts = split_top_level_and(expression.trim());
    if parts.len() > 1 {
        for part in parts {
            if !evaluate(part, item, names, values)? {
                return Ok(false);
            }
        }
        return Ok(true);
    }

    let expression = strip_outer_parens(parts[0]);
    if expression != parts[0] {
        return evaluate(expression, item, names, values);
    }
    let attribute = |token: &str| {
        resolve_name(token, names).map(|name| item.and_then(|item| item.get(&name)))
    };

    if let Some(args) = function_args(expression, "attribute_exists") {
        return Ok(attribute(args[0])?.is_some());
    }
    if let Some(args) = function_args(expression, "attribute_not_exists") {
        return Ok(attribute(args[0])?.is_none());
    }
    if let Some(args) = function_args(expression, "begins_with") {
        let [path, prefix] = args.as_slice() else {
            return Err(DynamoDBError::validation("begins_with takes two operands"));
        };
        let prefix = resolve_value(prefix, values)?;
        return Ok(match (attribute(*path)?, prefix) {
            (Some(AttributeValue::S(value)), AttributeValue::S(prefix)) => {
                value.starts_with(&prefix)
            }
            _ => false,
        });
    }
    if let Some((path, bounds)) = expression.split_once(" BETWEEN ") {
        let (lower, upper) = bounds
            .split_once(" AND ")
            .ok_or_else(|| DynamoDBError::validation("BETWEEN needs two bounds"))?;
        let lower = resolve_value(lower.trim(), values)?;
        let upper = resolve_value(upper.trim(), values)?;
        return Ok(attribute(path.trim())?.is_some_and(|value| {
            compare(value, &lower).is_some_and(Ordering::is_ge)
                && compare(value, &upper).is_some_and(Ordering::is_le)
        }));
    }
    for (operator, accept) in COMPARISONS {
        if let Some((left, right)) = expression.split_once(operator) {
            let right = resolve_value(right.trim(), values)?;
            return Ok(attribute(left.trim())?
                .and_then(|value| compare(value, &right))
                .is_some_and(accept));
        }
    }
    if let Some((left, right)) = expression.split_once(" = ") {
        let right = resolve_value(right.trim(), values)?;
        return Ok(attribute(left.trim())? == Some(&right));
    }
    Err(DynamoDBError::validation(format!(
        "Invalid ConditionExpression: {expression}"
    )))
}

fn apply_update(
    item: &mut Item,
    expression: &str,
    names: &ExpressionAttributeNames,
    values: &ExpressionAttributeValues,
) -> Result<(), DynamoDBError> {
    let (set_part, remove_part) = match expression.find("REMOVE ") {
        Some(i) => (&expression[..i], Some(&expression[i + "REMOVE ".len()..])),
        None => (expression, None),
    };
    let set_part = set_part.trim();
    if let Some(assignments) = set_part.strip_prefix("SET ") {
        for assignment in assignments.split(',') {
            let (path, value) = assignment.split_once(" = ").ok_or_else(|| {
                DynamoDBError::validation(format!("Invalid UpdateExpression: {expression}"))
            })?;
            item.insert(
                resolve_name(path.trim(), names)?,
                resolve_value(value.trim(), values)?,
            );
        }
    } else if !set_part.is_empty() {
        return Err(DynamoDBError::validation(format!(
            "Invalid UpdateExpression: {expression}"
        )));
    }
    for path in remove_part.into_iter().flat_map(|r| r.split(',')) {
        item.remove(&resolve_name(path.trim(), names)?);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

struct PlannedWrite {
    table: String,
    storage_key: String,
    after: Option<Item>,
}

fn plan_write(
    tables: &HashMap<String, MemoryTable>,
    action: &TransactWriteItem,
) -> Result<(Option<PlannedWrite>, bool), DynamoDBError> {
    let table_name = action
        .table_name()
        .ok_or_else(|| DynamoDBError::validation("TransactItems can only contain one action"))?;
    let table = tables
        .get(table_name)
        .ok_or_else(|| DynamoDBError::resource_not_found("Requested resource not found"))?;
    let planned = |storage_key: String, after: Option<Item>| PlannedWrite {
        table: table_name.to_owned(),
        storage_key,
        after,
    };

    if let Some(put) = &action.put {
        let key = table.storage_key(&put.item)?;
        let ok = check(
            put.condition_expression.as_deref(),
            table.items.get(&key),
            &put.expression_attribute_names,
            &put.expression_attribute_values,
        )?;
        return Ok((Some(planned(key, Some(put.item.clone()))), ok));
    }
    if let Some(delete) = &action.delete {
        let key = table.storage_key(&delete.key)?;
        let ok = check(
            delete.condition_expression.as_deref(),
            table.items.get(&key),
            &delete.expression_attribute_names,
            &delete.expression_attribute_values,
        )?;
        return Ok((Some(planned(key, None)), ok));
    }
    if let Some(update) = &action.update {
        let key = table.storage_key(&update.key)?;
        let existing = table.items.get(&key);
        let ok = check(
            update.condition_expression.as_deref(),
            existing,
            &update.expression_attribute_names,
            &update.expression_attribute_values,
        )?;
        let mut after = existing.cloned().unwrap_or_else(|| update.key.clone());
        apply_update(
            &mut after,
            &update.update_expression,
            &update.expression_attribute_names,
            &update.expression_attribute_values,
        )?;
        return Ok((Some(planned(key, Some(after))), ok));
    }
    if let Some(condition_check) = &action.condition_check {
        let key = table.storage_key(&condition_check.key)?;
        let ok = evaluate(
            &condition_check.condition_expression,
            table.items.get(&key),
            &condition_check.expression_attribute_names,
            &condition_check.expression_attribute_values,
        )?;
        return Ok((None, ok));
    }
    Err(DynamoDBError::validation("TransactItems can only contain one action"))
}

// ---------------------------------------------------------------------------
// DynamoDbApi
// ---------------------------------------------------------------------------

#[async_trait]
impl DynamoDbApi for InMemoryDynamoDb {
    async fn create_table(
        &self,
        input: CreateTableInput,
    ) -> Result<CreateTableOutput, DynamoDBError> {
        self.begin(DynamoDBOperation::CreateTable)?;
        let key = |key_type| {
            input
                .key_schema
                .iter()
                .find(|element| element.key_type == key_type)
                .map(|element| element.attribute_name.clone())
        };
        let partition_key = key(KeyType::Hash)
            .ok_or_else(|| DynamoDBError::validation("KeySchema needs a HASH key"))?;
        let sort_key = key(KeyType::Range);
        for name in std::iter::once(&partition_key).chain(sort_key.as_ref()) {
            if !input
                .attribute_definitions
                .iter()
                .any(|definition| definition.attribute_name == *name)
            {
                return Err(DynamoDBError::validation(format!(
                    "Key attribute {name} has no attribute definition"
                )));
            }
        }

        let mut tables = self.tables.lock();
        if tables.contains_key(&input.table_name) {
            return Err(DynamoDBError::with_message(
                DynamoDBErrorCode::ResourceInUseException,
                format!("Table already exists: {}", input.table_name),
            ));
        }
        let table = MemoryTable {
            partition_key,
            sort_key,
            items: BTreeMap::new(),
        };
        let description = table.description(input.table_name.clone());
        tables.insert(input.table_name, table);
        Ok(CreateTableOutput {
            table_description: Some(description),
        })
    }

    async fn describe_table(
        &self,
        input: DescribeTableInput,
    ) -> Result<DescribeTableOutput, DynamoDBError> {
        self.begin(DynamoDBOperation::DescribeTable)?;
        let mut tables = self.tables.lock();
        let table = table_mut(&mut tables, &input.table_name)?;
        Ok(DescribeTableOutput {
            table: Some(table.description(input.table_name)),
        })
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, DynamoDBError> {
        self.begin(DynamoDBOperation::PutItem)?;
        let mut tables = self.tables.lock();
        let table = table_mut(&mut tables, &input.table_name)?;
        let key = table.storage_key(&input.item)?;
        if !check(
            input.condition_expression.as_deref(),
            table.items.get(&key),
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )? {
            return Err(DynamoDBError::conditional_check_failed(CONDITION_FAILED));
        }
        let previous = table.items.insert(key, input.item);
        Ok(PutItemOutput {
            attributes: previous.filter(|_| input.return_values == Some(ReturnValue::AllOld)),
            ..Default::default()
        })
    }

    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, DynamoDBError> {
        self.begin(DynamoDBOperation::GetItem)?;
        let mut tables = self.tables.lock();
        let table = table_mut(&mut tables, &input.table_name)?;
        let key = table.storage_key(&input.key)?;
        Ok(GetItemOutput {
            item: table.items.get(&key).cloned(),
            ..Default::default()
        })
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, DynamoDBError> {
        self.begin(DynamoDBOperation::DeleteItem)?;
        let mut tables = self.tables.lock();
        let table = table_mut(&mut tables, &input.table_name)?;
        let key = table.storage_key(&input.key)?;
        if !check(
            input.condition_expression.as_deref(),
            table.items.get(&key),
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )? {
            return Err(DynamoDBError::conditional_check_failed(CONDITION_FAILED));
        }
        let previous = table.items.remove(&key);
        Ok(DeleteItemOutput {
            attributes: previous.filter(|_| input.return_values == Some(ReturnValue::AllOld)),
            ..Default::default()
        })
    }

    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput, DynamoDBError> {
        self.begin(DynamoDBOperation::UpdateItem)?;
        let mut tables = self.tables.lock();
        let table = table_mut(&mut tables, &input.table_name)?;
        let key = table.storage_key(&input.key)?;
        let existing = table.items.get(&key);
        if !check(
            input.condition_expression.as_deref(),
            existing,
            &input.expression_attribute_names,
            &input.expression_attribute_values,
        )? {
            return Err(DynamoDBError::conditional_check_failed(CONDITION_FAILED));
        }
        let mut updated = existing.cloned().unwrap_or_else(|| input.key.clone());
        if let Some(expression) = &input.update_expression {
            apply_update(
                &mut updated,
                expression,
                &input.expression_attribute_names,
                &input.expression_attribute_values,
            )?;
        }
        table.items.insert(key, updated.clone());
        Ok(UpdateItemOutput {
            attributes: (input.return_values == Some(ReturnValue::AllNew)).then_some(updated),
            ..Default::default()
        })
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, DynamoDBError> {
        self.begin(DynamoDBOperation::Query)?;
        let mut tables = self.tables.lock();
        let table = table_mut(&mut tables, &input.table_name)?;
        let key_condition = input
            .key_condition_expression
            .as_deref()
            .ok_or_else(|| DynamoDBError::validation("KeyConditionExpression is required"))?;
        let condition = |expression| Condition {
            expression,
            names: &input.expression_attribute_names,
            values: &input.expression_attribute_values,
        };
        let (items, scanned_count, last_evaluated_key) = table.page(
            Some(condition(key_condition)),
            input.filter_expression.as_deref().map(condition),
            input.exclusive_start_key.as_ref(),
            input.limit,
        )?;
        Ok(QueryOutput {
            count: i32::try_from(items.len()).unwrap_or(i32::MAX),
            items,
            scanned_count,
            last_evaluated_key,
            ..Default::default()
        })
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput, DynamoDBError> {
        self.begin(DynamoDBOperation::Scan)?;
        let mut tables = self.tables.lock();
        let table = table_mut(&mut tables, &input.table_name)?;
        let filter = input.filter_expression.as_deref().map(|expression| Condition {
            expression,
            names: &input.expression_attribute_names,
            values: &input.expression_attribute_values,
        });
        let (items, scanned_count, last_evaluated_key) = table.page(
            None,
            filter,
            input.exclusive_start_key.as_ref(),
            input.limit,
        )?;
        Ok(ScanOutput {
            count: i32::try_from(items.len()).unwrap_or(i32::MAX),
            items,
            scanned_count,
            last_evaluated_key,
            ..Default::default()
        })
    }

    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, DynamoDBError> {
        self.begin(DynamoDBOperation::BatchGetItem)?;
        let mut tables = self.tables.lock();
        let mut responses = HashMap::new();
        for (table_name, keys) in input.request_items {
            let table = table_mut(&mut tables, &table_name)?;
            let mut found = Vec::new();
            for key in &keys.keys {
                if let Some(item) = table.items.get(&table.storage_key(key)?) {
                    found.push(item.clone());
                }
            }
            responses.insert(table_name, found);
        }
        Ok(BatchGetItemOutput {
            responses,
            ..Default::default()
        })
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, DynamoDBError> {
        self.begin(DynamoDBOperation::BatchWriteItem)?;
        let mut capacity = self.batch_write_capacity.lock().unwrap_or(usize::MAX);
        let mut tables = self.tables.lock();
        let mut unprocessed_items: HashMap<String, Vec<WriteRequest>> = HashMap::new();

        let mut table_names: Vec<_> = input.request_items.keys().cloned().collect();
        table_names.sort();
        for table_name in table_names {
            let table = table_mut(&mut tables, &table_name)?;
            for request in &input.request_items[&table_name] {
                if capacity == 0 {
                    unprocessed_items
                        .entry(table_name.clone())
                        .or_default()
                        .push(request.clone());
                    continue;
                }
                capacity -= 1;
                if let Some(put) = &request.put_request {
                    table.items.insert(table.storage_key(&put.item)?, put.item.clone());
                }
                if let Some(delete) = &request.delete_request {
                    table.items.remove(&table.storage_key(&delete.key)?);
                }
            }
        }
        Ok(BatchWriteItemOutput {
            unprocessed_items,
            ..Default::default()
        })
    }

    async fn transact_get_items(
        &self,
        input: TransactGetItemsInput,
    ) -> Result<TransactGetItemsOutput, DynamoDBError> {
        self.begin(DynamoDBOperation::TransactGetItems)?;
        let mut tables = self.tables.lock();
        let mut responses = Vec::with_capacity(input.transact_items.len());
        for get in input.transact_items {
            let table = table_mut(&mut tables, &get.get.table_name)?;
            let item = table.items.get(&table.storage_key(&get.get.key)?).cloned();
            responses.push(ItemResponse { item });
        }
        Ok(TransactGetItemsOutput {
            responses,
            ..Default::default()
        })
    }

    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, DynamoDBError> {
        self.begin(DynamoDBOperation::TransactWriteItems)?;
        let mut tables = self.tables.lock();

        let mut planned = Vec::with_capacity(input.transact_items.len());
        let mut reasons = Vec::with_capacity(input.transact_items.len());
        let mut canceled = false;
        for action in &input.transact_items {
            let (write, ok) = plan_write(&tables, action)?;
            canceled |= !ok;
            reasons.push(if ok {
                CancellationReason {
                    code: Some("None".to_owned()),
                    ..Default::default()
                }
            } else {
                CancellationReason {
                    code: Some("ConditionalCheckFailed".to_owned()),
                    message: Some(CONDITION_FAILED.to_owned()),
                    ..Default::default()
                }
            });
            planned.extend(write);
        }
        if canceled {
            return Err(DynamoDBError::transaction_canceled(reasons));
        }

        for write in planned {
            let table = table_mut(&mut tables, &write.table)?;
            match write.after {
                Some(item) => {
                    table.items.insert(write.storage_key, item);
                }
                None => {
                    table.items.remove(&write.storage_key);
                }
            }
        }
        Ok(TransactWriteItemsOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> ExpressionAttributeValues {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), AttributeValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_should_evaluate_joined_conditions() {
        let item: Item = HashMap::from([
            ("id".to_owned(), AttributeValue::from("a")),
            ("version".to_owned(), AttributeValue::number(2)),
        ]);
        let names = HashMap::from([("#v".to_owned(), "version".to_owned())]);
        let mut bound = values(&[(":id", "a")]);
        bound.insert(":v".to_owned(), AttributeValue::number(2));

        assert!(evaluate("(id = :id) AND (#v = :v)", Some(&item), &names, &bound).unwrap());
        assert!(!evaluate("((attribute_not_exists(#v)) AND (id = :id))", Some(&item), &names, &bound).unwrap());
        assert!(evaluate("attribute_not_exists(id)", None, &names, &bound).unwrap());
        assert!(evaluate("id = :missing", Some(&item), &names, &bound).is_err());
    }

    #[test]
    fn test_should_evaluate_comparisons_and_between() {
        let item: Item = HashMap::from([
            ("id".to_owned(), AttributeValue::from("a")),
            ("sk".to_owned(), AttributeValue::from("o2")),
            ("total".to_owned(), AttributeValue::number(15)),
        ]);
        let names = HashMap::from([("#sk".to_owned(), "sk".to_owned())]);
        let mut bound = values(&[(":id", "a"), (":lo", "o1"), (":hi", "o3")]);
        bound.insert(":n".to_owned(), AttributeValue::number(9));

        assert!(evaluate("id = :id AND #sk BETWEEN :lo AND :hi", Some(&item), &names, &bound).unwrap());
        assert!(!evaluate("#sk BETWEEN :hi AND :hi", Some(&item), &names, &bound).unwrap());
        assert!(evaluate("total > :n", Some(&item), &names, &bound).unwrap());
        assert!(evaluate("total >= :n", Some(&item), &names, &bound).unwrap());
        assert!(!evaluate("total <= :n", Some(&item), &names, &bound).unwrap());
        assert!(!evaluate("#sk < :lo", Some(&item), &names, &bound).unwrap());
    }

    #[test]
    fn test_should_apply_set_and_remove() {
        let mut item: Item = HashMap::from([
            ("id".to_owned(), AttributeValue::from("a")),
            ("status".to_owned(), AttributeValue::from("open")),
        ]);
        let names = HashMap::from([
            ("#n".to_owned(), "name".to_owned()),
            ("#s".to_owned(), "status".to_owned()),
        ]);
        apply_update(&mut item, "SET #n = :n REMOVE #s", &names, &values(&[(":n", "x")])).unwrap();
        assert_eq!(item.get("name"), Some(&AttributeValue::from("x")));
        assert!(!item.contains_key("status"));
    }
}
