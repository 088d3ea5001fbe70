//! Mapped tables: a table name bound to a schema and an extension.

use std::fmt;
use std::sync::Arc;

use futures::Stream;
use parking_lot::RwLock;
use ruststack_dynamodb_model::input::{
    CreateTableInput, DeleteItemInput, DescribeTableInput, GetItemInput, PutItemInput, QueryInput, ScanInput,
    UpdateItemInput,
};
use ruststack_dynamodb_model::types::{
    BillingMode, ExpressionAttributeNames, ExpressionAttributeValues, ReturnValue,
    TableDescription,
};
use ruststack_dynamodb_model::{DynamoDBOperation, Item, Key as KeyMap};
use tracing::debug;

use crate::api::DynamoDbApi;
use crate::error::{EnhancedError, EnhancedResult};
use crate::expression::{AND, Expression, condition_parts, join_names, join_values};
use crate::extension::{Extension, ReadContext, ReadModification, WriteContext};
use crate::optimistic_locking::conditionally_apply_optimistic_locking;
use crate::page::Page;
use crate::request::{
    CreateTableEnhancedRequest, DeleteItemEnhancedRequest, GetItemEnhancedRequest,
    PutItemEnhancedRequest, QueryEnhancedRequest, ScanEnhancedRequest, UpdateItemEnhancedRequest,
};
use crate::schema::{Key, TableMetadata, TableSchema};
use crate::update::update_expression;

// ---------------------------------------------------------------------------
// MappedTableResource
// ---------------------------------------------------------------------------

/// A table name bound to the schema of its items and the extension applied
/// to them.
pub struct MappedTableResource<T> {
    table_name: String,
    schema: Arc<dyn TableSchema<T>>,
    extension: Option<Arc<dyn Extension>>,
}

impl<T> Clone for MappedTableResource<T> {
    fn clone(&self) -> Self {
        Self {
            table_name: self.table_name.clone(),
            schema: Arc::clone(&self.schema),
            extension: self.extension.clone(),
        }
    }
}

impl<T> fmt::Debug for MappedTableResource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedTableResource")
            .field("table_name", &self.table_name)
            .field("schema", &self.schema)
            .field("extension", &self.extension)
            .finish()
    }
}

impl<T> MappedTableResource<T> {
    /// Bind `table_name` to `schema`, without extension.
    #[must_use]
    pub fn new(table_name: impl Into<String>, schema: Arc<dyn TableSchema<T>>) -> Self {
        Self {
            table_name: table_name.into(),
            schema,
            extension: None,
        }
    }

    /// Apply `extension` to items written to and read from this table.
    #[must_use]
    pub fn with_extension(mut self, extension: Arc<dyn Extension>) -> Self {
        self.extension = Some(extension);
        self
    }

    /// Table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Item schema.
    #[must_use]
    pub fn schema(&self) -> &dyn TableSchema<T> {
        self.schema.as_ref()
    }

    /// Key layout of the table.
    #[must_use]
    pub fn table_metadata(&self) -> &TableMetadata {
        self.schema.table_metadata()
    }

    /// Extension applied to items.
    #[must_use]
    pub fn extension(&self) -> Option<&Arc<dyn Extension>> {
        self.extension.as_ref()
    }

    /// Primary key of `key_item`.
    pub fn key_from(&self, key_item: &T) -> EnhancedResult<Key> {
        let map = self.schema.item_to_map(key_item, true)?;
        Key::from_item(&map, self.table_metadata())
    }

    /// Attribute map of `key` in this table.
    pub fn key_map(&self, key: &Key) -> EnhancedResult<Item> {
        key.key_map(self.table_metadata())
    }

    /// Map `item` and run the extension's `before_write` on it.
    pub(crate) fn prepare_write(
        &self,
        item: &T,
        ignore_nulls: bool,
        operation: DynamoDBOperation,
    ) -> EnhancedResult<(Item, Option<Expression>)> {
        let map = self.schema.item_to_map(item, ignore_nulls)?;
        let Some(extension) = &self.extension else {
            return Ok((map, None));
        };
        let modification = extension.before_write(&WriteContext {
            item: &map,
            table_name: &self.table_name,
            table_metadata: self.table_metadata(),
            operation,
        })?;
        let (transformed, condition) = modification.into_parts();
        Ok((transformed.unwrap_or(map), condition))
    }

    /// Item to write for a put and the condition it must satisfy: the
    /// caller's condition first, then the extension's.
    pub(crate) fn put_parts(
        &self,
        request: PutItemEnhancedRequest<T>,
        operation: DynamoDBOperation,
    ) -> EnhancedResult<(Item, Option<Expression>)> {
        let (item, extension_condition) = self.prepare_write(&request.item, true, operation)?;
        let condition = Expression::join(request.condition, extension_condition, AND)?;
        Ok((item, condition))
    }

    pub(crate) fn update_parts(
        &self,
        request: UpdateItemEnhancedRequest<T>,
        operation: DynamoDBOperation,
    ) -> EnhancedResult<UpdateParts> {
        let (item, extension_condition) =
            self.prepare_write(&request.item, request.ignore_nulls, operation)?;
        let metadata = self.table_metadata();
        let key = Key::from_item(&item, metadata)?.key_map(metadata)?;
        let condition = Expression::join(request.condition, extension_condition, AND)?;
        let (condition_expression, condition_names, condition_values) = condition_parts(condition);
        let (update_expression, names, values) = match update_expression(&item, metadata) {
            Some(update) => {
                let (text, names, values) = update.into_parts();
                (Some(text), names, values)
            }
            None => Default::default(),
        };
        Ok(UpdateParts {
            key,
            update_expression,
            condition_expression,
            names: join_names(names, condition_names)?,
            values: join_values(values, condition_values)?,
            item,
        })
    }

    /// Run the extension's `after_read` on `raw` and map it to an item. An
    /// empty map means no item.
    pub(crate) fn read_item(
        &self,
        raw: Item,
        operation: DynamoDBOperation,
    ) -> EnhancedResult<Option<T>> {
        if raw.is_empty() {
            return Ok(None);
        }
        let map = match &self.extension {
            Some(extension) => {
                let modification = extension.after_read(&ReadContext {
                    item: &raw,
                    table_name: &self.table_name,
                    table_metadata: self.table_metadata(),
                    operation,
                })?;
                match modification {
                    ReadModification::Transform(item) => item,
                    ReadModification::NoChange => raw,
                }
            }
            None => raw,
        };
        if map.is_empty() {
            return Ok(None);
        }
        self.schema.map_to_item(&map).map(Some)
    }

    /// Map every raw item, dropping the ones that read as no item.
    pub(crate) fn read_items(
        &self,
        raw: Vec<Item>,
        operation: DynamoDBOperation,
    ) -> EnhancedResult<Vec<T>> {
        let mut items = Vec::with_capacity(raw.len());
        for map in raw {
            if let Some(item) = self.read_item(map, operation)? {
                items.push(item);
            }
        }
        Ok(items)
    }
}

/// Wire pieces of an update, shared by single updates and transactions.
pub(crate) struct UpdateParts {
    pub(crate) item: Item,
    pub(crate) key: KeyMap,
    pub(crate) update_expression: Option<String>,
    pub(crate) condition_expression: Option<String>,
    pub(crate) names: ExpressionAttributeNames,
    pub(crate) values: ExpressionAttributeValues,
}

// ---------------------------------------------------------------------------
// DynamoDbTable
// ---------------------------------------------------------------------------

enum Cursor {
    Start,
    After(KeyMap),
    Done,
}

impl Cursor {
    fn next(last_evaluated_key: Option<&KeyMap>) -> Self {
        match last_evaluated_key {
            Some(key) if !key.is_empty() => Self::After(key.clone()),
            _ => Self::Done,
        }
    }
}

/// Typed operations on one table.
pub struct DynamoDbTable<T> {
    resource: MappedTableResource<T>,
    api: Arc<dyn DynamoDbApi>,
    description: RwLock<Option<TableDescription>>,
}

impl<T> fmt::Debug for DynamoDbTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamoDbTable")
            .field("resource", &self.resource)
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

impl<T> DynamoDbTable<T> {
    /// Issue operations for `resource` through `api`.
    #[must_use]
    pub fn new(resource: MappedTableResource<T>, api: Arc<dyn DynamoDbApi>) -> Self {
        Self {
            resource,
            api,
            description: RwLock::new(None),
        }
    }

    /// The mapped table resource.
    #[must_use]
    pub fn resource(&self) -> &MappedTableResource<T> {
        &self.resource
    }

    /// Table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        self.resource.table_name()
    }

    /// Primary key of `key_item`.
    pub fn key_from(&self, key_item: &T) -> EnhancedResult<Key> {
        self.resource.key_from(key_item)
    }

    /// Write an item, replacing any item with the same key.
    pub async fn put_item(
        &self,
        request: impl Into<PutItemEnhancedRequest<T>>,
    ) -> EnhancedResult<()> {
        let (item, condition) = self
            .resource
            .put_parts(request.into(), DynamoDBOperation::PutItem)?;
        let (condition_expression, names, values) = condition_parts(condition);

        debug!(table = self.table_name(), "putting item");
        self.api
            .put_item(PutItemInput {
                table_name: self.table_name().to_owned(),
                item,
                condition_expression,
                expression_attribute_names: names,
                expression_attribute_values: values,
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    /// Read the item with the requested key.
    pub async fn get_item(
        &self,
        request: impl Into<GetItemEnhancedRequest>,
    ) -> EnhancedResult<Option<T>> {
        let request = request.into();
        let output = self
            .api
            .get_item(GetItemInput {
                table_name: self.table_name().to_owned(),
                key: self.resource.key_map(&request.key)?,
                consistent_read: request.consistent_read,
                ..Default::default()
            })
            .await?;
        match output.item {
            Some(raw) => self.resource.read_item(raw, DynamoDBOperation::GetItem),
            None => Ok(None),
        }
    }

    /// Delete an item, returning it as it was before the delete.
    pub async fn delete_item(
        &self,
        request: impl Into<DeleteItemEnhancedRequest>,
    ) -> EnhancedResult<Option<T>> {
        let request = request.into();
        let (condition_expression, names, values) = condition_parts(request.condition);

        debug!(
            table = self.table_name(),
            conditional = condition_expression.is_some(),
            "deleting item"
        );
        let output = self
            .api
            .delete_item(DeleteItemInput {
                table_name: self.table_name().to_owned(),
                key: self.resource.key_map(&request.key)?,
                condition_expression,
                expression_attribute_names: names,
                expression_attribute_values: values,
                return_values: Some(ReturnValue::AllOld),
            })
            .await?;
        match output.attributes {
            Some(raw) => self.resource.read_item(raw, DynamoDBOperation::DeleteItem),
            None => Ok(None),
        }
    }

    /// Delete the item identified by `key_item`. With `optimistic_locking`,
    /// the delete only succeeds if the stored version equals the version of
    /// `key_item`.
    pub async fn delete_key_item(
        &self,
        key_item: &T,
        optimistic_locking: bool,
    ) -> EnhancedResult<Option<T>> {
        let request = DeleteItemEnhancedRequest::new(self.key_from(key_item)?);
        let request = conditionally_apply_optimistic_locking(
            request,
            key_item,
            self.resource.schema(),
            optimistic_locking,
        )?;
        self.delete_item(request).await
    }

    /// Update the stored item with every attribute of the request item,
    /// returning the item as stored after the update.
    pub async fn update_item(
        &self,
        request: impl Into<UpdateItemEnhancedRequest<T>>,
    ) -> EnhancedResult<T> {
        let parts = self
            .resource
            .update_parts(request.into(), DynamoDBOperation::UpdateItem)?;

        debug!(table = self.table_name(), "updating item");
        let output = self
            .api
            .update_item(UpdateItemInput {
                table_name: self.table_name().to_owned(),
                key: parts.key,
                update_expression: parts.update_expression,
                condition_expression: parts.condition_expression,
                expression_attribute_names: parts.names,
                expression_attribute_values: parts.values,
                return_values: Some(ReturnValue::AllNew),
            })
            .await?;

        let updated = match output.attributes {
            Some(raw) => self.resource.read_item(raw, DynamoDBOperation::UpdateItem)?,
            None => None,
        };
        match updated {
            Some(updated) => Ok(updated),
            None => self.resource.schema().map_to_item(&parts.item),
        }
    }

    /// Lazily scan the table, one page per request.
    pub fn scan(
        &self,
        request: ScanEnhancedRequest,
    ) -> impl Stream<Item = EnhancedResult<Page<T>>> + '_ {
        futures::stream::try_unfold(Cursor::Start, move |cursor| {
            let request = request.clone();
            async move { self.scan_page(&request, cursor).await }
        })
    }

    /// Lazily query the table, one page per request.
    pub fn query(
        &self,
        request: QueryEnhancedRequest,
    ) -> impl Stream<Item = EnhancedResult<Page<T>>> + '_ {
        futures::stream::try_unfold(Cursor::Start, move |cursor| {
            let request = request.clone();
            async move { self.query_page(&request, cursor).await }
        })
    }

    /// Create the table with the key schema of its metadata.
    pub async fn create_table(&self, request: CreateTableEnhancedRequest) -> EnhancedResult<()> {
        let metadata = self.resource.table_metadata();
        let billing_mode = if request.provisioned_throughput.is_some() {
            BillingMode::Provisioned
        } else {
            BillingMode::PayPerRequest
        };
        debug!(table = self.table_name(), %billing_mode, "creating table");
        self.api
            .create_table(CreateTableInput {
                table_name: self.table_name().to_owned(),
                key_schema: metadata.key_schema(),
                attribute_definitions: metadata.attribute_definitions(),
                billing_mode: Some(billing_mode),
                provisioned_throughput: request.provisioned_throughput,
            })
            .await?;
        Ok(())
    }

    /// Table description, served from cache after the first call.
    pub async fn describe_table(&self) -> EnhancedResult<TableDescription> {
        let cached = self.description.read().clone();
        match cached {
            Some(description) => Ok(description),
            None => self.refresh_description().await,
        }
    }

    /// Reload the table description and replace the cached copy.
    pub async fn refresh_description(&self) -> EnhancedResult<TableDescription> {
        let output = self
            .api
            .describe_table(DescribeTableInput {
                table_name: self.table_name().to_owned(),
            })
            .await?;
        let description = output.table.ok_or_else(|| {
            EnhancedError::Internal(anyhow::anyhow!(
                "DescribeTable returned no description for table {}",
                self.table_name()
            ))
        })?;
        *self.description.write() = Some(description.clone());
        Ok(description)
    }

    fn start_key(&self, cursor: Cursor, first: Option<&Key>) -> EnhancedResult<Option<KeyMap>> {
        match cursor {
            Cursor::Start => first.map(|key| self.resource.key_map(key)).transpose(),
            Cursor::After(key) => Ok(Some(key)),
            Cursor::Done => Ok(None),
        }
    }

    async fn scan_page(
        &self,
        request: &ScanEnhancedRequest,
        cursor: Cursor,
    ) -> EnhancedResult<Option<(Page<T>, Cursor)>> {
        if matches!(cursor, Cursor::Done) {
            return Ok(None);
        }
        let exclusive_start_key = self.start_key(cursor, request.exclusive_start_key.as_ref())?;
        let (filter_expression, names, values) = condition_parts(request.filter_expression.clone());

        let output = self
            .api
            .scan(ScanInput {
                table_name: self.table_name().to_owned(),
                index_name: request.index_name.clone(),
                filter_expression,
                expression_attribute_names: names,
                expression_attribute_values: values,
                exclusive_start_key,
                limit: request.limit,
                consistent_read: request.consistent_read,
            })
            .await?;
        debug!(
            table = self.table_name(),
            count = output.count,
            scanned_count = output.scanned_count,
            "scanned page"
        );

        let items = self.resource.read_items(output.items, DynamoDBOperation::Scan)?;
        let next = Cursor::next(output.last_evaluated_key.as_ref());
        let page = Page::create(items, output.last_evaluated_key)
            .with_counts(output.count, output.scanned_count)
            .with_consumed_capacity(output.consumed_capacity);
        Ok(Some((page, next)))
    }

    async fn query_page(
        &self,
        request: &QueryEnhancedRequest,
        cursor: Cursor,
    ) -> EnhancedResult<Option<(Page<T>, Cursor)>> {
        if matches!(cursor, Cursor::Done) {
            return Ok(None);
        }
        let exclusive_start_key = self.start_key(cursor, request.exclusive_start_key.as_ref())?;
        let (key_condition, key_names, key_values) = request
            .query_conditional
            .expression(self.resource.table_metadata())?
            .into_parts();
        let (filter_expression, filter_names, filter_values) =
            condition_parts(request.filter_expression.clone());

        let output = self
            .api
            .query(QueryInput {
                table_name: self.table_name().to_owned(),
                index_name: request.index_name.clone(),
                key_condition_expression: Some(key_condition),
                filter_expression,
                expression_attribute_names: join_names(key_names, filter_names)?,
                expression_attribute_values: join_values(key_values, filter_values)?,
                exclusive_start_key,
                limit: request.limit,
                consistent_read: request.consistent_read,
                scan_index_forward: request.scan_index_forward,
            })
            .await?;
        debug!(
            table = self.table_name(),
            count = output.count,
            "queried page"
        );

        let items = self.resource.read_items(output.items, DynamoDBOperation::Query)?;
        let next = Cursor::next(output.last_evaluated_key.as_ref());
        let page = Page::create(items, output.last_evaluated_key)
            .with_counts(output.count, output.scanned_count)
            .with_consumed_capacity(output.consumed_capacity);
        Ok(Some((page, next)))
    }
}
