//! Single-item operations, queries and scans through a typed table.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::TryStreamExt;
    use ruststack_dynamodb_enhanced::{
        CreateTableEnhancedRequest, DeleteItemEnhancedRequest, DynamoDbApi, DynamoDbTable,
        EnhancedClient, Expression, Extension, GetItemEnhancedRequest, Key, QueryConditional,
        QueryEnhancedRequest, ScanEnhancedRequest, SerdeTableSchema, TableMetadata, TimeToLive,
        TimeToLiveExtension, VersionedRecordExtension,
    };
    use ruststack_dynamodb_model::{AttributeValue, DynamoDBErrorCode, DynamoDBOperation};
    use serde::{Deserialize, Serialize};

    use crate::memory::InMemoryDynamoDb;
    use crate::{CUSTOMERS, Customer, ORDERS, Order, backend, client, customers, orders};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Session {
        id: String,
        created_at: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expires_at: Option<i64>,
    }

    async fn order_ids(
        orders: &DynamoDbTable<Order>,
        conditional: QueryConditional,
    ) -> Vec<String> {
        let request = QueryEnhancedRequest::builder()
            .query_conditional(conditional)
            .build();
        let pages: Vec<_> = orders.query(request).try_collect().await.unwrap();
        pages
            .into_iter()
            .flat_map(|page| page.into_items())
            .map(|order| order.id)
            .collect()
    }

    #[tokio::test]
    async fn test_should_version_new_items_and_reject_stale_puts() {
        let backend = backend();
        let client = client(backend.clone());
        let orders = orders(&client);

        orders.put_item(Order::new("c1", "o1", 100)).await.unwrap();
        let stored = orders
            .get_item(Key::partition("c1").with_sort("o1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.version, Some(1));

        // Still unversioned, so it claims the item does not exist yet.
        let err = orders
            .put_item(Order::new("c1", "o1", 250))
            .await
            .unwrap_err();
        assert!(err.is_conditional_check_failed());

        let mut next = stored.clone();
        next.total = 250;
        orders.put_item(next).await.unwrap();
        let stored = orders
            .get_item(
                GetItemEnhancedRequest::new(Key::partition("c1").with_sort("o1"))
                    .consistent_read(true),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total, 250);
        assert_eq!(stored.version, Some(2));
    }

    #[tokio::test]
    async fn test_should_update_with_version_check() {
        let backend = backend();
        let client = client(backend.clone());
        let orders = orders(&client);

        orders.put_item(Order::new("c1", "o1", 100)).await.unwrap();
        let mut order = orders
            .get_item(Key::partition("c1").with_sort("o1"))
            .await
            .unwrap()
            .unwrap();
        order.status = "shipped".to_owned();

        let updated = orders.update_item(order.clone()).await.unwrap();
        assert_eq!(updated.status, "shipped");
        assert_eq!(updated.version, Some(2));

        // `order` still carries version 1.
        let err = orders.update_item(order).await.unwrap_err();
        assert!(err.is_conditional_check_failed());

        let raw = backend
            .stored_item(
                ORDERS,
                &[
                    ("customer".to_owned(), AttributeValue::from("c1")),
                    ("id".to_owned(), AttributeValue::from("o1")),
                ]
                .into(),
            )
            .unwrap();
        assert_eq!(raw.get("version"), Some(&AttributeValue::number(2)));
    }

    #[tokio::test]
    async fn test_should_delete_only_matching_versions() {
        let backend = backend();
        let client = client(backend.clone());
        let orders = orders(&client);

        orders.put_item(Order::new("c1", "o1", 100)).await.unwrap();
        let v1 = orders
            .get_item(Key::partition("c1").with_sort("o1"))
            .await
            .unwrap()
            .unwrap();
        let v2 = orders.update_item(v1.clone()).await.unwrap();

        let err = orders.delete_key_item(&v1, true).await.unwrap_err();
        assert!(err.is_conditional_check_failed());
        assert_eq!(backend.item_count(ORDERS), 1);

        let deleted = orders.delete_key_item(&v2, true).await.unwrap();
        assert_eq!(deleted.map(|o| o.version), Some(Some(2)));
        assert_eq!(backend.item_count(ORDERS), 0);
    }

    #[tokio::test]
    async fn test_should_delete_with_caller_condition() {
        let backend = backend();
        let client = client(backend.clone());
        let customers = customers(&client);

        customers
            .put_item(Customer {
                id: "c1".to_owned(),
                name: "Ada".to_owned(),
            })
            .await
            .unwrap();

        let request = DeleteItemEnhancedRequest::new(Key::partition("c1")).condition(
            Expression::new("#n = :n")
                .with_name("#n", "name")
                .with_value(":n", AttributeValue::from("Grace")),
        );
        let err = customers.delete_item(request).await.unwrap_err();
        assert!(err.is_conditional_check_failed());

        let deleted = customers.delete_item(Key::partition("c1")).await.unwrap();
        assert_eq!(deleted.map(|c| c.name).as_deref(), Some("Ada"));
        assert_eq!(backend.item_count(CUSTOMERS), 0);
        assert!(customers.get_item(Key::partition("c1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_should_query_sort_key_prefix() {
        let backend = backend();
        let client = client(backend.clone());
        let orders = orders(&client);

        for (customer, id) in [
            ("c1", "2024-01"),
            ("c1", "2024-02"),
            ("c1", "2025-01"),
            ("c2", "2024-03"),
        ] {
            orders.put_item(Order::new(customer, id, 10)).await.unwrap();
        }

        let request = QueryEnhancedRequest::builder()
            .query_conditional(QueryConditional::SortBeginsWith {
                partition_value: AttributeValue::from("c1"),
                prefix: "2024-".to_owned(),
            })
            .build();
        let pages: Vec<_> = orders.query(request).try_collect().await.unwrap();
        let ids: Vec<_> = pages
            .iter()
            .flat_map(|page| page.items())
            .map(|order| order.id.as_str())
            .collect();
        assert_eq!(ids, ["2024-01", "2024-02"]);
        assert!(pages.last().unwrap().is_last_page());
    }

    #[tokio::test]
    async fn test_should_scan_page_by_page() {
        let backend = backend();
        let client = client(backend.clone());
        let orders = orders(&client);

        for id in ["a", "b", "c", "d", "e"] {
            orders.put_item(Order::new("c1", id, 10)).await.unwrap();
        }

        let request = ScanEnhancedRequest::builder().limit(2).build();
        let pages: Vec<_> = orders.scan(request).try_collect().await.unwrap();
        let sizes: Vec<_> = pages.iter().map(|page| page.items().len()).collect();
        assert_eq!(sizes, [2, 2, 1]);
        assert_eq!(pages[0].scanned_count(), Some(2));
        assert!(pages[2].is_last_page());

        let filtered = ScanEnhancedRequest::builder()
            .filter_expression(
                Expression::new("id = :id").with_value(":id", AttributeValue::from("d")),
            )
            .build();
        let pages: Vec<_> = orders.scan(filtered).try_collect().await.unwrap();
        let found: Vec<_> = pages.into_iter().flat_map(|page| page.into_items()).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "d");
    }

    #[tokio::test]
    async fn test_should_describe_table_once() {
        let backend = backend();
        let client = client(backend.clone());
        let orders = orders(&client);

        let description = orders.describe_table().await.unwrap();
        assert_eq!(description.table_name.as_deref(), Some(ORDERS));
        assert_eq!(description.key_schema.len(), 2);
        orders.describe_table().await.unwrap();

        let describes = backend
            .calls()
            .into_iter()
            .filter(|op| *op == DynamoDBOperation::DescribeTable)
            .count();
        assert_eq!(describes, 1);
    }

    #[tokio::test]
    async fn test_should_query_sort_key_ranges() {
        let backend = backend();
        let client = client(backend.clone());
        let orders = orders(&client);
        for id in ["a", "b", "c", "d"] {
            orders.put_item(Order::new("c1", id, 10)).await.unwrap();
        }
        orders.put_item(Order::new("c2", "b", 10)).await.unwrap();

        let key = |id: &str| Key::partition("c1").with_sort(id);
        assert_eq!(
            order_ids(&orders, QueryConditional::SortGreaterThan(key("b"))).await,
            ["c", "d"]
        );
        assert_eq!(
            order_ids(&orders, QueryConditional::SortLessThanOrEqualTo(key("b"))).await,
            ["a", "b"]
        );
        assert_eq!(
            order_ids(
                &orders,
                QueryConditional::SortBetween {
                    from: key("b"),
                    to: key("c"),
                }
            )
            .await,
            ["b", "c"]
        );
    }

    #[tokio::test]
    async fn test_should_create_table_and_stamp_expiry() {
        crate::init_tracing();
        let backend = Arc::new(InMemoryDynamoDb::default());
        let client = EnhancedClient::builder()
            .api(Arc::clone(&backend) as Arc<dyn DynamoDbApi>)
            .extensions(vec![
                Arc::new(VersionedRecordExtension::default()) as Arc<dyn Extension>,
                Arc::new(TimeToLiveExtension::new()),
            ])
            .build();
        let metadata = TableMetadata::builder()
            .partition_key("id")
            .time_to_live(
                TimeToLive::builder()
                    .attribute("expires_at")
                    .base_attribute("created_at")
                    .duration(chrono::TimeDelta::hours(1))
                    .build(),
            )
            .build();
        let sessions: DynamoDbTable<Session> =
            client.table("sessions", Arc::new(SerdeTableSchema::new(metadata)));

        sessions
            .create_table(CreateTableEnhancedRequest::default())
            .await
            .unwrap();
        let err = sessions
            .create_table(CreateTableEnhancedRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.service_code(), Some(DynamoDBErrorCode::ResourceInUseException));

        sessions
            .put_item(Session {
                id: "s-1".to_owned(),
                created_at: 1_700_000_000,
                expires_at: None,
            })
            .await
            .unwrap();
        let stored = sessions.get_item(Key::partition("s-1")).await.unwrap().unwrap();
        assert_eq!(stored.expires_at, Some(1_700_003_600));
    }
}
