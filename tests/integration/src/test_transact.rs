//! Transactional writes and reads.

#[cfg(test)]
mod tests {
    use ruststack_dynamodb_enhanced::{
        DynamoDbTable, EnhancedError, Expression, Key, TransactGetItemsEnhancedRequest,
        TransactWriteItemsEnhancedRequest,
    };
    use ruststack_dynamodb_model::DynamoDBErrorCode;

    use crate::{Customer, ORDERS, Order, backend, client, customers, orders};

    async fn stored(orders: &DynamoDbTable<Order>, id: &str) -> Option<Order> {
        orders
            .get_item(Key::partition("c1").with_sort(id))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_should_commit_every_action() {
        let backend = backend();
        let client = client(backend.clone());
        let customers = customers(&client);
        let orders = orders(&client);
        customers
            .put_item(Customer {
                id: "c1".to_owned(),
                name: "Ada".to_owned(),
            })
            .await
            .unwrap();
        orders.put_item(Order::new("c1", "o2", 20)).await.unwrap();
        orders.put_item(Order::new("c1", "o3", 30)).await.unwrap();
        let o2 = stored(&orders, "o2").await.unwrap();
        let mut o3 = stored(&orders, "o3").await.unwrap();
        o3.status = "shipped".to_owned();

        let request = TransactWriteItemsEnhancedRequest::builder()
            .add_put_item(orders.resource(), Order::new("c1", "o1", 10))
            .unwrap()
            .add_delete_key_item(orders.resource(), &o2, true)
            .unwrap()
            .add_update_item(orders.resource(), o3)
            .unwrap()
            .add_condition_check(
                customers.resource(),
                &Key::partition("c1"),
                Expression::new("attribute_exists(id)"),
            )
            .unwrap()
            .build();
        client.transact_write_items(request).await.unwrap();

        assert_eq!(stored(&orders, "o1").await.unwrap().version, Some(1));
        assert!(stored(&orders, "o2").await.is_none());
        let o3 = stored(&orders, "o3").await.unwrap();
        assert_eq!(o3.status, "shipped");
        assert_eq!(o3.version, Some(2));
    }

    #[tokio::test]
    async fn test_should_cancel_with_reasons_per_action() {
        let backend = backend();
        let client = client(backend.clone());
        let customers = customers(&client);
        let orders = orders(&client);
        orders.put_item(Order::new("c1", "o2", 20)).await.unwrap();
        let stale = stored(&orders, "o2").await.unwrap();
        orders.update_item(stale.clone()).await.unwrap();

        let request = TransactWriteItemsEnhancedRequest::builder()
            .add_put_item(orders.resource(), Order::new("c1", "o1", 10))
            .unwrap()
            .add_update_item(orders.resource(), stale)
            .unwrap()
            .add_condition_check(
                customers.resource(),
                &Key::partition("nobody"),
                Expression::new("attribute_exists(id)"),
            )
            .unwrap()
            .build();
        let err = client.transact_write_items(request).await.unwrap_err();

        let EnhancedError::Service(err) = err else {
            panic!("expected a service error, got {err:?}");
        };
        assert_eq!(err.code, DynamoDBErrorCode::TransactionCanceledException);
        let codes: Vec<_> = err
            .cancellation_reasons
            .iter()
            .map(|reason| reason.code.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(
            codes,
            ["None", "ConditionalCheckFailed", "ConditionalCheckFailed"]
        );
        assert!(stored(&orders, "o1").await.is_none());
        assert_eq!(backend.item_count(ORDERS), 1);
    }

    #[tokio::test]
    async fn test_should_read_items_in_request_order() {
        let backend = backend();
        let client = client(backend.clone());
        let customers = customers(&client);
        let orders = orders(&client);
        orders.put_item(Order::new("c1", "o1", 10)).await.unwrap();
        customers
            .put_item(Customer {
                id: "c1".to_owned(),
                name: "Ada".to_owned(),
            })
            .await
            .unwrap();

        let request = TransactGetItemsEnhancedRequest::builder()
            .add_get_key_item(orders.resource(), &Order::new("c1", "o1", 0))
            .unwrap()
            .add_get_item(orders.resource(), &Key::partition("c1").with_sort("missing"))
            .unwrap()
            .add_get_item(customers.resource(), &Key::partition("c1"))
            .unwrap()
            .build();
        let results = client.transact_get_items(request).await.unwrap();

        assert_eq!(results.len(), 3);
        let order = results[0].get_item(orders.resource()).unwrap().unwrap();
        assert_eq!((order.id.as_str(), order.version), ("o1", Some(1)));
        assert!(results[1].get_item(orders.resource()).unwrap().is_none());
        assert_eq!(
            results[2]
                .get_item(customers.resource())
                .unwrap()
                .map(|c| c.name),
            Some("Ada".to_owned())
        );
    }
}
