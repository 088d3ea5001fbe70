//! Batch writes and reads across tables.

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use ruststack_dynamodb_enhanced::{
        BatchGetItemEnhancedRequest, BatchWriteItemEnhancedRequest, EnhancedError,
        GetItemEnhancedRequest, Key, ReadBatch, WriteBatch,
    };

    use crate::{CUSTOMERS, Customer, ORDERS, Order, backend, client, customers, orders};

    fn customer(id: &str) -> Customer {
        Customer {
            id: id.to_owned(),
            name: format!("customer {id}"),
        }
    }

    #[tokio::test]
    async fn test_should_report_and_resubmit_unprocessed_writes() {
        let backend = backend();
        let client = client(backend.clone());
        let customers = customers(&client);
        let orders = orders(&client);
        orders.put_item(Order::new("c1", "o1", 10)).await.unwrap();
        backend.limit_batch_writes(2);

        let customer_batch = WriteBatch::create(customers.resource(), |batch| {
            Ok(batch
                .add_put_item(customer("c1"))
                .add_put_item(customer("c2"))
                .add_put_item(customer("c3")))
        })
        .unwrap();
        let order_batch = WriteBatch::create(orders.resource(), |batch| {
            Ok(batch.add_delete_key(Key::partition("c1").with_sort("o1")))
        })
        .unwrap();
        let result = client
            .batch_write_item(
                BatchWriteItemEnhancedRequest::new(vec![customer_batch]).add_write_batch(order_batch),
            )
            .await
            .unwrap();

        let unprocessed = result
            .unprocessed_put_items_for_table(customers.resource())
            .unwrap();
        assert_eq!(unprocessed, [customer("c3")]);
        let unprocessed_deletes = result
            .unprocessed_delete_items_for_table(orders.resource())
            .unwrap();
        assert_eq!(unprocessed_deletes, [Key::partition("c1").with_sort("o1")]);
        assert_eq!(backend.item_count(CUSTOMERS), 2);
        assert_eq!(backend.item_count(ORDERS), 1);

        let retry = BatchWriteItemEnhancedRequest::new(vec![
            WriteBatch::create(customers.resource(), |batch| {
                Ok(unprocessed.into_iter().fold(batch, |batch, c| batch.add_put_item(c)))
            })
            .unwrap(),
            WriteBatch::create(orders.resource(), |batch| {
                Ok(unprocessed_deletes
                    .into_iter()
                    .fold(batch, |batch, key| batch.add_delete_key(key)))
            })
            .unwrap(),
        ]);
        let result = client.batch_write_item(retry).await.unwrap();
        assert!(result.unprocessed_requests().is_empty());
        assert_eq!(backend.item_count(CUSTOMERS), 3);
        assert_eq!(backend.item_count(ORDERS), 0);
    }

    #[tokio::test]
    async fn test_should_refuse_batch_puts_to_versioned_tables() {
        let backend = backend();
        let client = client(backend.clone());
        let orders = orders(&client);

        let err = WriteBatch::create(orders.resource(), |batch| {
            Ok(batch.add_put_item(Order::new("c1", "o1", 10)))
        })
        .unwrap_err();
        assert!(matches!(err, EnhancedError::InvalidArgument(_)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_should_read_batches_from_several_tables() {
        let backend = backend();
        let client = client(backend.clone());
        let customers = customers(&client);
        let orders = orders(&client);
        customers.put_item(customer("c1")).await.unwrap();
        orders.put_item(Order::new("c1", "o1", 10)).await.unwrap();
        orders.put_item(Order::new("c1", "o2", 20)).await.unwrap();

        let request = BatchGetItemEnhancedRequest::new(vec![
            ReadBatch::create(customers.resource(), |batch| {
                Ok(batch
                    .add_get_item(Key::partition("c1"))
                    .add_get_item(Key::partition("missing")))
            })
            .unwrap(),
            ReadBatch::create(orders.resource(), |batch| {
                batch.add_get_key_item(&Order::new("c1", "o2", 0))
            })
            .unwrap(),
        ]);
        let pages: Vec<_> = client.batch_get_item(request).try_collect().await.unwrap();
        assert_eq!(pages.len(), 1);

        let page = &pages[0];
        assert!(!page.has_unprocessed_keys());
        assert_eq!(
            page.results_for_table(customers.resource()).unwrap(),
            [customer("c1")]
        );
        let orders_read = page.results_for_table(orders.resource()).unwrap();
        assert_eq!(orders_read.len(), 1);
        assert_eq!(orders_read[0].id, "o2");
        assert_eq!(orders_read[0].version, Some(1));
    }

    #[tokio::test]
    async fn test_should_reject_mixed_consistency_for_one_table() {
        let backend = backend();
        let client = client(backend.clone());
        let customers = customers(&client);

        let request = BatchGetItemEnhancedRequest::new(vec![
            ReadBatch::create(customers.resource(), |batch| {
                Ok(batch.add_get_item(
                    GetItemEnhancedRequest::new(Key::partition("c1")).consistent_read(true),
                ))
            })
            .unwrap(),
            ReadBatch::create(customers.resource(), |batch| {
                Ok(batch.add_get_item(Key::partition("c2")))
            })
            .unwrap(),
        ]);
        let err = client
            .batch_get_item(request)
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(err, EnhancedError::InvalidArgument(_)));
        assert!(backend.calls().is_empty());
    }
}
