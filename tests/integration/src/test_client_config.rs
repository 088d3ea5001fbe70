//! Resolved client configuration driving retries of the enhanced client.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ruststack_client_core::retry::{BackoffStrategy, default_retry_strategy};
    use ruststack_client_core::{
        ClientBuilder, ClientConfigError, ClientConfiguration, ClientOverrideConfiguration,
        Credentials, RetryMode, StaticCredentialsProvider,
    };
    use ruststack_dynamodb_enhanced::{
        EnhancedClient, RetryingDynamoDbApi, dynamodb_service_defaults,
    };
    use ruststack_dynamodb_model::{DynamoDBErrorCode, DynamoDBOperation};

    use crate::{ORDERS, Order, backend, orders};

    fn configuration(max_attempts: u32) -> ClientConfiguration {
        let strategy = default_retry_strategy(RetryMode::Standard)
            .to_builder()
            .max_attempts(max_attempts)
            .backoff_strategy(BackoffStrategy::None)
            .throttling_backoff_strategy(BackoffStrategy::None)
            .build()
            .unwrap();
        ClientBuilder::new(dynamodb_service_defaults())
            .region("us-east-1")
            .endpoint_override("http://localhost:4566")
            .credentials_provider(
                StaticCredentialsProvider::new(Credentials::new("test", "test")).shared(),
            )
            .override_configuration(ClientOverrideConfiguration::new().retry_strategy(strategy))
            .build()
            .unwrap()
    }

    #[test]
    fn test_should_resolve_dynamodb_configuration() {
        let config = configuration(3);
        assert_eq!(config.region().as_str(), "us-east-1");
        assert!(config.endpoint_overridden());
        assert_eq!(config.endpoint().host(), Some("localhost"));
        assert_eq!(config.service_name(), "DynamoDB");
        assert_eq!(config.retry_strategy().max_attempts(), 3);
    }

    #[test]
    fn test_should_require_credentials() {
        let err = ClientBuilder::new(dynamodb_service_defaults())
            .region("us-west-2")
            .build()
            .unwrap_err();
        assert!(matches!(err, ClientConfigError::MissingCredentials));
    }

    #[tokio::test]
    async fn test_should_retry_throttled_writes_with_configured_strategy() {
        let backend = backend();
        let api = RetryingDynamoDbApi::from_configuration(backend.clone(), &configuration(3));
        let client = EnhancedClient::create(Arc::new(api));
        let orders = orders(&client);

        backend.fail_next_calls(&[
            DynamoDBErrorCode::ProvisionedThroughputExceededException,
            DynamoDBErrorCode::ThrottlingException,
        ]);
        orders.put_item(Order::new("c1", "o1", 10)).await.unwrap();

        assert_eq!(backend.calls(), [DynamoDBOperation::PutItem; 3]);
        assert_eq!(backend.item_count(ORDERS), 1);
    }

    #[tokio::test]
    async fn test_should_surface_error_after_last_attempt() {
        let backend = backend();
        let api = RetryingDynamoDbApi::from_configuration(backend.clone(), &configuration(2));
        let client = EnhancedClient::create(Arc::new(api));
        let orders = orders(&client);

        backend.fail_next_calls(&[DynamoDBErrorCode::ThrottlingException; 3]);
        let err = orders
            .put_item(Order::new("c1", "o1", 10))
            .await
            .unwrap_err();

        assert_eq!(err.service_code(), Some(DynamoDBErrorCode::ThrottlingException));
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_should_not_retry_conditional_failures() {
        let backend = backend();
        let api = RetryingDynamoDbApi::from_configuration(backend.clone(), &configuration(3));
        let client = EnhancedClient::create(Arc::new(api));
        let orders = orders(&client);

        orders.put_item(Order::new("c1", "o1", 10)).await.unwrap();
        let err = orders
            .put_item(Order::new("c1", "o1", 20))
            .await
            .unwrap_err();

        assert!(err.is_conditional_check_failed());
        assert_eq!(backend.calls().len(), 2);
    }
}
