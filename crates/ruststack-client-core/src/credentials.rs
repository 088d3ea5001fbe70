//! Credentials and request signing interfaces.
//!
//! Credential resolution chains and the signature algorithm live outside this
//! crate. A client only needs something that yields [`Credentials`] and
//! something that signs a request with them.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::http::SdkHttpRequest;
use crate::region::Region;

/// An AWS access key pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl Credentials {
    /// Create long-term credentials.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    /// Attach a session token.
    #[must_use]
    pub fn with_session_token(mut self, session_token: impl Into<String>) -> Self {
        self.session_token = Some(session_token.into());
        self
    }

    /// The access key id.
    #[must_use]
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// The secret access key.
    #[must_use]
    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    /// The session token, for temporary credentials.
    #[must_use]
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &self.session_token.as_ref().map(|_| "** redacted **"))
            .finish()
    }
}

/// Source of credentials for a client.
#[async_trait]
pub trait CredentialsProvider: Send + Sync + fmt::Debug {
    /// Resolve the credentials to sign the next request with.
    async fn resolve_credentials(&self) -> anyhow::Result<Credentials>;
}

/// A provider that always returns the same credentials.
#[derive(Debug, Clone)]
pub struct StaticCredentialsProvider {
    credentials: Credentials,
}

impl StaticCredentialsProvider {
    /// Create a provider around fixed credentials.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Wrap the provider for use with a client builder.
    #[must_use]
    pub fn shared(self) -> Arc<dyn CredentialsProvider> {
        Arc::new(self)
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentialsProvider {
    async fn resolve_credentials(&self) -> anyhow::Result<Credentials> {
        Ok(self.credentials.clone())
    }
}

/// Name and region a request is signed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningParams {
    /// Service signing name, e.g. `dynamodb`.
    pub signing_name: String,
    /// Signing region; always the canonical region.
    pub signing_region: Region,
}

/// Signs outgoing requests.
pub trait RequestSigner: Send + Sync + fmt::Debug {
    /// Sign `request` in place.
    fn sign(
        &self,
        request: &mut SdkHttpRequest,
        credentials: &Credentials,
        params: &SigningParams,
    ) -> anyhow::Result<()>;
}
