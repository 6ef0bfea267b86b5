//! Signer trait and the built-in signers

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::RequestBuilder;
use std::sync::Arc;

/// Attaches credentials to an outgoing request
#[async_trait]
pub trait RequestSigner: Send + Sync {
    /// Return the request with credentials applied
    async fn sign(&self, req: RequestBuilder) -> Result<RequestBuilder>;

    /// Short name for logs (never the secret itself)
    fn name(&self) -> &'static str;
}

/// Signer shared between the fetcher and anything else that issues requests
pub type SharedSigner = Arc<dyn RequestSigner>;

/// Sends requests unsigned
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

#[async_trait]
impl RequestSigner for NoAuth {
    async fn sign(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        Ok(req)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// `Authorization: Bearer <token>`
#[derive(Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    /// Create a bearer signer; the token must not be blank
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::missing_field("bearer_token"));
        }
        if token.contains(['\r', '\n']) {
            return Err(Error::auth("bearer token contains a line break"));
        }
        Ok(Self {
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl RequestSigner for BearerToken {
    async fn sign(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        Ok(req.bearer_auth(&self.token))
    }

    fn name(&self) -> &'static str {
        "bearer"
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &"****")
            .finish()
    }
}
