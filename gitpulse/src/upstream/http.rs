//! HTTP doer abstraction for testability.
//!
//! [`HttpDo`] is the seam between the upstream client and the network.
//! Production code uses [`ReqwestDo`]; tests substitute scripted doers that
//! return canned responses, which is also how the rate limiter decorator
//! slots in without knowing anything about GitHub.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, UpstreamError};

/// Executes a single HTTP request.
#[async_trait]
pub trait HttpDo: Send + Sync {
    /// Performs the request, aborting when `cancel` fires.
    async fn execute(
        &self,
        request: reqwest::Request,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, Error>;
}

/// Real doer backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestDo {
    client: reqwest::Client,
}

impl ReqwestDo {
    /// Creates a doer with the given whole-request timeout.
    pub fn new(timeout: std::time::Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gitpulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Internal(format!("building http client: {e}")))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpDo for ReqwestDo {
    async fn execute(
        &self,
        request: reqwest::Request,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, Error> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(Error::Upstream(UpstreamError::Cancelled)),

            result = self.client.execute(request) => {
                result.map_err(|e| Error::Upstream(UpstreamError::Transport(e.to_string())))
            }
        }
    }
}
