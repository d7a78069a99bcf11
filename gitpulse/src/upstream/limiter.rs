//! Rate-limited HTTP doer.
//!
//! GitHub's unauthenticated quota is small, so every upstream call funnels
//! through one shared token bucket. The decorator sits below the client and
//! above the transport: callers block until a slot is admitted, and a caller
//! that gives up while waiting gets [`Error::TooManyRequests`] rather than a
//! transport error.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::upstream::http::HttpDo;

/// Wraps an [`HttpDo`] and admits requests at a fixed rate, burst 1.
pub struct RateLimitedDo<D> {
    inner: D,
    limiter: DefaultDirectRateLimiter,
}

impl<D: HttpDo> RateLimitedDo<D> {
    /// Creates a limited doer admitting `max_rate` requests per second.
    ///
    /// Fractional rates are allowed (`0.5` means one request every two
    /// seconds). Rates that are zero, negative, or non-finite fail with
    /// [`Error::InvalidRequest`].
    pub fn new(inner: D, max_rate: f64) -> Result<Self, Error> {
        if !max_rate.is_finite() || max_rate <= 0.0 {
            return Err(Error::InvalidRequest(format!(
                "upstream rate limit must be a positive number, got {max_rate}"
            )));
        }

        let period = std::time::Duration::from_secs_f64(1.0 / max_rate);
        let quota = Quota::with_period(period).ok_or_else(|| {
            Error::InvalidRequest(format!("upstream rate limit {max_rate} is too high"))
        })?;

        Ok(Self {
            inner,
            limiter: RateLimiter::direct(quota),
        })
    }
}

#[async_trait]
impl<D: HttpDo> HttpDo for RateLimitedDo<D> {
    async fn execute(
        &self,
        request: reqwest::Request,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, Error> {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => Err(Error::TooManyRequests(
                "cancelled while waiting for the upstream rate limiter".to_string(),
            )),

            _ = self.limiter.until_ready() => self.inner.execute(request, cancel).await,
        }
    }
}
