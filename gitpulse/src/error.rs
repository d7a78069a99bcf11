//! Error types shared across the cache stack.
//!
//! Every layer reports failures through the same [`Error`] kind enum so that
//! callers (and the HTTP layer) can map outcomes with a single match. Upstream
//! failures carry an [`UpstreamError`] sub-kind because several of them need
//! to be told apart (rate-limit exhaustion, 202-retry exhaustion).

use thiserror::Error;

/// Top-level error kinds surfaced by the service and the cache layers.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied parameters violate the request contract.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The upstream rate limiter was still throttling when the caller gave up.
    #[error("too many requests: {0}")]
    TooManyRequests(String),

    /// No usable data was available; a refresh has been enqueued.
    #[error("scheduled for later: {0}")]
    ScheduledForLater(String),

    /// The refresh queue is full; not even a refresh could be enqueued.
    #[error("overloaded: {0}")]
    Overloaded(String),

    /// The upstream HTTP call failed.
    #[error("upstream: {0}")]
    Upstream(#[from] UpstreamError),

    /// Serialization faults and non-transient store errors.
    #[error("internal: {0}")]
    Internal(String),
}

/// Failure modes of a single upstream HTTP call.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection, TLS, or protocol-level failure.
    #[error("http transport: {0}")]
    Transport(String),

    /// Upstream answered with an unexpected HTTP status.
    #[error("got invalid http status code: {0}")]
    Status(u16),

    /// Upstream reported its rate limit as exhausted.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// The 202-retry budget for contributor statistics ran out.
    #[error("too many retries with status 202")]
    Retries,

    /// The response body exceeded the configured read cap.
    #[error("response body larger than {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The caller cancelled while the request was in flight.
    #[error("request cancelled")]
    Cancelled,

    /// The response body was not the JSON document we expected.
    #[error("decoding response: {0}")]
    Decode(String),
}

impl Error {
    /// Returns true for [`Error::ScheduledForLater`].
    pub fn is_scheduled_for_later(&self) -> bool {
        matches!(self, Error::ScheduledForLater(_))
    }

    /// Returns true for [`Error::InvalidRequest`].
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Error::InvalidRequest(_))
    }
}
