//! Upstream GitHub access: transport seam, rate limiting, and the REST client.

mod client;
mod http;
mod limiter;
mod response;

pub use client::Client;
pub use http::{HttpDo, ReqwestDo};
pub use limiter::RateLimitedDo;
