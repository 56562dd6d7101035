//! Seam between the pipeline and the HTTP client.
use async_trait::async_trait;
use strand_model::{Request, Response};

use crate::error::Error;

/// Sends one prepared request and returns the raw response.
///
/// Implementations must not follow redirects or judge status codes; the
/// manager does both. Dropping the returned future must abort the exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, Error>;
}
