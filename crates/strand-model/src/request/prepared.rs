use bytes::Bytes;
use url::Url;

use crate::{Headers, Method};

/// Fully resolved request handed to adapters and the transport.
///
/// Produced by [`crate::RequestDescriptor::prepare`]. Adapters receive it by value
/// and return a (possibly) modified copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Absolute URL, query string included.
    pub url: Url,
    pub method: Method,
    /// Fields sent as-is; adapters add to or rewrite them.
    pub headers: Headers,
    /// Encoded body. `None` for bodiless requests and after a redirect downgrade to GET.
    pub body: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            url,
            method,
            headers: Headers::new(),
            body: None,
        }
    }

    /// Builder-style header setter, replacing any existing value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }
}
