use bytes::Bytes;
use url::Url;

use crate::{Headers, domain::LOCATION};

/// Response returned by the transport.
///
/// `url` is the address that produced this response, which differs from the
/// original request once redirects have been followed.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Address that answered.
    pub url: Url,
    /// HTTP status code, not yet judged; validators decide what counts as failure.
    pub status: u16,
    /// Fields in wire order. Repeated names are kept as separate entries.
    pub headers: Headers,
    /// Raw body, fully read.
    pub body: Bytes,
}

impl Response {
    pub fn new(url: Url, status: u16) -> Self {
        Self {
            url,
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// Redirect target resolved against the response URL.
    pub fn location(&self) -> Option<Url> {
        let raw = self.headers.get(LOCATION)?;
        self.url.join(raw).ok()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }
}
