use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, redirect::Policy};
use strand_core::{Error, ManagerConfig, Transport};
use strand_model::{Request, Response};
use tracing::{debug, trace};

use crate::convert;

#[derive(Clone, Debug)]
pub struct TransportOptions {
    /// Whole-exchange timeout, body included.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_max_idle_per_host: 8,
        }
    }
}

impl From<&ManagerConfig> for TransportOptions {
    fn from(config: &ManagerConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            ..Self::default()
        }
    }
}

/// HTTP transport over a pooled reqwest client.
///
/// Redirects are never followed here; the request manager handles them so each
/// hop goes back through the adapter chain.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    inner: Client,
    options: TransportOptions,
}

impl HttpTransport {
    pub fn new(options: TransportOptions) -> Result<Self, Error> {
        let inner = Client::builder()
            .redirect(Policy::none())
            .connect_timeout(options.connect_timeout)
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .build()
            .map_err(|e| Error::Runtime(format!("failed to build http client: {e}")))?;
        Ok(Self { inner, options })
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, Error> {
        let Request {
            url,
            method,
            headers,
            body,
        } = request;
        trace!(%method, %url, "sending request");

        let mut builder = self
            .inner
            .request(convert::method(method), url.clone())
            .headers(convert::header_map(&headers)?)
            .timeout(self.options.request_timeout);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let resp = builder.send().await.map_err(convert::error)?;
        let status = resp.status().as_u16();
        let final_url = resp.url().clone();
        let response_headers = convert::headers(resp.headers());
        let body = resp.bytes().await.map_err(convert::error)?;
        debug!(%method, %url, status, bytes = body.len(), "response received");

        let mut response = Response::new(final_url, status).with_body(body);
        response.headers = response_headers;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use url::Url;

    use strand_model::Method;

    use super::*;

    /// Serve a single canned response and hand back the raw request text.
    async fn serve_once(reply: &'static str) -> (Url, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut seen = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                seen.extend_from_slice(&buf[..n]);
                if n == 0 || seen.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&seen).into_owned()
        });
        (Url::parse(&format!("http://{addr}/path?q=1")).unwrap(), handle)
    }

    fn transport(timeout_ms: u64) -> HttpTransport {
        HttpTransport::new(TransportOptions {
            request_timeout: Duration::from_millis(timeout_ms),
            ..TransportOptions::default()
        })
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn returns_status_headers_and_body() {
        let (url, server) =
            serve_once("HTTP/1.1 404 Not Found\r\nServer: test\r\nContent-Length: 4\r\nConnection: close\r\n\r\nnope").await;

        let request = Request::new(Method::Get, url.clone()).with_header("X-Probe", "1");
        let response = transport(2_000).send(request).await.unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.header("server"), Some("test"));
        assert_eq!(response.body, "nope");
        assert_eq!(response.url, url);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("GET /path?q=1 HTTP/1.1"));
        assert!(raw.to_ascii_lowercase().contains("x-probe: 1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn redirects_are_returned_not_followed() {
        let (url, _server) =
            serve_once("HTTP/1.1 302 Found\r\nLocation: /elsewhere\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;

        let response = transport(2_000).send(Request::new(Method::Get, url)).await.unwrap();

        assert_eq!(response.status, 302);
        assert_eq!(response.location().unwrap().path(), "/elsewhere");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn slow_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        let _held = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let err = transport(100).send(Request::new(Method::Get, url)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        drop(listener);

        let err = transport(2_000).send(Request::new(Method::Get, url)).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.is_retryable());
    }
}
