use std::sync::Arc;

use parking_lot::RwLock;
use strand_model::{Request, USER_AGENT};
use tracing::{debug, trace};

use crate::error::Error;
use crate::promise::Promise;
use crate::queue::Queue;

/// Outcome of a single adapter.
#[derive(Debug, Clone)]
pub enum Adaptation {
    /// Hand the (possibly modified) request to the next adapter.
    EvaluateNext(Request),
    /// Use this request as final; remaining adapters are skipped.
    Intercept(Request),
    /// Abort: the request is never dispatched.
    Fail(Error),
}

/// Link in the adapter chain that may rewrite a request before dispatch.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;

    fn adapt(&self, request: Request, queue: &Queue) -> Promise<Adaptation>;
}

/// Run `adapters` in order over `request`.
///
/// Resolves with the final request, or rejects with the error of the first
/// adapter that failed. Later adapters never see a request after `Intercept`.
pub fn execute_adapter_chain(
    queue: &Queue,
    adapters: Arc<[Arc<dyn Adapter>]>,
    request: Request,
) -> Promise<Request> {
    evaluate(queue.clone(), adapters, 0, request)
}

fn evaluate(queue: Queue, chain: Arc<[Arc<dyn Adapter>]>, index: usize, request: Request) -> Promise<Request> {
    let Some(adapter) = chain.get(index).cloned() else {
        return Promise::resolved(&queue, request);
    };
    trace!(adapter = adapter.name(), index, "evaluating adapter");

    let step = adapter.adapt(request, &queue);
    step.then_promise(move |outcome| match outcome {
        Adaptation::EvaluateNext(request) => Ok(evaluate(queue, chain, index + 1, request)),
        Adaptation::Intercept(request) => {
            debug!(adapter = adapter.name(), "adapter intercepted request");
            Ok(Promise::resolved(&queue, request))
        }
        Adaptation::Fail(err) => {
            debug!(adapter = adapter.name(), error = %err, "adapter failed request");
            Err(err)
        }
    })
}

/// Synchronous adapter backed by a closure.
pub struct AdapterFn<F> {
    name: String,
    f: F,
}

impl<F> AdapterFn<F>
where
    F: Fn(Request) -> Adaptation + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self { name: name.into(), f }
    }
}

impl<F> Adapter for AdapterFn<F>
where
    F: Fn(Request) -> Adaptation + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn adapt(&self, request: Request, queue: &Queue) -> Promise<Adaptation> {
        Promise::resolved(queue, (self.f)(request))
    }
}

/// Sets `User-Agent` unless the request already carries one.
pub struct UserAgentAdapter {
    user_agent: String,
}

impl UserAgentAdapter {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl Adapter for UserAgentAdapter {
    fn name(&self) -> &str {
        "user-agent"
    }

    fn adapt(&self, mut request: Request, queue: &Queue) -> Promise<Adaptation> {
        request.headers.set_if_absent(USER_AGENT, self.user_agent.clone());
        Promise::resolved(queue, Adaptation::EvaluateNext(request))
    }
}

/// Sets a fixed header on every request that does not already carry it.
pub struct HeaderAdapter {
    header: String,
    value: String,
}

impl HeaderAdapter {
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
        }
    }
}

impl Adapter for HeaderAdapter {
    fn name(&self) -> &str {
        &self.header
    }

    fn adapt(&self, mut request: Request, queue: &Queue) -> Promise<Adaptation> {
        request.headers.set_if_absent(self.header.clone(), self.value.clone());
        Promise::resolved(queue, Adaptation::EvaluateNext(request))
    }
}

/// Attaches the current anti-forgery token, if one has been captured.
///
/// The token can be swapped at any time through a shared handle.
pub struct XsrfTokenAdapter {
    header: String,
    token: Arc<RwLock<Option<String>>>,
}

impl XsrfTokenAdapter {
    pub const DEFAULT_HEADER: &'static str = "X-XSRF-TOKEN";

    pub fn new() -> Self {
        Self::with_header(Self::DEFAULT_HEADER)
    }

    pub fn with_header(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Shared slot the token is read from.
    pub fn token(&self) -> Arc<RwLock<Option<String>>> {
        self.token.clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token;
    }
}

impl Default for XsrfTokenAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for XsrfTokenAdapter {
    fn name(&self) -> &str {
        "xsrf-token"
    }

    fn adapt(&self, mut request: Request, queue: &Queue) -> Promise<Adaptation> {
        if let Some(token) = self.token.read().clone() {
            request.headers.set(self.header.clone(), token);
        }
        Promise::resolved(queue, Adaptation::EvaluateNext(request))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use strand_model::Method;
    use tokio::time::timeout;
    use url::Url;

    use super::*;

    fn request() -> Request {
        Request::new(Method::Get, Url::parse("https://example.test/").unwrap())
    }

    fn chain(adapters: Vec<Arc<dyn Adapter>>) -> Arc<[Arc<dyn Adapter>]> {
        adapters.into()
    }

    fn counting(name: &str, hits: Arc<AtomicUsize>) -> Arc<dyn Adapter> {
        Arc::new(AdapterFn::new(name, move |req| {
            hits.fetch_add(1, Ordering::SeqCst);
            Adaptation::EvaluateNext(req)
        }))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_chain_passes_request_through() {
        let q = Queue::current("adapters").unwrap();
        let out = timeout(Duration::from_secs(1), execute_adapter_chain(&q, chain(vec![]), request()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out, request());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn adapters_run_in_registration_order() {
        let q = Queue::current("adapters").unwrap();
        let adapters = chain(vec![
            Arc::new(HeaderAdapter::new("X-Step", "one")) as Arc<dyn Adapter>,
            Arc::new(AdapterFn::new("second", |req: Request| {
                let seen = req.headers.get("X-Step").unwrap_or_default().to_string();
                Adaptation::EvaluateNext(req.with_header("X-Step", format!("{seen},two")))
            })) as Arc<dyn Adapter>,
        ]);

        let out = timeout(Duration::from_secs(1), execute_adapter_chain(&q, adapters, request()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.headers.get("X-Step"), Some("one,two"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_short_circuits_the_chain() {
        let q = Queue::current("adapters").unwrap();
        let (first, third) = (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)));
        let adapters = chain(vec![
            counting("first", first.clone()),
            Arc::new(AdapterFn::new("deny", |_| Adaptation::Fail(Error::Adapter("denied".into())))) as Arc<dyn Adapter>,
            counting("third", third.clone()),
        ]);

        let err = timeout(Duration::from_secs(1), execute_adapter_chain(&q, adapters, request()))
            .await
            .unwrap()
            .unwrap_err();

        assert!(matches!(err, Error::Adapter(msg) if msg == "denied"));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(third.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn intercept_skips_remaining_adapters() {
        let q = Queue::current("adapters").unwrap();
        let later = Arc::new(AtomicUsize::new(0));
        let adapters = chain(vec![
            Arc::new(AdapterFn::new("intercept", |req: Request| {
                Adaptation::Intercept(req.with_header("X-Final", "yes"))
            })) as Arc<dyn Adapter>,
            counting("later", later.clone()),
        ]);

        let out = timeout(Duration::from_secs(1), execute_adapter_chain(&q, adapters, request()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(out.headers.get("X-Final"), Some("yes"));
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn user_agent_is_only_set_when_missing() {
        let q = Queue::current("adapters").unwrap();
        let adapter: Arc<dyn Adapter> = Arc::new(UserAgentAdapter::new("strand/1"));

        let filled = timeout(Duration::from_secs(1), execute_adapter_chain(&q, chain(vec![adapter.clone()]), request()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(filled.headers.get("user-agent"), Some("strand/1"));

        let custom = request().with_header("User-Agent", "custom");
        let kept = timeout(Duration::from_secs(1), execute_adapter_chain(&q, chain(vec![adapter]), custom))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.headers.get("User-Agent"), Some("custom"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn static_header_keeps_the_callers_value() {
        let q = Queue::current("adapters").unwrap();
        let adapters = chain(vec![Arc::new(HeaderAdapter::new("X-Api-Key", "static")) as Arc<dyn Adapter>]);

        let own = request().with_header("X-Api-Key", "caller");
        let kept = timeout(Duration::from_secs(1), execute_adapter_chain(&q, adapters.clone(), own))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kept.headers.get("x-api-key"), Some("caller"));

        let filled = timeout(Duration::from_secs(1), execute_adapter_chain(&q, adapters, request()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(filled.headers.get("X-Api-Key"), Some("static"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn xsrf_token_follows_the_shared_slot() {
        let q = Queue::current("adapters").unwrap();
        let adapter = Arc::new(XsrfTokenAdapter::new());
        let adapters = chain(vec![adapter.clone() as Arc<dyn Adapter>]);

        let without = execute_adapter_chain(&q, adapters.clone(), request()).await.unwrap();
        assert!(!without.headers.contains(XsrfTokenAdapter::DEFAULT_HEADER));

        adapter.set_token(Some("t0k3n".into()));
        let with = execute_adapter_chain(&q, adapters, request()).await.unwrap();
        assert_eq!(with.headers.get(XsrfTokenAdapter::DEFAULT_HEADER), Some("t0k3n"));
    }
}
