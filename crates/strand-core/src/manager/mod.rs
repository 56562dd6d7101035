//! Request manager: owns the transport and the adapter, retrier and validation chains.
//!
//! Requests go through the pipeline below; each arrow is a promise step, so
//! cancelling the request promise stops whichever step is in flight.
//!
//! ```text
//! adapters ──▶ transport ──▶ redirect? ──yes──▶ adapters (next hop)
//!                  │              │ no
//!                  │              ▼
//!                  │          validators ──ok──▶ resolve
//!                  ▼ error        │ error
//!               retriers ◀────────┘
//!                  │
//!        retry ◀───┴───▶ reject
//! ```
mod config;
mod execution;

use std::sync::Arc;

use parking_lot::RwLock;
use strand_model::{HandlingDirective, Request, RequestDescriptor, Response};
use tracing::{debug, instrument};

pub use config::{DEFAULT_USER_AGENT, ManagerConfig};
use execution::Execution;

use crate::pipeline::{
    Adapter, CloudflareChallengeValidator, DefaultRetryPolicy, Retrier, StatusValidator, UserAgentAdapter, Validator,
};
use crate::promise::Promise;
use crate::queue::Queue;
use crate::request::RequestBuilding;
use crate::transport::Transport;

pub(crate) struct ManagerInner {
    transport: Arc<dyn Transport>,
    queue: Queue,
    config: ManagerConfig,
    policy: Arc<DefaultRetryPolicy>,
    adapters: RwLock<Vec<Arc<dyn Adapter>>>,
    retriers: RwLock<Vec<Arc<dyn Retrier>>>,
    validators: RwLock<Vec<Arc<dyn Validator>>>,
}

impl ManagerInner {
    fn adapter_snapshot(&self) -> Arc<[Arc<dyn Adapter>]> {
        self.adapters.read().as_slice().into()
    }

    fn retrier_snapshot(&self) -> Arc<[Arc<dyn Retrier>]> {
        self.retriers.read().as_slice().into()
    }

    fn validator_snapshot(&self) -> Arc<[Arc<dyn Validator>]> {
        self.validators.read().as_slice().into()
    }
}

/// Entry point for building and executing requests.
///
/// Cheap to clone; clones share the transport and all registered chains.
/// A new manager starts with a [`UserAgentAdapter`] and the Cloudflare-challenge
/// and status validators installed.
#[derive(Clone)]
pub struct RequestManager {
    inner: Arc<ManagerInner>,
}

impl RequestManager {
    pub fn new(transport: Arc<dyn Transport>, queue: Queue, config: ManagerConfig) -> Self {
        let policy = Arc::new(DefaultRetryPolicy::new(config.retry.clone(), config.retry_ceiling));
        let adapters: Vec<Arc<dyn Adapter>> = vec![Arc::new(UserAgentAdapter::new(config.user_agent.clone()))];
        let validators: Vec<Arc<dyn Validator>> = vec![
            Arc::new(CloudflareChallengeValidator) as Arc<dyn Validator>,
            Arc::new(StatusValidator) as Arc<dyn Validator>,
        ];
        Self {
            inner: Arc::new(ManagerInner {
                transport,
                queue,
                config,
                policy,
                adapters: RwLock::new(adapters),
                retriers: RwLock::new(Vec::new()),
                validators: RwLock::new(validators),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn queue(&self) -> &Queue {
        &self.inner.queue
    }

    /// Append an adapter. Requests already started keep the chain they began with.
    pub fn enqueue_adapter(&self, adapter: Arc<dyn Adapter>) {
        debug!(adapter = adapter.name(), "adapter registered");
        self.inner.adapters.write().push(adapter);
    }

    /// Append a retrier, consulted after the ones registered before it.
    pub fn enqueue_retrier(&self, retrier: Arc<dyn Retrier>) {
        debug!(retrier = retrier.name(), "retrier registered");
        self.inner.retriers.write().push(retrier);
    }

    /// Append a response validator, run after the built-in ones.
    pub fn enqueue_validation(&self, validator: Arc<dyn Validator>) {
        debug!(validator = validator.name(), "validator registered");
        self.inner.validators.write().push(validator);
    }

    /// Describe a request. Nothing is sent until a decoder's promise is concluded.
    pub fn request(&self, descriptor: RequestDescriptor, handling: HandlingDirective) -> RequestBuilding {
        RequestBuilding::new(self.clone(), descriptor, handling)
    }

    pub fn get(&self, url: impl Into<String>, handling: HandlingDirective) -> RequestBuilding {
        self.request(RequestDescriptor::get(url), handling)
    }

    /// Run a prepared request through the whole pipeline.
    #[instrument(level = "debug", skip(self, request), fields(method = %request.method, url = %request.url))]
    pub fn execute(&self, request: Request) -> Promise<Response> {
        Execution::start(self.inner.clone(), request)
    }
}
