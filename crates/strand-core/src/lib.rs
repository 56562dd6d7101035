//! Lazy, cancellable promises and the request pipeline built on them.
//!
//! - [`task`]: cancellable handles and containers.
//! - [`queue`]: execution queues continuations are posted to.
//! - [`promise`]: single-resolution promises and the `all`/`queue` combinators.
//! - [`pipeline`]: adapter, retrier and validation chains.
//! - [`manager`]: [`RequestManager`] wiring the chains to a [`Transport`].
pub mod backoff;
pub mod error;
pub mod manager;
pub mod pipeline;
pub mod promise;
pub mod queue;
pub mod request;
pub mod task;
pub mod transport;

pub use error::Error;
pub use manager::{ManagerConfig, RequestManager};
pub use promise::{Completion, IntoResolution, Promise, PromiseFuture};
pub use queue::Queue;
pub use request::RequestBuilding;
pub use task::{AsyncTask, TaskContainer, TaskRef};
pub use transport::Transport;

pub mod prelude {
    pub use crate::error::Error;
    pub use crate::manager::{ManagerConfig, RequestManager};
    pub use crate::pipeline::{
        Adaptation, Adapter, RetryContext, RetryDirective, Retrier, Validator,
    };
    pub use crate::promise::{Completion, Promise};
    pub use crate::queue::Queue;
    pub use crate::request::RequestBuilding;
    pub use crate::task::{AsyncTask, TaskContainer, TaskRef};
    pub use crate::transport::Transport;
    pub use strand_model::{HandlingDirective, Method, Request, RequestDescriptor, Response};
}
