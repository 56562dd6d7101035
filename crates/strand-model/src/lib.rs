mod domain;
pub use domain::{Headers, KeyValue, Method};
pub use domain::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION, USER_AGENT, X_REQUESTED_WITH};

mod error;
pub use error::{ModelError, ModelResult};

mod request;
pub use request::{HandlingDirective, Parameters, Request, RequestDescriptor, Response};

mod strategy;
pub use strategy::{BackoffStrategy, JitterStrategy, RetryStrategy};
