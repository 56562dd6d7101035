//! Ordered request-processing chains.
//!
//! Every chain is evaluated against a snapshot taken when a request starts, so
//! registering a new link never affects requests already in flight.
mod adapter;
mod retrier;
mod validation;

pub use adapter::{
    Adaptation, Adapter, AdapterFn, HeaderAdapter, UserAgentAdapter, XsrfTokenAdapter,
    execute_adapter_chain,
};
pub use retrier::{
    DefaultRetryPolicy, RetryContext, RetryDecision, RetryDirective, Retrier, RetrierFn,
    StatusRetrier, execute_retrier_chain,
};
pub use validation::{CloudflareChallengeValidator, StatusValidator, Validator, run_validations};
