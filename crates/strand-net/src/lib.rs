//! reqwest-backed [`Transport`](strand_core::Transport).
mod convert;
mod transport;

pub use transport::{HttpTransport, TransportOptions};
