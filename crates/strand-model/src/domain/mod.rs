mod kv;
pub use kv::KeyValue;

mod headers;
pub use headers::Headers;

mod method;
pub use method::Method;

mod constants;
pub use constants::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, LOCATION, USER_AGENT, X_REQUESTED_WITH};
