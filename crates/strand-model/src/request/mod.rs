mod directive;
pub use directive::HandlingDirective;

mod descriptor;
pub use descriptor::{Parameters, RequestDescriptor};

mod prepared;
pub use prepared::Request;

mod response;
pub use response::Response;
