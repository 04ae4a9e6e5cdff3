//! Per-request state: request accessors, the buffered response, user values,
//! the request logger and cancellation.

mod cancel;
mod core;
mod logger;
mod response;
mod values;

pub use self::core::{content_type_for, RequestContext};
pub use cancel::CancellationToken;
pub use logger::Logger;
pub use response::{ResponseWriter, APPLICATION_JSON, TEXT_HTML, TEXT_PLAIN};
pub use values::{TypedKey, UserValues};
