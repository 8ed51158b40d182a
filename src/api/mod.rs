//! JSON query API over the request log store.

mod envelope;
mod error;
mod handlers;

pub use envelope::{Envelope, LogPage};
pub use error::ApiError;
pub use handlers::{routes, ApiState, StatusResponse, API_PREFIX, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
