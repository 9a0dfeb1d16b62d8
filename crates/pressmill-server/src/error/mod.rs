//! API error types and their HTTP representation.

pub mod response;
pub mod types;

pub use types::{ApiError, ApiResult};
