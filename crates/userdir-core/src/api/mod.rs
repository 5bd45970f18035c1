//! REST API client module for the remote user source.
//!
//! The remote API (JSONPlaceholder by default) serves the user collection
//! and single-user lookups. It accepts `POST` and `DELETE` but does not
//! persist them, so the collection manager never relies on those calls.

pub mod client;
pub mod error;
pub mod source;

pub use client::{is_not_found, ApiClient, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use error::ApiError;
pub use source::UserSource;
