//! Variable fetch layer.
//!
//! - `transport`: how bytes are obtained (HTTP or a local directory)
//! - `retry`: bounded exponential backoff for transient failures
//! - `api`: route building and parsing of one variable's two resources
//! - `loader`: coalescing in-memory cache over `api::fetch_variable`

pub mod api;
pub mod loader;
pub mod retry;
pub mod transport;

pub use api::{FetchOptions, VariableUrls, fetch_variable, variable_urls};
pub use loader::VariableLoader;
pub use retry::RetryPolicy;
pub use transport::{FileTransport, HttpTransport, Transport};
