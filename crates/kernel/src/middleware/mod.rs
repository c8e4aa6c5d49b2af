//! HTTP middleware components.
//!
//! Bearer token authentication and request metrics.

pub mod api_token;
pub mod metrics;

pub use api_token::authenticate_api_token;
pub use metrics::track_metrics;
