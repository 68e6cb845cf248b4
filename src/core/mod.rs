//! Core functionality for the chat proxy server.
//!
//! - Configuration management
//! - Error handling
//! - Logging context and subscriber setup
//! - Metrics collection
//! - HTTP middleware
//! - Stream cancellation

pub mod cancel;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod middleware;

// Re-export commonly used types
pub use cancel::CancelSignal;
pub use config::{AppConfig, ProviderConfig, ProviderSource, ServerConfig};
pub use error::{AppError, Result, StreamError};
pub use logging::{generate_request_id, get_request_id, init_logging, REQUEST_ID};
pub use metrics::{get_metrics, init_metrics, Metrics};
pub use middleware::{request_id_middleware, MetricsMiddleware};
