//! Chat Proxy Server - a streaming relay in front of an OpenAI-compatible
//! chat-completions API
//!
//! A browser page posts a conversation to `POST /api/chat-completion`. The
//! proxy trims it to a character budget, prepends a fixed persona, forwards it
//! to OpenAI or Azure OpenAI with streaming enabled, and relays the generated
//! text back as a plain UTF-8 byte stream.
//!
//! # Architecture
//!
//! - [`core`]: Core functionality (config, errors, logging, metrics, middleware, cancellation)
//! - [`sse`]: Incremental Server-Sent Events parsing and upstream event decoding
//! - [`services`]: Budget selection and the upstream completion stream
//! - [`api`]: HTTP handlers, request models and the router
//!
//! # Configuration
//!
//! Provider selection (read per request):
//! - `AZURE_OPENAI_API_BASE_URL`: when set, Azure OpenAI is used
//! - `AZURE_OPENAI_DEPLOYMENT`, `AZURE_OPENAI_API_KEY`: Azure settings
//! - `OPENAI_API_BASE_URL`: OpenAI base URL (default: https://api.openai.com)
//! - `OPENAI_API_KEY`: OpenAI key
//!
//! Server settings:
//! - `HOST`: Server bind address (default: 0.0.0.0)
//! - `PORT`: Server port (default: 3000)
//! - `VERIFY_SSL`: Verify SSL certificates for upstream (default: true)
//! - `REQUEST_TIMEOUT_SECS`: Upstream connect timeout in seconds (default: 300)

pub mod api;
pub mod core;
pub mod services;
pub mod sse;

// Re-export commonly used types for convenience
pub use api::models::{ChatCompletionRequest, Message, Role};
pub use api::{build_router, AppState};
pub use core::{AppConfig, AppError, ProviderConfig, ProviderSource, Result};
pub use services::{create_http_client, CompletionService};
