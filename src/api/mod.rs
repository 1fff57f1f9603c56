//! HTTP API for the travel assistant.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `GET /api/tools` - List the registered tools
//! - `POST /api/chat` - Run one query through the agent

mod routes;
pub mod types;

pub use routes::serve;
pub use types::*;
