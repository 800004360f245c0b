//! HTTP API server for external control (presentation layer)
//!
//! This module provides a REST API for controlling the live session:
//! - POST /session/start - Start the live translation session
//! - POST /session/stop - Stop it and report final statistics
//! - GET /session/status - Connection state, last error, both transcripts
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
