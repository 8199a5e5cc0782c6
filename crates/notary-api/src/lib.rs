//! # Notary API
//!
//! HTTP gateway for Notary.
//!
//! Features:
//! - OpenTimestamps proof creation, verification and upgrade
//! - Hash anchoring and verification on an EVM contract
//! - User and todo store, with todo anchoring
//! - Tower middleware (request id, tracing, CORS, timeout, body limit)
//! - OpenAPI document and Swagger UI
//! - Graceful shutdown

pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use server::{init_tracing, NotaryServer, ServerConfig};
pub use state::AppState;
