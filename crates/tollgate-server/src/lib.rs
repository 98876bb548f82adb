//! # Tollgate Server
//!
//! HTTP gateway that authenticates bearer credentials against a secret
//! store and forwards validated requests to an upstream backend.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod dispatch;
/// API error responses.
pub mod error;
mod server;

pub use error::{ApiError, INVALID_API_KEY};
pub use server::{AppState, Server, ServerConfig, ServerError};
