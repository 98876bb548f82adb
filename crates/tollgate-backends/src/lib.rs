//! # Tollgate Backends
//!
//! Clients for the upstream services Tollgate dispatches validated
//! requests to. Backends implement the [`Backend`] trait; the gateway
//! treats payloads as opaque JSON and passes upstream verdicts through.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod openai;
pub mod traits;

pub use openai::OpenAiBackend;
pub use traits::{Backend, BackendError, Operation};
