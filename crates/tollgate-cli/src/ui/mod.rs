//! Terminal output helpers.

mod output;

pub use output::{error, header, health_check, info, kv, success, warning, HealthStatus};
