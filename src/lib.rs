//! Procurement API gateway library.
//!
//! Translates vendor purchasing-system calls into calls against a backend
//! order-management API and shapes the answers the way each caller expects.

pub mod admin;
pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod transcode;

pub use config::schema::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
