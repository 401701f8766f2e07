//! Backend subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → auth.rs (API key → tenant + token)
//!     → forwarder.rs (method check, URL, headers, timeout, status expectation)
//!     → client.rs (one HTTP call, buffered response)
//!     → transcode (shape the answer for the caller)
//! ```
//!
//! # Design Decisions
//! - Each inbound request makes exactly one backend call
//! - The transport sits behind `BackendClient` so tests can script it

pub mod auth;
pub mod client;
pub mod forwarder;

pub use auth::{Authenticator, Credentials, StaticKeyAuthenticator};
pub use client::{BackendClient, BackendRequest, BackendResponse, ForwardError, HyperBackendClient};
pub use forwarder::{Forwarder, Outbound};
