//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, one endpoint per path pattern)
//!     → request.rs (request ID, parameter collection)
//!     → routing + backend (dialect, auth, route, forward)
//!     → response.rs (transcode the outcome)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::GatewayServer;
