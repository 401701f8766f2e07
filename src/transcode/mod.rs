//! Response transcoding subsystem.
//!
//! # Data Flow
//! ```text
//! backend status + content type + body, caller Accept
//!     → render.rs (passthrough rules, content negotiation)
//!     → envelope.rs (JSON or XML error envelope)
//!     → Rendered (status, content type, body)
//! ```
//!
//! # Design Decisions
//! - Success bodies are never rewrapped; the backend's representation wins
//! - XML is the default representation, JSON only when asked for
//! - Serialization failures degrade to an XML internal-error envelope

pub mod envelope;
pub mod render;

pub use envelope::{Envelope, ErrorBody};
pub use render::{render, render_error, Rendered, ResponseFormat, Transcoded};
