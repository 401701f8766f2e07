//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (type parameter, method, matched path pattern)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate key match)
//!     → Return: RouteDescriptor or a typed error
//!
//! Backend path:
//!     RouteDescriptor.backend_path + RequestParams
//!     → template.rs (merge extra query, default, remove, substitute, fold whitespace)
//!     → resolved backend path
//!
//! Route compilation (at startup):
//!     ApiConfiguration.routing[]
//!     → route.rs (validate and compile each entry)
//!     → duplicate-key detection
//!     → freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex anywhere: keys are exact strings, templates are scanned by hand
//! - Deterministic: same input always resolves to the same route and path

pub mod matcher;
pub mod params;
pub mod route;
pub mod router;
pub mod template;

pub use params::RequestParams;
pub use route::RouteDescriptor;
pub use router::{load_route_table, RouteTable};
