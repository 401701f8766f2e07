//! Route matching logic.
//!
//! # Responsibilities
//! - Match the dialect (exact match, case-insensitive)
//! - Match method and path pattern (exact, case-sensitive)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - The path is compared as a key, never as a glob or regex
//! - The dialect is folded once when the key is built, not per comparison

use axum::http::Method;

use crate::routing::route::RouteDescriptor;

/// Lookup key for one inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey {
    dialect: String,
    method: Method,
    path_pattern: String,
}

impl RouteKey {
    pub fn new(dialect: &str, method: Method, path_pattern: impl Into<String>) -> Self {
        Self {
            dialect: dialect.to_lowercase(),
            method,
            path_pattern: path_pattern.into(),
        }
    }

    /// The key a descriptor is declared under.
    pub fn of(route: &RouteDescriptor) -> Self {
        Self::new(route.dialect(), route.method().clone(), route.path_pattern())
    }

    /// True if this key selects `route`.
    pub fn matches(&self, route: &RouteDescriptor) -> bool {
        self.matches_endpoint(route) && route.dialect().to_lowercase() == self.dialect
    }

    /// Method and path agree, whatever the dialect.
    pub fn matches_endpoint(&self, route: &RouteDescriptor) -> bool {
        *route.method() == self.method && route.path_pattern() == self.path_pattern
    }
}
