//! Route table and dispatch.
//!
//! # Responsibilities
//! - Store compiled route descriptors
//! - Resolve (dialect, method, path pattern) to exactly one descriptor
//! - Flag duplicate keys, which are authoring bugs in the route table
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) linear scan, first match wins
//! - Explicit error kinds rather than a silent default route

use axum::http::Method;
use thiserror::Error;

use crate::config::loader::{load_api_configuration, ConfigError};
use crate::config::schema::ApiConfiguration;
use crate::error::{GatewayError, GatewayResult};
use crate::routing::matcher::RouteKey;
use crate::routing::route::{RouteDescriptor, RouteError};
use crate::routing::template::TemplateParam;

/// Errors compiling a route-table document.
#[derive(Debug, Error)]
#[error("invalid route table: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
pub struct RouteTableError(pub Vec<RouteError>);

/// Errors loading a route table from its source.
#[derive(Debug, Error)]
pub enum LoadRouteTableError {
    #[error(transparent)]
    Source(#[from] ConfigError),

    #[error(transparent)]
    Invalid(#[from] RouteTableError),
}

/// Load and compile the route table once.
///
/// `None` selects the built-in table; an `http(s)://` source is fetched,
/// anything else is read as a file.
pub async fn load_route_table(source: Option<&str>) -> Result<RouteTable, LoadRouteTableError> {
    let config = load_api_configuration(source).await?;
    Ok(RouteTable::from_api_configuration(&config)?)
}

/// Two entries declared under the same key. Only `first` is ever selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRoute {
    pub first: usize,
    pub duplicate: usize,
    pub key: RouteKey,
}

/// The immutable set of routes loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
    duplicates: Vec<DuplicateRoute>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteDescriptor>) -> Self {
        let duplicates = find_duplicates(&routes);
        for dup in &duplicates {
            tracing::warn!(
                first = dup.first,
                duplicate = dup.duplicate,
                dialect = %routes[dup.duplicate].dialect(),
                method = %routes[dup.duplicate].method(),
                path = %routes[dup.duplicate].path_pattern(),
                "Duplicate route key in API configuration; only the first entry is used"
            );
        }
        Self { routes, duplicates }
    }

    /// Compile every entry of a route-table document, reporting all bad entries.
    pub fn from_api_configuration(config: &ApiConfiguration) -> Result<Self, RouteTableError> {
        let mut routes = Vec::with_capacity(config.routing.len());
        let mut errors = Vec::new();
        for (index, raw) in config.routing.iter().enumerate() {
            match RouteDescriptor::compile(index, raw) {
                Ok(route) => routes.push(route),
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            return Err(RouteTableError(errors));
        }
        Ok(Self::new(routes))
    }

    /// Select the route for one inbound request.
    ///
    /// An empty dialect fails with `MissingParameter` before any matching.
    /// A known method/path with no entry for this dialect is an
    /// `UnknownDialect`; a method/path nobody declares is `RouteNotConfigured`.
    pub fn resolve(&self, dialect: &str, method: &Method, path: &str) -> GatewayResult<&RouteDescriptor> {
        if dialect.is_empty() {
            return Err(GatewayError::MissingParameter(
                TemplateParam::Type.name().to_string(),
            ));
        }

        let key = RouteKey::new(dialect, method.clone(), path);
        let mut matches = self.routes.iter().filter(|route| key.matches(route));
        match matches.next() {
            Some(route) => {
                if matches.next().is_some() {
                    tracing::warn!(
                        dialect = %dialect,
                        method = %method,
                        path = %path,
                        "Multiple routes match; using the first declared"
                    );
                }
                Ok(route)
            }
            None if self.routes.iter().any(|route| key.matches_endpoint(route)) => {
                Err(GatewayError::UnknownDialect(dialect.to_string()))
            }
            None => Err(GatewayError::RouteNotConfigured {
                method: method.to_string(),
                path: path.to_string(),
            }),
        }
    }

    /// True if any dialect declares `method` on `path`.
    pub fn declares(&self, method: &Method, path: &str) -> bool {
        let key = RouteKey::new("", method.clone(), path);
        self.routes.iter().any(|route| key.matches_endpoint(route))
    }

    /// Distinct inbound path patterns, in declaration order.
    pub fn patterns(&self) -> Vec<&str> {
        let mut patterns: Vec<&str> = Vec::new();
        for route in &self.routes {
            if !patterns.contains(&route.path_pattern()) {
                patterns.push(route.path_pattern());
            }
        }
        patterns
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }

    /// Duplicate keys found at load time.
    pub fn duplicates(&self) -> &[DuplicateRoute] {
        &self.duplicates
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn find_duplicates(routes: &[RouteDescriptor]) -> Vec<DuplicateRoute> {
    let keys: Vec<RouteKey> = routes.iter().map(RouteKey::of).collect();
    let mut duplicates = Vec::new();
    for (duplicate, key) in keys.iter().enumerate() {
        if let Some(first) = keys[..duplicate].iter().position(|k| k == key) {
            duplicates.push(DuplicateRoute {
                first,
                duplicate,
                key: key.clone(),
            });
        }
    }
    duplicates
}
