//! Shared error taxonomy for the routeweave route assembly engine.
//!
//! This crate provides the foundational types used across the other routeweave crates:
//! - `WeaveError`: unified error taxonomy
//! - `Result`: convenience alias over `WeaveError`

/// Unified error type for route assembly and weaving.
#[derive(Debug, thiserror::Error)]
pub enum WeaveError {
    // === Intercept Errors ===
    #[error("Intercept '{intercept}' could not be prepared: {message}")]
    ConfigurationError { intercept: String, message: String },

    #[error(
        "Proxy for intercept '{intercept}' on route '{route}' has no proceed marker; \
         the wrapped outputs would be unreachable"
    )]
    MissingProceed { route: String, intercept: String },

    // === Dependency Lookup Errors ===
    #[error("No bean found for {lookup}")]
    DependencyNotFound { lookup: String },

    #[error("Ambiguous lookup for type '{type_name}': {} candidates ({})", .candidates.len(), .candidates.join(", "))]
    AmbiguousDependency {
        type_name: String,
        candidates: Vec<String>,
    },

    // === Route Errors ===
    #[error("Route definition validation failed: {0}")]
    ValidationError(String),

    #[error("Node path {path:?} does not resolve on route '{route}'")]
    InvalidNodePath { route: String, path: Vec<usize> },

    #[error("Route '{route}' failed to assemble: {source}")]
    RouteAssembly {
        route: String,
        #[source]
        source: Box<WeaveError>,
    },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl WeaveError {
    /// Returns `true` if the error stems from the declared configuration, so
    /// repeating the assembly pass unchanged fails the same way.
    pub fn is_terminal(&self) -> bool {
        match self {
            WeaveError::ConfigurationError { .. }
            | WeaveError::MissingProceed { .. }
            | WeaveError::DependencyNotFound { .. }
            | WeaveError::AmbiguousDependency { .. }
            | WeaveError::ValidationError(_)
            | WeaveError::InvalidNodePath { .. } => true,
            WeaveError::RouteAssembly { source, .. } => source.is_terminal(),
            WeaveError::Io(_) | WeaveError::Json(_) | WeaveError::Other(_) => false,
        }
    }

    /// The route an assembly failure belongs to, if any.
    pub fn route(&self) -> Option<&str> {
        match self {
            WeaveError::MissingProceed { route, .. }
            | WeaveError::InvalidNodePath { route, .. }
            | WeaveError::RouteAssembly { route, .. } => Some(route),
            _ => None,
        }
    }
}

/// A convenience alias for `Result<T, WeaveError>`.
pub type Result<T> = std::result::Result<T, WeaveError>;
