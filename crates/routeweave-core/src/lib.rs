//! Route assembly engine: node model, intercept weaving, validation, and
//! the assembly driver.
//!
//! This crate turns declared routes into their assembled form: exception
//! clauses are hoisted to the front of every route and intercepts are nested
//! around the route's own logic, each continuing into the wrapped logic at its
//! proceed marker.

pub mod assembly;
pub mod config;
pub mod events;
pub mod intercept;
pub mod node;
pub mod registry;
pub mod render;
pub mod route;
pub mod strategy;
pub mod validation;
pub mod weave;

pub use assembly::{AssembledContext, RouteAssembler};
pub use config::{load_context, parse_context, ContextDefinition, ExceptionClauseDefinition};
pub use events::{AssemblyEvent, EventEmitter};
pub use intercept::{expand_variables, Intercept, InterceptDefinition, Requirement};
pub use node::{count_proceeds, find_first_proceed, NodeKind, ProcessingNode};
pub use registry::{BeanRegistry, DependencyLookup};
pub use render::render_route;
pub use route::{BlockStack, NodePath, RouteDefinition};
pub use strategy::{discover_strategies, ContextStrategy};
pub use validation::{validate, validate_or_raise, Diagnostic, LintRule, Severity};
pub use weave::{LayerReport, MissingProceedPolicy, WeaveOptions, WeaveReport, Weaver};
