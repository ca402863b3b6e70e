//! Route assembly driver.
//!
//! Takes a bound [`ContextDefinition`] through validate, resolve, and weave,
//! producing routes ready to hand to an execution runtime. Context strategies
//! (see [`crate::strategy`]) are woven innermost, before the declared
//! intercepts.

use routeweave_types::{Result, WeaveError};

use crate::config::ContextDefinition;
use crate::events::{AssemblyEvent, EventEmitter};
use crate::intercept::Intercept;
use crate::registry::{BeanRegistry, DependencyLookup};
use crate::route::RouteDefinition;
use crate::strategy::discover_strategies;
use crate::validation::{validate_or_raise, Diagnostic};
use crate::weave::{WeaveReport, Weaver};

/// Routes of a context after assembly, with one report per route.
#[derive(Debug)]
pub struct AssembledContext {
    pub id: String,
    pub routes: Vec<RouteDefinition>,
    pub reports: Vec<WeaveReport>,
    /// Resolved bean name of the context error handler.
    pub error_handler: Option<String>,
    /// Non-fatal diagnostics raised during validation.
    pub diagnostics: Vec<Diagnostic>,
}

impl AssembledContext {
    pub fn route(&self, id: &str) -> Option<&RouteDefinition> {
        self.routes.iter().find(|r| r.id() == id)
    }

    pub fn report(&self, route_id: &str) -> Option<&WeaveReport> {
        self.reports.iter().find(|r| r.route_id == route_id)
    }
}

#[derive(Default)]
pub struct RouteAssembler {
    emitter: Option<EventEmitter>,
    parent: Option<BeanRegistry>,
}

impl RouteAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_emitter(mut self, emitter: EventEmitter) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Registry consulted when a dependency is not declared in the context.
    pub fn with_parent_registry(mut self, parent: BeanRegistry) -> Self {
        self.parent = Some(parent);
        self
    }

    fn emit(&self, event: AssemblyEvent) {
        if let Some(ref emitter) = self.emitter {
            emitter.emit(event);
        }
    }

    /// Assemble every route of `ctx`.
    ///
    /// The pass fails as a whole on the first route that cannot be woven; no
    /// route from a failed pass should be activated.
    pub fn assemble(&self, ctx: ContextDefinition) -> Result<AssembledContext> {
        let diagnostics = validate_or_raise(&ctx)?;
        for diag in &diagnostics {
            tracing::warn!(rule = %diag.rule, "{}", diag.message);
        }

        let clauses = ctx.exception_clause_nodes();
        let ContextDefinition {
            id,
            beans,
            intercepts,
            mut routes,
            options,
            trace,
            delay,
            error_handler,
            ..
        } = ctx;

        let mut registry = BeanRegistry::from(beans);
        if let Some(ref parent) = self.parent {
            registry = registry.with_parent(parent.clone());
        }

        let error_handler = error_handler
            .as_deref()
            .map(|name| registry.lookup_by_name(name))
            .transpose()?;
        let strategies = discover_strategies(&registry, trace, delay)?;

        assign_route_ids(&mut routes);

        tracing::info!(
            context = %id,
            routes = routes.len(),
            strategies = strategies.len(),
            intercepts = intercepts.len(),
            "assembling routes"
        );
        self.emit(AssemblyEvent::AssemblyStarted {
            context_id: id.clone(),
            route_count: routes.len(),
            intercept_count: strategies.len() + intercepts.len(),
        });

        let weaver = Weaver::new(&registry)
            .with_exception_clauses(&clauses)
            .with_options(options);

        let mut reports = Vec::with_capacity(routes.len());
        for route in &mut routes {
            // Intercepts are prepared per route, so each route gets its own copy.
            let mut route_intercepts: Vec<Box<dyn Intercept>> = strategies
                .iter()
                .cloned()
                .map(|s| Box::new(s) as Box<dyn Intercept>)
                .chain(intercepts.iter().cloned().map(|i| Box::new(i) as Box<dyn Intercept>))
                .collect();
            match weaver.weave(route, &mut route_intercepts) {
                Ok(report) => {
                    self.emit_report(&report);
                    reports.push(report);
                }
                Err(err) => {
                    tracing::error!(route = %route.id(), error = %err, "route assembly failed");
                    self.emit(AssemblyEvent::AssemblyFailed {
                        route_id: route.id().to_string(),
                        error: err.to_string(),
                    });
                    return Err(WeaveError::RouteAssembly {
                        route: route.id().to_string(),
                        source: Box::new(err),
                    });
                }
            }
        }

        self.emit(AssemblyEvent::AssemblyCompleted {
            context_id: id.clone(),
            route_count: routes.len(),
        });

        Ok(AssembledContext {
            id,
            routes,
            reports,
            error_handler,
            diagnostics,
        })
    }

    fn emit_report(&self, report: &WeaveReport) {
        for layer in &report.layers {
            self.emit(AssemblyEvent::InterceptApplied {
                route_id: report.route_id.clone(),
                intercept_id: layer.intercept.clone(),
                wrapped: layer.wrapped,
            });
            if layer.dropped > 0 {
                self.emit(AssemblyEvent::OutputsDropped {
                    route_id: report.route_id.clone(),
                    intercept_id: layer.intercept.clone(),
                    count: layer.dropped,
                });
            }
        }
        self.emit(AssemblyEvent::RouteWoven {
            route_id: report.route_id.clone(),
            exception_handlers: report.exception_handlers,
            layers: report.layers.len(),
        });
    }
}

/// Give unnamed routes a positional id (`route1`, `route2`, ...), skipping
/// ids that are already taken.
fn assign_route_ids(routes: &mut [RouteDefinition]) {
    let taken: std::collections::HashSet<String> = routes
        .iter()
        .filter(|r| !r.id.is_empty())
        .map(|r| r.id.clone())
        .collect();
    for (pos, route) in routes.iter_mut().enumerate() {
        if route.id.is_empty() {
            let mut candidate = format!("route{}", pos + 1);
            while taken.contains(&candidate) {
                candidate.push('_');
            }
            route.id = candidate;
        }
    }
}
