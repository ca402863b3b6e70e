//! Context validation: lint rules and diagnostics.
//!
//! Checks a [`ContextDefinition`] before assembly. Call [`validate`] for
//! advisory diagnostics or [`validate_or_raise`] to fail on the first
//! `Error`-severity issue.

use std::collections::HashSet;

use routeweave_types::{Result, WeaveError};

use crate::config::ContextDefinition;
use crate::node::{count_proceeds, NodeKind, ProcessingNode};
use crate::weave::MissingProceedPolicy;

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub route_id: Option<String>,
    pub intercept_id: Option<String>,
    pub fix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Diagnostic {
    fn new(rule: &str, severity: Severity, message: String) -> Self {
        Self {
            rule: rule.into(),
            severity,
            message,
            route_id: None,
            intercept_id: None,
            fix: None,
        }
    }

    fn on_route(mut self, route_id: &str) -> Self {
        self.route_id = Some(route_id.into());
        self
    }

    fn on_intercept(mut self, intercept_id: &str) -> Self {
        self.intercept_id = Some(intercept_id.into());
        self
    }

    fn with_fix(mut self, fix: &str) -> Self {
        self.fix = Some(fix.into());
        self
    }
}

// ---------------------------------------------------------------------------
// LintRule trait
// ---------------------------------------------------------------------------

pub trait LintRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, ctx: &ContextDefinition) -> Vec<Diagnostic>;
}

fn all_nodes(nodes: &[ProcessingNode]) -> impl Iterator<Item = &ProcessingNode> {
    nodes.iter().flat_map(ProcessingNode::descendants)
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct ProceedMarkerRule;
impl LintRule for ProceedMarkerRule {
    fn name(&self) -> &str { "proceed_marker" }
    fn apply(&self, ctx: &ContextDefinition) -> Vec<Diagnostic> {
        let severity = match ctx.options.missing_proceed {
            MissingProceedPolicy::Reject => Severity::Error,
            MissingProceedPolicy::Drop => Severity::Warning,
        };
        ctx.intercepts
            .iter()
            .filter(|i| count_proceeds(&i.outputs) == 0)
            .map(|i| {
                Diagnostic::new(
                    self.name(),
                    severity,
                    format!(
                        "Intercept '{}' has no proceed marker; the routes it wraps would be lost",
                        i.id
                    ),
                )
                .on_intercept(&i.id)
                .with_fix("Add a {\"kind\": \"proceed\"} node where the wrapped route should continue")
            })
            .collect()
    }
}

struct SingleProceedRule;
impl LintRule for SingleProceedRule {
    fn name(&self) -> &str { "single_proceed" }
    fn apply(&self, ctx: &ContextDefinition) -> Vec<Diagnostic> {
        ctx.intercepts
            .iter()
            .filter_map(|i| {
                let count = count_proceeds(&i.outputs);
                (count > 1).then(|| {
                    Diagnostic::new(
                        self.name(),
                        Severity::Warning,
                        format!(
                            "Intercept '{}' has {} proceed markers; only the first one continues into the route",
                            i.id, count
                        ),
                    )
                    .on_intercept(&i.id)
                })
            })
            .collect()
    }
}

struct ProceedPlacementRule;
impl LintRule for ProceedPlacementRule {
    fn name(&self) -> &str { "proceed_placement" }
    fn apply(&self, ctx: &ContextDefinition) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for route in &ctx.routes {
            if all_nodes(route.outputs()).any(ProcessingNode::is_proceed) {
                diags.push(
                    Diagnostic::new(
                        self.name(),
                        Severity::Warning,
                        format!("Route '{}' declares a proceed marker outside any intercept", route.id()),
                    )
                    .on_route(route.id()),
                );
            }
        }
        for clause in &ctx.on_exception {
            if all_nodes(&clause.outputs).any(ProcessingNode::is_proceed) {
                diags.push(Diagnostic::new(
                    self.name(),
                    Severity::Warning,
                    format!(
                        "Exception clause for [{}] declares a proceed marker",
                        clause.exceptions.join(", ")
                    ),
                ));
            }
        }
        for intercept in &ctx.intercepts {
            if all_nodes(&intercept.outputs).any(|n| n.is_proceed() && !n.outputs.is_empty()) {
                diags.push(
                    Diagnostic::new(
                        self.name(),
                        Severity::Info,
                        format!(
                            "Intercept '{}' declares outputs inside its proceed marker; they run before the wrapped route",
                            intercept.id
                        ),
                    )
                    .on_intercept(&intercept.id),
                );
            }
        }
        diags
    }
}

struct DeclaredProxyRule;
impl LintRule for DeclaredProxyRule {
    fn name(&self) -> &str { "declared_proxy" }
    fn apply(&self, ctx: &ContextDefinition) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for route in &ctx.routes {
            if all_nodes(route.outputs()).any(ProcessingNode::is_proxy) {
                diags.push(
                    Diagnostic::new(
                        self.name(),
                        Severity::Error,
                        format!("Route '{}' declares a proxy node directly", route.id()),
                    )
                    .on_route(route.id())
                    .with_fix("Declare an intercept instead; proxies are created during assembly"),
                );
            }
        }
        for intercept in &ctx.intercepts {
            if all_nodes(&intercept.outputs).any(ProcessingNode::is_proxy) {
                diags.push(
                    Diagnostic::new(
                        self.name(),
                        Severity::Error,
                        format!("Intercept '{}' declares a proxy node directly", intercept.id),
                    )
                    .on_intercept(&intercept.id),
                );
            }
        }
        diags
    }
}

struct DuplicateRouteIdRule;
impl LintRule for DuplicateRouteIdRule {
    fn name(&self) -> &str { "duplicate_route_id" }
    fn apply(&self, ctx: &ContextDefinition) -> Vec<Diagnostic> {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        let mut diags = Vec::new();
        for route in ctx.routes.iter().filter(|r| !r.id().is_empty()) {
            if !seen.insert(route.id()) && reported.insert(route.id()) {
                diags.push(
                    Diagnostic::new(
                        self.name(),
                        Severity::Error,
                        format!("Route id '{}' is declared more than once", route.id()),
                    )
                    .on_route(route.id()),
                );
            }
        }
        diags
    }
}

struct DuplicateInterceptIdRule;
impl LintRule for DuplicateInterceptIdRule {
    fn name(&self) -> &str { "duplicate_intercept_id" }
    fn apply(&self, ctx: &ContextDefinition) -> Vec<Diagnostic> {
        let mut seen = HashSet::new();
        ctx.intercepts
            .iter()
            .filter(|i| !seen.insert(i.id.as_str()))
            .map(|i| {
                Diagnostic::new(
                    self.name(),
                    Severity::Warning,
                    format!("Intercept id '{}' is declared more than once", i.id),
                )
                .on_intercept(&i.id)
            })
            .collect()
    }
}

struct ExceptionTypesRule;
impl LintRule for ExceptionTypesRule {
    fn name(&self) -> &str { "exception_types" }
    fn apply(&self, ctx: &ContextDefinition) -> Vec<Diagnostic> {
        let declared = ctx.on_exception.iter().map(|c| c.exceptions.is_empty());
        let in_routes = ctx.routes.iter().flat_map(|r| {
            all_nodes(r.outputs()).filter_map(|n| match n.kind {
                NodeKind::OnException { ref exceptions, .. } => Some(exceptions.is_empty()),
                _ => None,
            })
        });
        let empty = declared.chain(in_routes).filter(|empty| *empty).count();
        if empty == 0 {
            return vec![];
        }
        vec![Diagnostic::new(
            self.name(),
            Severity::Error,
            format!("{empty} exception clause(s) name no exception types"),
        )
        .with_fix("List at least one exception type in \"exceptions\"")]
    }
}

struct RequirementShapeRule;
impl LintRule for RequirementShapeRule {
    fn name(&self) -> &str { "requirement_shape" }
    fn apply(&self, ctx: &ContextDefinition) -> Vec<Diagnostic> {
        ctx.intercepts
            .iter()
            .flat_map(|i| {
                i.requires.iter().filter(|r| !r.is_well_formed()).map(move |r| {
                    Diagnostic::new(
                        self.name(),
                        Severity::Error,
                        format!(
                            "Requirement '{}' of intercept '{}' must set exactly one of 'bean' or 'type'",
                            r.var, i.id
                        ),
                    )
                    .on_intercept(&i.id)
                })
            })
            .collect()
    }
}

struct EmptyRouteRule;
impl LintRule for EmptyRouteRule {
    fn name(&self) -> &str { "empty_route" }
    fn apply(&self, ctx: &ContextDefinition) -> Vec<Diagnostic> {
        ctx.routes
            .iter()
            .enumerate()
            .filter(|(_, r)| r.outputs().is_empty())
            .map(|(pos, r)| {
                let name = if r.id().is_empty() {
                    format!("#{}", pos + 1)
                } else {
                    r.id().to_string()
                };
                let diag = Diagnostic::new(
                    self.name(),
                    Severity::Warning,
                    format!("Route '{name}' has no outputs"),
                );
                if r.id().is_empty() { diag } else { diag.on_route(r.id()) }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

fn built_in_rules() -> Vec<Box<dyn LintRule>> {
    vec![
        Box::new(ProceedMarkerRule),
        Box::new(SingleProceedRule),
        Box::new(ProceedPlacementRule),
        Box::new(DeclaredProxyRule),
        Box::new(DuplicateRouteIdRule),
        Box::new(DuplicateInterceptIdRule),
        Box::new(ExceptionTypesRule),
        Box::new(RequirementShapeRule),
        Box::new(EmptyRouteRule),
    ]
}

/// Run all built-in lint rules and return every diagnostic.
pub fn validate(ctx: &ContextDefinition) -> Vec<Diagnostic> {
    built_in_rules()
        .iter()
        .flat_map(|rule| rule.apply(ctx))
        .collect()
}

/// Run all rules; fail with `ValidationError` on the first `Error` diagnostic.
pub fn validate_or_raise(ctx: &ContextDefinition) -> Result<Vec<Diagnostic>> {
    let diagnostics = validate(ctx);
    if let Some(err) = diagnostics.iter().find(|d| d.severity == Severity::Error) {
        return Err(WeaveError::ValidationError(format!(
            "[{}] {}",
            err.rule, err.message
        )));
    }
    Ok(diagnostics)
}
