//! The weaving engine: merges exception clauses into a route and nests
//! intercept proxies around the route's original logic.
//!
//! Weaving is a fold over the intercepts. The accumulator starts as the
//! route's non-exception outputs; each intercept contributes a proxy whose
//! first proceed marker receives the accumulator, and the proxy becomes the
//! new accumulator. The last intercept therefore ends up outermost. Exception
//! clauses never take part in the fold and stay at the front of the route.

use routeweave_types::{Result, WeaveError};
use serde::{Deserialize, Serialize};

use crate::intercept::Intercept;
use crate::node::{find_first_proceed, resolve_mut, ProcessingNode};
use crate::registry::DependencyLookup;
use crate::route::{BlockStack, NodePath, RouteDefinition};

// ---------------------------------------------------------------------------
// Options and report
// ---------------------------------------------------------------------------

/// What to do when a proxy has no reachable proceed marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingProceedPolicy {
    /// Fail the weave with [`WeaveError::MissingProceed`].
    #[default]
    Reject,
    /// Attach the wrapped outputs nowhere. They become unreachable.
    Drop,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaveOptions {
    #[serde(default)]
    pub missing_proceed: MissingProceedPolicy,
}

impl WeaveOptions {
    pub fn lenient() -> Self {
        Self {
            missing_proceed: MissingProceedPolicy::Drop,
        }
    }
}

/// One applied intercept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerReport {
    pub intercept: String,
    /// Path of the proceed marker relative to the proxy's own outputs.
    pub proceed: Option<NodePath>,
    /// Number of nodes the proxy wrapped.
    pub wrapped: usize,
    /// Number of nodes lost because the proxy had no proceed marker.
    pub dropped: usize,
}

/// Summary of a weave over one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaveReport {
    pub route_id: String,
    pub exception_handlers: usize,
    pub layers: Vec<LayerReport>,
    /// Proceed markers of the reachable proxies, innermost at the bottom.
    pub blocks: BlockStack,
}

impl WeaveReport {
    pub fn dropped(&self) -> usize {
        self.layers.iter().map(|l| l.dropped).sum()
    }
}

// ---------------------------------------------------------------------------
// Weaver
// ---------------------------------------------------------------------------

pub struct Weaver<'a> {
    deps: &'a dyn DependencyLookup,
    exception_clauses: &'a [ProcessingNode],
    options: WeaveOptions,
}

impl<'a> Weaver<'a> {
    pub fn new(deps: &'a dyn DependencyLookup) -> Self {
        Self {
            deps,
            exception_clauses: &[],
            options: WeaveOptions::default(),
        }
    }

    /// Exception clauses merged into every woven route. Each route receives
    /// its own copy.
    pub fn with_exception_clauses(mut self, clauses: &'a [ProcessingNode]) -> Self {
        self.exception_clauses = clauses;
        self
    }

    pub fn with_options(mut self, options: WeaveOptions) -> Self {
        self.options = options;
        self
    }

    /// Weave `intercepts` around `route`, in declaration order.
    ///
    /// Not idempotent: weaving an already woven route wraps the existing
    /// proxy chain again. On failure the route keeps its exception handlers
    /// and every layer applied before the failing intercept; use
    /// [`Weaver::weave_partial`] to get the report for that state.
    pub fn weave<I: Intercept>(
        &self,
        route: &mut RouteDefinition,
        intercepts: &mut [I],
    ) -> Result<WeaveReport> {
        let (report, outcome) = self.weave_partial(route, intercepts);
        outcome.map(|()| report)
    }

    /// Like [`Weaver::weave`], but the report is returned on failure as well.
    ///
    /// After a failure the report lists the layers applied before the failing
    /// intercept, and its `blocks` resolve on the partially woven route.
    pub fn weave_partial<I: Intercept>(
        &self,
        route: &mut RouteDefinition,
        intercepts: &mut [I],
    ) -> (WeaveReport, Result<()>) {
        route.add_outputs(self.exception_clauses.iter().cloned());

        let (handlers, mut wrapped): (Vec<_>, Vec<_>) = route
            .take_outputs()
            .into_iter()
            .partition(ProcessingNode::is_exception_clause);

        let mut report = WeaveReport {
            route_id: route.id().to_string(),
            exception_handlers: handlers.len(),
            layers: Vec::with_capacity(intercepts.len()),
            blocks: BlockStack::new(),
        };
        // Offset inside each proceed marker at which the wrapped nodes start.
        let mut offsets = Vec::with_capacity(intercepts.len());
        let mut failure = None;

        for intercept in intercepts.iter_mut() {
            match self.wrap_layer(route.id(), intercept, wrapped) {
                Ok((proxy, layer, offset)) => {
                    tracing::debug!(
                        route = %report.route_id,
                        intercept = %layer.intercept,
                        wrapped = layer.wrapped,
                        "applied intercept"
                    );
                    if layer.dropped > 0 {
                        tracing::warn!(
                            route = %report.route_id,
                            intercept = %layer.intercept,
                            dropped = layer.dropped,
                            "intercept has no proceed marker; wrapped outputs dropped"
                        );
                    }
                    report.layers.push(layer);
                    offsets.push(offset);
                    wrapped = vec![proxy];
                }
                Err((err, restored)) => {
                    failure = Some(err);
                    wrapped = restored;
                    break;
                }
            }
        }

        route.add_outputs(handlers);
        route.add_outputs(wrapped);
        report.blocks = insertion_points(report.exception_handlers, &report.layers, &offsets);

        match failure {
            Some(err) => {
                tracing::warn!(
                    route = %report.route_id,
                    applied = report.layers.len(),
                    error = %err,
                    "weave aborted"
                );
                (report, Err(err))
            }
            None => (report, Ok(())),
        }
    }

    /// One step of the fold: prepare the intercept, create its proxy, and
    /// attach `wrapped` to the proxy's first proceed marker.
    ///
    /// On failure `wrapped` is handed back untouched.
    fn wrap_layer<I: Intercept>(
        &self,
        route_id: &str,
        intercept: &mut I,
        wrapped: Vec<ProcessingNode>,
    ) -> std::result::Result<(ProcessingNode, LayerReport, usize), (WeaveError, Vec<ProcessingNode>)>
    {
        if let Err(err) = intercept.prepare(self.deps) {
            return Err((err, wrapped));
        }
        let mut proxy = intercept.create_proxy();
        let proceed = find_first_proceed(&proxy.outputs);

        let mut layer = LayerReport {
            intercept: intercept.id().to_string(),
            proceed: proceed.clone(),
            wrapped: wrapped.len(),
            dropped: 0,
        };

        let marker = proceed
            .as_ref()
            .and_then(|path| resolve_mut(&mut proxy.outputs, path.indices()));
        let offset = match marker {
            Some(marker) => {
                let offset = marker.outputs.len();
                marker.outputs.extend(wrapped);
                offset
            }
            None => match self.options.missing_proceed {
                MissingProceedPolicy::Reject => {
                    let err = WeaveError::MissingProceed {
                        route: route_id.to_string(),
                        intercept: layer.intercept,
                    };
                    return Err((err, wrapped));
                }
                MissingProceedPolicy::Drop => {
                    layer.dropped = wrapped.len();
                    0
                }
            },
        };

        Ok((proxy, layer, offset))
    }
}

/// Resolve each layer's proceed marker to a path in the final route.
///
/// The outermost proxy sits right after the exception handlers; every inner
/// proxy sits inside the proceed marker of the layer around it. Layers below a
/// proxy without a proceed marker are unreachable and contribute no entry.
fn insertion_points(handlers: usize, layers: &[LayerReport], offsets: &[usize]) -> BlockStack {
    let mut paths = Vec::with_capacity(layers.len());
    let mut container = NodePath::from(vec![handlers]);

    for (layer, offset) in layers.iter().zip(offsets).rev() {
        let Some(ref proceed) = layer.proceed else {
            break;
        };
        let marker = container.join(proceed);
        container = marker.child(*offset);
        paths.push(marker);
    }

    let mut blocks = BlockStack::new();
    for path in paths.into_iter().rev() {
        blocks.push(path);
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intercept::InterceptDefinition;
    use crate::node::NodeKind;
    use crate::registry::BeanRegistry;

    fn intercept(id: &str) -> InterceptDefinition {
        InterceptDefinition::new(id).with_outputs([
            ProcessingNode::step(format!("log:{id}")),
            ProcessingNode::proceed(),
        ])
    }

    fn route() -> RouteDefinition {
        RouteDefinition::new("r").with_outputs([
            ProcessingNode::step("direct:a"),
            ProcessingNode::step("direct:b"),
        ])
    }

    #[test]
    fn single_layer_wraps_outputs() {
        let deps = BeanRegistry::new();
        let mut r = route();
        let report = Weaver::new(&deps).weave(&mut r, &mut [intercept("a")]).unwrap();

        assert_eq!(r.outputs().len(), 1);
        let proxy = &r.outputs()[0];
        assert_eq!(proxy.kind, NodeKind::Proxy { intercept: "a".into() });
        assert_eq!(
            proxy.outputs[1].outputs,
            vec![ProcessingNode::step("direct:a"), ProcessingNode::step("direct:b")]
        );
        assert_eq!(report.layers.len(), 1);
        assert_eq!(report.layers[0].wrapped, 2);
        assert_eq!(report.blocks.current(), Some(&NodePath::from(vec![0, 1])));
    }

    #[test]
    fn blocks_resolve_to_proceed_markers() {
        let deps = BeanRegistry::new();
        let clauses = [ProcessingNode::on_exception(["IoError"], true)];
        let mut r = route();
        let report = Weaver::new(&deps)
            .with_exception_clauses(&clauses)
            .weave(&mut r, &mut [intercept("a"), intercept("b"), intercept("c")])
            .unwrap();

        assert_eq!(report.blocks.len(), 3);
        for path in report.blocks.iter() {
            assert!(r.node_at(path).unwrap().is_proceed(), "{path} is not a proceed marker");
        }
        // Outermost first on top: c sits after the single handler.
        assert_eq!(report.blocks.current(), Some(&NodePath::from(vec![1, 1])));
        assert_eq!(
            report.blocks.iter().next(),
            Some(&NodePath::from(vec![1, 1, 0, 1, 0, 1]))
        );
    }

    #[test]
    fn blocks_account_for_declared_proceed_outputs() {
        let deps = BeanRegistry::new();
        let seeded = InterceptDefinition::new("seeded").with_outputs([ProcessingNode::proceed()
            .with_outputs([ProcessingNode::step("log:first")])]);
        let mut intercepts: Vec<Box<dyn Intercept>> =
            vec![Box::new(intercept("inner")), Box::new(seeded)];
        let mut r = route();
        let report = Weaver::new(&deps).weave(&mut r, &mut intercepts).unwrap();

        // Inner proxy lands after the pre-declared step inside the outer proceed.
        let inner_marker = report.blocks.iter().next().unwrap();
        assert_eq!(inner_marker, &NodePath::from(vec![0, 0, 1, 1]));
        assert!(r.node_at(inner_marker).unwrap().is_proceed());
    }

    #[test]
    fn reject_policy_keeps_previous_layers() {
        let deps = BeanRegistry::new();
        let no_proceed = InterceptDefinition::new("broken")
            .with_outputs([ProcessingNode::step("log:broken")]);
        let mut intercepts: Vec<Box<dyn Intercept>> =
            vec![Box::new(intercept("a")), Box::new(no_proceed)];
        let mut r = route();
        let err = Weaver::new(&deps).weave(&mut r, &mut intercepts).unwrap_err();

        assert!(matches!(err, WeaveError::MissingProceed { ref intercept, .. } if intercept == "broken"));
        assert_eq!(r.outputs().len(), 1);
        assert_eq!(r.outputs()[0].kind, NodeKind::Proxy { intercept: "a".into() });
        assert_eq!(r.outputs()[0].outputs[1].outputs.len(), 2);
    }

    #[test]
    fn partial_report_resolves_on_failed_route() {
        let deps = BeanRegistry::new();
        let clauses = [ProcessingNode::on_exception(["IoError"], true)];
        let no_proceed = InterceptDefinition::new("broken")
            .with_outputs([ProcessingNode::step("log:broken")]);
        let mut intercepts: Vec<Box<dyn Intercept>> = vec![
            Box::new(intercept("a")),
            Box::new(intercept("b")),
            Box::new(no_proceed),
        ];
        let mut r = route();
        let (report, outcome) = Weaver::new(&deps)
            .with_exception_clauses(&clauses)
            .weave_partial(&mut r, &mut intercepts);

        assert!(matches!(outcome, Err(WeaveError::MissingProceed { .. })));
        let applied: Vec<&str> = report.layers.iter().map(|l| l.intercept.as_str()).collect();
        assert_eq!(applied, vec!["a", "b"]);
        assert_eq!(report.blocks.len(), 2);
        assert_eq!(report.blocks.current(), Some(&NodePath::from(vec![1, 1])));
        for path in report.blocks.iter() {
            assert!(r.node_at(path).unwrap().is_proceed(), "{path} is not a proceed marker");
        }
    }

    #[test]
    fn drop_policy_reports_lost_outputs() {
        let deps = BeanRegistry::new();
        let mut r = route();
        let mut intercepts = [InterceptDefinition::new("mute").with_outputs([ProcessingNode::step("log:x")])];
        let report = Weaver::new(&deps)
            .with_options(WeaveOptions::lenient())
            .weave(&mut r, &mut intercepts)
            .unwrap();

        assert_eq!(report.dropped(), 2);
        assert!(report.blocks.is_empty());
    }

    #[test]
    fn exception_clauses_are_cloned_per_route() {
        let deps = BeanRegistry::new();
        let clauses = [ProcessingNode::on_exception(["IoError"], false)];
        let weaver = Weaver::new(&deps).with_exception_clauses(&clauses);
        let mut first = route();
        let mut second = route();
        weaver.weave(&mut first, &mut [intercept("a")]).unwrap();
        weaver.weave(&mut second, &mut [intercept("a")]).unwrap();

        first.outputs_mut()[0].outputs.push(ProcessingNode::step("log:only-first"));
        assert!(second.outputs()[0].outputs.is_empty());
        assert!(clauses[0].outputs.is_empty());
    }
}
