//! Context-wide intercepts switched on by context attributes or by
//! well-known beans in the registry.
//!
//! A context enables a strategy in one of two ways:
//! - registering exactly one bean of the strategy's reserved type
//!   ([`DEBUGGER_TYPE`], [`TRACER_TYPE`], [`DELAYER_TYPE`]);
//! - setting the `trace` or `delay` attribute of the context.
//!
//! Strategies are woven before the declared intercepts, so they sit
//! innermost, directly around the route's own logic.

use routeweave_types::{Result, WeaveError};

use crate::intercept::Intercept;
use crate::node::ProcessingNode;
use crate::registry::DependencyLookup;

pub const DEBUGGER_TYPE: &str = "routeweave:Debugger";
pub const TRACER_TYPE: &str = "routeweave:Tracer";
pub const TRACE_FORMATTER_TYPE: &str = "routeweave:TraceFormatter";
pub const DELAYER_TYPE: &str = "routeweave:Delayer";

/// A built-in intercept applied to every route of a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextStrategy {
    Debugger {
        bean: String,
    },
    Tracer {
        bean: Option<String>,
        formatter: Option<String>,
    },
    Delayer {
        bean: Option<String>,
        millis: Option<u64>,
    },
}

impl ContextStrategy {
    fn entry_step(&self) -> ProcessingNode {
        let uri = match self {
            ContextStrategy::Debugger { bean } => format!("bean:{bean}?method=breakpoint"),
            ContextStrategy::Tracer { bean, formatter } => {
                let base = match bean {
                    Some(bean) => format!("bean:{bean}?method=trace"),
                    None => "log:trace".to_string(),
                };
                match formatter {
                    Some(formatter) => {
                        let sep = if base.contains('?') { '&' } else { '?' };
                        format!("{base}{sep}formatter={formatter}")
                    }
                    None => base,
                }
            }
            ContextStrategy::Delayer { bean, millis } => match (bean, millis) {
                (Some(bean), Some(ms)) => format!("bean:{bean}?method=delay&millis={ms}"),
                (Some(bean), None) => format!("bean:{bean}?method=delay"),
                (None, Some(ms)) => format!("delay:{ms}"),
                (None, None) => "delay:0".to_string(),
            },
        };
        ProcessingNode::step(uri)
    }
}

impl Intercept for ContextStrategy {
    fn id(&self) -> &str {
        match self {
            ContextStrategy::Debugger { .. } => "debugger",
            ContextStrategy::Tracer { .. } => "tracer",
            ContextStrategy::Delayer { .. } => "delayer",
        }
    }

    /// Dependencies are resolved once by [`discover_strategies`].
    fn prepare(&mut self, _deps: &dyn DependencyLookup) -> Result<()> {
        Ok(())
    }

    fn create_proxy(&self) -> ProcessingNode {
        ProcessingNode::proxy(self.id()).with_outputs([self.entry_step(), ProcessingNode::proceed()])
    }
}

/// Look up the single bean of `type_name`; absence is not an error.
fn optional_bean(deps: &dyn DependencyLookup, strategy: &str, type_name: &str) -> Result<Option<String>> {
    match deps.lookup_by_type(type_name) {
        Ok(bean) => Ok(Some(bean)),
        Err(WeaveError::DependencyNotFound { .. }) => Ok(None),
        Err(e) => Err(WeaveError::ConfigurationError {
            intercept: strategy.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Collect the strategies a context enables, in the order debugger, tracer,
/// delayer.
///
/// `trace: Some(false)` turns the tracer off even when a tracer bean is
/// registered; `Some(true)` turns it on with the default log step when none is.
/// `delay` enables the delayer or parameterizes a registered one.
pub fn discover_strategies(
    deps: &dyn DependencyLookup,
    trace: Option<bool>,
    delay: Option<u64>,
) -> Result<Vec<ContextStrategy>> {
    let mut strategies = Vec::new();

    if let Some(bean) = optional_bean(deps, "debugger", DEBUGGER_TYPE)? {
        strategies.push(ContextStrategy::Debugger { bean });
    }

    if trace != Some(false) {
        let bean = optional_bean(deps, "tracer", TRACER_TYPE)?;
        if bean.is_some() || trace == Some(true) {
            let formatter = optional_bean(deps, "tracer", TRACE_FORMATTER_TYPE)?;
            strategies.push(ContextStrategy::Tracer { bean, formatter });
        }
    }

    let bean = optional_bean(deps, "delayer", DELAYER_TYPE)?;
    if bean.is_some() || delay.is_some() {
        strategies.push(ContextStrategy::Delayer { bean, millis: delay });
    }

    for strategy in &strategies {
        tracing::debug!(strategy = strategy.id(), "context strategy enabled");
    }
    Ok(strategies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BeanRegistry;

    #[test]
    fn nothing_registered_enables_nothing() {
        assert!(discover_strategies(&BeanRegistry::new(), None, None).unwrap().is_empty());
    }

    #[test]
    fn beans_enable_strategies_in_fixed_order() {
        let mut reg = BeanRegistry::new();
        reg.register("slow", DELAYER_TYPE);
        reg.register("tracer", TRACER_TYPE);
        reg.register("fmt", TRACE_FORMATTER_TYPE);
        reg.register("dbg", DEBUGGER_TYPE);

        let strategies = discover_strategies(&reg, None, None).unwrap();
        let ids: Vec<&str> = strategies.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec!["debugger", "tracer", "delayer"]);
        assert_eq!(
            strategies[1],
            ContextStrategy::Tracer {
                bean: Some("tracer".into()),
                formatter: Some("fmt".into()),
            }
        );
    }

    #[test]
    fn attributes_enable_defaults() {
        let strategies = discover_strategies(&BeanRegistry::new(), Some(true), Some(250)).unwrap();
        let steps: Vec<String> = strategies
            .iter()
            .map(|s| s.create_proxy().outputs[0].to_string())
            .collect();
        assert_eq!(steps, vec!["to(log:trace)", "to(delay:250)"]);
    }

    #[test]
    fn trace_false_overrides_tracer_bean() {
        let mut reg = BeanRegistry::new();
        reg.register("tracer", TRACER_TYPE);
        assert!(discover_strategies(&reg, Some(false), None).unwrap().is_empty());
    }

    #[test]
    fn delay_parameterizes_registered_delayer() {
        let mut reg = BeanRegistry::new();
        reg.register("slow", DELAYER_TYPE);
        let strategies = discover_strategies(&reg, None, Some(10)).unwrap();
        assert_eq!(
            strategies[0].create_proxy().outputs[0],
            ProcessingNode::step("bean:slow?method=delay&millis=10")
        );
    }

    #[test]
    fn formatter_without_tracer_bean_goes_on_default_step() {
        let mut reg = BeanRegistry::new();
        reg.register("fmt", TRACE_FORMATTER_TYPE);
        let strategies = discover_strategies(&reg, Some(true), None).unwrap();
        assert_eq!(
            strategies[0].create_proxy().outputs[0],
            ProcessingNode::step("log:trace?formatter=fmt")
        );
    }

    #[test]
    fn ambiguous_strategy_bean_is_a_configuration_error() {
        let mut reg = BeanRegistry::new();
        reg.register("a", TRACER_TYPE);
        reg.register("b", TRACER_TYPE);
        let err = discover_strategies(&reg, None, None).unwrap_err();
        assert!(matches!(err, WeaveError::ConfigurationError { ref intercept, .. } if intercept == "tracer"));
    }

    #[test]
    fn strategy_proxy_has_proceed_marker() {
        let proxy = ContextStrategy::Debugger { bean: "dbg".into() }.create_proxy();
        assert!(proxy.outputs[1].is_proceed());
    }
}
