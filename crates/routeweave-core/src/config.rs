//! Declarative context definition, bound from JSON.
//!
//! A context file declares beans, context-scoped exception clauses and
//! intercepts, and the routes they apply to:
//!
//! ```json
//! {
//!   "id": "orders",
//!   "beans": { "myTracer": "Tracer" },
//!   "on_exception": [{ "exceptions": ["IoError"], "handled": true,
//!                      "outputs": [{ "kind": "step", "uri": "log:error" }] }],
//!   "intercepts": [{ "id": "trace",
//!                    "requires": [{ "var": "tracer", "type": "Tracer" }],
//!                    "outputs": [{ "kind": "step", "uri": "bean:${tracer}" },
//!                                { "kind": "proceed" }] }],
//!   "routes": [{ "id": "in", "outputs": [{ "kind": "step", "uri": "direct:in" }] }]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use routeweave_types::Result;
use serde::{Deserialize, Serialize};

use crate::intercept::InterceptDefinition;
use crate::node::{NodeKind, ProcessingNode};
use crate::route::RouteDefinition;
use crate::weave::WeaveOptions;

fn default_context_id() -> String {
    "routeweave".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextDefinition {
    #[serde(default = "default_context_id")]
    pub id: String,
    /// Bean name to bean type.
    #[serde(default)]
    pub beans: BTreeMap<String, String>,
    #[serde(default)]
    pub on_exception: Vec<ExceptionClauseDefinition>,
    #[serde(default)]
    pub intercepts: Vec<InterceptDefinition>,
    #[serde(default)]
    pub routes: Vec<RouteDefinition>,
    #[serde(default)]
    pub options: WeaveOptions,
    /// Force the context tracer on or off; see [`crate::strategy`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<bool>,
    /// Delay in milliseconds applied by the context delayer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
    /// Name of the bean handling errors no exception clause catches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_handler: Option<String>,
}

impl Default for ContextDefinition {
    fn default() -> Self {
        Self {
            id: default_context_id(),
            beans: BTreeMap::new(),
            on_exception: Vec::new(),
            intercepts: Vec::new(),
            routes: Vec::new(),
            options: WeaveOptions::default(),
            trace: None,
            delay: None,
            error_handler: None,
        }
    }
}

impl ContextDefinition {
    /// The context-scoped exception clauses as processing nodes.
    pub fn exception_clause_nodes(&self) -> Vec<ProcessingNode> {
        self.on_exception
            .iter()
            .cloned()
            .map(ExceptionClauseDefinition::into_node)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionClauseDefinition {
    pub exceptions: Vec<String>,
    #[serde(default)]
    pub handled: bool,
    #[serde(default)]
    pub outputs: Vec<ProcessingNode>,
}

impl ExceptionClauseDefinition {
    pub fn into_node(self) -> ProcessingNode {
        ProcessingNode::new(NodeKind::OnException {
            exceptions: self.exceptions,
            handled: self.handled,
        })
        .with_outputs(self.outputs)
    }
}

pub fn parse_context(source: &str) -> Result<ContextDefinition> {
    Ok(serde_json::from_str(source)?)
}

pub fn load_context(path: &Path) -> Result<ContextDefinition> {
    let source = std::fs::read_to_string(path)?;
    let context = parse_context(&source)?;
    tracing::debug!(
        path = %path.display(),
        routes = context.routes.len(),
        intercepts = context.intercepts.len(),
        "loaded context definition"
    );
    Ok(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weave::MissingProceedPolicy;
    use routeweave_types::WeaveError;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "id": "orders",
        "beans": { "myTracer": "Tracer" },
        "on_exception": [{ "exceptions": ["IoError"], "handled": true,
                           "outputs": [{ "kind": "step", "uri": "log:error" }] }],
        "intercepts": [{ "id": "trace",
                         "requires": [{ "var": "tracer", "type": "Tracer" }],
                         "outputs": [{ "kind": "step", "uri": "bean:${tracer}" },
                                     { "kind": "proceed" }] }],
        "routes": [{ "id": "in", "outputs": [{ "kind": "step", "uri": "direct:in" }] }],
        "options": { "missing_proceed": "drop" }
    }"#;

    #[test]
    fn parse_full_context() {
        let ctx = parse_context(SAMPLE).unwrap();
        assert_eq!(ctx.id, "orders");
        assert_eq!(ctx.beans.get("myTracer").map(String::as_str), Some("Tracer"));
        assert_eq!(ctx.intercepts[0].id, "trace");
        assert_eq!(ctx.intercepts[0].outputs.len(), 2);
        assert_eq!(ctx.routes[0].id(), "in");
        assert_eq!(ctx.options.missing_proceed, MissingProceedPolicy::Drop);

        let clauses = ctx.exception_clause_nodes();
        assert_eq!(clauses.len(), 1);
        assert!(clauses[0].is_exception_clause());
        assert_eq!(clauses[0].outputs, vec![ProcessingNode::step("log:error")]);
    }

    #[test]
    fn defaults_for_empty_document() {
        let ctx = parse_context("{}").unwrap();
        assert_eq!(ctx.id, "routeweave");
        assert!(ctx.routes.is_empty());
        assert_eq!(ctx.options.missing_proceed, MissingProceedPolicy::Reject);
        assert_eq!(ctx.trace, None);
        assert_eq!(ctx.error_handler, None);
    }

    #[test]
    fn parse_context_attributes() {
        let ctx = parse_context(r#"{"trace": true, "delay": 200, "error_handler": "deadLetter"}"#).unwrap();
        assert_eq!(ctx.trace, Some(true));
        assert_eq!(ctx.delay, Some(200));
        assert_eq!(ctx.error_handler.as_deref(), Some("deadLetter"));
    }

    #[test]
    fn malformed_json_is_json_error() {
        assert!(matches!(parse_context("{ nope"), Err(WeaveError::Json(_))));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let ctx = load_context(file.path()).unwrap();
        assert_eq!(ctx.routes.len(), 1);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_context(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, WeaveError::Io(_)));
    }
}
