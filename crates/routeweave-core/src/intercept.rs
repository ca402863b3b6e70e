//! Intercept definitions and the proxies they contribute to routes.

use std::collections::BTreeMap;

use routeweave_types::{Result, WeaveError};
use serde::{Deserialize, Serialize};

use crate::node::{NodeKind, ProcessingNode};
use crate::registry::DependencyLookup;

// ---------------------------------------------------------------------------
// Intercept trait
// ---------------------------------------------------------------------------

/// A cross-cutting behavior that can be woven around a route's logic.
pub trait Intercept {
    /// Identifier used in proxy nodes, reports, and errors.
    fn id(&self) -> &str;

    /// Resolve configuration that depends on the assembly context.
    fn prepare(&mut self, deps: &dyn DependencyLookup) -> Result<()>;

    /// Build a fresh proxy node. Each call returns an independent tree.
    fn create_proxy(&self) -> ProcessingNode;
}

impl<T: Intercept + ?Sized> Intercept for Box<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn prepare(&mut self, deps: &dyn DependencyLookup) -> Result<()> {
        (**self).prepare(deps)
    }

    fn create_proxy(&self) -> ProcessingNode {
        (**self).create_proxy()
    }
}

// ---------------------------------------------------------------------------
// Declarative intercept
// ---------------------------------------------------------------------------

/// A dependency an intercept needs, bound to a `${var}` placeholder.
///
/// Exactly one of `bean` (lookup by name) or `type` (lookup by type) is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub var: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bean: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub bean_type: Option<String>,
}

impl Requirement {
    pub fn by_name(var: impl Into<String>, bean: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            bean: Some(bean.into()),
            bean_type: None,
        }
    }

    pub fn by_type(var: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            var: var.into(),
            bean: None,
            bean_type: Some(type_name.into()),
        }
    }

    /// `true` when exactly one lookup form is set.
    pub fn is_well_formed(&self) -> bool {
        self.bean.is_some() != self.bean_type.is_some()
    }

    fn resolve(&self, deps: &dyn DependencyLookup) -> Result<String> {
        match (&self.bean, &self.bean_type) {
            (Some(name), None) => deps.lookup_by_name(name),
            (None, Some(type_name)) => deps.lookup_by_type(type_name),
            _ => Err(WeaveError::Other(format!(
                "requirement '{}' must set exactly one of 'bean' or 'type'",
                self.var
            ))),
        }
    }
}

/// An intercept declared as a template of processing nodes.
///
/// The template should contain a proceed marker; the weaving engine attaches
/// the wrapped route logic to the first one it finds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterceptDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Requirement>,
    #[serde(default)]
    pub outputs: Vec<ProcessingNode>,
    #[serde(skip)]
    resolved: BTreeMap<String, String>,
}

impl InterceptDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            requires: Vec::new(),
            outputs: Vec::new(),
            resolved: BTreeMap::new(),
        }
    }

    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = ProcessingNode>) -> Self {
        self.outputs.extend(outputs);
        self
    }

    pub fn with_requirement(mut self, requirement: Requirement) -> Self {
        self.requires.push(requirement);
        self
    }

    /// Dependency values resolved by the last successful `prepare()`.
    pub fn resolved(&self) -> &BTreeMap<String, String> {
        &self.resolved
    }
}

impl Intercept for InterceptDefinition {
    fn id(&self) -> &str {
        &self.id
    }

    fn prepare(&mut self, deps: &dyn DependencyLookup) -> Result<()> {
        let mut resolved = BTreeMap::new();
        for req in &self.requires {
            let value = req
                .resolve(deps)
                .map_err(|e| WeaveError::ConfigurationError {
                    intercept: self.id.clone(),
                    message: e.to_string(),
                })?;
            tracing::debug!(intercept = %self.id, var = %req.var, bean = %value, "resolved intercept dependency");
            resolved.insert(req.var.clone(), value);
        }
        self.resolved = resolved;
        Ok(())
    }

    fn create_proxy(&self) -> ProcessingNode {
        let mut outputs = self.outputs.clone();
        if !self.resolved.is_empty() {
            for node in &mut outputs {
                expand_node_variables(node, &self.resolved);
            }
        }
        ProcessingNode::proxy(self.id.clone()).with_outputs(outputs)
    }
}

fn expand_node_variables(node: &mut ProcessingNode, vars: &BTreeMap<String, String>) {
    if let NodeKind::Step { ref mut uri } = node.kind {
        let expanded = expand_variables(uri, vars);
        if expanded != *uri {
            *uri = expanded;
        }
    }
    for child in &mut node.outputs {
        expand_node_variables(child, vars);
    }
}

/// Expand `${variable}` patterns in a string.
///
/// Replaces each occurrence of `${key}` with the corresponding value from `vars`.
/// Variables that do not appear in `vars` are left as-is. The template is
/// scanned once from left to right; substituted values are never expanded
/// again.
pub fn expand_variables(template: &str, vars: &BTreeMap<String, String>) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            rest = &rest[start..];
            break;
        };
        match vars.get(&after[..end]) {
            Some(value) => {
                result.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                // Unknown key: keep the opener and rescan the template after it.
                result.push_str("${");
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}
