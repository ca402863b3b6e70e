//! Dependency lookup used by intercepts while they are prepared.

use std::collections::BTreeMap;

use routeweave_types::{Result, WeaveError};

/// Resolves named or typed dependencies to a single bean name.
pub trait DependencyLookup {
    fn lookup_by_name(&self, name: &str) -> Result<String>;

    /// Resolve the single bean of `type_name`. Zero or several candidates are errors.
    fn lookup_by_type(&self, type_name: &str) -> Result<String>;
}

/// In-memory bean registry: bean name to bean type, with an optional parent.
///
/// Type lookups that find nothing locally fall back to the parent. Several
/// local candidates fail without consulting the parent.
#[derive(Debug, Clone, Default)]
pub struct BeanRegistry {
    beans: BTreeMap<String, String>,
    parent: Option<Box<BeanRegistry>>,
}

impl BeanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, parent: BeanRegistry) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    pub fn register(&mut self, name: impl Into<String>, type_name: impl Into<String>) {
        self.beans.insert(name.into(), type_name.into());
    }

    pub fn len(&self) -> usize {
        self.beans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }

    fn local_candidates(&self, type_name: &str) -> Vec<String> {
        self.beans
            .iter()
            .filter(|(_, t)| t.as_str() == type_name)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl From<BTreeMap<String, String>> for BeanRegistry {
    fn from(beans: BTreeMap<String, String>) -> Self {
        Self { beans, parent: None }
    }
}

impl DependencyLookup for BeanRegistry {
    fn lookup_by_name(&self, name: &str) -> Result<String> {
        if self.beans.contains_key(name) {
            return Ok(name.to_string());
        }
        match self.parent {
            Some(ref parent) => parent.lookup_by_name(name),
            None => Err(WeaveError::DependencyNotFound {
                lookup: format!("name '{name}'"),
            }),
        }
    }

    fn lookup_by_type(&self, type_name: &str) -> Result<String> {
        let mut candidates = self.local_candidates(type_name);
        match candidates.len() {
            1 => Ok(candidates.remove(0)),
            0 => match self.parent {
                Some(ref parent) => parent.lookup_by_type(type_name),
                None => Err(WeaveError::DependencyNotFound {
                    lookup: format!("type '{type_name}'"),
                }),
            },
            _ => Err(WeaveError::AmbiguousDependency {
                type_name: type_name.to_string(),
                candidates,
            }),
        }
    }
}
