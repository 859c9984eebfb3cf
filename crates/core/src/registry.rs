//! Component registry — resolving implementations by configured name.
//!
//! Configuration refers to models, environments and agent kinds by string
//! identifier. The registry maps the known identifiers to factories
//! statically; identifiers outside the builtin set fall through to an
//! ordered list of pluggable loaders, so embedders can resolve their own
//! fully-qualified names. A lookup that nothing recognises fails with
//! `Error::UnknownComponent`.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::Error;

/// Resolves externally supplied component identifiers to factories.
pub trait ComponentLoader<F>: Send + Sync {
    /// Try to produce a factory for `name`; `None` means "not mine".
    fn load(&self, name: &str) -> Option<F>;
}

/// A static name→factory map with pluggable fallback loaders.
pub struct ComponentRegistry<F> {
    kind: &'static str,
    entries: BTreeMap<&'static str, F>,
    loaders: Vec<Box<dyn ComponentLoader<F>>>,
}

impl<F: Clone> ComponentRegistry<F> {
    /// Create an empty registry for a component kind ("agent", "model", ...).
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
            loaders: Vec::new(),
        }
    }

    /// Register a builtin factory under a known identifier.
    pub fn register(mut self, name: &'static str, factory: F) -> Self {
        debug!(kind = self.kind, component = name, "Registered component");
        self.entries.insert(name, factory);
        self
    }

    /// Append a fallback loader, consulted in registration order.
    pub fn with_loader(mut self, loader: Box<dyn ComponentLoader<F>>) -> Self {
        self.loaders.push(loader);
        self
    }

    /// Resolve an identifier to a factory.
    pub fn resolve(&self, name: &str) -> Result<F, Error> {
        if let Some(factory) = self.entries.get(name) {
            return Ok(factory.clone());
        }
        for loader in &self.loaders {
            if let Some(factory) = loader.load(name) {
                return Ok(factory);
            }
        }
        Err(Error::UnknownComponent {
            kind: self.kind,
            name: name.to_string(),
        })
    }

    /// The builtin identifiers, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }
}
