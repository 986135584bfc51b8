use std::collections::HashMap;

use crate::descriptor::{EffectDescriptor, EffectKind};
use crate::error::{EffectError, Result};

/// Verb-to-descriptor catalog.
///
/// Built once at startup and then shared read-only.
#[derive(Debug, Clone, Default)]
pub struct EffectRegistry {
    descriptors: HashMap<String, EffectDescriptor>,
}

impl EffectRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every [`EffectKind`].
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in EffectKind::ALL {
            registry.descriptors.insert(kind.verb().to_string(), kind.descriptor());
        }
        registry
    }

    /// Add a descriptor. Fails if the verb is already registered.
    pub fn register(&mut self, descriptor: EffectDescriptor) -> Result<()> {
        if self.descriptors.contains_key(descriptor.verb()) {
            return Err(EffectError::DuplicateVerb(descriptor.verb().to_string()));
        }
        self.descriptors
            .insert(descriptor.verb().to_string(), descriptor);
        Ok(())
    }

    /// Descriptor for `verb` (exact, case-sensitive).
    pub fn lookup(&self, verb: &str) -> Result<&EffectDescriptor> {
        self.descriptors
            .get(verb)
            .ok_or_else(|| EffectError::NotFound(verb.to_string()))
    }

    /// Registered verbs, sorted.
    pub fn verbs(&self) -> Vec<&str> {
        let mut verbs: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        verbs.sort_unstable();
        verbs
    }

    /// Descriptors sorted by verb.
    pub fn descriptors(&self) -> Vec<&EffectDescriptor> {
        let mut descriptors: Vec<&EffectDescriptor> = self.descriptors.values().collect();
        descriptors.sort_unstable_by(|a, b| a.verb().cmp(b.verb()));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
