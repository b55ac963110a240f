//! Deep copy that preserves sharing inside the copied graph.

use std::collections::HashMap;

use tracing::trace;

use super::object::{ObjectPtr, WeakObjectPtr};
use super::registry::TypeRegistry;
use crate::util::Result;

/// State of one top-level copy.
///
/// Objects with more than one owner are remembered by address, so every
/// owner of a shared source ends up sharing one copy.
pub struct CopyContext {
    registry: TypeRegistry,
    copies: HashMap<usize, ObjectPtr>,
    targets: Vec<WeakObjectPtr>,
}

impl CopyContext {
    pub fn new() -> Self {
        Self::with_registry(TypeRegistry::global())
    }

    pub fn with_registry(registry: &TypeRegistry) -> Self {
        Self {
            registry: registry.clone(),
            copies: HashMap::new(),
            targets: Vec::new(),
        }
    }

    /// Copy `source`, reusing the earlier copy of a shared object.
    pub fn copy(&mut self, source: &ObjectPtr) -> Result<ObjectPtr> {
        let shared = source.ref_count() > 1;
        if shared {
            if let Some(existing) = self.copies.get(&source.addr()) {
                return Ok(existing.clone());
            }
        }

        let src = source.read();
        let copy = self.registry.create(src.description().id)?;
        trace!(type_name = src.type_name(), shared, "copy");
        if shared {
            self.copies.insert(source.addr(), copy.clone());
        }

        self.targets.push(copy.downgrade());
        let result = copy.write().copy_from(&*src, self);
        self.targets.pop();
        result?;
        Ok(copy)
    }

    /// Handle of the object currently being filled by `copy_from`.
    ///
    /// Lets a copy point back references of its children at itself.
    pub fn current_target(&self) -> WeakObjectPtr {
        self.targets.last().cloned().unwrap_or_default()
    }
}

impl Default for CopyContext {
    fn default() -> Self {
        Self::new()
    }
}
