//! Process-wide descriptor cache.
//!
//! Descriptors are compiled at most once per `(class, inherit)` pair and
//! then shared as `Arc<ModelDescriptor>`. Reads of a cached descriptor only
//! take the read side of an `RwLock`; compilation is serialized behind a
//! separate mutex and re-checks the cache before compiling, so concurrent
//! first access compiles once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use crate::error::Result;
use crate::meta::{CompileContext, ModelDescriptor};

type CacheKey = (String, bool);

/// Compile-once cache of model descriptors.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    cache: RwLock<HashMap<CacheKey, Arc<ModelDescriptor>>>,
    compile_lock: Mutex<()>,
}

impl DescriptorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached descriptor, if already compiled.
    pub fn get(&self, class: &str, inherit: bool) -> Option<Arc<ModelDescriptor>> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.get(&(class.to_string(), inherit)).cloned()
    }

    /// Cached descriptor, compiling it on first access.
    ///
    /// A failed compilation is not cached; the error is returned to every
    /// caller that triggers it.
    pub fn get_or_compile(
        &self,
        class: &str,
        inherit: bool,
        ctx: CompileContext<'_>,
    ) -> Result<Arc<ModelDescriptor>> {
        // Fast path: already compiled
        if let Some(found) = self.get(class, inherit) {
            return Ok(found);
        }

        // Slow path: one compiler at a time, re-check under the lock
        let _guard = self
            .compile_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = self.get(class, inherit) {
            tracing::trace!(class = class, inherit = inherit, "Descriptor compiled concurrently");
            return Ok(found);
        }

        let descriptor = Arc::new(ModelDescriptor::compile(class, inherit, ctx)?);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.insert((class.to_string(), inherit), Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Number of cached descriptors.
    pub fn len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// True when nothing has been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Global registry singleton, for callers that do not inject their own.
pub fn global() -> &'static DescriptorRegistry {
    static REGISTRY: OnceLock<DescriptorRegistry> = OnceLock::new();
    REGISTRY.get_or_init(DescriptorRegistry::new)
}
