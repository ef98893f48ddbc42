//! Hot-reloadable registry handle.

use arc_swap::ArcSwap;
use std::sync::Arc;

use mapper_core::registry::MappingRegistry;

/// A registry handle that supports atomic replacement.
///
/// Readers take a snapshot with [`ReloadableRegistry::load`] (a lock-free
/// pointer read) and keep working against it; [`ReloadableRegistry::install`]
/// swaps in a freshly loaded generation without disturbing in-flight
/// transformations.
#[derive(Debug, Clone)]
pub struct ReloadableRegistry {
    inner: Arc<ArcSwap<MappingRegistry>>,
}

impl ReloadableRegistry {
    /// Wrap an initial registry generation.
    pub fn new(registry: MappingRegistry) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(registry)),
        }
    }

    /// Snapshot the current registry generation.
    pub fn load(&self) -> Arc<MappingRegistry> {
        self.inner.load_full()
    }

    /// Atomically install a new registry generation.
    pub fn install(&self, registry: MappingRegistry) {
        self.inner.store(Arc::new(registry));
    }
}
