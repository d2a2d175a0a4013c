//! Copy-on-write registry of plugin descriptors.

use std::sync::{Arc, RwLock};

use tracing::info;

use crate::plugin::PluginSpec;

/// Ordered, immutable-per-snapshot list of plugins.
///
/// Readers take one snapshot per message and scan it without holding the
/// lock; a reload swaps the whole list atomically.
pub struct PluginRegistry {
    plugins: RwLock<Arc<Vec<Arc<PluginSpec>>>>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn with_plugins(plugins: Vec<PluginSpec>) -> Self {
        let registry = Self::new();
        registry.swap(plugins);
        registry
    }

    /// Replace the whole plugin list. Existing snapshots keep the old list.
    pub fn swap(&self, plugins: Vec<PluginSpec>) {
        let next: Arc<Vec<Arc<PluginSpec>>> = Arc::new(plugins.into_iter().map(Arc::new).collect());
        let mut guard = self.plugins.write().unwrap_or_else(|e| e.into_inner());
        info!(count = next.len(), "plugin registry swapped");
        *guard = next;
    }

    /// Current snapshot, in registration order.
    pub fn snapshot(&self) -> Arc<Vec<Arc<PluginSpec>>> {
        let guard = self.plugins.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }
}
