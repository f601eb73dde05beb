//! Natively registered module-style handlers.
//!
//! Module-style identifiers (`api/devices.mod`) are not compiled at runtime.
//! The host registers a Rust handler under the matching module path
//! (`api.devices`) before serving, and the loader hands that handler out once
//! the on-disk resource has passed the marker check.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::{EntryPoint, Handler};

/// Separator between module path segments.
pub const MODULE_PATH_DELIMITER: char = '.';

/// Build-time registry of module-style handlers keyed by module path.
#[derive(Default, Clone)]
pub struct ModuleRegistry {
    modules: HashMap<String, EntryPoint>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `module_path`, replacing any previous entry.
    pub fn register<H>(&mut self, module_path: impl Into<String>, handler: H)
    where
        H: Handler + 'static,
    {
        let module_path = module_path.into();
        tracing::debug!("Registered module handler '{}'", module_path);
        self.modules.insert(module_path, Arc::new(handler));
    }

    pub fn with_module<H>(mut self, module_path: impl Into<String>, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.register(module_path, handler);
        self
    }

    pub fn get(&self, module_path: &str) -> Option<EntryPoint> {
        self.modules.get(module_path).cloned()
    }

    pub fn contains(&self, module_path: &str) -> bool {
        self.modules.contains_key(module_path)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Translates a module-style identifier into its module path.
///
/// Returns `None` when `id` does not end in `suffix`.
pub fn module_path_for(id: &str, suffix: &str) -> Option<String> {
    let stem = id.strip_suffix(suffix)?;
    Some(stem.replace('/', &MODULE_PATH_DELIMITER.to_string()))
}
