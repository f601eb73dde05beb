//! Script alias resolution.
//!
//! An alias table maps a requested identifier to the identifier of the
//! resource that actually serves it. Resolution is a single lookup: aliases
//! are not followed transitively.

use scriptgate_common::{GatewayError, Result, ScriptId};
use std::collections::HashMap;
use std::path::Path;

use crate::config::GatewayConfig;

/// Static, read-only mapping from identifier to backing identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasTable {
    aliases: HashMap<ScriptId, ScriptId>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a table from a JSON object such as `{"index.js": "api/home.js"}`.
    ///
    /// Both sides are normalized, so `"/index.js"` and `"index.js"` are the
    /// same key.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("Failed to read alias file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    /// Loads the table named by `config.alias_file`, or an empty one.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        match &config.alias_file {
            Some(path) => Self::from_json_file(path),
            None => Ok(Self::new()),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let aliases: HashMap<ScriptId, ScriptId> = serde_json::from_str(raw)?;
        Ok(Self { aliases })
    }

    pub fn insert(&mut self, from: impl Into<ScriptId>, to: impl Into<ScriptId>) {
        self.aliases.insert(from.into(), to.into());
    }

    pub fn with_alias(mut self, from: impl Into<ScriptId>, to: impl Into<ScriptId>) -> Self {
        self.insert(from, to);
        self
    }

    /// Returns the backing identifier for `id`, or `id` itself when no alias
    /// exists.
    pub fn resolve(&self, id: &ScriptId) -> ScriptId {
        match self.aliases.get(id) {
            Some(target) => {
                tracing::debug!("Alias {} -> {}", id, target);
                target.clone()
            }
            None => id.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl<K: Into<ScriptId>, V: Into<ScriptId>> FromIterator<(K, V)> for AliasTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = AliasTable::new();
        for (from, to) in iter {
            table.insert(from, to);
        }
        table
    }
}
