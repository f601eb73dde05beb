//! Script identifiers
//!
//! A `ScriptId` is the normalized form of a request path: the query string is
//! dropped and leading/trailing `/` separators are stripped. It is the key for
//! both alias lookup and the handler cache.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized handler path, e.g. `api/devices.js`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ScriptId(String);

impl ScriptId {
    /// Normalizes a raw request path into an identifier.
    ///
    /// Normalizing an already normalized identifier returns it unchanged.
    pub fn new(path: &str) -> Self {
        let path = path.split_once('?').map_or(path, |(path, _)| path);
        ScriptId(path.trim_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for ScriptId {
    fn from(path: String) -> Self {
        ScriptId::new(&path)
    }
}

impl From<&str> for ScriptId {
    fn from(path: &str) -> Self {
        ScriptId::new(path)
    }
}

impl From<ScriptId> for String {
    fn from(id: ScriptId) -> Self {
        id.0
    }
}

impl AsRef<str> for ScriptId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
