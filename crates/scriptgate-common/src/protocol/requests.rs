use serde::{Deserialize, Serialize};

use super::{Headers, ScriptId};

/// Protocol version assumed when the host server does not supply one.
pub const DEFAULT_PROTOCOL: &str = "HTTP/1.1";

/// An inbound request as handed over by the host server.
///
/// `path` may carry a query string (`/api/status?verbose=1`); the connector
/// splits it off when building the script identifier and the metavariables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub path: String,
    pub method: String,
    pub headers: Headers,
    pub body: Vec<u8>,
    pub protocol_version: String,
}

impl Request {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Request {
            path: path.into(),
            method: method.into(),
            headers: Headers::new(),
            body: Vec::new(),
            protocol_version: DEFAULT_PROTOCOL.to_string(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_protocol(mut self, protocol_version: impl Into<String>) -> Self {
        self.protocol_version = protocol_version.into();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// The path without its query string.
    pub fn script_path(&self) -> &str {
        self.path.split_once('?').map_or(self.path.as_str(), |(path, _)| path)
    }

    /// The text after `?`, or `""` when there is none.
    pub fn query_string(&self) -> &str {
        self.path.split_once('?').map_or("", |(_, query)| query)
    }

    pub fn script_id(&self) -> ScriptId {
        ScriptId::new(self.script_path())
    }
}
