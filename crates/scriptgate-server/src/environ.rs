//! Per-request execution context.
//!
//! Every invocation receives an [`Environ`] built fresh from the request:
//!
//! - **Metavariables**: CGI-style `KEY -> value` strings; reading a key that
//!   was never set yields `""`
//! - **Input stream**: forward-only reads over the request body
//! - **Error stream**: writes are prefixed with the request path and handed to
//!   the logging collaborator
//!
//! None of these are shared between requests.

use scriptgate_common::Request;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Source tag attached to everything a handler writes to its error stream.
pub const LOG_SOURCE: &str = "scriptgate";

/// Constant reported as `PATH_INFO`.
pub const PATH_INFO: &str = "/";

/// Logging collaborator receiving handler diagnostics.
///
/// Implementations must not block indefinitely.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str, source: &str);
}

/// Forwards handler diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, message: &str, source: &str) {
        tracing::warn!(source = source, "{}", message);
    }
}

/// Metavariable map with an empty-string default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaVars {
    vars: HashMap<String, String>,
}

impl MetaVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, or `""` when it was never set.
    pub fn get(&self, key: &str) -> &str {
        self.vars.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Forward-only reader over a request body.
#[derive(Debug, Clone, Default)]
pub struct InputStream {
    data: Vec<u8>,
    cursor: usize,
}

impl InputStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, cursor: 0 }
    }

    /// Reads from the cursor.
    ///
    /// `Some(n)` returns up to `n` bytes and moves the cursor forward by `n`
    /// even when fewer bytes were left. `None` returns everything that is
    /// left and moves the cursor to the end. Reading past the end yields an
    /// empty buffer.
    pub fn read(&mut self, n: Option<usize>) -> Vec<u8> {
        let len = self.data.len();
        let start = self.cursor.min(len);
        match n {
            Some(n) => {
                let end = start.saturating_add(n).min(len);
                self.cursor = self.cursor.saturating_add(n);
                self.data[start..end].to_vec()
            }
            None => {
                self.cursor = len;
                self.data[start..].to_vec()
            }
        }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.cursor)
    }
}

/// Error/log stream bound to one request.
#[derive(Clone)]
pub struct ErrorStream {
    path: String,
    sink: Arc<dyn LogSink>,
}

impl ErrorStream {
    pub fn new(path: impl Into<String>, sink: Arc<dyn LogSink>) -> Self {
        Self { path: path.into(), sink }
    }

    /// Concatenates `parts` and logs them as `"<path>: <text>"`.
    pub fn write<I, S>(&self, parts: I)
    where
        I: IntoIterator<Item = S>,
        S: fmt::Display,
    {
        let text: String = parts.into_iter().map(|p| p.to_string()).collect();
        self.sink.log(&format!("{}: {}", self.path, text), LOG_SOURCE);
    }
}

impl fmt::Debug for ErrorStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorStream").field("path", &self.path).finish()
    }
}

/// Everything a handler sees of one request.
#[derive(Debug)]
pub struct Environ {
    pub vars: MetaVars,
    pub input: InputStream,
    pub errors: ErrorStream,
}

impl Environ {
    /// Shorthand for `self.vars.get(key)`.
    pub fn var(&self, key: &str) -> &str {
        self.vars.get(key)
    }
}

/// Builds an [`Environ`] for each request.
#[derive(Clone)]
pub struct ContextBuilder {
    sink: Arc<dyn LogSink>,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl ContextBuilder {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> Arc<dyn LogSink> {
        self.sink.clone()
    }

    pub fn build(&self, request: Request) -> Environ {
        let vars = meta_vars(&request);
        let errors = ErrorStream::new(request.script_path(), self.sink.clone());
        Environ {
            vars,
            input: InputStream::new(request.body),
            errors,
        }
    }
}

fn meta_vars(request: &Request) -> MetaVars {
    let header = |name: &str| request.header(name).unwrap_or("").to_string();
    let host = request.header("Host").unwrap_or("");
    let (remote_host, remote_port) = split_host_port(host);

    let mut vars = MetaVars::new();
    vars.set(
        "CONTENT_LENGTH",
        request
            .header("Content-Length")
            .map(str::to_string)
            .unwrap_or_else(|| request.body.len().to_string()),
    );
    vars.set("CONTENT_TYPE", header("Content-Type"));
    vars.set("HTTP_USER_AGENT", header("User-Agent"));
    vars.set("HTTP_COOKIE", header("Cookie"));
    vars.set("REMOTE_HOST", remote_host);
    vars.set("REMOTE_PORT", remote_port);
    vars.set("REQUEST_METHOD", request.method.as_str());
    vars.set("SCRIPT_NAME", request.script_path());
    vars.set("SERVER_PROTOCOL", request.protocol_version.as_str());
    vars.set("QUERY_STRING", request.query_string());
    vars.set("PATH_INFO", PATH_INFO);
    vars
}

/// Splits a trailing `:port` off a Host header value.
fn split_host_port(host: &str) -> (&str, &str) {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            (name, port)
        }
        _ => (host, ""),
    }
}
