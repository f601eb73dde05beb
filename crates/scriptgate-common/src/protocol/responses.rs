//! Response Types
//!
//! A handler answers with a three-part response: a numeric status, a header
//! map and a lazily produced body.
//!
//! # Body Semantics
//!
//! [`Body`] is a finite, non-restartable sequence of byte chunks. Each chunk
//! is yielded at most once; after the sequence reports exhaustion every later
//! call to `next` reports exhaustion again, so a second full drain yields
//! nothing. An empty body is a valid zero-length body.
//!
//! # Example
//!
//! ```
//! use scriptgate_common::protocol::responses::{Body, Response};
//!
//! let mut response = Response::text(404, "api/missing.js not found");
//! assert_eq!(response.status, 404);
//! assert_eq!(response.headers.get("content-type"), Some("text/plain"));
//! assert_eq!(response.body.read_all(), b"api/missing.js not found");
//! assert!(response.body.read_all().is_empty());
//! ```

use std::fmt;

use super::Headers;

/// One piece of a response body.
pub type Chunk = Vec<u8>;

/// One-shot lazy sequence of body chunks.
pub struct Body {
    chunks: Option<Box<dyn Iterator<Item = Chunk> + Send>>,
}

impl Body {
    /// A body that is already exhausted.
    pub fn empty() -> Self {
        Body { chunks: None }
    }

    /// A body holding a single chunk.
    pub fn once(chunk: impl Into<Chunk>) -> Self {
        Self::from_iter_lazy(std::iter::once(chunk.into()))
    }

    /// A body over chunks that are already in memory.
    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        Self::from_iter_lazy(chunks.into_iter())
    }

    /// A body whose chunks are produced on demand by `iter`.
    pub fn from_iter_lazy<I>(iter: I) -> Self
    where
        I: Iterator<Item = Chunk> + Send + 'static,
    {
        Body { chunks: Some(Box::new(iter)) }
    }

    /// Drains every remaining chunk into one buffer.
    pub fn read_all(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in self.by_ref() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    /// Returns true once the sequence has signalled its end.
    pub fn is_exhausted(&self) -> bool {
        self.chunks.is_none()
    }
}

impl Iterator for Body {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let next = self.chunks.as_mut()?.next();
        if next.is_none() {
            // Drop the producer so the end marker is sticky.
            self.chunks = None;
        }
        next
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("exhausted", &self.is_exhausted())
            .finish()
    }
}

/// A handler's answer: status code, headers and a lazy body.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    pub headers: Headers,
    pub body: Body,
}

impl Response {
    pub fn new(status: u16, headers: Headers, body: Body) -> Self {
        Response { status, headers, body }
    }

    /// A plain-text response with a single body chunk.
    ///
    /// This is the shape every synthetic error response takes.
    pub fn text(status: u16, message: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");
        Response {
            status,
            headers,
            body: Body::once(message.into().into_bytes()),
        }
    }
}
