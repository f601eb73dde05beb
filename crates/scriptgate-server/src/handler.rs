//! Handler entry points.
//!
//! Whatever the loader produces, the cache stores and the dispatcher invokes
//! is an [`EntryPoint`]: a shared handle to something implementing
//! [`Handler`]. Load failures are represented by [`DummyHandler`] so every
//! cached entry can be invoked the same way.

use scriptgate_common::{GatewayError, Response, Result};
use std::sync::Arc;

use crate::environ::Environ;

/// A loaded request handler.
///
/// An `Err` return is a fault raised by the handler itself; the connector
/// passes it to the host server untouched.
pub trait Handler: Send + Sync {
    fn run(&self, env: Environ) -> Result<Response>;

    /// Status this handler stands in for when it represents a failed load.
    fn failed_status(&self) -> Option<u16> {
        None
    }
}

impl<F> Handler for F
where
    F: Fn(Environ) -> Result<Response> + Send + Sync,
{
    fn run(&self, env: Environ) -> Result<Response> {
        self(env)
    }
}

/// Shared, invocable handler as stored in the cache.
pub type EntryPoint = Arc<dyn Handler>;

/// Stand-in for a handler that could not be resolved or loaded.
///
/// Invoking it ignores the request and answers with the recorded status and
/// the diagnostic as a plain-text body.
#[derive(Debug, Clone)]
pub struct DummyHandler {
    status: u16,
    diagnostic: String,
}

impl DummyHandler {
    pub fn new(status: u16, diagnostic: impl Into<String>) -> Self {
        Self { status, diagnostic: diagnostic.into() }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn diagnostic(&self) -> &str {
        &self.diagnostic
    }
}

impl From<GatewayError> for DummyHandler {
    fn from(err: GatewayError) -> Self {
        DummyHandler::new(err.status(), err.to_string())
    }
}

impl Handler for DummyHandler {
    fn run(&self, _env: Environ) -> Result<Response> {
        Ok(Response::text(self.status, self.diagnostic.clone()))
    }

    fn failed_status(&self) -> Option<u16> {
        Some(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environ::ContextBuilder;
    use scriptgate_common::{Body, Headers, Request};

    fn env() -> Environ {
        ContextBuilder::default().build(Request::get("/x.js").with_body(b"ignored".to_vec()))
    }

    #[test]
    fn test_dummy_handler_response() {
        let dummy = DummyHandler::new(404, "x.js not found");
        let mut resp = dummy.run(env()).unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(resp.headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(resp.headers.len(), 1);
        assert_eq!(resp.body.read_all(), b"x.js not found");
        assert!(resp.body.read_all().is_empty());
    }

    #[test]
    fn test_dummy_handler_from_error() {
        let dummy = DummyHandler::from(GatewayError::NotAnApplication("nope".into()));
        assert_eq!(dummy.status(), 501);
        assert_eq!(dummy.diagnostic(), "nope");
        assert_eq!(dummy.failed_status(), Some(501));
    }

    #[test]
    fn test_dummy_handler_is_repeatable() {
        let dummy: EntryPoint = Arc::new(DummyHandler::new(500, "boom"));
        for _ in 0..3 {
            let mut resp = dummy.run(env()).unwrap();
            assert_eq!(resp.body.read_all(), b"boom");
        }
    }

    #[test]
    fn test_closure_handler() {
        let handler: EntryPoint = Arc::new(|mut env: Environ| -> Result<Response> {
            let body = env.input.read(None);
            Ok(Response::new(200, Headers::new(), Body::once(body)))
        });
        let mut resp = handler.run(env()).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body.read_all(), b"ignored");
        assert_eq!(handler.failed_status(), None);
    }
}
