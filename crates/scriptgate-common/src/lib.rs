//! scriptgate Common Types
//!
//! This crate provides the protocol definitions shared by the scriptgate
//! connector and the host servers embedding it.
//!
//! # Overview
//!
//! scriptgate sits between an HTTP-capable host server and a directory of
//! independently authored request handlers. Every request crosses the
//! boundary as a [`Request`] and comes back as a three-part [`Response`]:
//!
//! - **status**: numeric HTTP status code
//! - **headers**: unique keys, insertion order preserved
//! - **body**: a one-shot lazy sequence of byte chunks
//!
//! # Components
//!
//! - [`protocol`] - Request/Response types, script identifiers, errors
//!
//! # Example
//!
//! ```
//! use scriptgate_common::{Request, ScriptId};
//!
//! let request = Request::get("/api/devices.js?room=kitchen")
//!     .with_header("Host", "hub.local:8080");
//!
//! assert_eq!(request.script_id(), ScriptId::new("api/devices.js"));
//! assert_eq!(request.query_string(), "room=kitchen");
//! ```

pub mod protocol;

pub use protocol::*;
