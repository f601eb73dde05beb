//! scriptgate server
//!
//! This crate provides the connector between a host HTTP server and a
//! directory of independently authored request handlers. Handlers are either
//! JavaScript sources run in the Boa engine or natively registered Rust
//! modules; both are loaded once, cached for the life of the process and
//! invoked with a CGI-style environment.

pub mod alias;
pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod environ;
pub mod handler;
pub mod http_bridge;
pub mod loader;
pub mod modules;
pub mod runtime;

pub use alias::AliasTable;
pub use cache::{CacheState, HandlerCache};
pub use config::GatewayConfig;
pub use dispatcher::Dispatcher;
pub use environ::{ContextBuilder, Environ, ErrorStream, InputStream, LogSink, MetaVars, TracingSink};
pub use handler::{DummyHandler, EntryPoint, Handler};
pub use loader::Loader;
pub use modules::ModuleRegistry;
