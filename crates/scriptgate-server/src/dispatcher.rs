//! Request dispatch.
//!
//! The dispatcher ties the connector together. For every request it:
//!
//! 1. Normalizes the handler identifier from the request path
//! 2. Resolves it through the alias table
//! 3. Fetches the entry point from the cache, loading it on first use
//! 4. Builds the per-request environment
//! 5. Invokes the entry point and hands back its response unchanged
//!
//! Load and resolve failures never surface as `Err`: the loader turns them
//! into cached dummy handlers that answer with 404, 501 or 500. Only faults
//! raised by a loaded handler while running reach the caller.
//!
//! # Example
//!
//! ```no_run
//! use scriptgate_server::{Dispatcher, GatewayConfig};
//! use scriptgate_common::Request;
//!
//! let dispatcher = Dispatcher::from_config(GatewayConfig::new("/srv/handlers")).unwrap();
//! let mut response = dispatcher.handle(Request::get("/api/status.js")).unwrap();
//! println!("{} {:?}", response.status, response.body.read_all());
//! ```

use scriptgate_common::{GatewayError, Request, Response, Result};
use std::sync::Arc;

use crate::alias::AliasTable;
use crate::cache::HandlerCache;
use crate::config::GatewayConfig;
use crate::environ::{ContextBuilder, LogSink, TracingSink};
use crate::handler::EntryPoint;
use crate::loader::Loader;
use crate::modules::ModuleRegistry;

/// Routes requests to cached handler entry points.
///
/// A dispatcher is meant to live for the whole process and be shared between
/// request threads; everything it holds is `Send + Sync`.
pub struct Dispatcher {
    aliases: AliasTable,
    loader: Loader,
    cache: HandlerCache,
    context: ContextBuilder,
}

impl Dispatcher {
    pub fn new(
        config: &GatewayConfig,
        aliases: AliasTable,
        modules: ModuleRegistry,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            aliases,
            loader: Loader::new(config, modules, sink.clone()),
            cache: HandlerCache::new(),
            context: ContextBuilder::new(sink),
        }
    }

    /// Builds a dispatcher with no native modules, logging through `tracing`.
    ///
    /// The configuration is validated and its alias file, if any, is loaded.
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        Self::with_modules(config, ModuleRegistry::new())
    }

    pub fn with_modules(config: GatewayConfig, modules: ModuleRegistry) -> Result<Self> {
        config.validate()?;
        let aliases = AliasTable::from_config(&config)?;
        tracing::info!(
            "Serving handlers from {} ({} aliases, {} modules)",
            config.script_root().display(),
            aliases.len(),
            modules.len()
        );
        Ok(Self::new(&config, aliases, modules, Arc::new(TracingSink)))
    }

    /// Handles one request.
    ///
    /// # Errors
    ///
    /// Only faults raised by a loaded handler are returned; the host should
    /// translate them into a 500 response (see
    /// [`fault_response`](crate::http_bridge::fault_response)).
    pub fn handle(&self, request: Request) -> Result<Response> {
        let entry = self.entry_point(&request);
        let env = self.context.build(request);
        entry.run(env)
    }

    /// Runs [`handle`](Self::handle) on tokio's blocking pool.
    pub async fn handle_async(self: Arc<Self>, request: Request) -> Result<Response> {
        tokio::task::spawn_blocking(move || self.handle(request))
            .await
            .map_err(|e| GatewayError::Handler(format!("Dispatch task failed: {}", e)))?
    }

    pub fn cache(&self) -> &HandlerCache {
        &self.cache
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    fn entry_point(&self, request: &Request) -> EntryPoint {
        let id = request.script_id();
        let resolved = self.aliases.resolve(&id);
        tracing::debug!("Dispatching {} {} to {}", request.method, request.path, resolved);
        self.cache
            .get_or_build(&resolved, || self.loader.load_or_dummy(&resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheState;
    use crate::config::DEFAULT_MARKER_LINE;
    use crate::environ::Environ;
    use scriptgate_common::ScriptId;
    use std::fs;
    use std::path::Path;

    fn write_script(root: &Path, id: &str, body: &str) {
        let path = root.join(id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("{}\n{}", DEFAULT_MARKER_LINE, body)).unwrap();
    }

    fn dispatcher(root: &Path, aliases: AliasTable) -> Dispatcher {
        Dispatcher::new(
            &GatewayConfig::new(root),
            aliases,
            ModuleRegistry::new(),
            Arc::new(TracingSink),
        )
    }

    #[test]
    fn test_handle_script() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "hello.js", "function run(env) { return [200, {}, 'hi ' + env.QUERY_STRING]; }");
        let dispatcher = dispatcher(dir.path(), AliasTable::new());

        let mut resp = dispatcher.handle(Request::get("/hello.js?name=lamp")).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body.read_all(), b"hi name=lamp");
        assert_eq!(dispatcher.cache().state(&ScriptId::new("hello.js")), CacheState::Loaded);
    }

    #[test]
    fn test_query_string_shares_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "a.js", "function run(env) { return [204]; }");
        let dispatcher = dispatcher(dir.path(), AliasTable::new());

        dispatcher.handle(Request::get("/a.js")).unwrap();
        dispatcher.handle(Request::get("/a.js?x=1")).unwrap();
        dispatcher.handle(Request::get("a.js")).unwrap();
        assert_eq!(dispatcher.cache().builds(), 1);
    }

    #[test]
    fn test_alias_shares_entry() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "api/home.js", "var n = 0; function run(env) { n += 1; return [200, {}, String(n)]; }");
        let dispatcher = dispatcher(dir.path(), AliasTable::new().with_alias("index.js", "api/home.js"));

        let mut first = dispatcher.handle(Request::get("/index.js")).unwrap();
        let mut second = dispatcher.handle(Request::get("/api/home.js")).unwrap();
        assert_eq!(first.body.read_all(), b"1");
        assert_eq!(second.body.read_all(), b"2");
        assert_eq!(dispatcher.cache().builds(), 1);
        assert_eq!(dispatcher.cache().state(&ScriptId::new("index.js")), CacheState::Unloaded);
    }

    #[test]
    fn test_failures_are_responses() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("plain.js"), "function run(env) { return [200]; }").unwrap();
        write_script(dir.path(), "broken.js", "function run( {");
        let dispatcher = dispatcher(dir.path(), AliasTable::new());

        let mut missing = dispatcher.handle(Request::get("/missing.js")).unwrap();
        assert_eq!(missing.status, 404);
        assert!(String::from_utf8(missing.body.read_all()).unwrap().contains("missing.js"));

        assert_eq!(dispatcher.handle(Request::get("/plain.js")).unwrap().status, 501);
        assert_eq!(dispatcher.handle(Request::get("/broken.js")).unwrap().status, 500);

        assert_eq!(dispatcher.cache().state(&ScriptId::new("missing.js")), CacheState::Failed(404));
        assert_eq!(dispatcher.cache().state(&ScriptId::new("plain.js")), CacheState::Failed(501));
        assert_eq!(dispatcher.cache().state(&ScriptId::new("broken.js")), CacheState::Failed(500));
    }

    #[test]
    fn test_failure_is_cached_until_restart() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(dir.path(), AliasTable::new());

        assert_eq!(dispatcher.handle(Request::get("/late.js")).unwrap().status, 404);
        write_script(dir.path(), "late.js", "function run(env) { return [200]; }");
        assert_eq!(dispatcher.handle(Request::get("/late.js")).unwrap().status, 404);
        assert_eq!(dispatcher.cache().builds(), 1);
    }

    #[test]
    fn test_handler_fault_propagates() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "fault.js", "function run(env) { throw new Error('relay stuck'); }");
        let dispatcher = dispatcher(dir.path(), AliasTable::new());

        let err = dispatcher.handle(Request::get("/fault.js")).unwrap_err();
        assert!(matches!(err, GatewayError::Handler(ref msg) if msg.contains("relay stuck")));
        assert_eq!(dispatcher.cache().state(&ScriptId::new("fault.js")), CacheState::Loaded);
    }

    #[test]
    fn test_module_handler() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "api/rooms.mod", "");
        let modules = ModuleRegistry::new().with_module("api.rooms", |mut env: Environ| -> Result<Response> {
            let body = env.input.read(None);
            Ok(Response::text(201, format!("{} bytes", body.len())))
        });
        let dispatcher = Dispatcher::new(
            &GatewayConfig::new(dir.path()),
            AliasTable::new(),
            modules,
            Arc::new(TracingSink),
        );

        let req = Request::new("POST", "/api/rooms.mod").with_body(b"kitchen".to_vec());
        let mut resp = dispatcher.handle(req).unwrap();
        assert_eq!(resp.status, 201);
        assert_eq!(resp.body.read_all(), b"7 bytes");
    }

    #[test]
    fn test_from_config_loads_alias_file() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "api/home.js", "function run(env) { return [200, {}, 'home']; }");
        let alias_file = dir.path().join("aliases.json");
        fs::write(&alias_file, r#"{"/": "api/home.js"}"#).unwrap();

        let dispatcher =
            Dispatcher::from_config(GatewayConfig::new(dir.path()).with_alias_file(&alias_file)).unwrap();
        assert_eq!(dispatcher.aliases().len(), 1);
        assert_eq!(dispatcher.handle(Request::get("/")).unwrap().body.read_all(), b"home");
    }

    #[test]
    fn test_from_config_rejects_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let missing_root = dir.path().join("nowhere");
        assert!(Dispatcher::from_config(GatewayConfig::new(&missing_root)).is_err());

        let bad_aliases = dir.path().join("aliases.json");
        fs::write(&bad_aliases, "[1, 2]").unwrap();
        assert!(Dispatcher::from_config(GatewayConfig::new(dir.path()).with_alias_file(&bad_aliases)).is_err());
    }

    #[tokio::test]
    async fn test_handle_async() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "ping.js", "function run(env) { return [200, {}, 'pong']; }");
        let dispatcher = Arc::new(dispatcher(dir.path(), AliasTable::new()));

        let mut resp = dispatcher.clone().handle_async(Request::get("/ping.js")).await.unwrap();
        assert_eq!(resp.body.read_all(), b"pong");
    }
}
