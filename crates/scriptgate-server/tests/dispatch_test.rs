//! Dispatcher Integration Tests
//!
//! End-to-end tests driving requests through a `Dispatcher` backed by a
//! temporary script root. They cover:
//! - Load failures answered as 404 / 501 / 500 responses
//! - Alias resolution sharing cache entries
//! - Single-flight loading under concurrent first requests
//! - Per-request environment semantics as seen from a script

use boa_engine::{Context, Script, Source};
use scriptgate_common::{Request, Response, Result, ScriptId};
use scriptgate_server::config::DEFAULT_MARKER_LINE;
use scriptgate_server::{
    AliasTable, CacheState, Dispatcher, Environ, GatewayConfig, ModuleRegistry, TracingSink,
};
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use tempfile::TempDir;

/// Helper function to create a script root holding the given handlers
fn create_script_root(scripts: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (id, content) in scripts {
        write_file(dir.path(), id, content);
    }
    dir
}

fn write_file(root: &Path, id: &str, content: &str) {
    let path = root.join(id);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn handler_source(body: &str) -> String {
    format!("{}\n{}", DEFAULT_MARKER_LINE, body)
}

fn dispatcher(root: &Path) -> Dispatcher {
    Dispatcher::from_config(GatewayConfig::new(root)).unwrap()
}

fn body_text(resp: &mut Response) -> String {
    String::from_utf8(resp.body.read_all()).unwrap()
}

// ============================================================================
// Failure Responses
// ============================================================================

#[test]
fn test_missing_handler_is_404_naming_path() {
    let root = create_script_root(&[]);
    let dispatcher = dispatcher(root.path());

    let mut resp = dispatcher.handle(Request::get("/api/lights/nope.js")).unwrap();
    assert_eq!(resp.status, 404);
    assert_eq!(resp.headers.get("Content-Type"), Some("text/plain"));
    assert!(body_text(&mut resp).contains("api/lights/nope.js"));
}

#[test]
fn test_unmarked_resource_is_501() {
    let root = create_script_root(&[("legacy.js", "function run(env) { return [200]; }\n")]);
    let dispatcher = dispatcher(root.path());

    let mut resp = dispatcher.handle(Request::get("/legacy.js")).unwrap();
    assert_eq!(resp.status, 501);
    assert!(body_text(&mut resp).contains("legacy.js"));
}

#[test]
fn test_compile_failure_is_500_with_engine_message() {
    let broken = "function run(env) {\n  return [200, {}, 'x'\n";
    let root = create_script_root(&[("broken.js", &handler_source(broken))]);
    let dispatcher = dispatcher(root.path());

    let expected = Script::parse(Source::from_bytes(broken), None, &mut Context::default())
        .err()
        .expect("source should not parse")
        .to_string();

    let mut resp = dispatcher.handle(Request::get("/broken.js")).unwrap();
    assert_eq!(resp.status, 500);
    assert_eq!(body_text(&mut resp), expected);
}

#[test]
fn test_failures_are_permanent() {
    let root = create_script_root(&[]);
    let dispatcher = dispatcher(root.path());
    let id = ScriptId::new("later.js");

    assert_eq!(dispatcher.cache().state(&id), CacheState::Unloaded);
    assert_eq!(dispatcher.handle(Request::get("/later.js")).unwrap().status, 404);

    write_file(root.path(), "later.js", &handler_source("function run(env) { return [200]; }"));
    for _ in 0..3 {
        assert_eq!(dispatcher.handle(Request::get("/later.js")).unwrap().status, 404);
    }
    assert_eq!(dispatcher.cache().state(&id), CacheState::Failed(404));
    assert_eq!(dispatcher.cache().builds(), 1);
}

// ============================================================================
// Alias Resolution
// ============================================================================

#[test]
fn test_alias_and_target_share_one_entry() {
    let root = create_script_root(&[(
        "api/home.js",
        &handler_source("var hits = 0; function run(env) { hits += 1; return [200, {}, env.SCRIPT_NAME + ' ' + hits]; }"),
    )]);
    let aliases = AliasTable::new().with_alias("/index.js", "/api/home.js");
    let dispatcher = Dispatcher::new(
        &GatewayConfig::new(root.path()),
        aliases,
        ModuleRegistry::new(),
        Arc::new(TracingSink),
    );

    let mut via_alias = dispatcher.handle(Request::get("/index.js")).unwrap();
    let mut direct = dispatcher.handle(Request::get("/api/home.js")).unwrap();

    // SCRIPT_NAME reflects the requested path, the state reflects one context.
    assert_eq!(body_text(&mut via_alias), "/index.js 1");
    assert_eq!(body_text(&mut direct), "/api/home.js 2");
    assert_eq!(dispatcher.cache().builds(), 1);
    assert_eq!(dispatcher.cache().len(), 1);
}

#[test]
fn test_unaliased_identifier_resolves_to_itself() {
    let aliases = AliasTable::new().with_alias("a.js", "b.js");
    let id = ScriptId::new("/c.js");
    assert_eq!(aliases.resolve(&id), id);
    assert_eq!(aliases.resolve(&ScriptId::new("a.js")), ScriptId::new("b.js"));
}

#[test]
fn test_aliases_are_not_followed_transitively() {
    let root = create_script_root(&[
        ("b.js", &handler_source("function run(env) { return [200, {}, 'b']; }")),
        ("c.js", &handler_source("function run(env) { return [200, {}, 'c']; }")),
    ]);
    let alias_file = root.path().join("aliases.json");
    fs::write(&alias_file, r#"{"a.js": "b.js", "b.js": "c.js"}"#).unwrap();
    let dispatcher =
        Dispatcher::from_config(GatewayConfig::new(root.path()).with_alias_file(&alias_file)).unwrap();

    assert_eq!(body_text(&mut dispatcher.handle(Request::get("/a.js")).unwrap()), "b");
    assert_eq!(body_text(&mut dispatcher.handle(Request::get("/b.js")).unwrap()), "c");
}

// ============================================================================
// Caching and Concurrency
// ============================================================================

#[test]
fn test_concurrent_first_requests_build_once() {
    const CLIENTS: usize = 12;
    let root = create_script_root(&[(
        "api/slow.js",
        &handler_source("var start = Date.now(); while (Date.now() - start < 50) {} function run(env) { return [200, {}, 'ready']; }"),
    )]);
    let dispatcher = dispatcher(root.path());
    let barrier = Barrier::new(CLIENTS);

    std::thread::scope(|s| {
        for _ in 0..CLIENTS {
            s.spawn(|| {
                barrier.wait();
                let mut resp = dispatcher.handle(Request::get("/api/slow.js")).unwrap();
                assert_eq!(resp.status, 200);
                assert_eq!(resp.body.read_all(), b"ready");
            });
        }
    });

    assert_eq!(dispatcher.cache().builds(), 1);
}

#[test]
fn test_repeat_lookups_return_same_entry() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let root = create_script_root(&[("status.mod", &handler_source(""))]);
    let modules = ModuleRegistry::new().with_module("status", move |_env: Environ| -> Result<Response> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Response::text(200, "up"))
    });
    let dispatcher = Dispatcher::with_modules(GatewayConfig::new(root.path()), modules).unwrap();

    for _ in 0..5 {
        assert_eq!(dispatcher.handle(Request::get("/status.mod")).unwrap().status, 200);
    }
    let id = ScriptId::new("status.mod");
    let first = dispatcher.cache().get(&id).unwrap();
    let second = dispatcher.cache().get(&id).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(dispatcher.cache().builds(), 1);
    assert_eq!(built.load(Ordering::SeqCst), 5);
}

// ============================================================================
// Request Environment
// ============================================================================

#[test]
fn test_unknown_metavariable_is_empty() {
    let root = create_script_root(&[(
        "vars.js",
        &handler_source("function run(env) { return [200, {}, '[' + env.HTTP_X_NOT_SENT + '][' + env.HTTP_COOKIE + ']']; }"),
    )]);
    let dispatcher = dispatcher(root.path());

    let mut resp = dispatcher.handle(Request::get("/vars.js")).unwrap();
    assert_eq!(body_text(&mut resp), "[][]");
}

#[test]
fn test_partial_reads_of_request_body() {
    let root = create_script_root(&[(
        "read.js",
        &handler_source(
            "function run(env) { var a = env.input.read(5), b = env.input.read(5), c = env.input.read(5); \
             return [200, {}, a.length + ',' + b.length + ',' + c.length + ':' + a + b]; }",
        ),
    )]);
    let dispatcher = dispatcher(root.path());

    let req = Request::new("PUT", "/read.js").with_body(b"abcdefgh".to_vec());
    let mut resp = dispatcher.handle(req).unwrap();
    assert_eq!(body_text(&mut resp), "5,3,0:abcdefgh");
}

#[test]
fn test_native_environment_metavariables() {
    let root = create_script_root(&[("echo.mod", &handler_source(""))]);
    let modules = ModuleRegistry::new().with_module("echo", |env: Environ| -> Result<Response> {
        let keys = [
            "REQUEST_METHOD",
            "SCRIPT_NAME",
            "QUERY_STRING",
            "REMOTE_HOST",
            "REMOTE_PORT",
            "CONTENT_TYPE",
            "CONTENT_LENGTH",
            "SERVER_PROTOCOL",
            "PATH_INFO",
        ];
        let lines: Vec<String> = keys.iter().map(|k| format!("{}={}", k, env.var(k))).collect();
        Ok(Response::text(200, lines.join("\n")))
    });
    let dispatcher = Dispatcher::with_modules(GatewayConfig::new(root.path()), modules).unwrap();

    let req = Request::new("POST", "/echo.mod?verbose=1")
        .with_header("Host", "hub.local:8123")
        .with_header("Content-Type", "application/json")
        .with_body(b"{}".to_vec());
    let mut resp = dispatcher.handle(req).unwrap();
    assert_eq!(
        body_text(&mut resp),
        "REQUEST_METHOD=POST\nSCRIPT_NAME=/echo.mod\nQUERY_STRING=verbose=1\n\
         REMOTE_HOST=hub.local\nREMOTE_PORT=8123\nCONTENT_TYPE=application/json\n\
         CONTENT_LENGTH=2\nSERVER_PROTOCOL=HTTP/1.1\nPATH_INFO=/"
    );
}
