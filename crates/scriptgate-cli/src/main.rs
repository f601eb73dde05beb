//! # scriptgate CLI Entry Point
//!
//! Main binary for scriptgate. Runs single requests through the connector and
//! checks that handlers load, without a host HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! # Run a GET request against a handler
//! scriptgate run /api/lights.js?room=kitchen -r /srv/handlers
//!
//! # POST a body with headers, printing JSON
//! scriptgate run /api/lights.js -r /srv/handlers -X POST \
//!   -H 'Content-Type: application/json' -d '{"on": true}' --json
//!
//! # Check that handlers load (exits non-zero on any failure)
//! scriptgate check -r /srv/handlers --alias-file aliases.json /index.js /api/lights.js
//! ```
//!
//! When `-r` is omitted the script root is taken from `SCRIPTGATE_ROOT`.

use anyhow::{Context, Result};
use argh::FromArgs;
use scriptgate_cli::output::{Format, write_response};
use scriptgate_common::{Request, ScriptId};
use scriptgate_server::{AliasTable, Dispatcher, GatewayConfig, Loader, ModuleRegistry, TracingSink};
use std::io::Write;
use std::sync::Arc;

/// Main CLI structure parsed from command-line arguments.
#[derive(FromArgs)]
/// scriptgate - run script handlers behind a CGI-style connector
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Run(RunArgs),
    Check(CheckArgs),
}

/// Arguments for running a single request.
///
/// The request goes through alias resolution, loading and invocation exactly
/// as it would behind a host server. Load failures print as their 404, 501
/// or 500 response; a fault raised by the handler exits with an error.
#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
/// run one request through a handler and print the response
struct RunArgs {
    /// request path, optionally with a query string
    #[argh(positional)]
    path: String,

    /// directory holding handler resources (defaults to $SCRIPTGATE_ROOT)
    #[argh(option, short = 'r')]
    root: Option<String>,

    /// request method
    #[argh(option, short = 'X', default = "\"GET\".into()")]
    method: String,

    /// request header as "Name: value"; may be repeated
    #[argh(option, short = 'H', long = "header")]
    headers: Vec<String>,

    /// request body
    #[argh(option, short = 'd')]
    data: Option<String>,

    /// JSON file mapping aliases to handler identifiers
    #[argh(option, long = "alias-file")]
    alias_file: Option<String>,

    /// required first line of handler resources
    #[argh(option)]
    marker: Option<String>,

    /// print the response as a JSON object
    #[argh(switch)]
    json: bool,
}

/// Arguments for checking handlers.
///
/// Each path is normalized and resolved through the alias table, then loaded
/// without being invoked. Module-style handlers are served by modules the
/// host registers in-process, so for them only the resource and its marker
/// line are checked.
#[derive(FromArgs)]
#[argh(subcommand, name = "check")]
/// check that handlers load
struct CheckArgs {
    /// request paths of the handlers to check
    #[argh(positional)]
    paths: Vec<String>,

    /// directory holding handler resources (defaults to $SCRIPTGATE_ROOT)
    #[argh(option, short = 'r')]
    root: Option<String>,

    /// JSON file mapping aliases to handler identifiers
    #[argh(option, long = "alias-file")]
    alias_file: Option<String>,

    /// required first line of handler resources
    #[argh(option)]
    marker: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Logs go to stderr so stdout carries only the rendered response.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let mut stdout = std::io::stdout().lock();
    match cli.command {
        Commands::Run(args) => run_request(args, &mut stdout).await,
        Commands::Check(args) => check_handlers(args, &mut stdout),
    }
}

/// Builds the gateway configuration shared by both subcommands.
fn gateway_config(
    root: Option<String>,
    alias_file: Option<String>,
    marker: Option<String>,
) -> Result<GatewayConfig> {
    let mut config = match root {
        Some(root) => GatewayConfig::new(root),
        None => GatewayConfig::from_env().context("No script root given (use -r)")?,
    };
    if let Some(alias_file) = alias_file {
        config = config.with_alias_file(alias_file);
    }
    if let Some(marker) = marker {
        config = config.with_marker_line(marker);
    }
    Ok(config)
}

/// Splits a `Name: value` header argument.
fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("Invalid header '{}': expected \"Name: value\"", raw))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Invalid header '{}': empty name", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

async fn run_request<W: Write>(args: RunArgs, out: &mut W) -> Result<()> {
    let config = gateway_config(args.root, args.alias_file, args.marker)?;
    let dispatcher = Arc::new(Dispatcher::from_config(config)?);

    let mut request = Request::new(args.method, args.path);
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        request = request.with_header(name, value);
    }
    if let Some(data) = args.data {
        request = request.with_body(data.into_bytes());
    }

    tracing::debug!("Running {} {}", request.method, request.path);
    let response = dispatcher.handle_async(request).await?;

    let format = if args.json { Format::Json } else { Format::Text };
    write_response(out, response, format)
}

fn check_handlers<W: Write>(args: CheckArgs, out: &mut W) -> Result<()> {
    let config = gateway_config(args.root, args.alias_file, args.marker)?;
    config.validate()?;
    let aliases = AliasTable::from_config(&config)?;
    let loader = Loader::new(&config, ModuleRegistry::new(), Arc::new(TracingSink));

    let mut failures = 0;
    for path in &args.paths {
        let resolved = aliases.resolve(&ScriptId::new(path));
        let checked = if loader.is_module_style(&resolved) {
            loader.verify(&resolved).map(|()| " (module not checked)")
        } else {
            loader.load(&resolved).map(|_| "")
        };
        match checked {
            Ok(note) => writeln!(out, "ok  {}{}", resolved, note)?,
            Err(e) => {
                failures += 1;
                writeln!(out, "{} {}: {}", e.status(), resolved, e)?;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} handlers failed to load", failures, args.paths.len());
    }
    Ok(())
}
