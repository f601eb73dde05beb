use boa_engine::{Context, Script, Source, js_string, object::JsObject, value::JsValue};
use scriptgate_common::{GatewayError, Response, Result, ScriptId};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use crate::environ::{Environ, LogSink};
use crate::handler::Handler;
use crate::runtime::{bindings, conversions::js_to_response};

/// Name of the global a script must define to be servable.
pub const ENTRY_POINT: &str = "run";

/// A compiled raw-source handler.
///
/// Boa's `Context` is neither `Send` nor `Sync`, so each compiled script
/// lives on its own worker thread for the rest of the process. The handler
/// itself only holds the sending half of the worker's queue; invocations are
/// shipped over, run one at a time, and the caller blocks for the reply.
///
/// Dropping the handler closes the queue, which ends the worker thread.
pub struct ScriptHandler {
    id: ScriptId,
    queue: mpsc::Sender<Invocation>,
}

struct Invocation {
    env: Environ,
    reply: mpsc::SyncSender<Result<Response>>,
}

impl ScriptHandler {
    /// Compile `source` into a fresh context and extract its entry point.
    ///
    /// The context starts out with nothing but the language built-ins and the
    /// `gateway` base environment. The source is parsed first, then
    /// evaluated to populate the global scope, and finally the global `run`
    /// is looked up.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Load` carrying the engine's message if parsing
    /// or evaluation fails, or if no callable `run` was defined.
    pub fn compile(id: ScriptId, source: String, sink: Arc<dyn LogSink>) -> Result<Self> {
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let (queue, invocations) = mpsc::channel::<Invocation>();

        let worker_id = id.clone();
        thread::Builder::new()
            .name(format!("script:{}", id))
            .spawn(move || {
                let mut worker = match ScriptWorker::new(worker_id, &source, sink) {
                    Ok(worker) => {
                        let _ = ready_tx.send(Ok(()));
                        worker
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while let Ok(invocation) = invocations.recv() {
                    let result = worker.invoke(invocation.env);
                    let _ = invocation.reply.send(result);
                }
                tracing::debug!("Script worker for {} stopped", worker.id);
            })
            .map_err(|e| GatewayError::Load(format!("Failed to spawn script worker: {}", e)))?;

        ready_rx
            .recv()
            .map_err(|_| GatewayError::Load(format!("{}: script worker exited during load", id)))??;

        tracing::info!("Compiled script {}", id);
        Ok(Self { id, queue })
    }

    pub fn id(&self) -> &ScriptId {
        &self.id
    }
}

impl Handler for ScriptHandler {
    fn run(&self, env: Environ) -> Result<Response> {
        let (reply, response) = mpsc::sync_channel(1);
        self.queue
            .send(Invocation { env, reply })
            .map_err(|_| GatewayError::Handler(format!("{}: script worker is gone", self.id)))?;
        response
            .recv()
            .map_err(|_| GatewayError::Handler(format!("{}: script worker dropped the request", self.id)))?
    }
}

/// Thread-local half of a [`ScriptHandler`]: the context and its entry point.
struct ScriptWorker {
    id: ScriptId,
    ctx: Context,
    entry: JsObject,
    env_wrapper: JsObject,
}

impl ScriptWorker {
    fn new(id: ScriptId, source: &str, sink: Arc<dyn LogSink>) -> Result<Self> {
        let mut ctx = Context::default();

        bindings::install_gateway_bindings(&mut ctx, &id, sink)?;
        let env_wrapper = bindings::env_wrapper(&mut ctx)?;

        let script = Script::parse(Source::from_bytes(source), None, &mut ctx)
            .map_err(|e| GatewayError::Load(e.to_string()))?;
        script
            .evaluate(&mut ctx)
            .map_err(|e| GatewayError::Load(e.to_string()))?;

        let entry = ctx
            .global_object()
            .get(js_string!(ENTRY_POINT), &mut ctx)
            .map_err(|e| GatewayError::Load(e.to_string()))?;
        let entry = entry
            .as_object()
            .filter(|o| o.is_callable())
            .ok_or_else(|| GatewayError::Load(format!("{}: entry point not found", id)))?
            .clone();

        Ok(Self { id, ctx, entry, env_wrapper })
    }

    fn invoke(&mut self, env: Environ) -> Result<Response> {
        tracing::debug!("Invoking {}", self.id);
        let env = bindings::env_object(env, &self.env_wrapper, &mut self.ctx)?;

        let result = self
            .entry
            .call(&JsValue::undefined(), &[env], &mut self.ctx)
            .map_err(|e| GatewayError::Handler(format!("{}: {}", self.id, e)))?;

        js_to_response(result, &mut self.ctx)
    }
}
