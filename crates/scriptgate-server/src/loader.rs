//! Handler loading.
//!
//! The loader turns a resolved identifier into an [`EntryPoint`]:
//!
//! 1. The resource `<script_root>/<id>` must exist (`NotFound`, 404)
//! 2. Its first line must equal the marker line (`NotAnApplication`, 501)
//! 3. Module-style identifiers are served by the natively registered handler
//!    for their module path; everything else is compiled as JavaScript in a
//!    fresh context (`Load`, 500 on any failure)
//!
//! [`Loader::load_or_dummy`] folds every failure into a [`DummyHandler`] so
//! the result can always be cached and invoked.

use scriptgate_common::{GatewayError, Result, ScriptId};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::environ::LogSink;
use crate::handler::{DummyHandler, EntryPoint};
use crate::modules::{ModuleRegistry, module_path_for};
use crate::runtime::ScriptHandler;

/// Loads handler resources from a script root.
pub struct Loader {
    script_root: PathBuf,
    marker_line: String,
    module_suffix: String,
    modules: ModuleRegistry,
    sink: Arc<dyn LogSink>,
}

impl Loader {
    pub fn new(config: &GatewayConfig, modules: ModuleRegistry, sink: Arc<dyn LogSink>) -> Self {
        Self {
            script_root: config.script_root.clone(),
            marker_line: config.marker_line.clone(),
            module_suffix: config.module_suffix.clone(),
            modules,
            sink,
        }
    }

    /// Loads the handler for `id`.
    ///
    /// # Errors
    ///
    /// - `GatewayError::NotFound` if no resource exists for `id`
    /// - `GatewayError::NotAnApplication` if the first line is not the marker
    /// - `GatewayError::Load` if the module is not registered, the source fails
    ///   to compile or evaluate, or no `run` entry point is defined
    pub fn load(&self, id: &ScriptId) -> Result<EntryPoint> {
        let mut reader = self.open_application(id)?;

        if let Some(module_path) = module_path_for(id.as_str(), &self.module_suffix) {
            tracing::debug!("Loading {} as module '{}'", id, module_path);
            return self.modules.get(&module_path).ok_or_else(|| {
                GatewayError::Load(format!("{}: module '{}' is not registered", id, module_path))
            });
        }

        let mut source = String::new();
        reader
            .read_to_string(&mut source)
            .map_err(|e| GatewayError::Load(format!("{}: {}", id, e)))?;

        let handler = ScriptHandler::compile(id.clone(), source, self.sink.clone())?;
        Ok(Arc::new(handler))
    }

    /// Checks that `id` names an application resource without building it:
    /// the resource exists and starts with the marker line.
    ///
    /// # Errors
    ///
    /// `GatewayError::NotFound` or `GatewayError::NotAnApplication`, as for
    /// [`load`](Self::load).
    pub fn verify(&self, id: &ScriptId) -> Result<()> {
        self.open_application(id).map(|_| ())
    }

    /// Whether `id` is served by the native module registry.
    pub fn is_module_style(&self, id: &ScriptId) -> bool {
        module_path_for(id.as_str(), &self.module_suffix).is_some()
    }

    /// Opens the resource for `id` and consumes its marker line.
    fn open_application(&self, id: &ScriptId) -> Result<BufReader<File>> {
        let path = self
            .resource_path(id)
            .ok_or_else(|| GatewayError::NotFound(format!("{} not found", id)))?;

        let file = File::open(&path)
            .map_err(|_| GatewayError::NotFound(format!("{} not found", id)))?;
        let mut reader = BufReader::new(file);

        // Compared as bytes, so a binary resource reads as 501 rather than 500.
        let mut first_line = Vec::new();
        reader
            .read_until(b'\n', &mut first_line)
            .map_err(|e| GatewayError::Load(format!("{}: {}", id, e)))?;
        while matches!(first_line.last(), Some(b'\n' | b'\r')) {
            first_line.pop();
        }
        if first_line != self.marker_line.as_bytes() {
            return Err(GatewayError::NotAnApplication(format!(
                "{} is not a scriptgate application",
                id
            )));
        }
        Ok(reader)
    }

    /// Like [`load`](Self::load), but every failure becomes a
    /// [`DummyHandler`] answering with the failure's status and diagnostic.
    pub fn load_or_dummy(&self, id: &ScriptId) -> EntryPoint {
        match self.load(id) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", id, e);
                Arc::new(DummyHandler::from(e))
            }
        }
    }

    /// Maps `id` to a regular file under the script root.
    ///
    /// Identifiers that would escape the root (`..`, absolute components) and
    /// anything that is not a regular file have no resource.
    fn resource_path(&self, id: &ScriptId) -> Option<PathBuf> {
        if id.is_empty() {
            return None;
        }
        let relative = Path::new(id.as_str());
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }
        let path = self.script_root.join(relative);
        path.is_file().then_some(path)
    }
}
