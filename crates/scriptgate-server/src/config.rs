//! Connector configuration.
//!
//! This module holds the settings the loader and resolver need: where handler
//! resources live, which marker line a resource must start with, how
//! module-style handlers are recognised and where the alias table comes from.

use scriptgate_common::{GatewayError, Result};
use std::path::{Path, PathBuf};

/// First line every handler resource must carry.
pub const DEFAULT_MARKER_LINE: &str = "#!/usr/bin/env scriptgate";

/// Suffix that marks an identifier as a module-style handler.
pub const DEFAULT_MODULE_SUFFIX: &str = ".mod";

/// Environment variable consulted for the script root when none is given.
pub const SCRIPT_ROOT_ENV: &str = "SCRIPTGATE_ROOT";

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
///
/// # Fields
///
/// - `script_root` - Directory handler identifiers are resolved against
/// - `marker_line` - Required first line of every handler resource
/// - `module_suffix` - Identifier suffix selecting the module-style loader
/// - `alias_file` - Optional JSON file holding the alias table
///
/// # Example
///
/// ```
/// use scriptgate_server::GatewayConfig;
///
/// let root = tempfile::tempdir().unwrap();
/// let config = GatewayConfig::new(root.path())
///     .with_marker_line("#!/usr/bin/env hub")
///     .with_alias_file("/etc/hub/aliases.json");
/// assert!(config.validate().is_ok());
///
/// let missing = GatewayConfig::new(root.path().join("nowhere"));
/// assert!(missing.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub script_root: PathBuf,
    pub marker_line: String,
    pub module_suffix: String,
    pub alias_file: Option<PathBuf>,
}

impl GatewayConfig {
    pub fn new(script_root: impl Into<PathBuf>) -> Self {
        Self {
            script_root: script_root.into(),
            marker_line: DEFAULT_MARKER_LINE.to_string(),
            module_suffix: DEFAULT_MODULE_SUFFIX.to_string(),
            alias_file: None,
        }
    }

    /// Builds a configuration rooted at `$SCRIPTGATE_ROOT`.
    pub fn from_env() -> Result<Self> {
        let root = std::env::var_os(SCRIPT_ROOT_ENV).ok_or_else(|| {
            GatewayError::Config(format!("{} is not set", SCRIPT_ROOT_ENV))
        })?;
        Ok(Self::new(root))
    }

    pub fn with_marker_line(mut self, marker_line: impl Into<String>) -> Self {
        self.marker_line = marker_line.into();
        self
    }

    pub fn with_module_suffix(mut self, module_suffix: impl Into<String>) -> Self {
        self.module_suffix = module_suffix.into();
        self
    }

    pub fn with_alias_file(mut self, alias_file: impl Into<PathBuf>) -> Self {
        self.alias_file = Some(alias_file.into());
        self
    }

    pub fn script_root(&self) -> &Path {
        &self.script_root
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Config` if:
    /// - The marker line is empty or spans several lines
    /// - The module suffix is empty
    /// - The script root does not exist or is not a directory
    pub fn validate(&self) -> Result<()> {
        if self.marker_line.trim().is_empty() {
            return Err(GatewayError::Config("marker line must not be empty".into()));
        }
        if self.marker_line.contains('\n') {
            return Err(GatewayError::Config("marker line must be a single line".into()));
        }
        if self.module_suffix.is_empty() {
            return Err(GatewayError::Config("module suffix must not be empty".into()));
        }
        if !self.script_root.is_dir() {
            return Err(GatewayError::Config(format!(
                "script root is not a directory: {}",
                self.script_root.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::new("/tmp");
        assert_eq!(config.marker_line, DEFAULT_MARKER_LINE);
        assert_eq!(config.module_suffix, DEFAULT_MODULE_SUFFIX);
        assert!(config.alias_file.is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let config = GatewayConfig::new("/tmp")
            .with_marker_line("#!/bin/hub")
            .with_module_suffix(".native")
            .with_alias_file("/tmp/aliases.json");
        assert_eq!(config.marker_line, "#!/bin/hub");
        assert_eq!(config.module_suffix, ".native");
        assert_eq!(config.alias_file, Some(PathBuf::from("/tmp/aliases.json")));
    }

    #[test]
    fn test_validate_accepts_existing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GatewayConfig::new(dir.path()).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = GatewayConfig::new(dir.path().join("nope"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("script root"));
    }

    #[test]
    fn test_validate_rejects_bad_marker() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GatewayConfig::new(dir.path()).with_marker_line("").validate().is_err());
        assert!(GatewayConfig::new(dir.path()).with_marker_line("a\nb").validate().is_err());
        assert!(GatewayConfig::new(dir.path()).with_module_suffix("").validate().is_err());
    }
}
