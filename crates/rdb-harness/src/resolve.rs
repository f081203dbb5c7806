//! Locating companion scripts and the interpreter that runs them.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::{HarnessError, Result};

/// Maps a script name to an absolute path.
pub trait PathResolver: Send + Sync {
    fn resolve(&self, script: &str) -> Result<PathBuf>;
}

/// Resolves scripts as siblings inside one directory (normally the
/// directory holding the integration test sources).
#[derive(Debug, Clone)]
pub struct SiblingResolver {
    dir: PathBuf,
}

impl SiblingResolver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `tests/integration` under a crate's manifest dir.
    pub fn integration_dir(manifest_dir: impl AsRef<Path>) -> Self {
        Self::new(manifest_dir.as_ref().join("tests").join("integration"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PathResolver for SiblingResolver {
    fn resolve(&self, script: &str) -> Result<PathBuf> {
        let candidate = self.dir.join(script);
        if !candidate.is_file() {
            return Err(HarnessError::ScriptNotFound(candidate));
        }
        Ok(std::path::absolute(&candidate)?)
    }
}

/// Interpreter from an override (used verbatim, bytes included) or the default.
/// An empty override counts as unset.
pub fn resolve_interpreter(override_value: Option<&OsStr>, default: &str) -> OsString {
    match override_value {
        Some(value) if !value.is_empty() => value.to_os_string(),
        _ => OsString::from(default),
    }
}

/// Read the interpreter override from the process environment.
/// Values that are not valid UTF-8 are kept as-is.
pub fn interpreter_override(var: &str) -> Option<OsString> {
    std::env::var_os(var)
}
