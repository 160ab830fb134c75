//! Task-kind catalogs.
//!
//! Deployments may describe the task kinds their executor understands in
//! two JSON files: a names file (array of kind strings) and a settings
//! file (map of kind to required parameter names). When present, the
//! loader rejects definitions that reference unknown kinds or omit
//! required parameters. Absent or unreadable files disable the checks.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, warn};

use crate::definition::TaskDefinition;
use crate::error::{Result, WorkflowError};

/// Known task kinds and their required parameters.
#[derive(Debug, Clone, Default)]
pub struct TaskCatalog {
    /// Known kinds, when a names file was loaded.
    names: Option<HashSet<String>>,
    /// Required parameter names per kind, when a settings file was loaded.
    required_params: Option<HashMap<String, Vec<String>>>,
}

impl TaskCatalog {
    /// A catalog that accepts everything.
    pub fn permissive() -> Self {
        Self::default()
    }

    /// Load the catalogs from the configured files.
    ///
    /// Either path may be empty or point at a missing/unparsable file; the
    /// corresponding check is then skipped (with a warning for files that
    /// exist but don't parse).
    pub fn load(names_path: &Path, settings_path: &Path) -> Self {
        Self {
            names: read_json(names_path, "tasks names"),
            required_params: read_json(settings_path, "tasks settings"),
        }
    }

    /// Check one task against the catalogs.
    pub fn check(&self, task: &TaskDefinition) -> Result<()> {
        if let Some(names) = &self.names {
            if !names.contains(&task.kind) {
                return Err(WorkflowError::Invalid(format!(
                    "Task '{}' has unknown kind '{}'",
                    task.id, task.kind
                )));
            }
        }
        if let Some(required) = &self.required_params {
            if let Some(params) = required.get(&task.kind) {
                for param in params {
                    if !task.params.contains_key(param) {
                        return Err(WorkflowError::Invalid(format!(
                            "Task '{}' ({}) is missing required param '{}'",
                            task.id, task.kind, param
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Option<T> {
    if path.as_os_str().is_empty() || !path.exists() {
        debug!("No {} file at {}; checks disabled", what, path.display());
        return None;
    }
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read {} file {}: {}", what, path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Failed to parse {} file {}: {}", what, path.display(), e);
            None
        }
    }
}
