//! Loading definition files into runtime workflows.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use weft_store::Store;

use crate::catalog::TaskCatalog;
use crate::error::Result;
use crate::executor::TaskExecutor;
use crate::workflow::Workflow;
use crate::WorkflowDefinition;

/// Paths the loader needs, lifted from the engine settings.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Scratch directory handed to every run.
    pub temp_dir: PathBuf,
    /// The workflow XML schema document, kept alongside the engine for
    /// operators and external validation tooling.
    pub schema_path: PathBuf,
    /// JSON catalog of known task kinds (optional).
    pub tasks_names_file: PathBuf,
    /// JSON catalog of required task params per kind (optional).
    pub tasks_settings_file: PathBuf,
}

/// Turns a definition file into a runtime [`Workflow`].
///
/// Failures are returned, not logged as errors: the engine decides how
/// loudly to report them, and it must never abort because one definition
/// is bad.
pub struct WorkflowLoader {
    temp_dir: PathBuf,
    catalog: TaskCatalog,
    store: Arc<dyn Store>,
    executor: Arc<dyn TaskExecutor>,
}

impl WorkflowLoader {
    pub fn new(config: LoaderConfig, store: Arc<dyn Store>, executor: Arc<dyn TaskExecutor>) -> Self {
        if !config.schema_path.as_os_str().is_empty() && !config.schema_path.exists() {
            warn!(
                "Workflow schema not found at {}",
                config.schema_path.display()
            );
        }
        let catalog = TaskCatalog::load(&config.tasks_names_file, &config.tasks_settings_file);
        Self {
            temp_dir: config.temp_dir,
            catalog,
            store,
            executor,
        }
    }

    /// Load, validate, and wrap the definition at `path`.
    pub fn load(&self, path: &Path) -> Result<Workflow> {
        debug!("Loading workflow file: {}", path.display());

        let definition = WorkflowDefinition::from_file(path)?;
        definition.validate()?;
        for task in &definition.tasks {
            self.catalog.check(task)?;
        }

        Ok(Workflow::new(
            definition,
            path.to_path_buf(),
            self.temp_dir.clone(),
            self.store.clone(),
            self.executor.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::NoopExecutor;
    use crate::LaunchType;
    use std::time::Duration;
    use weft_store::SqliteStore;

    fn loader_in(dir: &Path) -> WorkflowLoader {
        WorkflowLoader::new(
            LoaderConfig {
                temp_dir: dir.join("temp"),
                ..Default::default()
            },
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            Arc::new(NoopExecutor),
        )
    }

    fn write_workflow(dir: &Path, filename: &str, id: i32) -> PathBuf {
        let path = dir.join(filename);
        std::fs::write(
            &path,
            format!(
                r#"
<workflow id="{id}" name="wf-{id}">
  <launch type="periodic" period="60"/>
  <tasks><task id="t" kind="noop"/></tasks>
</workflow>"#
            ),
        )
        .unwrap();
        path
    }

    #[test]
    fn test_load_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workflow(dir.path(), "wf.xml", 3);

        let workflow = loader_in(dir.path()).load(&path).unwrap();
        assert_eq!(workflow.id(), 3);
        assert_eq!(workflow.name(), "wf-3");
        assert_eq!(workflow.file_path(), path);
        assert_eq!(
            workflow.launch_type(),
            &LaunchType::Periodic {
                every: Duration::from_secs(60)
            }
        );
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(loader_in(dir.path())
            .load(&dir.path().join("nope.xml"))
            .is_err());
    }

    #[test]
    fn test_load_invalid_definition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.xml");
        std::fs::write(&path, "<workflow id=\"1\" name=\"x\"></workflow>").unwrap();
        assert!(loader_in(dir.path()).load(&path).is_err());
    }

    #[test]
    fn test_load_enforces_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let names = dir.path().join("names.json");
        std::fs::write(&names, r#"["http"]"#).unwrap();

        let loader = WorkflowLoader::new(
            LoaderConfig {
                temp_dir: dir.path().join("temp"),
                tasks_names_file: names,
                ..Default::default()
            },
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            Arc::new(NoopExecutor),
        );

        let path = write_workflow(dir.path(), "wf.xml", 1);
        let err = loader.load(&path).unwrap_err();
        assert!(err.to_string().contains("unknown kind"));
    }
}
