//! The in-memory workflow registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use weft_workflow::Workflow;

/// Why an insert was refused. The existing entry always wins.
#[derive(Debug, Error)]
pub enum RegistryConflict {
    #[error("Workflow id {id} from {incoming} is already registered by {existing}")]
    DuplicateId {
        id: i32,
        existing: PathBuf,
        incoming: PathBuf,
    },

    #[error("Workflow file {path} is already registered")]
    DuplicatePath { path: PathBuf },
}

/// Process-wide mapping of workflow id to loaded workflow, with a
/// secondary index by definition file path.
///
/// Ids and paths are unique. The registry itself is not synchronized: the
/// engine guards it (together with every scheduler mutation) behind one
/// coarse mutex, since watcher, scheduler, and operator threads all reach
/// it.
#[derive(Debug, Default)]
pub struct Registry {
    by_id: HashMap<i32, Workflow>,
    path_index: HashMap<PathBuf, i32>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a workflow, refusing duplicates by id or path.
    pub fn insert(&mut self, workflow: Workflow) -> Result<(), RegistryConflict> {
        let id = workflow.id();
        let path = workflow.file_path().to_path_buf();

        if let Some(existing) = self.by_id.get(&id) {
            return Err(RegistryConflict::DuplicateId {
                id,
                existing: existing.file_path().to_path_buf(),
                incoming: path,
            });
        }
        if self.path_index.contains_key(&path) {
            return Err(RegistryConflict::DuplicatePath { path });
        }

        self.path_index.insert(path, id);
        self.by_id.insert(id, workflow);
        Ok(())
    }

    pub fn get(&self, id: i32) -> Option<&Workflow> {
        self.by_id.get(&id)
    }

    pub fn get_by_path(&self, path: &Path) -> Option<&Workflow> {
        self.path_index.get(path).and_then(|id| self.by_id.get(id))
    }

    pub fn remove_by_id(&mut self, id: i32) -> Option<Workflow> {
        let workflow = self.by_id.remove(&id)?;
        self.path_index.remove(workflow.file_path());
        Some(workflow)
    }

    pub fn remove_by_path(&mut self, path: &Path) -> Option<Workflow> {
        let id = self.path_index.remove(path)?;
        self.by_id.remove(&id)
    }

    /// Snapshot of every registered workflow.
    pub fn workflows(&self) -> Vec<Workflow> {
        self.by_id.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use weft_store::SqliteStore;
    use weft_workflow::{NoopExecutor, WorkflowDefinition};

    fn workflow(id: i32, file: &str) -> Workflow {
        let definition = WorkflowDefinition::from_xml(&format!(
            r#"
<workflow id="{id}" name="wf-{id}">
  <launch type="startup"/>
  <tasks><task id="t" kind="noop"/></tasks>
</workflow>"#
        ))
        .unwrap();
        Workflow::new(
            definition,
            PathBuf::from(file),
            PathBuf::from("/tmp"),
            Arc::new(SqliteStore::open_in_memory().unwrap()),
            Arc::new(NoopExecutor),
        )
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = Registry::new();
        registry.insert(workflow(1, "/wf/a.xml")).unwrap();
        registry.insert(workflow(2, "/wf/b.xml")).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(1).unwrap().id(), 1);
        assert_eq!(
            registry.get_by_path(Path::new("/wf/b.xml")).unwrap().id(),
            2
        );
        assert!(registry.get(3).is_none());
        assert!(registry.get_by_path(Path::new("/wf/c.xml")).is_none());
    }

    #[test]
    fn test_duplicate_id_refused() {
        let mut registry = Registry::new();
        registry.insert(workflow(7, "/wf/a.xml")).unwrap();

        let err = registry.insert(workflow(7, "/wf/b.xml")).unwrap_err();
        let msg = err.to_string();
        // The conflict names both files.
        assert!(msg.contains("/wf/a.xml"));
        assert!(msg.contains("/wf/b.xml"));

        // The original entry survives untouched.
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get(7).unwrap().file_path(),
            Path::new("/wf/a.xml")
        );
    }

    #[test]
    fn test_duplicate_path_refused() {
        let mut registry = Registry::new();
        registry.insert(workflow(1, "/wf/a.xml")).unwrap();

        let err = registry.insert(workflow(2, "/wf/a.xml")).unwrap_err();
        assert!(matches!(err, RegistryConflict::DuplicatePath { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_by_id_clears_path_index() {
        let mut registry = Registry::new();
        registry.insert(workflow(1, "/wf/a.xml")).unwrap();

        let removed = registry.remove_by_id(1).unwrap();
        assert_eq!(removed.id(), 1);
        assert!(registry.is_empty());
        assert!(registry.get_by_path(Path::new("/wf/a.xml")).is_none());

        // The path is free again.
        registry.insert(workflow(2, "/wf/a.xml")).unwrap();
    }

    #[test]
    fn test_remove_by_path_clears_id() {
        let mut registry = Registry::new();
        registry.insert(workflow(1, "/wf/a.xml")).unwrap();

        let removed = registry.remove_by_path(Path::new("/wf/a.xml")).unwrap();
        assert_eq!(removed.id(), 1);
        assert!(registry.get(1).is_none());
        assert!(registry.remove_by_path(Path::new("/wf/a.xml")).is_none());
    }

    #[test]
    fn test_ids_stay_unique() {
        let mut registry = Registry::new();
        registry.insert(workflow(1, "/wf/a.xml")).unwrap();
        registry.insert(workflow(2, "/wf/b.xml")).unwrap();
        let _ = registry.insert(workflow(1, "/wf/c.xml"));

        let mut ids: Vec<i32> = registry.workflows().iter().map(|w| w.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), registry.len());
    }
}
