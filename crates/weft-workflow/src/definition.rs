//! Declarative workflow definition parser.
//!
//! Parses XML workflow files into `WorkflowDefinition` structs and
//! validates them before the engine admits them to the registry.
//!
//! # Example XML
//!
//! ```xml
//! <workflow id="7" name="nightly-report" enabled="true">
//!   <launch type="cron" expression="0 0 9 * * *"/>
//!   <tasks>
//!     <task id="fetch" kind="http">
//!       <param name="url" value="https://example.com/report"/>
//!     </task>
//!     <task id="store" kind="file_write" depends-on="fetch">
//!       <param name="path" value="/tmp/report.json"/>
//!     </task>
//!   </tasks>
//! </workflow>
//! ```
//!
//! `launch` is one of `startup` (run once at engine boot), `periodic`
//! (`period` in seconds), or `cron` (`expression`, seconds-first grammar;
//! classic five-field strings are accepted).

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use roxmltree::{Document, Node};

use weft_store::LaunchKind;

use crate::error::{Result, WorkflowError};

/// When a workflow runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchType {
    /// Once, inline, at engine boot.
    Startup,
    /// Every `every`, repeating forever, starting immediately.
    Periodic { every: Duration },
    /// At each occurrence of the cron expression.
    Cron { expression: String },
}

impl LaunchType {
    /// The persistence-layer classification of this launch policy.
    pub fn kind(&self) -> LaunchKind {
        match self {
            LaunchType::Startup => LaunchKind::Startup,
            LaunchType::Periodic { .. } => LaunchKind::Periodic,
            LaunchType::Cron { .. } => LaunchKind::Cron,
        }
    }
}

/// A single task within a workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    /// Unique task identifier within this workflow.
    pub id: String,
    /// What the task does; interpreted by the executor, opaque here.
    pub kind: String,
    /// Free-form parameters passed to the executor.
    pub params: HashMap<String, String>,
    /// Ids of tasks that must complete before this one runs.
    pub depends_on: Vec<String>,
}

/// A complete parsed workflow definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowDefinition {
    /// Unique workflow id; the registry rejects duplicates.
    pub id: i32,
    /// Display name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Disabled workflows are held in the registry but never scheduled
    /// and ignore control operations.
    pub enabled: bool,
    pub launch: LaunchType,
    pub tasks: Vec<TaskDefinition>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl WorkflowDefinition {
    /// Parse a workflow definition from an XML string.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let doc = Document::parse(xml).map_err(|e| WorkflowError::Xml(e.to_string()))?;
        let root = doc.root_element();
        if !root.has_tag_name("workflow") {
            return Err(WorkflowError::Invalid(format!(
                "Expected <workflow> root element, found <{}>",
                root.tag_name().name()
            )));
        }

        let id = required_attr(root, "id")?
            .parse::<i32>()
            .map_err(|_| WorkflowError::Invalid("Workflow id must be an integer".into()))?;
        let name = required_attr(root, "name")?.to_string();
        let description = root.attribute("description").unwrap_or_default().to_string();
        let enabled = match root.attribute("enabled") {
            None => true,
            Some(v) => v.parse::<bool>().map_err(|_| {
                WorkflowError::Invalid(format!("enabled must be true or false, found '{}'", v))
            })?,
        };

        let launch_node = child_element(root, "launch").ok_or_else(|| {
            WorkflowError::Invalid("Workflow must have a <launch> element".into())
        })?;
        let launch = parse_launch(launch_node)?;

        let tasks_node = child_element(root, "tasks")
            .ok_or_else(|| WorkflowError::Invalid("Workflow must have a <tasks> element".into()))?;
        let mut tasks = Vec::new();
        for node in tasks_node.children().filter(|n| n.is_element()) {
            if !node.has_tag_name("task") {
                return Err(WorkflowError::Invalid(format!(
                    "Unexpected <{}> element inside <tasks>",
                    node.tag_name().name()
                )));
            }
            tasks.push(parse_task(node)?);
        }

        Ok(Self {
            id,
            name,
            description,
            enabled,
            launch,
            tasks,
        })
    }

    /// Load a workflow definition from a file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WorkflowError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_xml(&contents)
    }
}

fn required_attr<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).filter(|v| !v.is_empty()).ok_or_else(|| {
        WorkflowError::Invalid(format!(
            "<{}> is missing required attribute '{}'",
            node.tag_name().name(),
            name
        ))
    })
}

fn child_element<'a, 'b>(node: Node<'a, 'b>, name: &str) -> Option<Node<'a, 'b>> {
    node.children().find(|n| n.is_element() && n.has_tag_name(name))
}

fn parse_launch(node: Node<'_, '_>) -> Result<LaunchType> {
    match required_attr(node, "type")? {
        "startup" => Ok(LaunchType::Startup),
        "periodic" => {
            let seconds = required_attr(node, "period")?
                .parse::<u64>()
                .map_err(|_| WorkflowError::Invalid("period must be a number of seconds".into()))?;
            Ok(LaunchType::Periodic {
                every: Duration::from_secs(seconds),
            })
        }
        "cron" => Ok(LaunchType::Cron {
            expression: required_attr(node, "expression")?.to_string(),
        }),
        other => Err(WorkflowError::Invalid(format!(
            "Unknown launch type '{}'",
            other
        ))),
    }
}

fn parse_task(node: Node<'_, '_>) -> Result<TaskDefinition> {
    let id = required_attr(node, "id")?.to_string();
    let kind = required_attr(node, "kind")?.to_string();
    let depends_on = node
        .attribute("depends-on")
        .unwrap_or_default()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let mut params = HashMap::new();
    for child in node.children().filter(|n| n.is_element()) {
        if !child.has_tag_name("param") {
            return Err(WorkflowError::Invalid(format!(
                "Unexpected <{}> element inside task '{}'",
                child.tag_name().name(),
                id
            )));
        }
        params.insert(
            required_attr(child, "name")?.to_string(),
            child.attribute("value").unwrap_or_default().to_string(),
        );
    }

    Ok(TaskDefinition {
        id,
        kind,
        params,
        depends_on,
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl WorkflowDefinition {
    /// Validate the workflow definition.
    ///
    /// Checks:
    /// - At least one task
    /// - No duplicate task ids
    /// - All dependency references point to existing tasks
    /// - No cycles in the dependency graph
    /// - A periodic launch has a non-zero period
    /// - A cron launch has a parseable expression
    pub fn validate(&self) -> Result<()> {
        match &self.launch {
            LaunchType::Startup => {}
            LaunchType::Periodic { every } => {
                if every.is_zero() {
                    return Err(WorkflowError::Invalid("period must be greater than zero".into()));
                }
            }
            LaunchType::Cron { expression } => {
                if !weft_scheduler::is_cron_expression_valid(expression) {
                    return Err(WorkflowError::InvalidCron(expression.clone()));
                }
            }
        }

        if self.tasks.is_empty() {
            return Err(WorkflowError::Invalid(
                "Workflow must have at least one task".into(),
            ));
        }

        let mut seen_ids = HashSet::new();
        for task in &self.tasks {
            if !seen_ids.insert(task.id.as_str()) {
                return Err(WorkflowError::Invalid(format!(
                    "Duplicate task id: {}",
                    task.id
                )));
            }
        }

        for task in &self.tasks {
            for dep in &task.depends_on {
                if !seen_ids.contains(dep.as_str()) {
                    return Err(WorkflowError::Invalid(format!(
                        "Task '{}' depends on unknown task '{}'",
                        task.id, dep
                    )));
                }
            }
        }

        self.detect_cycles()
    }

    /// Detect cycles in the task dependency graph using Kahn's algorithm.
    fn detect_cycles(&self) -> Result<()> {
        let id_to_idx: HashMap<&str, usize> = self
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), i))
            .collect();

        let n = self.tasks.len();
        let mut in_degree = vec![0usize; n];
        let mut adj: Vec<Vec<usize>> = vec![vec![]; n];

        for task in &self.tasks {
            let idx = id_to_idx[task.id.as_str()];
            for dep in &task.depends_on {
                let dep_idx = id_to_idx[dep.as_str()];
                adj[dep_idx].push(idx);
                in_degree[idx] += 1;
            }
        }

        let mut queue: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut visited = 0;

        while let Some(node) = queue.pop() {
            visited += 1;
            for &neighbor in &adj[node] {
                in_degree[neighbor] -= 1;
                if in_degree[neighbor] == 0 {
                    queue.push(neighbor);
                }
            }
        }

        if visited != n {
            return Err(WorkflowError::Invalid(
                "Cycle detected in task dependencies".into(),
            ));
        }

        Ok(())
    }
}
