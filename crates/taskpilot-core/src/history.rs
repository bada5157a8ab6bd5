use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schedule;
use crate::store::{Store, StoreError};
use crate::task::{now_rfc3339, Status, SubtaskStatus, Task, TaskFile};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("context log unavailable: {}", .0.display())]
    Unavailable(PathBuf),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Start,
    Update,
    Complete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Start => "start",
            Action::Update => "update",
            Action::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// One immutable audit record. `task_title` is a snapshot taken when the
/// entry was written, not a live join against the task store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub task_id: u64,
    pub task_title: String,
    pub action: Action,
    pub summary: String,
    pub timestamp: String,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl HistoryEntry {
    pub fn new(task: &Task, action: Action, summary: &str) -> Self {
        HistoryEntry {
            task_id: task.id,
            task_title: task.title.clone(),
            action,
            summary: summary.to_string(),
            timestamp: now_rfc3339(),
            details: Map::new(),
        }
    }

    pub fn with_status_change(mut self, old: Status, new: Status) -> Self {
        self.details
            .insert("oldStatus".to_string(), Value::String(old.to_string()));
        self.details
            .insert("newStatus".to_string(), Value::String(new.to_string()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentContext {
    #[serde(default)]
    pub active_task: Option<u64>,
    #[serde(default)]
    pub summary: String,
}

/// The `context.json` document: append-only history plus a small mutable
/// head describing the current state of play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextState {
    pub last_updated: String,
    #[serde(default)]
    pub project_state: String,
    #[serde(default)]
    pub task_history: Vec<HistoryEntry>,
    #[serde(default)]
    pub current_context: CurrentContext,
}

impl ContextState {
    pub fn empty(project: &str) -> Self {
        ContextState {
            last_updated: now_rfc3339(),
            project_state: format!("Project '{}' initialized.", project),
            task_history: Vec::new(),
            current_context: CurrentContext::default(),
        }
    }

    /// Entries for one task, in insertion (chronological) order. The iterator
    /// borrows the state, so calling this again restarts from the beginning.
    pub fn history_for(&self, task_id: u64) -> impl Iterator<Item = &HistoryEntry> + '_ {
        self.task_history
            .iter()
            .filter(move |entry| entry.task_id == task_id)
    }
}

/// How an append affects `currentContext.activeTask`. The default derivation
/// follows the action (`start` activates, `complete` releases); `defer` needs
/// to release with an `update` action, hence the explicit variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveTask {
    Unchanged,
    Activate(u64),
    Release(u64),
}

impl ActiveTask {
    pub fn for_action(action: Action, task_id: u64) -> Self {
        match action {
            Action::Start => ActiveTask::Activate(task_id),
            Action::Complete => ActiveTask::Release(task_id),
            Action::Update => ActiveTask::Unchanged,
        }
    }
}

pub struct HistoryLog<'a> {
    store: &'a Store,
}

impl<'a> HistoryLog<'a> {
    pub fn new(store: &'a Store) -> Self {
        HistoryLog { store }
    }

    pub fn load(&self) -> Result<ContextState, ContextError> {
        match self.store.load_context() {
            Ok(state) => Ok(state),
            Err(StoreError::NotFound(path)) => Err(ContextError::Unavailable(path)),
            Err(err) => Err(err.into()),
        }
    }

    /// Append one entry and rewrite the context head, then persist. Does
    /// not take the store lock; callers hold it across the whole
    /// read-modify-write.
    pub fn append(&self, entry: HistoryEntry, active: ActiveTask) -> Result<(), ContextError> {
        let mut state = self.load()?;
        match active {
            ActiveTask::Unchanged => {}
            ActiveTask::Activate(id) => state.current_context.active_task = Some(id),
            ActiveTask::Release(id) => {
                if state.current_context.active_task == Some(id) {
                    state.current_context.active_task = None;
                }
            }
        }
        state.current_context.summary = entry.summary.clone();
        state.last_updated = entry.timestamp.clone();
        state.task_history.push(entry);
        self.store.save_context(&state)?;
        Ok(())
    }

    /// Manual note against a task, recorded as an `update` entry.
    pub fn update_note(&self, task: &Task, text: &str) -> Result<(), ContextError> {
        let entry = HistoryEntry::new(task, Action::Update, text.trim());
        self.append(entry, ActiveTask::Unchanged)
    }
}

#[derive(Debug, Clone)]
pub struct ProjectSummary {
    pub project: String,
    pub total: usize,
    pub counts: Vec<(Status, usize)>,
    pub active_task: Option<u64>,
    pub last_action: String,
}

impl ProjectSummary {
    pub fn render(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Project: {} ({} tasks)", self.project, self.total));
        for (status, count) in &self.counts {
            lines.push(format!("  {:<12} {}", status.to_string(), count));
        }
        match self.active_task {
            Some(id) => lines.push(format!("Active task: {}", id)),
            None => lines.push("Active task: none".to_string()),
        }
        if !self.last_action.is_empty() {
            lines.push(format!("Last action: {}", self.last_action));
        }
        lines.join("\n")
    }
}

/// Derive status counts and a digest from the two documents. Pure read.
pub fn project_summary(tasks: &TaskFile, context: &ContextState) -> ProjectSummary {
    ProjectSummary {
        project: tasks.project.clone(),
        total: tasks.tasks.len(),
        counts: schedule::status_counts(&tasks.tasks),
        active_task: context.current_context.active_task,
        last_action: context.current_context.summary.clone(),
    }
}

/// Heuristic next-step advice derived from scheduler state. Local only, no
/// assistant call.
pub fn suggest(tasks: &TaskFile) -> String {
    if let Some(current) = schedule::current_task(&tasks.tasks) {
        let open = current
            .subtasks
            .iter()
            .find(|s| s.status == SubtaskStatus::Pending);
        return match open {
            Some(sub) => format!(
                "Finish task {} '{}': next open subtask is {} '{}'.",
                current.id, current.title, sub.id, sub.title
            ),
            None => format!(
                "Finish task {} '{}' and mark it complete.",
                current.id, current.title
            ),
        };
    }
    if let Some(next) = schedule::next_task(&tasks.tasks) {
        return format!(
            "Start task {} '{}' (priority {}).",
            next.id, next.title, next.priority
        );
    }
    if tasks.tasks.iter().all(|t| t.status == Status::Done) && !tasks.tasks.is_empty() {
        return "All tasks are done. Add new tasks or close out the project.".to_string();
    }
    "No pending tasks. Review deferred tasks or add new ones.".to_string()
}
