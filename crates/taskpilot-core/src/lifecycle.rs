//! Status transitions over the task store. Every operation here is one
//! locked read-modify-write: mutate in memory, save `tasks.json`, then
//! append to the history log. A history append that fails after a confirmed
//! store write is reported as a warning on the outcome, never as an error,
//! so the two documents cannot disagree about the store's contents.

use std::path::PathBuf;

use thiserror::Error;

use crate::history::{Action, ActiveTask, ContextState, HistoryEntry, HistoryLog};
use crate::schedule;
use crate::store::{Store, StoreError};
use crate::task::{IdError, Status, SubtaskRef, SubtaskStatus, Task, TaskFile};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("task {0} not found")]
    TaskNotFound(u64),
    #[error("subtask {0} not found")]
    SubtaskNotFound(String),
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("title must not be empty")]
    EmptyTitle,
    #[error("task {active} is already in progress")]
    AlreadyActive { active: u64 },
    #[error("task {id} is {status}, cannot {op}")]
    BadState {
        id: u64,
        status: Status,
        op: &'static str,
    },
    #[error("already initialized: {}", .0.display())]
    AlreadyInitialized(PathBuf),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<IdError> for LifecycleError {
    fn from(err: IdError) -> Self {
        LifecycleError::InvalidId(err.to_string())
    }
}

/// Result of a mutating operation: a snapshot of the affected task, whether
/// a subtask completion cascaded to the parent, and any history-append
/// warning.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub task: Task,
    pub rolled_up: bool,
    pub audit_warning: Option<String>,
}

impl Outcome {
    fn new(task: Task) -> Self {
        Outcome {
            task,
            rolled_up: false,
            audit_warning: None,
        }
    }
}

pub struct Lifecycle<'a> {
    store: &'a Store,
}

impl<'a> Lifecycle<'a> {
    pub fn new(store: &'a Store) -> Self {
        Lifecycle { store }
    }

    /// Create empty `tasks.json` and `context.json`. Refuses to clobber an
    /// existing store.
    pub fn init(&self, project: &str) -> Result<TaskFile, LifecycleError> {
        let _guard = self.store.lock()?;
        if self.store.tasks_exist() {
            return Err(LifecycleError::AlreadyInitialized(
                self.store.location().tasks_path().to_path_buf(),
            ));
        }
        let file = TaskFile::new(project);
        self.store.save_tasks(&file)?;
        self.store.save_context(&ContextState::empty(project))?;
        Ok(file)
    }

    pub fn add_task(
        &self,
        title: &str,
        description: Option<&str>,
        priority: u8,
    ) -> Result<Outcome, LifecycleError> {
        if title.trim().is_empty() {
            return Err(LifecycleError::EmptyTitle);
        }
        let _guard = self.store.lock()?;
        let mut file = self.store.load_tasks()?;
        let task = Task::new(file.next_id(), title, description, priority);
        file.tasks.push(task.clone());
        self.store.save_tasks(&file)?;

        let mut outcome = Outcome::new(task);
        let entry = HistoryEntry::new(
            &outcome.task,
            Action::Update,
            &format!("Added task {} '{}'", outcome.task.id, outcome.task.title),
        );
        self.append_guarded(entry, ActiveTask::Unchanged, &mut outcome);
        Ok(outcome)
    }

    pub fn add_subtask(&self, parent: u64, title: &str) -> Result<Outcome, LifecycleError> {
        if title.trim().is_empty() {
            return Err(LifecycleError::EmptyTitle);
        }
        let _guard = self.store.lock()?;
        let mut file = self.store.load_tasks()?;
        let task = file
            .find_mut(parent)
            .ok_or(LifecycleError::TaskNotFound(parent))?;
        if task.status == Status::Done {
            // A pending subtask under a done parent would break the rollup
            // invariant.
            return Err(LifecycleError::BadState {
                id: parent,
                status: task.status,
                op: "add a subtask",
            });
        }
        let subtask_id = task.add_subtask(title).id.clone();
        let snapshot = task.clone();
        self.store.save_tasks(&file)?;

        let mut outcome = Outcome::new(snapshot);
        let entry = HistoryEntry::new(
            &outcome.task,
            Action::Update,
            &format!("Added subtask {} '{}'", subtask_id, title.trim()),
        );
        self.append_guarded(entry, ActiveTask::Unchanged, &mut outcome);
        Ok(outcome)
    }

    /// `pending -> in-progress`, enforcing the single-active-task invariant
    /// uniformly, whatever path the caller came through.
    pub fn start(&self, id: u64) -> Result<Outcome, LifecycleError> {
        let _guard = self.store.lock()?;
        let mut file = self.store.load_tasks()?;
        if file.find(id).is_none() {
            return Err(LifecycleError::TaskNotFound(id));
        }
        if let Some(active) = schedule::current_task(&file.tasks) {
            if active.id != id {
                return Err(LifecycleError::AlreadyActive { active: active.id });
            }
        }
        let task = file.find_mut(id).expect("checked above");
        if task.status != Status::Pending {
            return Err(LifecycleError::BadState {
                id,
                status: task.status,
                op: "start",
            });
        }
        let old = task.status;
        task.status = Status::InProgress;
        task.touch();
        let snapshot = task.clone();
        self.store.save_tasks(&file)?;

        let mut outcome = Outcome::new(snapshot);
        let entry = HistoryEntry::new(
            &outcome.task,
            Action::Start,
            &format!("Started task {} '{}'", id, outcome.task.title),
        )
        .with_status_change(old, Status::InProgress);
        self.append_guarded(entry, ActiveTask::Activate(id), &mut outcome);
        Ok(outcome)
    }

    /// Mark a task done from any state. Idempotent: completing a done task
    /// succeeds and records its own history entry. Forces all subtasks done.
    pub fn complete_task(&self, id: u64) -> Result<Outcome, LifecycleError> {
        let _guard = self.store.lock()?;
        let mut file = self.store.load_tasks()?;
        let task = file.find_mut(id).ok_or(LifecycleError::TaskNotFound(id))?;
        let old = task.status;
        task.status = Status::Done;
        for subtask in &mut task.subtasks {
            subtask.status = SubtaskStatus::Done;
        }
        task.touch();
        let snapshot = task.clone();
        self.store.save_tasks(&file)?;

        let mut outcome = Outcome::new(snapshot);
        let entry = HistoryEntry::new(
            &outcome.task,
            Action::Complete,
            &format!("Completed task {} '{}'", id, outcome.task.title),
        )
        .with_status_change(old, Status::Done);
        self.append_guarded(entry, ActiveTask::Release(id), &mut outcome);
        Ok(outcome)
    }

    /// Mark one subtask done; when the last one closes, cascade the parent
    /// to done (rollup). The parent's `updated_at` is stamped either way.
    pub fn complete_subtask(&self, subtask: SubtaskRef) -> Result<Outcome, LifecycleError> {
        let _guard = self.store.lock()?;
        let mut file = self.store.load_tasks()?;
        let task = file
            .find_mut(subtask.task)
            .ok_or(LifecycleError::TaskNotFound(subtask.task))?;
        let key = subtask.key();
        let entry_target = task
            .subtasks
            .iter_mut()
            .find(|s| s.id == key)
            .ok_or(LifecycleError::SubtaskNotFound(key.clone()))?;
        entry_target.status = SubtaskStatus::Done;

        let old = task.status;
        let rolled_up = task.all_subtasks_done() && task.status != Status::Done;
        if rolled_up {
            task.status = Status::Done;
        }
        task.touch();
        let snapshot = task.clone();
        self.store.save_tasks(&file)?;

        let mut outcome = Outcome::new(snapshot);
        outcome.rolled_up = rolled_up;
        let update = HistoryEntry::new(
            &outcome.task,
            Action::Update,
            &format!("Completed subtask {}", key),
        );
        self.append_guarded(update, ActiveTask::Unchanged, &mut outcome);
        if rolled_up {
            let complete = HistoryEntry::new(
                &outcome.task,
                Action::Complete,
                &format!(
                    "Completed task {} '{}' (all subtasks done)",
                    outcome.task.id, outcome.task.title
                ),
            )
            .with_status_change(old, Status::Done);
            self.append_guarded(complete, ActiveTask::Release(outcome.task.id), &mut outcome);
        }
        Ok(outcome)
    }

    /// Park a task. Reachable from `pending`/`in-progress` only; there is no
    /// automated way back, callers restart work via explicit commands.
    pub fn defer(&self, id: u64) -> Result<Outcome, LifecycleError> {
        let _guard = self.store.lock()?;
        let mut file = self.store.load_tasks()?;
        let task = file.find_mut(id).ok_or(LifecycleError::TaskNotFound(id))?;
        if !matches!(task.status, Status::Pending | Status::InProgress) {
            return Err(LifecycleError::BadState {
                id,
                status: task.status,
                op: "defer",
            });
        }
        let old = task.status;
        task.status = Status::Deferred;
        task.touch();
        let snapshot = task.clone();
        self.store.save_tasks(&file)?;

        let mut outcome = Outcome::new(snapshot);
        let entry = HistoryEntry::new(
            &outcome.task,
            Action::Update,
            &format!("Deferred task {} '{}'", id, outcome.task.title),
        )
        .with_status_change(old, Status::Deferred);
        self.append_guarded(entry, ActiveTask::Release(id), &mut outcome);
        Ok(outcome)
    }

    fn append_guarded(&self, entry: HistoryEntry, active: ActiveTask, outcome: &mut Outcome) {
        let log = HistoryLog::new(self.store);
        if let Err(err) = log.append(entry, active) {
            let warning = format!("store updated but history append failed: {err}");
            outcome.audit_warning = match outcome.audit_warning.take() {
                Some(existing) => Some(format!("{existing}; {warning}")),
                None => Some(warning),
            };
        }
    }
}
