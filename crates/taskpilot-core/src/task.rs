use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DESCRIPTION: &str = "no description";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Pending,
    InProgress,
    Done,
    Deferred,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in-progress",
            Status::Done => "done",
            Status::Deferred => "deferred",
        }
    }

    pub fn all() -> [Status; 4] {
        [
            Status::Pending,
            Status::InProgress,
            Status::Done,
            Status::Deferred,
        ]
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Status::Pending),
            "in-progress" => Ok(Status::InProgress),
            "done" => Ok(Status::Done),
            "deferred" => Ok(Status::Deferred),
            other => Err(IdError::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtaskStatus {
    Pending,
    Done,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    /// Composite key `"<parentId>.<ordinal>"`, ordinal 1-based, never reused.
    pub id: String,
    pub title: String,
    pub status: SubtaskStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub status: Status,
    /// 1 = highest, 3 = lowest.
    pub priority: u8,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    pub fn new(id: u64, title: &str, description: Option<&str>, priority: u8) -> Self {
        let now = now_rfc3339();
        Task {
            id,
            title: title.trim().to_string(),
            description: description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            status: Status::Pending,
            priority: priority.clamp(1, 3),
            subtasks: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = now_rfc3339();
    }

    /// Next subtask ordinal: one past the highest ever assigned, so ordinals
    /// are never reused even if the sequence has gaps.
    pub fn next_subtask_ordinal(&self) -> u32 {
        self.subtasks
            .iter()
            .filter_map(|s| s.id.rsplit('.').next())
            .filter_map(|ord| ord.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1
    }

    pub fn add_subtask(&mut self, title: &str) -> &Subtask {
        let ordinal = self.next_subtask_ordinal();
        self.subtasks.push(Subtask {
            id: format!("{}.{}", self.id, ordinal),
            title: title.trim().to_string(),
            status: SubtaskStatus::Pending,
        });
        self.touch();
        self.subtasks.last().expect("just pushed")
    }

    pub fn all_subtasks_done(&self) -> bool {
        !self.subtasks.is_empty()
            && self
                .subtasks
                .iter()
                .all(|s| s.status == SubtaskStatus::Done)
    }
}

/// Root document persisted as `tasks.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFile {
    pub project: String,
    pub version: String,
    pub tasks: Vec<Task>,
}

impl TaskFile {
    pub fn new(project: &str) -> Self {
        TaskFile {
            project: project.trim().to_string(),
            version: "0.1.0".to_string(),
            tasks: Vec::new(),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1
    }

    pub fn find(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn find_mut(&mut self, id: u64) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("invalid id '{0}': expected <n> or <n>.<m>")]
    Invalid(String),
    #[error("unknown status '{0}'")]
    UnknownStatus(String),
}

/// A parsed subtask reference such as `2.1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubtaskRef {
    pub task: u64,
    pub ordinal: u32,
}

impl SubtaskRef {
    pub fn key(&self) -> String {
        format!("{}.{}", self.task, self.ordinal)
    }
}

impl fmt::Display for SubtaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.task, self.ordinal)
    }
}

/// Target of a `complete` command: a whole task or a single subtask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompleteTarget {
    Task(u64),
    Subtask(SubtaskRef),
}

pub fn parse_target(raw: &str) -> Result<CompleteTarget, IdError> {
    let raw = raw.trim();
    if let Some((task, ordinal)) = raw.split_once('.') {
        let task = task
            .parse::<u64>()
            .map_err(|_| IdError::Invalid(raw.to_string()))?;
        let ordinal = ordinal
            .parse::<u32>()
            .map_err(|_| IdError::Invalid(raw.to_string()))?;
        if task == 0 || ordinal == 0 {
            return Err(IdError::Invalid(raw.to_string()));
        }
        return Ok(CompleteTarget::Subtask(SubtaskRef { task, ordinal }));
    }
    let task = raw
        .parse::<u64>()
        .map_err(|_| IdError::Invalid(raw.to_string()))?;
    if task == 0 {
        return Err(IdError::Invalid(raw.to_string()));
    }
    Ok(CompleteTarget::Task(task))
}

pub fn now_rfc3339() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn next_id_is_one_for_empty_store() {
        let file = TaskFile::new("demo");
        assert_eq!(file.next_id(), 1);
    }

    #[test]
    fn next_id_exceeds_every_existing_id() {
        let mut file = TaskFile::new("demo");
        file.tasks.push(Task::new(7, "a", None, 2));
        file.tasks.push(Task::new(3, "b", None, 1));
        let next = file.next_id();
        assert!(file.tasks.iter().all(|t| next > t.id));
        assert_eq!(next, 8);
    }

    #[test]
    fn new_task_defaults_description() {
        let task = Task::new(1, "  Example ", None, 2);
        assert_eq!(task.title, "Example");
        assert_eq!(task.description, DEFAULT_DESCRIPTION);
        assert_eq!(task.status, Status::Pending);
    }

    #[test]
    fn subtask_ordinals_are_never_reused() {
        let mut task = Task::new(2, "parent", None, 2);
        task.add_subtask("one");
        task.add_subtask("two");
        assert_eq!(task.subtasks[1].id, "2.2");
        task.subtasks.remove(0);
        task.add_subtask("three");
        assert_eq!(task.subtasks.last().unwrap().id, "2.3");
    }

    #[test]
    fn all_subtasks_done_requires_at_least_one() {
        let mut task = Task::new(1, "t", None, 1);
        assert!(!task.all_subtasks_done());
        task.add_subtask("a");
        assert!(!task.all_subtasks_done());
        task.subtasks[0].status = SubtaskStatus::Done;
        assert!(task.all_subtasks_done());
    }

    #[test]
    fn parse_target_accepts_task_and_subtask_forms() {
        assert_eq!(parse_target("3").unwrap(), CompleteTarget::Task(3));
        assert_eq!(
            parse_target(" 2.1 ").unwrap(),
            CompleteTarget::Subtask(SubtaskRef { task: 2, ordinal: 1 })
        );
    }

    #[test]
    fn parse_target_rejects_malformed_ids() {
        assert!(matches!(parse_target("abc"), Err(IdError::Invalid(_))));
        assert!(matches!(parse_target("2."), Err(IdError::Invalid(_))));
        assert!(matches!(parse_target("0"), Err(IdError::Invalid(_))));
        assert!(matches!(parse_target("1.0"), Err(IdError::Invalid(_))));
    }

    #[test]
    fn status_round_trips_through_serde_names() {
        let json = serde_json::to_string(&Status::InProgress).expect("serialize");
        assert_eq!(json, "\"in-progress\"");
        let back: Status = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, Status::InProgress);
    }
}
