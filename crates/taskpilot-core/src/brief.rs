//! Renders the assistant brief: a write-only text file meant to be injected
//! into an external coding assistant's prompt. Regenerated on demand, never
//! parsed back in.

use std::path::PathBuf;

use crate::history::{self, ContextState};
use crate::schedule;
use crate::store::{atomic_write, Store, StoreError};
use crate::task::{SubtaskStatus, TaskFile};

pub fn render_brief(tasks: &TaskFile, context: &ContextState) -> String {
    let mut lines = Vec::new();
    lines.push(format!("# Project context: {}", tasks.project));
    lines.push(String::new());
    lines.push(format!("Version: {}", tasks.version));
    lines.push(format!("Last updated: {}", context.last_updated));
    if !context.project_state.is_empty() {
        lines.push(String::new());
        lines.push(context.project_state.clone());
    }

    lines.push(String::new());
    lines.push("## Status".to_string());
    for (status, count) in schedule::status_counts(&tasks.tasks) {
        lines.push(format!("- {}: {}", status, count));
    }

    lines.push(String::new());
    lines.push("## Active task".to_string());
    match schedule::current_task(&tasks.tasks) {
        Some(task) => {
            lines.push(format!(
                "{}: {} (priority {})",
                task.id, task.title, task.priority
            ));
            lines.push(task.description.clone());
            for subtask in &task.subtasks {
                let mark = match subtask.status {
                    SubtaskStatus::Done => "x",
                    SubtaskStatus::Pending => " ",
                };
                lines.push(format!("- [{}] {} {}", mark, subtask.id, subtask.title));
            }
        }
        None => lines.push("None.".to_string()),
    }

    if let Some(next) = schedule::next_task(&tasks.tasks) {
        lines.push(String::new());
        lines.push("## Next up".to_string());
        lines.push(format!(
            "{}: {} (priority {})",
            next.id, next.title, next.priority
        ));
    }

    let recent: Vec<String> = context
        .task_history
        .iter()
        .rev()
        .take(5)
        .map(|entry| format!("- [{}] {}", entry.action, entry.summary))
        .collect();
    if !recent.is_empty() {
        lines.push(String::new());
        lines.push("## Recent activity".to_string());
        lines.extend(recent);
    }

    lines.push(String::new());
    lines.push(history::suggest(tasks));
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Load both documents, render, and overwrite the brief file.
pub fn write_brief(store: &Store) -> Result<PathBuf, StoreError> {
    let tasks = store.load_tasks()?;
    let context = store.load_context()?;
    let path = store.location().brief_path().to_path_buf();
    atomic_write(&path, &render_brief(&tasks, &context))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreLocation;
    use crate::task::{Status, Task};
    use tempfile::TempDir;

    #[test]
    fn render_brief_shows_active_task_and_subtasks() {
        let mut file = TaskFile::new("demo");
        let mut task = Task::new(1, "Build parser", None, 1);
        task.status = Status::InProgress;
        task.add_subtask("tokenizer");
        file.tasks.push(task);
        let context = ContextState::empty("demo");

        let text = render_brief(&file, &context);
        assert!(text.contains("# Project context: demo"));
        assert!(text.contains("1: Build parser (priority 1)"));
        assert!(text.contains("- [ ] 1.1 tokenizer"));
    }

    #[test]
    fn write_brief_creates_the_file() {
        let temp = TempDir::new().expect("tempdir");
        let store = Store::new(StoreLocation::new(temp.path()));
        store.save_tasks(&TaskFile::new("demo")).expect("tasks");
        store
            .save_context(&ContextState::empty("demo"))
            .expect("context");

        let path = write_brief(&store).expect("brief");
        let text = std::fs::read_to_string(path).expect("read");
        assert!(text.contains("## Active task"));
        assert!(text.contains("None."));
    }

    #[test]
    fn write_brief_requires_both_documents() {
        let temp = TempDir::new().expect("tempdir");
        let store = Store::new(StoreLocation::new(temp.path()));
        assert!(write_brief(&store).is_err());
    }
}
