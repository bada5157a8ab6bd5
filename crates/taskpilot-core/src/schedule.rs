//! Pure selection functions over a task snapshot. The priority space is
//! small (three levels) and task counts are small, so every call is a full
//! rescan; no incremental queue.

use crate::task::{Status, Task};

/// The next actionable task: `pending`, numerically smallest priority, ties
/// broken by original list order. `min_by_key` would return the last of
/// equal candidates, so the scan keeps the first explicitly.
pub fn next_task(tasks: &[Task]) -> Option<&Task> {
    let mut best: Option<&Task> = None;
    for task in tasks.iter().filter(|t| t.status == Status::Pending) {
        match best {
            Some(current) if task.priority >= current.priority => {}
            _ => best = Some(task),
        }
    }
    best
}

/// The task currently in progress. By convention there is at most one; if
/// the invariant has been violated the first is returned and
/// [`in_progress_anomaly`] reports the rest.
pub fn current_task(tasks: &[Task]) -> Option<&Task> {
    tasks.iter().find(|t| t.status == Status::InProgress)
}

/// More than one in-progress task is a detectable inconsistency. Callers
/// report it; nothing here resolves it silently.
pub fn in_progress_anomaly(tasks: &[Task]) -> Option<Vec<u64>> {
    let ids: Vec<u64> = tasks
        .iter()
        .filter(|t| t.status == Status::InProgress)
        .map(|t| t.id)
        .collect();
    if ids.len() > 1 {
        Some(ids)
    } else {
        None
    }
}

/// Counts per status, in enum order, including zeroes.
pub fn status_counts(tasks: &[Task]) -> Vec<(Status, usize)> {
    Status::all()
        .into_iter()
        .map(|status| (status, tasks.iter().filter(|t| t.status == status).count()))
        .collect()
}
