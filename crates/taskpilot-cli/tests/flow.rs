use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_taskpilot"))
}

fn run(root: &Path, args: &[&str]) -> std::process::Output {
    bin()
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("run taskpilot")
}

fn json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("json stdout")
}

#[test]
fn init_add_next_start_complete_flow() {
    let repo = TempDir::new().expect("repo");
    let root = repo.path();

    let init = run(root, &["init", "--project", "demo", "--json"]);
    assert!(init.status.success());
    assert_eq!(json(&init)["project"], "demo");
    assert!(root.join("tasks.json").exists());
    assert!(root.join("context.json").exists());

    // Priorities [3,1,2,1]: next must be the first priority-1 task (id 2).
    for (title, priority) in [("a", "3"), ("b", "1"), ("c", "2"), ("d", "1")] {
        let add = run(root, &["add", title, "--priority", priority]);
        assert!(add.status.success());
    }

    let next = run(root, &["next", "--json"]);
    assert!(next.status.success());
    let picked = &json(&next)["next"];
    assert_eq!(picked["id"], 2);
    assert_eq!(picked["priority"], 1);

    let started = run(root, &["next", "--start", "--json"]);
    assert!(started.status.success());
    assert_eq!(json(&started)["started"]["status"], "in-progress");

    let complete = run(root, &["complete", "2", "--json"]);
    assert!(complete.status.success());
    assert_eq!(json(&complete)["task"]["status"], "done");

    let summary = run(root, &["context", "summary", "--json"]);
    assert!(summary.status.success());
    let summary = json(&summary);
    assert_eq!(summary["total"], 4);
    assert_eq!(summary["counts"]["done"], 1);
    assert_eq!(summary["activeTask"], Value::Null);
}

#[test]
fn init_twice_is_a_user_error() {
    let repo = TempDir::new().expect("repo");
    assert!(run(repo.path(), &["init"]).status.success());
    let second = run(repo.path(), &["init"]);
    assert_eq!(second.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&second.stderr);
    assert!(stderr.contains("already initialized"));
}

#[test]
fn subtask_completion_rolls_up_via_cli() {
    let repo = TempDir::new().expect("repo");
    let root = repo.path();
    assert!(run(root, &["init"]).status.success());
    assert!(run(root, &["add", "filler"]).status.success());
    assert!(run(root, &["add", "Parent"]).status.success());
    assert!(run(root, &["add", "first", "--parent", "2"]).status.success());
    assert!(run(root, &["add", "second", "--parent", "2"]).status.success());

    let partial = run(root, &["complete", "2.1", "--json"]);
    assert!(partial.status.success());
    let partial = json(&partial);
    assert_eq!(partial["rolledUp"], false);
    assert_eq!(partial["task"]["status"], "pending");

    let full = run(root, &["complete", "2.2", "--json"]);
    assert!(full.status.success());
    let full = json(&full);
    assert_eq!(full["rolledUp"], true);
    assert_eq!(full["task"]["status"], "done");

    let history = run(root, &["context", "history", "2", "--json"]);
    assert!(history.status.success());
    let entries = json(&history)["history"].as_array().expect("array").clone();
    let completes = entries
        .iter()
        .filter(|e| e["action"] == "complete")
        .count();
    assert_eq!(completes, 1);
}

#[test]
fn list_filters_by_status() {
    let repo = TempDir::new().expect("repo");
    let root = repo.path();
    assert!(run(root, &["init"]).status.success());
    assert!(run(root, &["add", "a"]).status.success());
    assert!(run(root, &["add", "b"]).status.success());
    assert!(run(root, &["start", "1"]).status.success());

    let pending = run(root, &["list", "--status", "pending", "--json"]);
    assert!(pending.status.success());
    let tasks = json(&pending)["tasks"].as_array().expect("array").clone();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], 2);

    let bogus = run(root, &["list", "--status", "bogus"]);
    assert_eq!(bogus.status.code(), Some(1));
}

#[test]
fn defer_releases_active_task() {
    let repo = TempDir::new().expect("repo");
    let root = repo.path();
    assert!(run(root, &["init"]).status.success());
    assert!(run(root, &["add", "a"]).status.success());
    assert!(run(root, &["start", "1"]).status.success());

    let defer = run(root, &["defer", "1", "--json"]);
    assert!(defer.status.success());
    assert_eq!(json(&defer)["task"]["status"], "deferred");

    let summary = run(root, &["context", "summary", "--json"]);
    assert_eq!(json(&summary)["activeTask"], Value::Null);
}
