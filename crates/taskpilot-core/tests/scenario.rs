//! End-to-end flows through the public core API, store on disk.

use tempfile::TempDir;

use taskpilot_core::config::StoreLocation;
use taskpilot_core::history::{self, Action};
use taskpilot_core::lifecycle::Lifecycle;
use taskpilot_core::schedule;
use taskpilot_core::store::Store;
use taskpilot_core::task::{Status, SubtaskRef};

#[test]
fn single_task_flow_from_init_to_done() {
    let temp = TempDir::new().expect("tempdir");
    let store = Store::new(StoreLocation::new(temp.path()));
    let engine = Lifecycle::new(&store);

    let file = engine.init("demo").expect("init");
    assert_eq!(file.next_id(), 1);

    engine.add_task("A", None, 1).expect("add");
    let file = store.load_tasks().expect("load");
    assert_eq!(file.tasks.len(), 1);
    assert_eq!(file.tasks[0].id, 1);
    assert_eq!(file.tasks[0].status, Status::Pending);
    assert_eq!(schedule::next_task(&file.tasks).map(|t| t.id), Some(1));

    engine.start(1).expect("start");
    let file = store.load_tasks().expect("load");
    assert_eq!(file.tasks[0].status, Status::InProgress);

    engine.complete_task(1).expect("complete");
    let file = store.load_tasks().expect("load");
    assert_eq!(file.tasks[0].status, Status::Done);

    let context = store.load_context().expect("context");
    let completes = context
        .task_history
        .iter()
        .filter(|e| e.task_id == 1 && e.action == Action::Complete)
        .count();
    assert_eq!(completes, 1);
    assert_eq!(context.current_context.active_task, None);
}

#[test]
fn subtask_rollup_flow() {
    let temp = TempDir::new().expect("tempdir");
    let store = Store::new(StoreLocation::new(temp.path()));
    let engine = Lifecycle::new(&store);
    engine.init("demo").expect("init");
    engine.add_task("filler", None, 3).expect("add");
    engine.add_task("Parent", None, 1).expect("add");
    engine.add_subtask(2, "first").expect("sub");
    engine.add_subtask(2, "second").expect("sub");

    engine
        .complete_subtask(SubtaskRef { task: 2, ordinal: 1 })
        .expect("2.1");
    let file = store.load_tasks().expect("load");
    assert_eq!(file.find(2).expect("task 2").status, Status::Pending);

    let outcome = engine
        .complete_subtask(SubtaskRef { task: 2, ordinal: 2 })
        .expect("2.2");
    assert!(outcome.rolled_up);
    let file = store.load_tasks().expect("load");
    assert_eq!(file.find(2).expect("task 2").status, Status::Done);

    let context = store.load_context().expect("context");
    let updates = context
        .history_for(2)
        .filter(|e| e.action == Action::Update && e.summary.starts_with("Completed subtask"))
        .count();
    let completes = context
        .history_for(2)
        .filter(|e| e.action == Action::Complete)
        .count();
    assert_eq!(updates, 2);
    assert_eq!(completes, 1);
}

#[test]
fn summary_reflects_store_and_context() {
    let temp = TempDir::new().expect("tempdir");
    let store = Store::new(StoreLocation::new(temp.path()));
    let engine = Lifecycle::new(&store);
    engine.init("demo").expect("init");
    engine.add_task("A", None, 1).expect("add");
    engine.add_task("B", None, 2).expect("add");
    engine.start(1).expect("start");

    let tasks = store.load_tasks().expect("tasks");
    let context = store.load_context().expect("context");
    let summary = history::project_summary(&tasks, &context);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.active_task, Some(1));
    assert!(summary
        .counts
        .iter()
        .any(|(status, count)| *status == Status::InProgress && *count == 1));
    assert!(summary.render().contains("Project: demo (2 tasks)"));
}
