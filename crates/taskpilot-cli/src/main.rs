use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Error;
use clap::{Parser, Subcommand};
use serde_json::json;

use taskpilot_core::brief;
use taskpilot_core::config::{ConfigError, StoreLocation, DEFAULT_PRIORITY};
use taskpilot_core::history::{self, ContextError, HistoryLog};
use taskpilot_core::interpreter::{self, ChatCommand, Interpretation};
use taskpilot_core::lifecycle::{Lifecycle, LifecycleError, Outcome};
use taskpilot_core::schedule;
use taskpilot_core::store::{Store, StoreError};
use taskpilot_core::task::{parse_target, CompleteTarget, IdError, Status, Task};

const EXIT_USER: u8 = 1;
const EXIT_ENV: u8 = 2;

#[derive(Parser)]
#[command(name = "taskpilot", version, about = "Local task tracker with an assistant context log")]
struct Cli {
    /// Project root holding tasks.json and context.json (default: cwd, or
    /// TASKPILOT_ROOT)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Machine-readable JSON output
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create empty tasks.json and context.json
    Init {
        #[arg(long)]
        project: Option<String>,
    },
    /// Add a task, or a subtask with --parent
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// 1 = highest, 3 = lowest
        #[arg(long)]
        priority: Option<u8>,
        #[arg(long)]
        parent: Option<u64>,
    },
    /// List tasks, optionally filtered by status
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// Show the next actionable task; --start begins working on it
    Next {
        #[arg(long)]
        start: bool,
    },
    /// Move a pending task to in-progress
    Start { id: u64 },
    /// Complete a task (`3`) or a single subtask (`3.2`)
    Complete { id: String },
    /// Park a pending or in-progress task
    Defer { id: u64 },
    /// Regenerate the assistant brief file
    Generate,
    /// Inspect or update the context log
    Context {
        #[command(subcommand)]
        command: ContextCommand,
    },
    /// Free-text command façade
    Chat {
        #[arg(trailing_var_arg = true, required = true)]
        text: Vec<String>,
    },
    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum ContextCommand {
    /// Status counts and last action
    Summary,
    /// History entries, optionally for one task
    History { id: Option<u64> },
    /// Record a manual note against a task
    Update {
        id: u64,
        #[arg(trailing_var_arg = true, required = true)]
        text: Vec<String>,
    },
    /// Heuristic next-step suggestion
    Suggest,
}

/// A failed command plus its exit code: 1 for user errors, 2 for
/// environment errors.
struct Failure {
    code: u8,
    error: Error,
}

impl Failure {
    fn user(error: impl Into<Error>) -> Self {
        Failure {
            code: EXIT_USER,
            error: error.into(),
        }
    }

    fn env(error: impl Into<Error>) -> Self {
        Failure {
            code: EXIT_ENV,
            error: error.into(),
        }
    }
}

impl From<LifecycleError> for Failure {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Store(store) => Failure::env(store),
            other => Failure::user(other),
        }
    }
}

impl From<StoreError> for Failure {
    fn from(err: StoreError) -> Self {
        Failure::env(err)
    }
}

impl From<ContextError> for Failure {
    fn from(err: ContextError) -> Self {
        Failure::env(err)
    }
}

impl From<ConfigError> for Failure {
    fn from(err: ConfigError) -> Self {
        Failure::env(err)
    }
}

impl From<IdError> for Failure {
    fn from(err: IdError) -> Self {
        Failure::user(err)
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { EXIT_USER } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            eprintln!("error: {:#}", failure.error);
            ExitCode::from(failure.code)
        }
    }
}

fn run(cli: Cli) -> Result<(), Failure> {
    let root = resolve_root(cli.root.clone());
    let (location, config) = StoreLocation::resolve(&root)?;
    let store = Store::new(location);
    let engine = Lifecycle::new(&store);
    let json = cli.json;

    match cli.command {
        Command::Init { project } => {
            let name = project
                .or_else(|| config.as_ref().and_then(|c| c.project.clone()))
                .unwrap_or_else(|| dir_name(&root));
            let file = engine.init(&name)?;
            if json {
                println!("{}", json!({ "ok": true, "project": file.project }));
            } else {
                println!("Initialized project '{}' in {}", file.project, root.display());
            }
        }
        Command::Add {
            title,
            description,
            priority,
            parent,
        } => {
            let outcome = match parent {
                Some(parent) => engine.add_subtask(parent, &title)?,
                None => {
                    let priority = priority
                        .or_else(|| config.as_ref().and_then(|c| c.default_priority))
                        .unwrap_or(DEFAULT_PRIORITY);
                    if !(1..=3).contains(&priority) {
                        return Err(Failure::user(Error::msg(format!(
                            "priority must be 1..=3, got {priority}"
                        ))));
                    }
                    engine.add_task(&title, description.as_deref(), priority)?
                }
            };
            report_warning(&outcome);
            if json {
                println!(
                    "{}",
                    json!({ "ok": true, "task": to_json(&outcome.task)? })
                );
            } else if parent.is_some() {
                let sub = outcome.task.subtasks.last().expect("just added");
                println!("Added subtask {} '{}'", sub.id, sub.title);
            } else {
                println!("Added task {} '{}'", outcome.task.id, outcome.task.title);
            }
        }
        Command::List { status } => {
            let filter = status.map(|s| s.parse::<Status>()).transpose()?;
            let file = store.load_tasks()?;
            warn_anomaly(&file.tasks);
            let tasks: Vec<&Task> = file
                .tasks
                .iter()
                .filter(|t| filter.map(|f| t.status == f).unwrap_or(true))
                .collect();
            if json {
                println!("{}", json!({ "project": file.project, "tasks": tasks }));
            } else if tasks.is_empty() {
                println!("No tasks.");
            } else {
                for task in tasks {
                    println!("{}", render_task_line(task));
                }
            }
        }
        Command::Next { start } => {
            let file = store.load_tasks()?;
            let next = schedule::next_task(&file.tasks).cloned();
            match next {
                None => {
                    if json {
                        println!("{}", json!({ "next": serde_json::Value::Null }));
                    } else {
                        println!("No pending tasks.");
                    }
                }
                Some(task) => {
                    if start {
                        let outcome = engine.start(task.id)?;
                        report_warning(&outcome);
                        if json {
                            println!(
                                "{}",
                                json!({ "ok": true, "started": to_json(&outcome.task)? })
                            );
                        } else {
                            println!(
                                "Started task {} '{}'",
                                outcome.task.id, outcome.task.title
                            );
                        }
                    } else if json {
                        println!("{}", json!({ "next": to_json(&task)? }));
                    } else {
                        println!("Next: {}", render_task_line(&task));
                    }
                }
            }
        }
        Command::Start { id } => {
            let outcome = engine.start(id)?;
            report_warning(&outcome);
            if json {
                println!("{}", json!({ "ok": true, "task": to_json(&outcome.task)? }));
            } else {
                println!("Started task {} '{}'", outcome.task.id, outcome.task.title);
            }
        }
        Command::Complete { id } => {
            let target = parse_target(&id).map_err(LifecycleError::from)?;
            let outcome = match target {
                CompleteTarget::Task(id) => engine.complete_task(id)?,
                CompleteTarget::Subtask(subtask) => engine.complete_subtask(subtask)?,
            };
            report_warning(&outcome);
            if json {
                println!(
                    "{}",
                    json!({
                        "ok": true,
                        "rolledUp": outcome.rolled_up,
                        "task": to_json(&outcome.task)?,
                    })
                );
            } else {
                match target {
                    CompleteTarget::Task(_) => {
                        println!(
                            "Completed task {} '{}'",
                            outcome.task.id, outcome.task.title
                        );
                    }
                    CompleteTarget::Subtask(subtask) => {
                        println!("Completed subtask {}", subtask);
                        if outcome.rolled_up {
                            println!(
                                "Task {} '{}' is done (all subtasks complete)",
                                outcome.task.id, outcome.task.title
                            );
                        }
                    }
                }
            }
        }
        Command::Defer { id } => {
            let outcome = engine.defer(id)?;
            report_warning(&outcome);
            if json {
                println!("{}", json!({ "ok": true, "task": to_json(&outcome.task)? }));
            } else {
                println!("Deferred task {} '{}'", outcome.task.id, outcome.task.title);
            }
        }
        Command::Generate => {
            let path = brief::write_brief(&store)?;
            if json {
                println!("{}", json!({ "ok": true, "path": path }));
            } else {
                println!("Wrote {}", path.display());
            }
        }
        Command::Context { command } => run_context(command, &store, json)?,
        Command::Chat { text } => run_chat(&text.join(" "), &store, &engine, json)?,
        Command::Version => {
            println!("taskpilot {}", taskpilot_core::version());
        }
    }
    Ok(())
}

fn run_context(command: ContextCommand, store: &Store, json: bool) -> Result<(), Failure> {
    let log = HistoryLog::new(store);
    match command {
        ContextCommand::Summary => {
            let tasks = store.load_tasks()?;
            let context = log.load()?;
            warn_anomaly(&tasks.tasks);
            let summary = history::project_summary(&tasks, &context);
            if json {
                let counts: serde_json::Map<String, serde_json::Value> = summary
                    .counts
                    .iter()
                    .map(|(status, count)| (status.to_string(), json!(count)))
                    .collect();
                println!(
                    "{}",
                    json!({
                        "project": summary.project,
                        "total": summary.total,
                        "counts": counts,
                        "activeTask": summary.active_task,
                        "lastAction": summary.last_action,
                    })
                );
            } else {
                println!("{}", summary.render());
            }
        }
        ContextCommand::History { id } => {
            let context = log.load()?;
            let entries: Vec<_> = match id {
                Some(id) => context.history_for(id).collect(),
                None => context.task_history.iter().collect(),
            };
            if json {
                println!("{}", json!({ "history": entries }));
            } else if entries.is_empty() {
                println!("No history.");
            } else {
                for entry in entries {
                    println!(
                        "{} [{}] task {}: {}",
                        entry.timestamp, entry.action, entry.task_id, entry.summary
                    );
                }
            }
        }
        ContextCommand::Update { id, text } => {
            let _guard = store.lock()?;
            let tasks = store.load_tasks()?;
            let task = tasks
                .find(id)
                .ok_or_else(|| Failure::from(LifecycleError::TaskNotFound(id)))?;
            log.update_note(task, &text.join(" "))?;
            if json {
                println!("{}", json!({ "ok": true }));
            } else {
                println!("Recorded note for task {}", id);
            }
        }
        ContextCommand::Suggest => {
            let tasks = store.load_tasks()?;
            let text = history::suggest(&tasks);
            if json {
                println!("{}", json!({ "suggestion": text }));
            } else {
                println!("{}", text);
            }
        }
    }
    Ok(())
}

fn run_chat(input: &str, store: &Store, engine: &Lifecycle<'_>, json: bool) -> Result<(), Failure> {
    match interpreter::interpret(input) {
        Interpretation::Unrecognized => Err(Failure::user(Error::msg(format!(
            "unrecognized command: '{input}'"
        )))),
        Interpretation::Command(command) => match command {
            ChatCommand::List => {
                let file = store.load_tasks()?;
                if json {
                    println!("{}", json!({ "project": file.project, "tasks": file.tasks }));
                } else if file.tasks.is_empty() {
                    println!("No tasks.");
                } else {
                    for task in &file.tasks {
                        println!("{}", render_task_line(task));
                    }
                }
                Ok(())
            }
            ChatCommand::Next => {
                let file = store.load_tasks()?;
                match schedule::next_task(&file.tasks) {
                    Some(task) => println!("Next: {}", render_task_line(task)),
                    None => println!("No pending tasks."),
                }
                Ok(())
            }
            ChatCommand::Start(id) => {
                let outcome = engine.start(id)?;
                report_warning(&outcome);
                println!("Started task {} '{}'", outcome.task.id, outcome.task.title);
                Ok(())
            }
            ChatCommand::Complete(target) => {
                let outcome = match target {
                    CompleteTarget::Task(id) => engine.complete_task(id)?,
                    CompleteTarget::Subtask(subtask) => engine.complete_subtask(subtask)?,
                };
                report_warning(&outcome);
                println!(
                    "Completed: task {} is now {}",
                    outcome.task.id, outcome.task.status
                );
                Ok(())
            }
            ChatCommand::Summary => {
                let tasks = store.load_tasks()?;
                let context = HistoryLog::new(store).load()?;
                println!("{}", history::project_summary(&tasks, &context).render());
                Ok(())
            }
            ChatCommand::Plan(text) => {
                let titles = interpreter::split_plan(&text);
                if titles.is_empty() {
                    return Err(Failure::user(Error::msg("no tasks found in plan text")));
                }
                let mut ids = Vec::new();
                for title in &titles {
                    let outcome = engine.add_task(title, None, DEFAULT_PRIORITY)?;
                    report_warning(&outcome);
                    ids.push(outcome.task.id);
                }
                if json {
                    println!("{}", json!({ "ok": true, "added": ids }));
                } else {
                    println!("Added {} tasks from plan", ids.len());
                }
                Ok(())
            }
        },
    }
}

fn resolve_root(flag: Option<PathBuf>) -> PathBuf {
    if let Some(root) = flag {
        return root;
    }
    if let Ok(root) = std::env::var("TASKPILOT_ROOT") {
        let trimmed = root.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn dir_name(root: &PathBuf) -> String {
    root.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("project")
        .to_string()
}

fn render_task_line(task: &Task) -> String {
    let subtasks = if task.subtasks.is_empty() {
        String::new()
    } else {
        let done = task
            .subtasks
            .iter()
            .filter(|s| s.status == taskpilot_core::task::SubtaskStatus::Done)
            .count();
        format!(" [{}/{} subtasks]", done, task.subtasks.len())
    };
    format!(
        "{} | {} | P{} | {}{}",
        task.id, task.status, task.priority, task.title, subtasks
    )
}

fn warn_anomaly(tasks: &[Task]) {
    if let Some(ids) = schedule::in_progress_anomaly(tasks) {
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        eprintln!(
            "warning: multiple tasks in progress ({}); expected at most one",
            ids.join(", ")
        );
    }
}

fn report_warning(outcome: &Outcome) {
    if let Some(warning) = &outcome.audit_warning {
        eprintln!("warning: {warning}");
    }
}

fn to_json(task: &Task) -> Result<serde_json::Value, Failure> {
    serde_json::to_value(task).map_err(|err| Failure::env(Error::new(err)))
}
