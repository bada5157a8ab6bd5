//! Free-text command façade. A fixed set of patterns maps chat-style input
//! onto the structured command set; everything else is `Unrecognized`. The
//! rest of the crate never depends on string matching details, and the
//! patterns carry no compatibility guarantee.

use regex::Regex;

use crate::task::{parse_target, CompleteTarget};

#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    List,
    Next,
    Start(u64),
    Complete(CompleteTarget),
    Summary,
    /// Free-text plan to be split into tasks.
    Plan(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Command(ChatCommand),
    Unrecognized,
}

pub fn interpret(input: &str) -> Interpretation {
    let text = input.trim();
    if text.is_empty() {
        return Interpretation::Unrecognized;
    }
    let lower = text.to_lowercase();

    if let Some(rest) = strip_plan_prefix(text) {
        if rest.trim().is_empty() {
            return Interpretation::Unrecognized;
        }
        return Interpretation::Command(ChatCommand::Plan(rest.trim().to_string()));
    }

    let start_re = Regex::new(r"^(?:start|begin)(?:\s+(?:task|working on))?\s+#?(\d+)$")
        .expect("start pattern");
    if let Some(cap) = start_re.captures(&lower) {
        if let Ok(id) = cap[1].parse::<u64>() {
            return Interpretation::Command(ChatCommand::Start(id));
        }
    }

    let complete_re = Regex::new(r"^(?:complete|finish|done(?:\s+with)?)\s+(?:task\s+)?#?(\d+(?:\.\d+)?)$")
        .expect("complete pattern");
    if let Some(cap) = complete_re.captures(&lower) {
        if let Ok(target) = parse_target(&cap[1]) {
            return Interpretation::Command(ChatCommand::Complete(target));
        }
    }

    match lower.as_str() {
        "list" | "list tasks" | "show tasks" | "tasks" => {
            return Interpretation::Command(ChatCommand::List)
        }
        "next" | "next task" | "what's next" | "whats next" | "what is next" => {
            return Interpretation::Command(ChatCommand::Next)
        }
        "status" | "summary" | "progress" | "how are we doing" => {
            return Interpretation::Command(ChatCommand::Summary)
        }
        _ => {}
    }

    Interpretation::Unrecognized
}

fn strip_plan_prefix(text: &str) -> Option<&str> {
    let lower = text.to_lowercase();
    for prefix in ["plan:", "create tasks from", "make tasks from"] {
        if lower.starts_with(prefix) {
            return Some(&text[prefix.len()..]);
        }
    }
    None
}

/// Best-effort heuristic splitter: numbered or bulleted lines become task
/// titles; a single paragraph falls back to sentence splitting. Not a
/// guaranteed-correct extractor.
pub fn split_plan(text: &str) -> Vec<String> {
    let item_re = Regex::new(r"^\s*(?:\d+[.)]\s+|[-*]\s+)(.+)$").expect("item pattern");
    let mut items: Vec<String> = text
        .lines()
        .filter_map(|line| item_re.captures(line))
        .map(|cap| cap[1].trim().to_string())
        .filter(|title| !title.is_empty())
        .collect();
    if !items.is_empty() {
        return items;
    }

    // No list markers: treat each non-empty line as an item, or fall back to
    // sentences for a one-line paragraph.
    items = text
        .lines()
        .map(|line| line.trim().trim_end_matches('.').to_string())
        .filter(|line| !line.is_empty())
        .collect();
    if items.len() > 1 {
        return items;
    }
    text.split(['.', ';'])
        .map(|part| part.trim().to_string())
        .filter(|part| part.len() > 3)
        .collect()
}
