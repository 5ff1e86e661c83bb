//! Table and JSON output

use colored::Colorize;
use dms_core::{format_timestamp, LogEntry, Rule, RuleKind};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// Global flag for JSON output mode
static JSON_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_json_mode(enabled: bool) {
    JSON_MODE.store(enabled, Ordering::SeqCst);
}

pub fn is_json_mode() -> bool {
    JSON_MODE.load(Ordering::SeqCst)
}

/// Print `value` as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing to JSON: {}", e),
    }
}

#[derive(Tabled)]
pub struct RuleRow {
    #[tabled(rename = "name")]
    pub name: String,
    #[tabled(rename = "kind")]
    pub kind: String,
    #[tabled(rename = "argument")]
    pub argument: String,
    #[tabled(rename = "every")]
    pub every: String,
}

impl From<&Rule> for RuleRow {
    fn from(rule: &Rule) -> Self {
        RuleRow {
            name: rule.name.clone(),
            kind: format_kind(rule.kind),
            argument: rule.argument.clone(),
            every: format_frequency(rule.frequency_secs),
        }
    }
}

#[derive(Tabled)]
pub struct LogRow {
    #[tabled(rename = "time")]
    pub time: String,
    #[tabled(rename = "rule")]
    pub rule: String,
    #[tabled(rename = "result")]
    pub result: String,
}

impl From<&LogEntry> for LogRow {
    fn from(entry: &LogEntry) -> Self {
        LogRow {
            time: entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            rule: entry.rule_name.clone(),
            result: single_line(&entry.result),
        }
    }
}

pub fn print_rules_table(rules: &[Rule]) {
    if is_json_mode() {
        print_json(rules);
        return;
    }

    if rules.is_empty() {
        println!("No rules defined");
        return;
    }

    let rows: Vec<RuleRow> = rules.iter().map(RuleRow::from).collect();
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(3)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}

pub fn print_rule_detail(rule: &Rule) {
    if is_json_mode() {
        print_json(rule);
        return;
    }

    println!("{}", "─".repeat(50));
    println!("  {} │ {}", "Name".bold(), rule.name);
    println!("  {} │ {}", "Kind".bold(), format_kind(rule.kind));
    println!("  {} │ {}", "Argument".bold(), rule.argument);
    println!("  {} │ {}", "Every".bold(), format_frequency(rule.frequency_secs));
    println!("{}", "─".repeat(50));
}

pub fn print_logs_table(entries: &[LogEntry]) {
    if is_json_mode() {
        print_json(entries);
        return;
    }

    if entries.is_empty() {
        println!("No results recorded");
        return;
    }

    let rows: Vec<LogRow> = entries.iter().map(LogRow::from).collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}

pub fn print_log_entry(entry: &LogEntry) {
    if is_json_mode() {
        print_json(entry);
        return;
    }

    println!(
        "{} {} {}",
        format_timestamp(&entry.timestamp).dimmed(),
        entry.rule_name.bold(),
        entry.result.trim_end()
    );
}

/// Print the output of an on-demand run
pub fn print_run_result(name: &str, result: &str) {
    if is_json_mode() {
        print_json(&serde_json::json!({ "rule": name, "result": result }));
        return;
    }

    print_success(&format!("Rule {} ran", name));
    if !result.is_empty() {
        println!("{}", result.trim_end());
    }
}

fn format_kind(kind: RuleKind) -> String {
    match kind {
        RuleKind::File => "file".cyan().to_string(),
        RuleKind::Command => "command".magenta().to_string(),
        RuleKind::Cpu => "cpu".yellow().to_string(),
    }
}

/// Human form of a rule period; 0 means the rule only runs on demand
pub fn format_frequency(secs: u64) -> String {
    if secs == 0 {
        return "manual".to_string();
    }
    if secs >= 86400 {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    } else if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// Collapse multi-line output so it fits a table cell
fn single_line(result: &str) -> String {
    let trimmed = result.trim_end();
    let mut lines = trimmed.lines();
    match (lines.next(), lines.next()) {
        (Some(first), Some(_)) => format!("{} …", first),
        (Some(first), None) => first.to_string(),
        (None, _) => String::new(),
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_error(message: &str) {
    if is_json_mode() {
        let body = serde_json::json!({ "success": false, "error": message });
        if let Ok(json) = serde_json::to_string_pretty(&body) {
            eprintln!("{}", json);
        }
        return;
    }
    eprintln!("{} {}", "✗".red(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}
