//! CLI output formatting.
//!
//! Tables for the inspection commands and highlighted JSON for `--json`.

use std::fmt::Write;

use colored::Colorize;
use serde_json::Value;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Modify, Style};
use tabled::{Table, Tabled};

const INDENT: &str = "  ";

/// Prints JSON with syntax highlighting.
///
/// Keys are cyan, strings green, numbers yellow, booleans and null magenta.
pub fn print_highlighted_json(value: &Value) {
    println!("{}", highlight_json(value));
}

/// Renders `value` as pretty-printed, highlighted JSON.
#[must_use]
pub fn highlight_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, 0);
    out
}

fn write_value(out: &mut String, value: &Value, depth: usize) {
    match value {
        Value::Null => out.push_str(&"null".magenta().to_string()),
        Value::Bool(flag) => out.push_str(&flag.to_string().magenta().to_string()),
        Value::Number(number) => out.push_str(&number.to_string().yellow().to_string()),
        Value::String(text) => out.push_str(&quoted(text).green().to_string()),
        Value::Array(items) => {
            write_container(out, depth, ('[', ']'), items.iter().map(|item| (None, item)));
        }
        Value::Object(map) => {
            write_container(
                out,
                depth,
                ('{', '}'),
                map.iter().map(|(key, item)| (Some(key.as_str()), item)),
            );
        }
    }
}

fn write_container<'a>(
    out: &mut String,
    depth: usize,
    (open, close): (char, char),
    entries: impl ExactSizeIterator<Item = (Option<&'a str>, &'a Value)>,
) {
    if entries.len() == 0 {
        let _ = write!(out, "{}", format!("{open}{close}").white().bold());
        return;
    }

    let _ = writeln!(out, "{}", open.to_string().white().bold());
    let count = entries.len();
    for (position, (key, item)) in entries.enumerate() {
        out.push_str(&INDENT.repeat(depth + 1));
        if let Some(key) = key {
            let _ = write!(out, "{}{} ", quoted(key).cyan(), ":".white());
        }
        write_value(out, item, depth + 1);
        if position + 1 < count {
            out.push_str(&",".white().to_string());
        }
        out.push('\n');
    }
    out.push_str(&INDENT.repeat(depth));
    out.push_str(&close.to_string().white().bold().to_string());
}

fn quoted(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("\"{text}\""))
}

/// Prints a bold `title (count)` heading followed by a rounded table, or
/// `empty` dimmed when there are no rows.
pub fn print_table<T: Tabled>(title: &str, rows: Vec<T>, empty: &str) {
    if rows.is_empty() {
        println!("{}", empty.dimmed());
        return;
    }

    let count = rows.len();
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::right()))
        .to_string();

    println!("{}", format!("{title} ({count})").bold());
    println!("{table}");
}

/// Truncates a string to `max_chars` characters, ending with an ellipsis
/// when shortened.
#[must_use]
pub fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Formats a boolean as a colored check mark.
#[must_use]
pub fn format_bool(value: bool) -> String {
    if value { "✓".green().to_string() } else { "✗".red().to_string() }
}

/// Formats a bit mask; zero reads as "any".
#[must_use]
pub fn format_mask(mask: u32) -> String {
    if mask == 0 { "any".to_string() } else { format!("{mask:#06x}") }
}
