//! Table rendering for rule trees and replay reports.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use formcheck_model::{RuleNode, Severity};

use crate::scenario::ReplayReport;

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

/// One row per rule; children are indented under their condition.
pub fn rules_table(rules: &[RuleNode]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Operation"),
        header_cell("Flags"),
        header_cell("Target"),
        header_cell("Messages"),
    ]);
    apply_table_style(&mut table);
    add_rule_rows(&mut table, rules, 0);
    table
}

fn add_rule_rows(table: &mut Table, rules: &[RuleNode], depth: usize) {
    for rule in rules {
        let prefix = if depth == 0 {
            String::new()
        } else {
            format!("{}└ ", "  ".repeat(depth - 1))
        };
        let negation = if rule.negated { "~" } else { "" };
        let mut operation = Cell::new(format!("{prefix}{negation}{}", rule.operation));
        if rule.is_conditional() {
            operation = operation.add_attribute(Attribute::Bold);
        }
        let messages = rule
            .messages
            .iter()
            .map(|(outcome, text)| format!("{outcome}: {text}"))
            .collect::<Vec<_>>()
            .join("\n");
        table.add_row(vec![
            operation,
            Cell::new(rule_flags(rule)).fg(Color::DarkGrey),
            Cell::new(rule.control.as_deref().unwrap_or("-")),
            Cell::new(messages),
        ]);
        add_rule_rows(table, rule.children(), depth + 1);
    }
}

fn rule_flags(rule: &RuleNode) -> String {
    let mut flags = Vec::new();
    if rule.is_conditional() {
        flags.push("condition".to_string());
    }
    if rule.optional {
        flags.push("optional".to_string());
    }
    if let Some(endpoint) = rule.endpoint() {
        flags.push(format!("async {endpoint}"));
    }
    if flags.is_empty() {
        "-".to_string()
    } else {
        flags.join(", ")
    }
}

/// One row per rendered message; controls without messages get one row
/// showing their state.
pub fn report_table(report: &ReplayReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Control"),
        header_cell("State"),
        header_cell("Severity"),
        header_cell("Message"),
    ]);
    apply_table_style(&mut table);
    if let Some(column) = table.column_mut(1) {
        column.set_cell_alignment(CellAlignment::Center);
    }

    for control in &report.controls {
        let state = if control.loading {
            "loading".to_string()
        } else {
            control
                .state
                .iter()
                .map(Severity::as_str)
                .collect::<Vec<_>>()
                .join(" ")
        };
        if control.messages.is_empty() {
            table.add_row(vec![
                Cell::new(&control.control),
                Cell::new(state),
                dim_cell("-"),
                dim_cell("-"),
            ]);
            continue;
        }
        for message in &control.messages {
            let text = if message.async_originated {
                format!("{} (remote)", message.text)
            } else {
                message.text.clone()
            };
            table.add_row(vec![
                Cell::new(&control.control),
                Cell::new(&state),
                severity_cell(message.severity),
                Cell::new(text),
            ]);
        }
    }
    table
}

pub fn print_report(report: &ReplayReport) {
    if let Some(name) = &report.name {
        println!("Scenario: {name}");
    }
    println!("{}", report_table(report));
    match report.submitted {
        Some(true) => println!("Submit: accepted"),
        Some(false) => println!("Submit: blocked"),
        None => println!("Submit: not attempted"),
    }
    if report.pending > 0 {
        println!("Pending remote checks: {}", report.pending);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn severity_cell(severity: Option<Severity>) -> Cell {
    match severity {
        Some(Severity::Error) => Cell::new("error").fg(Color::Red),
        Some(Severity::Info) => Cell::new("info").fg(Color::Yellow),
        Some(Severity::Valid) => Cell::new("valid").fg(Color::Green),
        None => dim_cell("-"),
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
