//! Output helpers shared by commands

use console::style;
use fleetdeck_kube::{DiffKind, DiffList};
use serde::Serialize;

use crate::error::Result;

/// Print a document as YAML, or pretty JSON with `json`
pub fn print_document<T: Serialize>(value: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        print!("{}", serde_yaml::to_string(value)?);
    }
    Ok(())
}

/// Print drift records, one block per object
pub fn print_diff_list(list: &DiffList, unified: bool) {
    if list.is_empty() {
        println!("{} no differences", style("✓").green());
        return;
    }

    for record in list.iter() {
        let marker = match record.kind {
            DiffKind::Changed => style("~").yellow(),
            DiffKind::MissingCrd => style("!").red(),
        };
        let note = match record.kind {
            DiffKind::Changed => String::new(),
            DiffKind::MissingCrd => format!(" {}", style("(CRD not registered)").dim()),
        };
        println!("{} {}{}", marker, style(record.label()).bold(), note);

        if unified {
            for line in record.unified_diff().lines() {
                println!("{}", color_diff_line(line));
            }
        } else {
            println!("{}", record.patch);
        }
        println!();
    }

    println!("{} object(s) differ", style(list.len()).yellow().bold());
}

fn color_diff_line(line: &str) -> String {
    if line.starts_with("+++") || line.starts_with("---") {
        style(line).bold().to_string()
    } else if line.starts_with('+') {
        style(line).green().to_string()
    } else if line.starts_with('-') {
        style(line).red().to_string()
    } else {
        line.to_string()
    }
}
