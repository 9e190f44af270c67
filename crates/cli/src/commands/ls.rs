//! ls command - List the immediate children of a prefix
//!
//! Keys are flat; a child with further segments below it is shown as a
//! directory. `--raw` skips the projection and prints every key.

use clap::Args;
use comfy_table::{presets, Cell, CellAlignment, ContentArrangement, Table};
use qs_core::{DirectoryEntry, ListEntry};
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// List a prefix as a directory
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Key prefix to list (empty lists the bucket root)
    #[arg(default_value = "")]
    pub prefix: String,

    /// Print every key under the prefix instead of its immediate children
    #[arg(long)]
    pub raw: bool,

    /// Summarize output (show totals only)
    #[arg(long)]
    pub summarize: bool,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput<T> {
    prefix: String,
    items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<Summary>,
}

#[derive(Debug, Serialize)]
struct Summary {
    files: usize,
    dirs: usize,
    total_size_bytes: i64,
    total_size_human: String,
}

impl Summary {
    fn of(children: &[DirectoryEntry]) -> Self {
        let total: i64 = children.iter().filter_map(|c| c.size).sum();
        Self {
            files: children.iter().filter(|c| !c.is_dir).count(),
            dirs: children.iter().filter(|c| c.is_dir).count(),
            total_size_bytes: total,
            total_size_human: humansize::format_size(total.max(0) as u64, humansize::BINARY),
        }
    }
}

/// Execute the ls command
pub async fn execute(args: LsArgs, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let client = match ctx.client(&formatter).await {
        Ok(c) => c,
        Err(code) => return code,
    };

    if args.raw {
        return match client.list_all(&args.prefix).await {
            Ok(entries) => {
                print_raw(&args.prefix, &entries, &formatter);
                ExitCode::Success
            }
            Err(e) => {
                formatter.error(&format!("Failed to list '{}': {e}", args.prefix));
                ExitCode::from_error(&e)
            }
        };
    }

    let children = match client.list_directory(&args.prefix).await {
        Ok(children) => children,
        Err(e) => {
            formatter.error(&format!("Failed to list '{}': {e}", args.prefix));
            return ExitCode::from_error(&e);
        }
    };

    let summary = Summary::of(&children);

    if formatter.is_json() {
        formatter.json(&LsOutput {
            prefix: args.prefix,
            items: children,
            summary: args.summarize.then_some(summary),
        });
    } else {
        if !args.summarize && !children.is_empty() {
            formatter.println(&render_table(&children).to_string());
        }
        if args.summarize {
            formatter.println(&format!(
                "Total: {} file(s), {} dir(s), {}",
                summary.files, summary.dirs, summary.total_size_human
            ));
        }
    }

    ExitCode::Success
}

fn print_raw(prefix: &str, entries: &[ListEntry], formatter: &Formatter) {
    if formatter.is_json() {
        formatter.json(&LsOutput {
            prefix: prefix.to_string(),
            items: entries.to_vec(),
            summary: None,
        });
        return;
    }
    for entry in entries {
        formatter.println(&format!(
            "[{}] {:>10} {}",
            formatter.dim(&format_time(entry.put_time)),
            entry.size_human(),
            entry.key
        ));
    }
}

fn format_time(secs: i64) -> String {
    jiff::Timestamp::from_second(secs)
        .map(|t| t.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn storage_class(tag: i32) -> &'static str {
    match tag {
        1 => "IA",
        2 => "ARCHIVE",
        3 => "DEEP",
        _ => "STD",
    }
}

fn render_table(children: &[DirectoryEntry]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["MODIFIED", "SIZE", "CLASS", "NAME"]);

    for child in children {
        let (modified, class, name) = if child.is_dir {
            (String::new(), "", format!("{}/", child.name))
        } else {
            (
                child.put_time.map(format_time).unwrap_or_default(),
                storage_class(child.type_tag.unwrap_or(0)),
                child.name.clone(),
            )
        };
        table.add_row(vec![
            Cell::new(modified),
            Cell::new(child.size_human()).set_alignment(CellAlignment::Right),
            Cell::new(class),
            Cell::new(name),
        ]);
    }
    table
}
