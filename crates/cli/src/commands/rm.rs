//! rm command - Remove objects by prefix
//!
//! Every key under each given prefix is deleted, one at a time. Each key
//! gets its own outcome; one failure does not stop the rest.

use clap::Args;
use qs_core::{OpOutcome, OpStatus};
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Remove objects
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Key prefix(es) to remove
    #[arg(required = true)]
    pub prefixes: Vec<String>,

    /// Only show what would be deleted (dry run)
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    dry_run: bool,
    /// Keys a dry run would remove; nothing was attempted for them
    #[serde(skip_serializing_if = "Vec::is_empty")]
    planned: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcomes: Option<Vec<OpOutcome>>,
    deleted: usize,
    failed: usize,
}

impl RmOutput {
    fn new(outcomes: Vec<OpOutcome>) -> Self {
        let failed = outcomes
            .iter()
            .filter(|o| o.status == OpStatus::Error)
            .count();
        Self {
            status: if failed == 0 { "success" } else { "partial" },
            dry_run: false,
            planned: Vec::new(),
            deleted: outcomes.len() - failed,
            failed,
            outcomes: Some(outcomes),
        }
    }

    fn planned(keys: Vec<String>) -> Self {
        Self {
            status: "planned",
            dry_run: true,
            planned: keys,
            outcomes: None,
            deleted: 0,
            failed: 0,
        }
    }
}

/// Execute the rm command
pub async fn execute(args: RmArgs, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let client = match ctx.client(&formatter).await {
        Ok(c) => c,
        Err(code) => return code,
    };

    if args.dry_run {
        let mut keys = Vec::new();
        for prefix in &args.prefixes {
            match client.list_all(prefix).await {
                Ok(entries) => keys.extend(entries.into_iter().map(|e| e.key)),
                Err(e) => {
                    formatter.error(&format!("Failed to list '{prefix}': {e}"));
                    return ExitCode::from_error(&e);
                }
            }
        }

        let output = RmOutput::planned(keys);
        if formatter.is_json() {
            formatter.json(&output);
        } else {
            for key in &output.planned {
                formatter.println(&format!("Would remove: {key}"));
            }
        }
        return ExitCode::Success;
    }

    let output = match client.delete_by_prefix(&args.prefixes).await {
        Ok(outcomes) => RmOutput::new(outcomes),
        Err(e) => {
            formatter.error(&format!("Failed to remove: {e}"));
            return ExitCode::from_error(&e);
        }
    };

    if formatter.is_json() {
        formatter.json(&output);
    } else {
        for outcome in output.outcomes.iter().flatten() {
            match outcome.status {
                OpStatus::Success => formatter.println(&format!("Removed: {}", outcome.key)),
                OpStatus::Error => {
                    formatter.error(&format!("{}: {}", outcome.key, outcome.message))
                }
            }
        }
        formatter.success(&format!(
            "Removed {} object(s), {} failed.",
            output.deleted, output.failed
        ));
    }

    if output.failed > 0 {
        ExitCode::GeneralError
    } else {
        ExitCode::Success
    }
}
