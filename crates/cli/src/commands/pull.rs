//! pull command - Download an object
//!
//! With a destination directory the object is written there under its base
//! name; without one it goes to stdout.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Download an object
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Object key
    pub key: String,

    /// Destination directory (created if missing)
    pub dst: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct PullOutput {
    key: String,
    path: String,
}

/// Execute the pull command
pub async fn execute(args: PullArgs, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let client = match ctx.client(&formatter).await {
        Ok(c) => c,
        Err(code) => return code,
    };

    let Some(dst) = args.dst else {
        return match client.pull(&args.key).await {
            Ok(data) => {
                if let Err(e) = io::stdout().write_all(&data) {
                    formatter.error(&format!("Failed to write to stdout: {e}"));
                    return ExitCode::GeneralError;
                }
                ExitCode::Success
            }
            Err(e) => {
                formatter.error(&format!("Failed to download '{}': {e}", args.key));
                ExitCode::from_error(&e)
            }
        };
    };

    match client.pull_to(&args.key, &dst).await {
        Ok(path) => {
            if formatter.is_json() {
                formatter.json(&PullOutput {
                    key: args.key,
                    path: path.display().to_string(),
                });
            } else {
                formatter.success(&format!("{} -> {}", args.key, path.display()));
            }
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&format!("Failed to download '{}': {e}", args.key));
            ExitCode::from_error(&e)
        }
    }
}
