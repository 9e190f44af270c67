//! cat command - Display object contents
//!
//! Streams an object to stdout, optionally starting part way in.

use clap::Args;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Display object contents
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Object key
    pub key: String,

    /// Start reading at this byte offset
    #[arg(long, default_value = "0")]
    pub offset: u64,
}

/// Execute the cat command
pub async fn execute(args: CatArgs, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let client = match ctx.client(&formatter).await {
        Ok(c) => c,
        Err(code) => return code,
    };

    let mut body = match client.get(&args.key, args.offset).await {
        Ok(body) => body,
        Err(e) => {
            formatter.error(&format!("Failed to read '{}': {e}", args.key));
            return ExitCode::from_error(&e);
        }
    };

    // Bypass the formatter so binary data passes through untouched
    let mut stdout = tokio::io::stdout();
    if let Err(e) = tokio::io::copy(&mut body, &mut stdout).await {
        formatter.error(&format!("Failed to stream '{}': {e}", args.key));
        return ExitCode::GeneralError;
    }
    if let Err(e) = tokio::io::AsyncWriteExt::flush(&mut stdout).await {
        formatter.error(&format!("Failed to write to stdout: {e}"));
        return ExitCode::GeneralError;
    }

    ExitCode::Success
}
