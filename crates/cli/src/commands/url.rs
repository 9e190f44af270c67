//! url command - Print a signed download URL

use std::time::Duration;

use clap::Args;
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Print a signed download URL
#[derive(Args, Debug)]
pub struct UrlArgs {
    /// Object key
    pub key: String,

    /// Lifetime in seconds (defaults to transfer.url_ttl_secs, 3 hours)
    #[arg(long)]
    pub ttl: Option<u64>,
}

#[derive(Debug, Serialize)]
struct UrlOutput {
    key: String,
    url: String,
    expires_in_secs: u64,
}

/// Execute the url command
pub async fn execute(args: UrlArgs, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let client = match ctx.client(&formatter).await {
        Ok(c) => c,
        Err(code) => return code,
    };

    let (ttl, signed) = match args.ttl {
        Some(secs) => {
            let ttl = Duration::from_secs(secs);
            (ttl, client.signed_url(&args.key, ttl).await)
        }
        None => (client.transfer().url_ttl(), client.url_for(&args.key).await),
    };

    match signed {
        Ok(url) => {
            if formatter.is_json() {
                formatter.json(&UrlOutput {
                    key: args.key,
                    url,
                    expires_in_secs: ttl.as_secs(),
                });
            } else {
                formatter.println(&url);
            }
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&format!("Failed to sign '{}': {e}", args.key));
            ExitCode::from_error(&e)
        }
    }
}
