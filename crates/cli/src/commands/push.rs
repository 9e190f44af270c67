//! push command - Upload a file or a directory tree
//!
//! A single file lands under its own path. With `-r`, every file below a
//! directory is uploaded concurrently and each failure is reported.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use qs_core::{TreeUploadReport, UploadOptions, UploadResult};
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig, ProgressBar};

/// Upload local files
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Local file or directory
    pub path: PathBuf,

    /// Upload a directory tree
    #[arg(short, long)]
    pub recursive: bool,

    /// Maximum uploads in flight (0 = unbounded; overrides config)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Per-file timeout in seconds (overrides config)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Extra attempts for a failed file (overrides config)
    #[arg(long)]
    pub retries: Option<u32>,
}

/// Output structure for push command (JSON format)
#[derive(Debug, Serialize)]
struct PushOutput {
    status: &'static str,
    uploaded: Vec<UploadResult>,
    failed: Vec<qs_core::UploadFailure>,
    total: usize,
    total_size_bytes: i64,
}

impl From<TreeUploadReport> for PushOutput {
    fn from(report: TreeUploadReport) -> Self {
        Self {
            status: if report.failed.is_empty() { "success" } else { "partial" },
            total: report.total(),
            total_size_bytes: report.bytes(),
            uploaded: report.uploaded,
            failed: report.failed,
        }
    }
}

impl PushArgs {
    fn apply_overrides(&self, mut options: UploadOptions) -> UploadOptions {
        if let Some(n) = self.concurrency {
            options.concurrency = n;
        }
        if let Some(secs) = self.timeout {
            options.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(n) = self.retries {
            options.retries = n;
        }
        options
    }
}

/// Execute the push command
pub async fn execute(args: PushArgs, ctx: &Context, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config.clone());

    let metadata = match std::fs::metadata(&args.path) {
        Ok(m) => m,
        Err(e) => {
            formatter.error(&format!("Cannot read '{}': {e}", args.path.display()));
            return ExitCode::NotFound;
        }
    };

    if metadata.is_dir() && !args.recursive {
        formatter.error(&format!(
            "'{}' is a directory. Use -r to upload it recursively",
            args.path.display()
        ));
        return ExitCode::UsageError;
    }

    let client = match ctx.client(&formatter).await {
        Ok(c) => c,
        Err(code) => return code,
    };

    if !metadata.is_dir() {
        return match client.put_file(&args.path).await {
            Ok(result) => {
                if formatter.is_json() {
                    formatter.json(&result);
                } else {
                    formatter.success(&format!(
                        "{} -> {}/{}",
                        args.path.display(),
                        result.bucket,
                        result.key
                    ));
                }
                ExitCode::Success
            }
            Err(e) => {
                formatter.error(&format!("Failed to upload '{}': {e}", args.path.display()));
                ExitCode::from_error(&e)
            }
        };
    }

    let options = args.apply_overrides(client.uploader().options().clone());
    let strict = options.mode.is_strict();

    let spinner = ProgressBar::spinner(&output_config, "Uploading");
    let ticker = spinner.clone();
    let uploader = qs_core::TreeUploader::new(client.store(), options)
        .with_progress(move |_, _| ticker.inc());

    let report = uploader.push_tree_report(&args.path).await;
    spinner.finish_and_clear();

    for failure in &report.failed {
        formatter.warning(&format!("{}: {}", failure.path, failure.message));
    }

    let failed = report.failed.len();
    let total = report.total();
    let bytes = report.bytes();

    if formatter.is_json() {
        formatter.json(&PushOutput::from(report));
    } else {
        formatter.success(&format!(
            "Uploaded {} of {total} file(s), {}",
            total - failed,
            humansize::format_size(bytes.max(0) as u64, humansize::BINARY)
        ));
    }

    if strict && failed > 0 {
        let err = qs_core::Error::PartialFailure { failed, total };
        formatter.error(&err.to_string());
        return ExitCode::from_error(&err);
    }

    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> PushArgs {
        PushArgs {
            path: PathBuf::from("site"),
            recursive: true,
            concurrency: None,
            timeout: None,
            retries: None,
        }
    }

    #[test]
    fn test_overrides_keep_config_when_unset() {
        let base = UploadOptions {
            concurrency: 4,
            retries: 2,
            ..Default::default()
        };
        let options = args().apply_overrides(base);
        assert_eq!(options.concurrency, 4);
        assert_eq!(options.retries, 2);
        assert!(options.timeout.is_none());
    }

    #[test]
    fn test_overrides_replace_config() {
        let mut a = args();
        a.concurrency = Some(0);
        a.timeout = Some(30);
        a.retries = Some(1);

        let options = a.apply_overrides(UploadOptions {
            concurrency: 8,
            ..Default::default()
        });
        assert_eq!(options.concurrency, 0);
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.retries, 1);
    }

    #[test]
    fn test_output_status() {
        let report = TreeUploadReport {
            uploaded: vec![],
            failed: vec![qs_core::UploadFailure {
                path: "a".into(),
                message: "boom".into(),
            }],
        };
        let output = PushOutput::from(report);
        assert_eq!(output.status, "partial");
        assert_eq!(output.total, 1);
    }
}
