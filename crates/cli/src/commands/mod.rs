//! CLI command definitions and execution
//!
//! This module contains all CLI commands and their implementations.
//! Every storage command resolves a profile, builds a [`StoreClient`] and
//! reports through the shared [`Formatter`].

use std::sync::Arc;

use clap::{Parser, Subcommand};
use qs_core::{
    Config, ConfigManager, ErrorMode, MemoryStore, ObjectStore, ProfileManager, StoreClient,
};
use qs_s3::S3Store;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod cat;
mod completions;
mod ls;
mod profile;
mod pull;
mod push;
mod rm;
mod url;

/// Bucket name reported by the in-memory store
pub const MEMORY_BUCKET: &str = "memory";

/// qs - filesystem-style object storage client
///
/// Lists a flat bucket as a directory tree, uploads local trees
/// concurrently, and deletes by prefix.
#[derive(Parser, Debug)]
#[command(name = "qs")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Disable progress spinner
    #[arg(long, global = true, default_value = "false")]
    pub no_progress: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    /// Profile to use (defaults to the configured default profile)
    #[arg(long, global = true, env = "QS_PROFILE")]
    pub profile: Option<String>,

    /// Fail the whole command when any listing page or upload fails
    #[arg(long, global = true, default_value = "false")]
    pub strict: bool,

    /// Use an empty in-process store instead of a remote bucket
    #[arg(long, global = true, default_value = "false")]
    pub memory: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage connection profiles
    #[command(subcommand)]
    Profile(profile::ProfileCommands),

    /// List the immediate children of a prefix
    Ls(ls::LsArgs),

    /// Upload a file or directory tree
    Push(push::PushArgs),

    /// Download an object
    Pull(pull::PullArgs),

    /// Display object contents
    Cat(cat::CatArgs),

    /// Remove every object under one or more prefixes
    Rm(rm::RmArgs),

    /// Print a signed download URL
    Url(url::UrlArgs),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Settings every storage command needs
#[derive(Debug, Clone)]
pub struct Context {
    pub profile: Option<String>,
    pub strict: bool,
    pub memory: bool,
    pub config: Config,
}

impl Context {
    /// Build a client for the selected profile, or the in-memory store
    pub async fn connect(&self) -> qs_core::Result<StoreClient> {
        let mut transfer = self.config.transfer.clone();
        if self.strict {
            transfer.error_mode = ErrorMode::Strict;
        }

        let store: Arc<dyn ObjectStore> = if self.memory {
            tracing::debug!("Using in-memory store");
            Arc::new(MemoryStore::new(MEMORY_BUCKET))
        } else {
            let manager = ProfileManager::new()?;
            let profile = manager.resolve(self.profile.as_deref())?;
            Arc::new(S3Store::new(&profile).await?)
        };

        Ok(StoreClient::from_parts(store, transfer))
    }

    /// [`Context::connect`], reporting failures through `formatter`
    pub async fn client(&self, formatter: &Formatter) -> Result<StoreClient, ExitCode> {
        self.connect().await.map_err(|e| {
            formatter.error(&format!("Failed to connect: {e}"));
            ExitCode::from_error(&e)
        })
    }
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let mut output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        no_progress: cli.no_progress,
        quiet: cli.quiet,
    };

    let config = match ConfigManager::new().and_then(|m| m.load()) {
        Ok(config) => config,
        Err(e) => {
            Formatter::new(output_config).error(&format!("Failed to load config: {e}"));
            return ExitCode::from_error(&e);
        }
    };
    output_config = output_config.with_defaults(&config.defaults);

    if output_config.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let ctx = Context {
        profile: cli.profile,
        strict: cli.strict,
        memory: cli.memory,
        config,
    };

    match cli.command {
        Commands::Profile(cmd) => profile::execute(cmd, output_config).await,
        Commands::Ls(args) => ls::execute(args, &ctx, output_config).await,
        Commands::Push(args) => push::execute(args, &ctx, output_config).await,
        Commands::Pull(args) => pull::execute(args, &ctx, output_config).await,
        Commands::Cat(args) => cat::execute(args, &ctx, output_config).await,
        Commands::Rm(args) => rm::execute(args, &ctx, output_config).await,
        Commands::Url(args) => url::execute(args, &ctx, output_config).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["qs", "ls", "a/", "--json", "--strict", "--memory"]).unwrap();
        assert!(cli.json);
        assert!(cli.strict);
        assert!(cli.memory);
        assert!(matches!(cli.command, Commands::Ls(_)));
    }

    #[tokio::test]
    async fn test_memory_context_honors_strict() {
        let ctx = Context {
            profile: None,
            strict: true,
            memory: true,
            config: Config::default(),
        };
        let client = ctx.connect().await.unwrap();
        assert_eq!(client.bucket(), MEMORY_BUCKET);
        assert!(client.transfer().error_mode.is_strict());
    }
}
