//! Profile management commands
//!
//! A profile names one bucket on an S3-compatible endpoint together with
//! the credentials used to reach it.

use clap::Subcommand;
use serde::Serialize;

use qs_core::{Profile, ProfileManager};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Profile subcommands
#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// Add or update a profile
    Set(SetArgs),

    /// List all configured profiles
    List(ListArgs),

    /// Remove a profile
    Remove(RemoveArgs),
}

/// Arguments for the `profile set` command
#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Profile name (e.g., "kodo", "local")
    pub name: String,

    /// S3 endpoint URL (e.g., "https://s3.cn-east-1.qiniucs.com")
    pub endpoint: String,

    /// Access key
    pub access_key: String,

    /// Secret key
    pub secret_key: String,

    /// Bucket every key is scoped to
    pub bucket: String,

    /// Region name used for signing
    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Address the bucket as a subdomain instead of a path segment
    #[arg(long, default_value = "false")]
    pub virtual_host: bool,

    /// Make this the default profile
    #[arg(long, default_value = "false")]
    pub default: bool,
}

/// Arguments for the `profile list` command
#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show full details including region and addressing style
    #[arg(short, long)]
    pub long: bool,
}

/// Arguments for the `profile remove` command
#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Name of the profile to remove
    pub name: String,
}

/// JSON output for profile list
#[derive(Serialize)]
struct ProfileListOutput {
    profiles: Vec<ProfileInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<String>,
}

/// Profile information for output, without credentials
#[derive(Serialize)]
struct ProfileInfo {
    name: String,
    endpoint: String,
    bucket: String,
    region: String,
    path_style: bool,
}

impl From<&Profile> for ProfileInfo {
    fn from(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            endpoint: profile.endpoint.clone(),
            bucket: profile.bucket.clone(),
            region: profile.region.clone(),
            path_style: profile.path_style,
        }
    }
}

/// JSON output for profile set/remove operations
#[derive(Serialize)]
struct ProfileOperationOutput {
    success: bool,
    profile: String,
    message: String,
}

/// Execute a profile subcommand
pub async fn execute(cmd: ProfileCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let manager = match ProfileManager::new() {
        Ok(pm) => pm,
        Err(e) => {
            formatter.error(&format!("Failed to load profiles: {e}"));
            return ExitCode::from_error(&e);
        }
    };

    match cmd {
        ProfileCommands::Set(args) => execute_set(args, &manager, &formatter),
        ProfileCommands::List(args) => execute_list(args, &manager, &formatter),
        ProfileCommands::Remove(args) => execute_remove(args, &manager, &formatter),
    }
}

fn build_profile(args: &SetArgs) -> Profile {
    let mut profile = Profile::new(
        &args.name,
        &args.endpoint,
        &args.access_key,
        &args.secret_key,
        &args.bucket,
    );
    profile.region = args.region.clone();
    profile.path_style = !args.virtual_host;
    profile
}

fn report_operation(formatter: &Formatter, name: &str, message: String) {
    if formatter.is_json() {
        formatter.json(&ProfileOperationOutput {
            success: true,
            profile: name.to_string(),
            message,
        });
    } else {
        formatter.success(&message);
    }
}

fn execute_set(args: SetArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    let profile = build_profile(&args);

    if let Err(e) = manager.set(profile) {
        formatter.error(&format!("Failed to save profile '{}': {e}", args.name));
        return ExitCode::from_error(&e);
    }

    if args.default {
        if let Err(e) = manager.set_default(&args.name) {
            formatter.error(&format!("Failed to set default profile: {e}"));
            return ExitCode::from_error(&e);
        }
    }

    report_operation(
        formatter,
        &args.name,
        format!("Profile '{}' configured successfully", args.name),
    );
    ExitCode::Success
}

fn execute_list(args: ListArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    let profiles = match manager.list() {
        Ok(profiles) => profiles,
        Err(e) => {
            formatter.error(&format!("Failed to list profiles: {e}"));
            return ExitCode::from_error(&e);
        }
    };
    let default = manager
        .config_manager()
        .load()
        .ok()
        .and_then(|c| c.defaults.profile);

    if formatter.is_json() {
        formatter.json(&ProfileListOutput {
            profiles: profiles.iter().map(ProfileInfo::from).collect(),
            default,
        });
    } else if profiles.is_empty() {
        formatter.println("No profiles configured.");
    } else {
        for profile in &profiles {
            let marker = if default.as_deref() == Some(profile.name.as_str()) {
                "*"
            } else {
                " "
            };
            if args.long {
                formatter.println(&format!(
                    "{marker} {:<12} {} bucket={} region={} {}",
                    profile.name,
                    profile.endpoint,
                    profile.bucket,
                    profile.region,
                    if profile.path_style { "path-style" } else { "virtual-host" }
                ));
            } else {
                formatter.println(&format!(
                    "{marker} {:<12} {}/{}",
                    profile.name, profile.endpoint, profile.bucket
                ));
            }
        }
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &ProfileManager, formatter: &Formatter) -> ExitCode {
    match manager.remove(&args.name) {
        Ok(()) => {
            report_operation(
                formatter,
                &args.name,
                format!("Profile '{}' removed successfully", args.name),
            );
            ExitCode::Success
        }
        Err(qs_core::Error::ProfileNotFound(_)) => {
            formatter.error(&format!("Profile '{}' not found", args.name));
            ExitCode::NotFound
        }
        Err(e) => {
            formatter.error(&format!("Failed to remove profile: {e}"));
            ExitCode::from_error(&e)
        }
    }
}
