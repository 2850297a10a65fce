//! config command - Persist connection settings
//!
//! `config set` writes the connection flags (and `S3KV_*` variables) given on this
//! invocation into the config file, keeping fields that are not given. `config show`
//! prints what the file holds, without the secret key.

use clap::Subcommand;
use s3kv_core::{ConfigManager, ConnectionConfig, Error};
use serde::Serialize;

use super::ConnectionArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Save --endpoint, --access-key, --secret-key, --bucket, --secure, --region
    Set,

    /// Show the saved connection settings
    Show,
}

/// Saved settings for display (secret reduced to a flag)
#[derive(Debug, Serialize)]
struct ConfigOutput {
    path: String,
    endpoint: Option<String>,
    access_key: Option<String>,
    secret_key_set: bool,
    bucket: Option<String>,
    secure: Option<bool>,
    region: Option<String>,
}

impl ConfigOutput {
    fn new(manager: &ConfigManager, connection: ConnectionConfig) -> Self {
        Self {
            path: manager.config_path().display().to_string(),
            endpoint: connection.endpoint,
            access_key: connection.access_key,
            secret_key_set: connection.secret_key.is_some(),
            bucket: connection.bucket,
            secure: connection.secure,
            region: connection.region,
        }
    }
}

/// Execute a config subcommand
pub async fn execute(
    cmd: ConfigCommands,
    connection: &ConnectionArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let manager = match ConfigManager::new() {
        Ok(manager) => manager,
        Err(e) => return formatter.fail("Failed to locate config", &e),
    };

    let saving = matches!(cmd, ConfigCommands::Set);
    let result = match cmd {
        ConfigCommands::Set => set(&manager, connection),
        ConfigCommands::Show => manager.load().map(|config| config.connection),
    };

    match result {
        Ok(saved) => {
            let output = ConfigOutput::new(&manager, saved);
            if formatter.is_json() {
                formatter.json(&output);
            } else {
                if saving {
                    formatter.success(&format!("Saved settings to {}", output.path));
                }
                print_human(&formatter, &output);
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail("Config failed", &e),
    }
}

/// Merge the given flags into the file and save it
fn set(manager: &ConfigManager, connection: &ConnectionArgs) -> s3kv_core::Result<ConnectionConfig> {
    let given = connection.as_config();
    if given == ConnectionConfig::default() {
        return Err(Error::InvalidArgument(
            "nothing to save, pass at least one connection flag".into(),
        ));
    }

    let mut config = manager.load()?;
    config.connection = config.connection.overlay(given);
    manager.save(&config)?;
    tracing::debug!(path = %manager.config_path().display(), "config saved");
    Ok(config.connection)
}

fn print_human(formatter: &Formatter, output: &ConfigOutput) {
    let unset = || "(not set)".to_string();
    formatter.println(&format!(
        "Endpoint:   {}",
        output.endpoint.clone().unwrap_or_else(unset)
    ));
    formatter.println(&format!(
        "Access key: {}",
        output.access_key.clone().unwrap_or_else(unset)
    ));
    formatter.println(&format!(
        "Secret key: {}",
        if output.secret_key_set { "****" } else { "(not set)" }
    ));
    formatter.println(&format!(
        "Bucket:     {}",
        output.bucket.clone().unwrap_or_else(unset)
    ));
    formatter.println(&format!(
        "Secure:     {}",
        output.secure.map_or_else(unset, |s| s.to_string())
    ));
    formatter.println(&format!(
        "Region:     {}",
        output.region.clone().unwrap_or_else(unset)
    ));
}
