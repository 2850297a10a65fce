//! CLI command definitions and execution
//!
//! Every command that touches the bucket resolves its connection the same way: flags and
//! `S3KV_*` environment variables (parsed together by clap) over the config file.

use clap::{Args, Parser, Subcommand};
use s3kv_core::{ConfigManager, ConnectionConfig, ConnectionSettings, Result, Store};
use tokio_util::sync::CancellationToken;

use crate::exit_code::ExitCode;
use crate::output::OutputConfig;

mod cat;
mod completions;
mod config;
pub mod cp;
mod ls;
mod mv;
mod pipe;
mod rm;
mod stat;

/// s3kv - S3 bucket as a key-value store
///
/// Stores values under keys in one bucket of an S3-compatible service and copies files
/// between local paths and `s3:` keys.
#[derive(Parser, Debug)]
#[command(name = "s3kv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection settings taking precedence over the config file
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Access key
    #[arg(long, global = true, env = "S3KV_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// Secret key
    #[arg(long, global = true, env = "S3KV_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Endpoint URL or host[:port]
    #[arg(long, global = true, env = "S3KV_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Bucket holding the keys [default: s3kv]
    #[arg(long, global = true, env = "S3KV_BUCKET")]
    pub bucket: Option<String>,

    /// Use https when the endpoint has no scheme [default: true]
    #[arg(long, global = true, env = "S3KV_SECURE")]
    pub secure: Option<bool>,

    /// Region sent with signed requests [default: us-east-1]
    #[arg(long, global = true, env = "S3KV_REGION")]
    pub region: Option<String>,
}

impl ConnectionArgs {
    fn as_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            endpoint: self.endpoint.clone(),
            bucket: self.bucket.clone(),
            secure: self.secure,
            region: self.region.clone(),
        }
    }

    /// Merge with the config file and validate
    pub fn settings(&self) -> Result<ConnectionSettings> {
        let file = ConfigManager::new()?.load()?;
        file.connection.overlay(self.as_config()).into_settings()
    }

    /// Open a Store that is canceled on Ctrl+C
    pub async fn connect(&self) -> Result<Store> {
        let settings = self.settings()?;
        let mut store = s3kv_s3::connect(&settings).await?;
        store.set_cancellation(interrupt_token());
        Ok(store)
    }
}

/// Token canceled when the process receives Ctrl+C
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received, canceling");
            trigger.cancel();
        }
    });
    token
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy between local files and s3: keys
    Cp(cp::CpArgs),

    /// List keys under a prefix
    Ls(ls::LsArgs),

    /// Write a value to stdout
    Cat(cat::CatArgs),

    /// Show key metadata
    Stat(stat::StatArgs),

    /// Store stdin under a key
    Pipe(pipe::PipeArgs),

    /// Delete keys (folder markers recursively)
    Rm(rm::RmArgs),

    /// Move a key (copy, then delete the source)
    Mv(mv::MvArgs),

    /// Save or show connection settings in the config file
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Generate shell completion scripts
    Completions(completions::CompletionsArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        quiet: cli.quiet,
    };
    let connection = cli.connection;

    match cli.command {
        Commands::Cp(args) => cp::execute(args, &connection, output_config).await,
        Commands::Ls(args) => ls::execute(args, &connection, output_config).await,
        Commands::Cat(args) => cat::execute(args, &connection, output_config).await,
        Commands::Stat(args) => stat::execute(args, &connection, output_config).await,
        Commands::Pipe(args) => pipe::execute(args, &connection, output_config).await,
        Commands::Rm(args) => rm::execute(args, &connection, output_config).await,
        Commands::Mv(args) => mv::execute(args, &connection, output_config).await,
        Commands::Config(cmd) => config::execute(cmd, &connection, output_config).await,
        Commands::Completions(args) => completions::execute(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_connection_flags() {
        let cli = Cli::try_parse_from([
            "s3kv",
            "--endpoint",
            "localhost:9000",
            "--secure",
            "false",
            "ls",
            "notes/",
            "--bucket",
            "kv",
        ])
        .unwrap();

        assert_eq!(cli.connection.endpoint.as_deref(), Some("localhost:9000"));
        assert_eq!(cli.connection.secure, Some(false));
        assert_eq!(cli.connection.bucket.as_deref(), Some("kv"));
    }

    #[test]
    fn test_flags_override_file() {
        let args = ConnectionArgs {
            bucket: Some("flag".into()),
            ..Default::default()
        };
        let file = ConnectionConfig {
            access_key: Some("a".into()),
            secret_key: Some("s".into()),
            endpoint: Some("e:9000".into()),
            bucket: Some("file".into()),
            ..Default::default()
        };

        let settings = file.overlay(args.as_config()).into_settings().unwrap();
        assert_eq!(settings.bucket, "flag");
        assert_eq!(settings.endpoint, "e:9000");
    }

    #[test]
    fn test_config_set_takes_global_flags() {
        let cli = Cli::try_parse_from(["s3kv", "config", "set", "--endpoint", "localhost:9000"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Config(config::ConfigCommands::Set)));
        assert_eq!(cli.connection.endpoint.as_deref(), Some("localhost:9000"));
    }
}
