//! pipe command - Store stdin under a key
//!
//! Reads stdin to the end, then uploads it. Useful for piping output from other commands.

use clap::Args;
use s3kv_core::{SetOptions, remote_key};
use serde::Serialize;
use tokio::io::AsyncReadExt;

use super::ConnectionArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Store stdin under a key
#[derive(Args, Debug)]
pub struct PipeArgs {
    /// Key, optionally with s3:
    pub key: String,

    /// Content type for the stored value
    #[arg(long)]
    pub content_type: Option<String>,

    /// Fail instead of replacing an existing value
    #[arg(long)]
    pub no_overwrite: bool,
}

#[derive(Debug, Serialize)]
struct PipeOutput {
    status: &'static str,
    key: String,
    size_bytes: usize,
    size_human: String,
}

fn set_options(args: &PipeArgs) -> SetOptions {
    let mut options = SetOptions::new();
    if let Some(ct) = &args.content_type {
        options = options.content_type(ct);
    }
    if args.no_overwrite {
        options = options.no_overwrite();
    }
    options
}

/// Execute the pipe command
pub async fn execute(
    args: PipeArgs,
    connection: &ConnectionArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let key = match remote_key(&args.key) {
        Ok(key) => key,
        Err(e) => return formatter.fail("Invalid key", &e),
    };

    let store = match connection.connect().await {
        Ok(store) => store,
        Err(e) => return formatter.fail("Failed to connect", &e),
    };

    let mut buffer = Vec::new();
    if let Err(e) = tokio::io::stdin().read_to_end(&mut buffer).await {
        formatter.error(&format!("Failed to read from stdin: {e}"));
        return ExitCode::GeneralError;
    }
    let size = buffer.len();

    if let Err(e) = store.set(key, buffer, Some(set_options(&args))).await {
        return formatter.fail(&format!("Failed to store {key}"), &e);
    }

    let size_human = humansize::format_size(size, humansize::BINARY);
    if formatter.is_json() {
        formatter.json(&PipeOutput {
            status: "success",
            key: key.to_string(),
            size_bytes: size,
            size_human,
        });
    } else {
        formatter.success(&format!("Stored {key} ({size_human})"));
    }
    ExitCode::Success
}
