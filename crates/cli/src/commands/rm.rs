//! rm command - Delete keys
//!
//! A key ending in `/` is a folder marker: everything below it is deleted first, and the
//! first failure stops that folder. Remaining arguments are still processed.

use clap::Args;
use s3kv_core::remote_key;
use serde::Serialize;

use super::ConnectionArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Delete keys
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Keys to delete, optionally with s3:
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    status: &'static str,
    deleted: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed: Vec<String>,
}

/// Execute the rm command
pub async fn execute(
    args: RmArgs,
    connection: &ConnectionArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let mut keys = Vec::with_capacity(args.keys.len());
    for arg in &args.keys {
        match remote_key(arg) {
            Ok(key) => keys.push(key),
            Err(e) => return formatter.fail("Invalid key", &e),
        }
    }

    let store = match connection.connect().await {
        Ok(store) => store,
        Err(e) => return formatter.fail("Failed to connect", &e),
    };

    let mut deleted = Vec::new();
    let mut failed = Vec::new();
    let mut exit_code = ExitCode::Success;

    for key in keys {
        match store.del(key, None).await {
            Ok(()) => deleted.push(key.to_string()),
            Err(e) => {
                let code = formatter.fail(&format!("Failed to delete {key}"), &e);
                if exit_code == ExitCode::Success {
                    exit_code = code;
                }
                failed.push(key.to_string());
                if code == ExitCode::Interrupted {
                    break;
                }
            }
        }
    }

    if formatter.is_json() {
        formatter.json(&RmOutput {
            status: if failed.is_empty() { "success" } else { "partial" },
            deleted,
            failed,
        });
    } else if !deleted.is_empty() {
        formatter.success(&format!("Removed {} key(s).", deleted.len()));
    }

    exit_code
}
