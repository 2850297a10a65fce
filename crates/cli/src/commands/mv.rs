//! mv command - Move a key
//!
//! Copies the value to the destination key, then deletes the source. The two steps are
//! not atomic: if the delete fails both keys exist afterwards.

use clap::Args;
use s3kv_core::remote_key;
use serde::Serialize;

use super::ConnectionArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Move a key
#[derive(Args, Debug)]
pub struct MvArgs {
    /// Source key, optionally with s3:
    pub source: String,

    /// Destination key, optionally with s3:; must not exist
    pub target: String,
}

#[derive(Debug, Serialize)]
struct MvOutput {
    status: &'static str,
    source: String,
    target: String,
}

/// Execute the mv command
pub async fn execute(
    args: MvArgs,
    connection: &ConnectionArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let (source, target) = match (remote_key(&args.source), remote_key(&args.target)) {
        (Ok(source), Ok(target)) => (source, target),
        (Err(e), _) | (_, Err(e)) => return formatter.fail("Invalid key", &e),
    };

    let store = match connection.connect().await {
        Ok(store) => store,
        Err(e) => return formatter.fail("Failed to connect", &e),
    };

    if let Err(e) = store.move_object(source, target, None).await {
        return formatter.fail(&format!("Failed to move {source} to {target}"), &e);
    }

    if formatter.is_json() {
        formatter.json(&MvOutput {
            status: "success",
            source: source.to_string(),
            target: target.to_string(),
        });
    } else {
        formatter.success(&format!("{source} -> {target}"));
    }
    ExitCode::Success
}
