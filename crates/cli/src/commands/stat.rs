//! stat command - Show key metadata
//!
//! Displays what the bucket knows about a key without fetching its value.

use clap::Args;
use s3kv_core::{ObjectInfo, remote_key};
use serde::Serialize;

use super::ConnectionArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Show key metadata
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Key, optionally with s3:
    pub key: String,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_human: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_class: Option<String>,
}

impl From<ObjectInfo> for StatOutput {
    fn from(info: ObjectInfo) -> Self {
        Self {
            key: info.key,
            last_modified: info.last_modified.map(|t| t.to_string()),
            size_bytes: info.size_bytes,
            size_human: info.size_human,
            etag: info.etag,
            content_type: info.content_type,
            storage_class: info.storage_class,
        }
    }
}

fn human_lines(info: &ObjectInfo) -> Vec<String> {
    let mut lines = vec![format!("Key       : {}", info.key)];
    if let Some(modified) = info.last_modified {
        lines.push(format!(
            "Date      : {}",
            modified.strftime("%Y-%m-%d %H:%M:%S UTC")
        ));
    }
    if let (Some(size), Some(human)) = (info.size_bytes, &info.size_human) {
        lines.push(format!("Size      : {human} ({size} bytes)"));
    }
    if let Some(etag) = &info.etag {
        lines.push(format!("ETag      : {etag}"));
    }
    if let Some(ct) = &info.content_type {
        lines.push(format!("Type      : {ct}"));
    }
    if let Some(sc) = &info.storage_class {
        lines.push(format!("Class     : {sc}"));
    }
    lines
}

/// Execute the stat command
pub async fn execute(
    args: StatArgs,
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

    match store.get_info(key, None).await {
        Ok(info) => {
            if formatter.is_json() {
                formatter.json(&StatOutput::from(info));
            } else {
                for line in human_lines(&info) {
                    formatter.println(&line);
                }
            }
            ExitCode::Success
        }
        Err(e) => formatter.fail(&format!("Failed to stat {key}"), &e),
    }
}
