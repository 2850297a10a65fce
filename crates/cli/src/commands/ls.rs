//! ls command - List keys under a prefix
//!
//! Prints keys as they arrive from the listing. `--count` only counts them and
//! `--values` fetches every value as well.

use clap::Args;
use s3kv_core::{ListOptions, Record, Result, Store, remote_key};
use serde::Serialize;

use super::ConnectionArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// List keys under a prefix
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Key prefix, optionally with s3: (empty lists the whole bucket)
    #[arg(default_value = "")]
    pub prefix: String,

    /// Stop after this many keys
    #[arg(long)]
    pub max_keys: Option<usize>,

    /// Only list keys after this one
    #[arg(long)]
    pub start_after: Option<String>,

    /// Descend into folders instead of grouping them
    #[arg(short, long)]
    pub recursive: bool,

    /// Print the number of keys only
    #[arg(long, conflicts_with = "values")]
    pub count: bool,

    /// Fetch and print values too (in completion order)
    #[arg(long)]
    pub values: bool,
}

#[derive(Debug, Serialize)]
struct LsOutput {
    prefix: String,
    keys: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CountOutput {
    prefix: String,
    count: usize,
}

#[derive(Debug, Serialize)]
struct RecordOutput {
    key: String,
    value: String,
    size_bytes: usize,
}

impl From<Record> for RecordOutput {
    fn from(record: Record) -> Self {
        Self {
            size_bytes: record.value.len(),
            value: String::from_utf8_lossy(&record.value).into_owned(),
            key: record.key,
        }
    }
}

/// Strip an optional `s3:` marker; an empty prefix is allowed here
fn parse_prefix(arg: &str) -> String {
    remote_key(arg).map(str::to_string).unwrap_or_default()
}

fn list_options(args: &LsArgs) -> ListOptions {
    let mut options = ListOptions::new().recursive(args.recursive);
    if let Some(max) = args.max_keys {
        options = options.max_keys(max);
    }
    if let Some(after) = &args.start_after {
        options = options.start_after(parse_prefix(after));
    }
    options
}

/// Execute the ls command
pub async fn execute(
    args: LsArgs,
    connection: &ConnectionArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let store = match connection.connect().await {
        Ok(store) => store,
        Err(e) => return formatter.fail("Failed to connect", &e),
    };

    let prefix = parse_prefix(&args.prefix);
    match list(&store, prefix, &args, &formatter).await {
        Ok(()) if store.cancellation().is_cancelled() => ExitCode::Interrupted,
        Ok(()) => ExitCode::Success,
        Err(e) => formatter.fail("Failed to list keys", &e),
    }
}

async fn list(store: &Store, prefix: String, args: &LsArgs, formatter: &Formatter) -> Result<()> {
    let options = Some(list_options(args));

    if args.count {
        let count = store.try_list_len(&prefix, options).await?;
        if formatter.is_json() {
            formatter.json(&CountOutput { prefix, count });
        } else {
            formatter.println(&count.to_string());
        }
    } else if args.values {
        let records = store.try_list_body(&prefix, options).collect().await?;
        let records: Vec<RecordOutput> = records.into_iter().map(RecordOutput::from).collect();

        if formatter.is_json() {
            formatter.json(&records);
        } else {
            for record in records {
                formatter.println(&format!("{}\t{}", record.key, record.value));
            }
        }
    } else if formatter.is_json() {
        let keys = store.try_list(&prefix, options).collect().await?;
        formatter.json(&LsOutput { prefix, keys });
    } else {
        let mut keys = store.try_list(&prefix, options);
        while let Some(key) = keys.recv().await {
            formatter.println(&key);
        }
        keys.finish().await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use clap::Parser;
    use s3kv_core::MemoryStore;
    use std::sync::Arc;

    fn parse(argv: &[&str]) -> LsArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Ls(args) => args,
            _ => panic!("expected ls"),
        }
    }

    #[test]
    fn test_parse_prefix() {
        assert_eq!(parse_prefix("s3:notes/"), "notes/");
        assert_eq!(parse_prefix("notes/"), "notes/");
        assert_eq!(parse_prefix(""), "");
        assert_eq!(parse_prefix("s3:"), "");
    }

    #[test]
    fn test_list_options_from_flags() {
        let args = parse(&[
            "s3kv",
            "ls",
            "s3:a/",
            "--max-keys",
            "3",
            "--start-after",
            "s3:a/1",
            "-r",
        ]);
        let options = list_options(&args);

        assert_eq!(options.object.max_keys, Some(3));
        assert_eq!(options.object.start_after.as_deref(), Some("a/1"));
        assert!(options.object.recursive);
    }

    #[test]
    fn test_count_conflicts_with_values() {
        assert!(Cli::try_parse_from(["s3kv", "ls", "--count", "--values"]).is_err());
    }

    #[test]
    fn test_record_output_lossy_value() {
        let output = RecordOutput::from(Record {
            key: "k".into(),
            value: vec![b'o', b'k', 0xff],
        });
        assert_eq!(output.size_bytes, 3);
        assert!(output.value.starts_with("ok"));
    }

    #[tokio::test]
    async fn test_listing_error_is_reported() {
        let backend = MemoryStore::new();
        let store = Store::new(Arc::new(backend.clone()), "test");
        store.set("a/1", "v", None).await.unwrap();
        backend.fail_list("a/");

        let quiet = Formatter::new(OutputConfig {
            quiet: true,
            ..Default::default()
        });
        let json = Formatter::new(OutputConfig {
            json: true,
            quiet: true,
            ..Default::default()
        });

        let cases: [(&[&str], &Formatter); 4] = [
            (&["s3kv", "ls", "a/"], &quiet),
            (&["s3kv", "ls", "a/", "--count"], &quiet),
            (&["s3kv", "ls", "a/", "--values"], &quiet),
            (&["s3kv", "ls", "a/"], &json),
        ];
        for (argv, formatter) in cases {
            let args = parse(argv);
            let err = list(&store, parse_prefix(&args.prefix), &args, formatter)
                .await
                .unwrap_err();
            assert_eq!(ExitCode::from(&err), ExitCode::BackendError, "{argv:?}");
        }
    }

    #[tokio::test]
    async fn test_count_without_error() {
        let backend = MemoryStore::new();
        let store = Store::new(Arc::new(backend), "test");
        store.set("a/1", "v", None).await.unwrap();
        store.set("a/2", "v", None).await.unwrap();

        let formatter = Formatter::new(OutputConfig {
            quiet: true,
            ..Default::default()
        });
        let args = parse(&["s3kv", "ls", "a/", "--count"]);
        assert!(list(&store, "a/".into(), &args, &formatter).await.is_ok());
    }
}
