//! cat command - Write a value to stdout
//!
//! Streams the object body straight to stdout without buffering it.

use clap::Args;
use s3kv_core::{Error, GetOptions, Result, remote_key};
use tokio::io::AsyncWriteExt;

use super::ConnectionArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Write a value to stdout
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Key, optionally with s3:
    pub key: String,

    /// First byte to read
    #[arg(long)]
    pub offset: Option<u64>,

    /// Number of bytes to read (requires --offset or starts at 0)
    #[arg(long)]
    pub length: Option<u64>,
}

fn get_options(args: &CatArgs) -> Result<Option<GetOptions>> {
    if args.offset.is_none() && args.length.is_none() {
        return Ok(None);
    }

    let start = args.offset.unwrap_or(0);
    let end = match args.length {
        Some(len) => Some(start.checked_add(len.saturating_sub(1)).ok_or_else(|| {
            Error::InvalidArgument(format!("range of {len} bytes at offset {start} is too large"))
        })?),
        None => None,
    };
    Ok(Some(GetOptions::new().range(start, end)))
}

/// Execute the cat command
pub async fn execute(
    args: CatArgs,
    connection: &ConnectionArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let key = match remote_key(&args.key) {
        Ok(key) => key,
        Err(e) => return formatter.fail("Invalid key", &e),
    };
    if args.length == Some(0) {
        return ExitCode::Success;
    }
    let options = match get_options(&args) {
        Ok(options) => options,
        Err(e) => return formatter.fail("Invalid range", &e),
    };

    let store = match connection.connect().await {
        Ok(store) => store,
        Err(e) => return formatter.fail("Failed to connect", &e),
    };

    let mut object = match store.get_object(key, options).await {
        Ok(object) => object,
        Err(e) => return formatter.fail(&format!("Failed to get {key}"), &e),
    };

    // Raw bytes go to stdout, never through the formatter
    let mut stdout = tokio::io::stdout();
    let written = tokio::io::copy(&mut object, &mut stdout).await;
    if let Err(e) = written.and(stdout.flush().await) {
        formatter.error(&format!("Failed to write to stdout: {e}"));
        return ExitCode::GeneralError;
    }
    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(offset: Option<u64>, length: Option<u64>) -> CatArgs {
        CatArgs {
            key: "k".into(),
            offset,
            length,
        }
    }

    #[test]
    fn test_get_options_whole_object() {
        assert!(get_options(&args(None, None)).unwrap().is_none());
    }

    #[test]
    fn test_get_options_ranges() {
        let options = get_options(&args(Some(2), Some(3))).unwrap().unwrap();
        assert_eq!(options.object.range, Some((2, Some(4))));

        let options = get_options(&args(Some(5), None)).unwrap().unwrap();
        assert_eq!(options.object.range, Some((5, None)));

        let options = get_options(&args(None, Some(4))).unwrap().unwrap();
        assert_eq!(options.object.range, Some((0, Some(3))));
    }

    #[test]
    fn test_get_options_range_overflow() {
        let err = get_options(&args(Some(u64::MAX), Some(2))).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let options = get_options(&args(Some(u64::MAX), Some(1))).unwrap().unwrap();
        assert_eq!(options.object.range, Some((u64::MAX, Some(u64::MAX))));
    }

    #[tokio::test]
    async fn test_range_overflow_is_usage_error() {
        let quiet = OutputConfig {
            quiet: true,
            ..Default::default()
        };
        let code = execute(
            args(Some(u64::MAX), Some(u64::MAX)),
            &ConnectionArgs::default(),
            quiet,
        )
        .await;
        assert_eq!(code, ExitCode::UsageError);
    }
}
