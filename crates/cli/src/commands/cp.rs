//! cp command - Copy between local files and keys
//!
//! Arguments prefixed with `s3:` are keys in the configured bucket, anything else is a
//! local path. The bucket is only contacted when one side is a key.

use clap::Args;
use serde::Serialize;

use super::ConnectionArgs;
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

/// Copy between local files and keys
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source and target (local path or s3:key); further arguments are ignored
    #[arg(required = true, num_args = 2..)]
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CpOutput {
    status: &'static str,
    source: String,
    target: String,
    size_bytes: u64,
    size_human: String,
}

/// Execute the cp command
pub async fn execute(
    args: CpArgs,
    connection: &ConnectionArgs,
    output_config: OutputConfig,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    if args.paths.len() > 2 {
        formatter.warning(&format!(
            "Ignoring {} extra argument(s)",
            args.paths.len() - 2
        ));
    }

    let copied = s3kv_core::transfer(&args.paths, || connection.connect()).await;
    let size = match copied {
        Ok(size) => size,
        Err(e) => return formatter.fail("Failed to copy", &e),
    };

    let source = args.paths[0].trim().to_string();
    let target = args.paths[1].trim().to_string();
    let size_human = humansize::format_size(size, humansize::BINARY);

    if formatter.is_json() {
        formatter.json(&CpOutput {
            status: "success",
            source,
            target,
            size_bytes: size,
            size_human,
        });
    } else {
        formatter.success(&format!("{source} -> {target} ({size_human})"));
    }
    ExitCode::Success
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_cp_requires_two_paths() {
        assert!(Cli::try_parse_from(["s3kv", "cp", "only-one"]).is_err());

        let cli = Cli::try_parse_from(["s3kv", "cp", "a.txt", "s3:a", "extra"]).unwrap();
        match cli.command {
            Commands::Cp(args) => assert_eq!(args.paths, vec!["a.txt", "s3:a", "extra"]),
            _ => panic!("expected cp"),
        }
    }

    #[tokio::test]
    async fn test_cp_local_files_without_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.txt");
        let dst = dir.path().join("b.txt");
        std::fs::write(&src, "local only").unwrap();

        let args = CpArgs {
            paths: vec![
                src.to_string_lossy().to_string(),
                dst.to_string_lossy().to_string(),
            ],
        };
        let quiet = OutputConfig {
            quiet: true,
            ..Default::default()
        };

        let code = execute(args, &ConnectionArgs::default(), quiet).await;
        assert_eq!(code, ExitCode::Success);
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "local only");
    }

    #[tokio::test]
    async fn test_cp_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let args = CpArgs {
            paths: vec![
                dir.path().join("missing").to_string_lossy().to_string(),
                dir.path().join("out").to_string_lossy().to_string(),
            ],
        };
        let quiet = OutputConfig {
            quiet: true,
            ..Default::default()
        };

        let code = execute(args, &ConnectionArgs::default(), quiet).await;
        assert_eq!(code, ExitCode::GeneralError);
    }
}
