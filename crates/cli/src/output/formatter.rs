//! Human-readable and JSON printing for commands
//!
//! Status lines (success, warning, error) carry a colored mark unless colors are off or
//! JSON is requested. In JSON mode only documents go to stdout and errors go to stderr
//! as `{"error": ...}`.

use s3kv_core::Error;
use serde::Serialize;

use super::OutputConfig;
use crate::exit_code::ExitCode;

/// Kind of status line; picks the mark, its color and the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Success,
    Warning,
    Error,
}

impl Status {
    fn mark(self) -> (&'static str, &'static str) {
        match self {
            Status::Success => ("✓", "32"),
            Status::Warning => ("⚠", "33"),
            Status::Error => ("✗", "31"),
        }
    }

    fn line(self, message: &str, colored: bool) -> String {
        let (mark, color) = self.mark();
        if colored {
            format!("\x1b[{color}m{mark}\x1b[0m {message}")
        } else {
            format!("{mark} {message}")
        }
    }
}

/// Printer shared by all commands
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    fn colored(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    /// Success line on stdout; silent in quiet and JSON mode (the exit code says it)
    pub fn success(&self, message: &str) {
        if !self.config.quiet && !self.config.json {
            println!("{}", Status::Success.line(message, self.colored()));
        }
    }

    /// Warning line on stderr; silent in quiet and JSON mode
    pub fn warning(&self, message: &str) {
        if !self.config.quiet && !self.config.json {
            eprintln!("{}", Status::Warning.line(message, self.colored()));
        }
    }

    /// Error on stderr, printed even in quiet mode
    pub fn error(&self, message: &str) {
        if self.config.json {
            let body = serde_json::json!({ "error": message });
            match serde_json::to_string_pretty(&body) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{message}"),
            }
        } else {
            eprintln!("{}", Status::Error.line(message, self.colored()));
        }
    }

    /// Report a failed operation and map it to an exit code
    pub fn fail(&self, context: &str, err: &Error) -> ExitCode {
        self.error(&format!("{context}: {err}"));
        ExitCode::from(err)
    }

    /// Pretty JSON document on stdout
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Plain line on stdout, unless quiet
    pub fn println(&self, message: &str) {
        if !self.config.quiet {
            println!("{message}");
        }
    }
}
