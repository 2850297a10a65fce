//! Output formatting utilities
//!
//! Commands print through [`Formatter`], which switches between human-readable lines and
//! JSON documents. Raw object bytes (`cat`) bypass it.

mod formatter;

pub use formatter::Formatter;

/// Output configuration derived from CLI flags
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Use JSON output format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Suppress non-error output
    pub quiet: bool,
}
