//! CLI error handling and exit-code mapping.

use std::fmt;

/// Any error the CLI can hit.
#[derive(Debug)]
pub enum CliError {
    /// An advisor error, carrying its exit code.
    Advisor(keystone::Error),
    /// A filesystem error reading inputs or writing output.
    Io(std::io::Error),
    /// Anything else.
    Other(anyhow::Error),
}

impl CliError {
    /// Exit code: 2 parse failure, 3 no solution, 4 invalid
    /// model/workload, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Advisor(err) => err.exit_code(),
            Self::Io(_) | Self::Other(_) => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advisor(err) => err.fmt(f),
            Self::Io(err) => err.fmt(f),
            Self::Other(err) => err.fmt(f),
        }
    }
}

impl From<keystone::Error> for CliError {
    fn from(err: keystone::Error) -> Self {
        Self::Advisor(err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err)
    }
}

/// Result type for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;
