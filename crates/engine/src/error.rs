use std::fmt;

use crate::model::Source;

/// Structural failures. Data-content findings are never errors; they are
/// categorized into the result instead.
#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad threshold, missing sources, etc.).
    ConfigValidation(String),
    /// Required header absent for an entire source. Fatal for that source.
    MissingColumn { source: Source, column: &'static str },
    /// No rows supplied at all.
    EmptyInput,
    /// Reconciliation needs at least two sources.
    NotEnoughSources(usize),
    /// IO error (file read, CSV parse, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::MissingColumn { source, column } => {
                write!(f, "source '{source}': missing required column '{column}'")
            }
            Self::EmptyInput => write!(f, "no input rows supplied"),
            Self::NotEnoughSources(n) => {
                write!(f, "reconciliation requires at least 2 sources, got {n}")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
