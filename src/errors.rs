use crate::core::AllocationId;
use std::path::PathBuf;
use thiserror::Error;

/// Failures while applying completion events.
///
/// Both variants signal a contract violation by the event source; callers are
/// expected to stop feeding events rather than retry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgressError {
    #[error("Progress exceeds max for '{description}': {attempted} > {total}")]
    Overflow {
        description: String,
        attempted: u128,
        total: u64,
    },

    #[error("Allocation {0} is not part of this tree")]
    UnknownAllocation(AllocationId),
}

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Allocation '{0}' must have at least one unit")]
    ZeroUnits(String),

    #[error("Unknown allocation {0}")]
    UnknownAllocation(AllocationId),

    #[error("Fraction {fraction} for '{description}' is outside [0, 1]")]
    FractionOutOfRange { description: String, fraction: f64 },

    #[error("'{description}' has {children} children but only {units} units")]
    TooManyChildren {
        description: String,
        children: usize,
        units: u64,
    },

    #[error("'{description}' carries fraction {actual}, expected {expected}")]
    WeightMismatch {
        description: String,
        expected: f64,
        actual: f64,
    },

    #[error("No allocation at path '{0}'")]
    PathNotFound(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("bar_width must be greater than zero")]
    ZeroWidth,
}

pub type TreeResult<T> = Result<T, TreeError>;
