//! treeprogress - hierarchical weighted progress aggregation
//!
//! Work items organised in an allocation tree report completed units; the
//! aggregator turns them into a single completion value in [0, 1] and a
//! display worker draws it as an in-place terminal progress bar.

pub mod config;
pub mod core;
pub mod errors;
pub mod ui;

// Re-exports
pub use config::Config;
pub use self::core::{
    AllocationId, AllocationState, AllocationTree, EventScript, Executor, ProgressAggregator,
    ProgressEvent, ProgressSnapshot,
};
pub use errors::{ConfigError, ProgressError, TreeError};
pub use ui::{DisplayHandle, ProgressBar, ProgressDisplay};

/// Result type alias
pub type Result<T> = anyhow::Result<T>;
