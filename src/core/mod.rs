//! Core engine - allocation tree, event accounting, producer execution

mod aggregator;
mod events;
mod executor;
mod tree;

pub use aggregator::{AllocationState, AllocationStatus, ProgressAggregator, ProgressSnapshot};
pub use events::{EventScript, ProgressEvent, Producer, ScriptedEvent};
pub use executor::{Executor, ProducerEvent, RunReport};
pub use tree::{AllocationId, AllocationNode, AllocationTree, TreeSpec, WEIGHT_TOLERANCE};
