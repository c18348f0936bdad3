//! Completion events and scripted event sources

use super::tree::{AllocationId, AllocationTree};
use crate::errors::TreeResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Units newly completed on one allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub allocation: AllocationId,
    pub units: u64,
}

impl ProgressEvent {
    pub fn new(allocation: AllocationId, units: u64) -> Self {
        Self { allocation, units }
    }
}

fn default_producer() -> String {
    "main".to_string()
}

/// One line of an event script, addressing its allocation by path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedEvent {
    #[serde(default = "default_producer")]
    pub producer: String,
    pub allocation: String,
    pub units: u64,
}

/// Ordered events for one producer
#[derive(Debug, Clone, PartialEq)]
pub struct Producer {
    pub name: String,
    pub events: Vec<ProgressEvent>,
}

/// YAML event script
///
/// ```yaml
/// events:
///   - producer: pull
///     allocation: build/pull base image
///     units: 3
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventScript {
    #[serde(default)]
    pub events: Vec<ScriptedEvent>,
}

impl EventScript {
    pub fn from_file(path: &Path) -> TreeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> TreeResult<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Resolve paths against `tree` and split events by producer.
    ///
    /// Producers keep the order in which they first appear, and each keeps
    /// its events in script order.
    pub fn resolve(&self, tree: &AllocationTree) -> TreeResult<Vec<Producer>> {
        let mut producers: Vec<Producer> = Vec::new();

        for scripted in &self.events {
            let event = ProgressEvent::new(tree.find(&scripted.allocation)?, scripted.units);

            match producers.iter_mut().find(|p| p.name == scripted.producer) {
                Some(producer) => producer.events.push(event),
                None => producers.push(Producer {
                    name: scripted.producer.clone(),
                    events: vec![event],
                }),
            }
        }

        Ok(producers)
    }
}
