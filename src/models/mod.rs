// src/models/mod.rs

//! Data model for the collection framework.

mod candidate;
mod config;
mod summary;

pub use candidate::{Candidate, MetadataValue, RequestSpec, StorageSpec};
pub use config::{
    CollectorConfig, Environment, PartitionScheme, RegistryPolicy, RunOptions,
};
pub use summary::{CandidateError, RunSummary};
