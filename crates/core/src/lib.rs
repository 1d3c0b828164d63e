#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

//! Live index and safe mutation of a markdown vault.

pub mod config;
pub mod frontmatter;
pub mod index;
pub mod indexer;
pub mod operations;
pub mod pipeline;
pub mod vault;
pub mod watcher;

pub use indexer::{IndexPhase, IndexProgress, IndexStats, IndexerError, UpdateOutcome, VaultIndexer};
pub use operations::{
    BatchReport, DeleteMode, Operation, OperationContext, OperationError, OperationOptions,
    OperationPreview, OperationResult, ValidationResult, run_batch,
};
pub use pipeline::{Pipeline, PipelineReport};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
