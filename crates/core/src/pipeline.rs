//! Select, filter, then mutate: a batch over query results.

use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::config::OperationSettings;
use crate::index::{DocumentRecord, FilterCollection, Query};
use crate::indexer::{IndexerError, VaultIndexer};
use crate::operations::{Operation, OperationContext, OperationOptions, OperationResult};

/// Documents matching `select` and `filter` each get `operations` in order.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    pub select: Query,
    pub filter: FilterCollection,
    pub operations: Vec<Operation>,
    pub options: OperationOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<PipelineFailure>,
    pub skipped: Vec<PathBuf>,
    pub results: Vec<OperationResult>,
}

impl Pipeline {
    pub fn new(select: Query) -> Self {
        Self { select, ..Self::default() }
    }

    pub fn with_filter(mut self, filter: FilterCollection) -> Self {
        self.filter = filter;
        self
    }

    pub fn then(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn with_options(mut self, options: OperationOptions) -> Self {
        self.options = options;
        self
    }

    /// The documents the pipeline would act on.
    pub fn select_local(&self, indexer: &VaultIndexer) -> Result<Vec<DocumentRecord>, IndexerError> {
        indexer.query_filtered(&self.select, &self.filter)
    }

    /// Run every operation on every selected document.
    ///
    /// A document fails at its first failed operation. Without
    /// `continue_on_error` the remaining documents are skipped.
    pub fn run(
        &self,
        indexer: &VaultIndexer,
        settings: &OperationSettings,
    ) -> Result<PipelineReport, IndexerError> {
        let documents = self.select_local(indexer)?;
        let ctx = OperationContext::new(indexer, settings).with_options(self.options);
        let mut report = PipelineReport::default();

        for document in documents {
            if !report.failed.is_empty() && !self.options.continue_on_error {
                report.skipped.push(document.path);
                continue;
            }

            let mut current = document.clone();
            let mut failure = None;
            for operation in &self.operations {
                let result = operation.execute_and_apply(&current, &ctx);
                if !result.success {
                    failure = Some(result.error.clone().unwrap_or_default());
                    report.results.push(result);
                    break;
                }
                // Later operations see the document where the earlier ones left it.
                if !result.dry_run
                    && let Some(path) = &result.document
                    && let Some(moved) = indexer.get_document(path)
                {
                    current = moved;
                }
                report.results.push(result);
            }

            match failure {
                Some(error) => report.failed.push(PipelineFailure { path: document.path, error }),
                None => report.succeeded.push(document.path),
            }
        }

        info!(
            "pipeline finished: {} succeeded, {} failed, {} skipped",
            report.succeeded.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }
}
