//! Query command.

use vaultindex_core::config::ResolvedConfig;
use vaultindex_core::index::{FilterCollection, Query};

use super::output::{print_documents_json, print_documents_quiet, print_documents_table};
use super::{fail, open_index};
use crate::{OutputFormat, QueryArgs};

pub fn run(rc: &ResolvedConfig, args: &QueryArgs) {
    let query = match Query::parse_terms(&args.terms) {
        Ok(query) => query,
        Err(e) => fail(format!("invalid query: {e}")),
    };
    let filter = match args.filter.as_deref().map(serde_json::from_str::<FilterCollection>) {
        None => FilterCollection::default(),
        Some(Ok(filter)) => filter,
        Some(Err(e)) => fail(format!("invalid filter: {e}")),
    };

    let indexer = open_index(rc);
    let mut docs = match indexer.query_filtered(&query, &filter) {
        Ok(docs) => docs,
        Err(e) => fail(e),
    };
    if let Some(limit) = args.limit {
        docs.truncate(limit);
    }

    match args.format {
        OutputFormat::Table => print_documents_table(&docs),
        OutputFormat::Json => print_documents_json(&docs),
        OutputFormat::Quiet => print_documents_quiet(&docs),
    }
}
