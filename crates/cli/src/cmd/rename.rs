//! Rename command.

use vaultindex_core::Operation;
use vaultindex_core::config::ResolvedConfig;

use super::{find_document, open_index, run_operation};
use crate::RenameArgs;

pub fn run(rc: &ResolvedConfig, args: &RenameArgs) {
    let indexer = open_index(rc);
    let doc = find_document(&indexer, &args.path);
    let operation = Operation::Rename { new_name: args.new_name.clone() };
    run_operation(rc, &indexer, &doc, &operation, args.mutation);
}
