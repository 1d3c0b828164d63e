//! Move command.

use vaultindex_core::Operation;
use vaultindex_core::config::ResolvedConfig;

use super::{find_document, open_index, run_operation};
use crate::MoveArgs;

pub fn run(rc: &ResolvedConfig, args: &MoveArgs) {
    let indexer = open_index(rc);
    let doc = find_document(&indexer, &args.path);
    let folder = args.folder.trim_matches('/').to_string();
    let operation = Operation::Move { target_folder: folder };
    run_operation(rc, &indexer, &doc, &operation, args.mutation);
}
