//! Delete command.

use vaultindex_core::config::ResolvedConfig;
use vaultindex_core::{DeleteMode, Operation};

use super::{confirm, find_document, open_index, run_operation};
use crate::DeleteArgs;

pub fn run(rc: &ResolvedConfig, args: &DeleteArgs) {
    let indexer = open_index(rc);
    let doc = find_document(&indexer, &args.path);

    let mode = if args.permanent { DeleteMode::Permanent } else { DeleteMode::Soft };
    if mode == DeleteMode::Permanent
        && !args.mutation.dry_run
        && !args.yes
        && !confirm(&format!("Permanently delete {}?", doc.relative_path))
    {
        println!("Cancelled.");
        return;
    }

    run_operation(rc, &indexer, &doc, &Operation::Delete { mode }, args.mutation);
}
