pub mod delete;
pub mod index;
pub mod links;
pub mod move_cmd;
pub mod output;
pub mod query;
pub mod rename;
pub mod set;
pub mod watch;

use std::io::{self, Write};
use std::path::Path;

use vaultindex_core::config::{ConfigLoader, ResolvedConfig};
use vaultindex_core::index::DocumentRecord;
use vaultindex_core::{
    Operation, OperationContext, OperationOptions, OperationResult, VaultIndexer,
};

use crate::MutationArgs;
use crate::logging;

/// Print `message` to stderr and exit with status 1.
pub fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    logging::flush();
    std::process::exit(1);
}

pub fn load_config(config: Option<&Path>, profile: Option<&str>) -> ResolvedConfig {
    match ConfigLoader::load(config, profile) {
        Ok(rc) => rc,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    }
}

/// Build the index for the active profile.
pub fn open_index(rc: &ResolvedConfig) -> VaultIndexer {
    let indexer = match VaultIndexer::from_config(rc) {
        Ok(indexer) => indexer,
        Err(e) => fail(format!("opening index: {e}")),
    };
    if let Err(e) = indexer.initialize() {
        fail(format!("indexing {}: {e}", rc.vault_root.display()));
    }
    indexer
}

pub fn find_document(indexer: &VaultIndexer, path: &Path) -> DocumentRecord {
    match indexer.get_document(path) {
        Some(doc) => doc,
        None => fail(format!("document not found in index: {}", path.display())),
    }
}

/// Path relative to the vault root for display.
pub fn display_path(indexer: &VaultIndexer, path: &Path) -> String {
    path.strip_prefix(indexer.vault_root()).unwrap_or(path).display().to_string()
}

pub fn confirm(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }

    let mut input = String::new();
    if io::stdin().read_line(&mut input).is_err() {
        return false;
    }

    let input = input.trim().to_lowercase();
    input == "y" || input == "yes"
}

/// Preview or execute `operation` on the document at `path`.
pub fn run_operation(
    rc: &ResolvedConfig,
    indexer: &VaultIndexer,
    doc: &DocumentRecord,
    operation: &Operation,
    args: MutationArgs,
) {
    let mut options = OperationOptions::from_settings(&rc.operations);
    options.dry_run = args.dry_run;
    options.create_backup |= args.backup;
    if args.no_links {
        options.update_links = false;
    }
    let ctx = OperationContext::new(indexer, &rc.operations).with_options(options);

    if args.dry_run {
        match operation.preview(doc, &ctx) {
            Ok(preview) if args.json => output::print_json(&preview),
            Ok(preview) => output::print_preview(indexer, &preview),
            Err(e) => fail(e),
        }
        return;
    }

    let result = operation.execute_and_apply(doc, &ctx);
    if args.json {
        output::print_json(&result);
    } else if result.success {
        print_result(indexer, &result);
    }
    if let Some(error) = &result.error {
        fail(error);
    }
}

fn print_result(indexer: &VaultIndexer, result: &OperationResult) {
    let source = display_path(indexer, &result.source);
    match &result.document {
        Some(document) if *document != result.source => {
            println!("{}: {} -> {}", result.kind, source, display_path(indexer, document));
        }
        Some(_) => println!("{}: {}", result.kind, source),
        None => println!("{}: {} (removed)", result.kind, source),
    }
    if result.references_updated > 0 {
        println!("References updated: {}", result.references_updated);
    }
    if let Some(backup) = &result.backup {
        println!("Backup: {}", display_path(indexer, backup));
    }
}
