//! Index command: full scan with statistics.

use std::sync::mpsc;
use std::thread;

use vaultindex_core::config::ResolvedConfig;
use vaultindex_core::{IndexPhase, IndexProgress, VaultIndexer};

use super::fail;
use super::output::print_json;
use crate::{IndexArgs, OutputFormat};

pub fn run(rc: &ResolvedConfig, args: &IndexArgs) {
    let indexer = match VaultIndexer::from_config(rc) {
        Ok(indexer) => indexer,
        Err(e) => fail(format!("opening index: {e}")),
    };

    let show_progress = args.verbose && args.format == OutputFormat::Table;
    let (tx, rx) = mpsc::channel::<IndexProgress>();
    let stats = thread::scope(|scope| {
        let printer = scope.spawn(move || {
            for progress in rx {
                if show_progress {
                    print_progress(&progress);
                }
            }
        });
        let stats = indexer.initialize_with_progress(Some(&tx));
        drop(tx);
        let _ = printer.join();
        stats
    });

    let stats = match stats {
        Ok(stats) => stats,
        Err(e) => fail(format!("indexing {}: {e}", rc.vault_root.display())),
    };

    match args.format {
        OutputFormat::Json => print_json(&stats),
        OutputFormat::Quiet => println!("{}", stats.documents_indexed),
        OutputFormat::Table => {
            println!("Vault: {}", rc.vault_root.display());
            println!("Profile: {}", rc.active_profile);
            println!();
            println!("Files found:       {}", stats.files_found);
            println!("Documents indexed: {}", stats.documents_indexed);
            if stats.documents_skipped > 0 {
                println!("Skipped:           {}", stats.documents_skipped);
            }
            if rc.cache_path.is_some() {
                println!("Cache hits:        {}", stats.cache_hits);
            }
            println!("Links:             {}", stats.links_indexed);
            println!("Unresolved links:  {}", stats.unresolved_links);
            println!("Duration:          {}ms", stats.duration_ms);
        }
    }
}

fn print_progress(progress: &IndexProgress) {
    let phase = match progress.phase {
        IndexPhase::Scanning => {
            println!("Scanning...");
            return;
        }
        IndexPhase::Extracting => "extract",
        IndexPhase::Linking => "link",
        IndexPhase::Done => return,
    };
    if let Some(path) = &progress.path {
        println!("[{}/{}] {} {}", progress.current, progress.total, phase, path);
    }
}
