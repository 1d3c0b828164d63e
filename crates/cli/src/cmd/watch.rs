//! Watch command: keep the index live and report changes.

use std::io::{self, BufRead};
use std::sync::Arc;
use std::thread;

use tracing::info;
use vaultindex_core::config::ResolvedConfig;
use vaultindex_core::watcher::ChangeKind;

use super::output::print_json;
use super::{display_path, fail, open_index};
use crate::WatchArgs;

pub fn run(rc: &ResolvedConfig, args: &WatchArgs) {
    let indexer = Arc::new(open_index(rc));
    if let Err(e) = indexer.start_watching() {
        fail(format!("starting watcher: {e}"));
    }
    let events = match indexer.subscribe() {
        Ok(Some(events)) => events,
        Ok(None) => fail("watcher is not running"),
        Err(e) => fail(format!("subscribing to changes: {e}")),
    };

    if !args.json {
        println!(
            "Watching {} ({} documents). Press Ctrl-C or Ctrl-D to stop.",
            rc.vault_root.display(),
            indexer.document_count()
        );
    }

    let json = args.json;
    let reporter = Arc::clone(&indexer);
    thread::spawn(move || {
        for event in events {
            if json {
                print_json(&event);
                continue;
            }
            let marker = match event.kind {
                ChangeKind::Created => '+',
                ChangeKind::Modified => '~',
                ChangeKind::Deleted => '-',
            };
            println!("{} {}", marker, display_path(&reporter, &event.path));
        }
    });

    // Block until stdin closes; Ctrl-C ends the process directly.
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        if line.is_err() {
            break;
        }
    }

    indexer.shutdown();
    info!("watch ended with {} documents indexed", indexer.document_count());
}
