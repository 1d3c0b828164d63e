//! Dynamic shell completion of vault paths.
//!
//! Enabled with `source <(COMPLETE=bash vdx)` (or zsh/fish).

use clap_complete::engine::CompletionCandidate;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use vaultindex_core::config::{ConfigLoader, ResolvedConfig};
use vaultindex_core::vault::{VaultWalker, to_slash};

fn load_config() -> Option<ResolvedConfig> {
    ConfigLoader::load(None, None).ok()
}

fn walk(cfg: &ResolvedConfig) -> Vec<String> {
    VaultWalker::with_exclusions(&cfg.vault_root, &cfg.extension, cfg.excluded_folders.clone())
        .and_then(|walker| walker.walk())
        .map(|files| files.iter().map(|f| to_slash(&f.relative_path)).collect())
        .unwrap_or_default()
}

/// Complete document paths relative to the vault root.
pub fn complete_documents(current: &OsStr) -> Vec<CompletionCandidate> {
    let current = current.to_str().unwrap_or("");
    let Some(cfg) = load_config() else {
        return Vec::new();
    };
    walk(&cfg)
        .into_iter()
        .filter(|path| path.starts_with(current))
        .map(CompletionCandidate::new)
        .collect()
}

/// Complete folders that already contain documents.
pub fn complete_folders(current: &OsStr) -> Vec<CompletionCandidate> {
    let current = current.to_str().unwrap_or("");
    let Some(cfg) = load_config() else {
        return Vec::new();
    };
    let folders: BTreeSet<String> = walk(&cfg)
        .iter()
        .filter_map(|path| path.rsplit_once('/').map(|(dir, _)| dir.to_string()))
        .collect();
    folders
        .into_iter()
        .filter(|dir| dir.starts_with(current))
        .map(CompletionCandidate::new)
        .collect()
}
