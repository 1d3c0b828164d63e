//! Vault file discovery and content extraction.
//!
//! This module provides utilities for walking vault directories,
//! abstracting filesystem access, extracting metadata from markdown
//! files, and computing content hashes.

pub mod extractor;
pub mod fs;
pub mod hasher;
pub mod paths;
pub mod walker;

pub use extractor::{extract, extract_links, prettify_name, slugify};
pub use fs::{FileStats, MemoryFs, OsFs, VaultFs, VaultFsError};
pub use hasher::content_hash;
pub use paths::{is_within, normalize_path, relative_path, to_slash};
pub use walker::{VaultWalker, VaultWalkerError, WalkedFile};
