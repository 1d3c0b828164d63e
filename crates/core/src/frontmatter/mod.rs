//! Frontmatter parsing, modification, and serialization.
//!
//! This module provides functionality to:
//! - Parse YAML frontmatter from markdown documents
//! - Merge or replace frontmatter fields
//! - Serialize documents back to markdown with frontmatter

pub mod modifier;
pub mod parser;
pub mod serializer;
pub mod types;

pub use modifier::{FrontmatterMode, apply_update};
pub use parser::{FrontmatterParseError, parse};
pub use serializer::{frontmatter_to_yaml, serialize};
pub use types::{Frontmatter, ParsedDocument, value_strings};
