//! In-memory vault index.
//!
//! This module provides:
//! - Multi-index storage over document records and the link graph
//! - Link target resolution
//! - Structured queries and declarative filters
//! - An optional SQLite cache of extracted documents
//!
//! # Example
//!
//! ```no_run
//! use vaultindex_core::index::{Condition, Field, Query};
//!
//! let query = Query::new()
//!     .with(Condition::from_raw(Field::Tag, "project"))
//!     .with(Condition::from_raw(Field::Frontmatter("status".into()), "active"));
//! ```

pub mod cache;
pub mod filter;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod storage;
pub mod types;

pub use cache::{CacheError, CachedDocument, MetadataCache, SqliteCache};
pub use filter::{
    ArrayOperator, CompiledFilter, DateOperator, FilterCollection, FilterCondition, FilterError,
    FilterLogic, FilterSubject, MetadataOperator, NumberOperator, OneOrMany, StringOperator,
};
pub use query::{Condition, Field, FileField, Operator, Query, QueryError, QueryParseError};
pub use resolver::LinkResolver;
pub use schema::{SCHEMA_VERSION, SchemaError};
pub use storage::MultiIndexStorage;
pub use types::{
    DocumentRecord, Heading, LinkEntry, LinkKind, LinkSyntax, RawLink, TaskCounts,
};
