//! Structured field/operator/value queries over the storage.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::storage::{MultiIndexStorage, normalize_key};
use super::types::DocumentRecord;
use crate::frontmatter::value_strings;

#[derive(Debug, Error)]
pub enum QueryParseError {
    #[error("empty query term")]
    EmptyTerm,

    #[error("unknown query field: {0}")]
    UnknownField(String),

    #[error("query term '{0}' needs a value")]
    MissingValue(String),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("operator {operator:?} on {field} needs a value")]
    MissingValue { field: String, operator: Operator },
}

/// Filesystem-derived fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileField {
    Path,
    Folder,
    Name,
    Size,
    Created,
    Modified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// `file.*`
    File(FileField),
    /// `fm.<key>`
    Frontmatter(String),
    Tag,
    ExactTag,
    Title,
    Alias,
    Hash,
}

impl Field {
    /// Parse `file.path`, `fm.status`, `tag`, `exact-tag`, `title`, `alias`, `hash`.
    pub fn parse(name: &str) -> Result<Self, QueryParseError> {
        if let Some(key) = name.strip_prefix("fm.")
            && !key.is_empty()
        {
            return Ok(Self::Frontmatter(key.to_string()));
        }
        let field = match name {
            "file.path" => Self::File(FileField::Path),
            "file.folder" => Self::File(FileField::Folder),
            "file.name" => Self::File(FileField::Name),
            "file.size" => Self::File(FileField::Size),
            "file.created" => Self::File(FileField::Created),
            "file.modified" => Self::File(FileField::Modified),
            "tag" | "tags" => Self::Tag,
            "exact-tag" | "exact_tag" => Self::ExactTag,
            "title" => Self::Title,
            "alias" | "aliases" => Self::Alias,
            "hash" => Self::Hash,
            other => return Err(QueryParseError::UnknownField(other.to_string())),
        };
        Ok(field)
    }

    /// Values of this field on `record`. `None` means the field is absent.
    fn values(&self, record: &DocumentRecord) -> Option<Vec<String>> {
        let values = match self {
            Self::File(FileField::Path) => vec![record.relative_path.clone()],
            Self::File(FileField::Folder) => vec![record.folder.clone()],
            Self::File(FileField::Name) => vec![record.name.clone(), record.file_name()],
            Self::File(FileField::Size) => vec![record.size.to_string()],
            Self::File(FileField::Created) => timestamp_values(&record.created),
            Self::File(FileField::Modified) => timestamp_values(&record.modified),
            Self::Frontmatter(key) => return record.frontmatter.get(key).map(value_strings),
            Self::Tag => record.tags.iter().cloned().collect(),
            Self::ExactTag => record.exact_tags.iter().cloned().collect(),
            Self::Title => vec![record.title.clone()],
            Self::Alias => record.aliases.clone(),
            Self::Hash => vec![record.content_hash.clone()],
        };
        if values.is_empty() { None } else { Some(values) }
    }

    fn case_sensitive(&self) -> bool {
        matches!(self, Self::ExactTag)
    }

    /// Same folding as the storage indexes, so index lookups and the
    /// per-record check agree.
    fn normalize(&self, value: &str) -> String {
        match self {
            Self::ExactTag => value.trim().to_string(),
            Self::Tag => normalize_key(value.trim().trim_start_matches('#')),
            _ => normalize_key(value),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(field) => write!(f, "file.{}", format!("{field:?}").to_lowercase()),
            Self::Frontmatter(key) => write!(f, "fm.{key}"),
            Self::Tag => write!(f, "tag"),
            Self::ExactTag => write!(f, "exact-tag"),
            Self::Title => write!(f, "title"),
            Self::Alias => write!(f, "alias"),
            Self::Hash => write!(f, "hash"),
        }
    }
}

fn timestamp_values(at: &chrono::DateTime<chrono::Utc>) -> Vec<String> {
    vec![at.date_naive().to_string(), at.to_rfc3339()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    Contains,
    /// Glob pattern, case-insensitive.
    Matches,
    Exists,
    NotExists,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: Field,
    pub operator: Operator,
    #[serde(default)]
    pub value: Option<String>,
}

impl Condition {
    pub fn new(field: Field, operator: Operator, value: Option<String>) -> Self {
        Self { field, operator, value }
    }

    /// Equality, or a pattern match when `value` contains `*` or `?`.
    pub fn from_raw(field: Field, value: &str) -> Self {
        let operator = if value.contains(['*', '?']) { Operator::Matches } else { Operator::Equals };
        Self::new(field, operator, Some(value.to_string()))
    }

    pub fn exists(field: Field) -> Self {
        Self::new(field, Operator::Exists, None)
    }

    pub fn not_exists(field: Field) -> Self {
        Self::new(field, Operator::NotExists, None)
    }
}

/// A conjunction of conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Parse whitespace-separated terms; see [`Query::parse_terms`].
    pub fn parse(text: &str) -> Result<Self, QueryParseError> {
        Self::parse_terms(text.split_whitespace())
    }

    /// Parse one condition per term:
    /// `field:value`, `field:*glob*`, `field~text`, `field?`, `!field`.
    pub fn parse_terms<I, S>(terms: I) -> Result<Self, QueryParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let conditions =
            terms.into_iter().map(|t| parse_term(t.as_ref())).collect::<Result<_, _>>()?;
        Ok(Self { conditions })
    }
}

fn parse_term(term: &str) -> Result<Condition, QueryParseError> {
    let term = term.trim();
    if term.is_empty() {
        return Err(QueryParseError::EmptyTerm);
    }
    if let Some(field) = term.strip_prefix('!') {
        return Ok(Condition::not_exists(Field::parse(field)?));
    }
    if let Some(field) = term.strip_suffix('?')
        && !field.contains([':', '~'])
    {
        return Ok(Condition::exists(Field::parse(field)?));
    }
    let Some(split) = term.find([':', '~']) else {
        return Err(QueryParseError::MissingValue(term.to_string()));
    };
    let (field, rest) = term.split_at(split);
    let value = &rest[1..];
    if value.is_empty() {
        return Err(QueryParseError::MissingValue(term.to_string()));
    }
    let field = Field::parse(field)?;
    if rest.starts_with('~') {
        Ok(Condition::new(field, Operator::Contains, Some(value.to_string())))
    } else {
        Ok(Condition::from_raw(field, value))
    }
}

enum Predicate<'q> {
    Equals(&'q Field, String),
    Contains(&'q Field, String),
    Matches(&'q Field, GlobMatcher),
    Exists(&'q Field),
    NotExists(&'q Field),
}

impl Predicate<'_> {
    fn test(&self, record: &DocumentRecord) -> bool {
        match self {
            Self::Equals(field, expected) => field
                .values(record)
                .is_some_and(|vs| vs.iter().any(|v| field.normalize(v) == *expected)),
            Self::Contains(field, needle) => field
                .values(record)
                .is_some_and(|vs| vs.iter().any(|v| field.normalize(v).contains(needle.as_str()))),
            Self::Matches(field, glob) => {
                field.values(record).is_some_and(|vs| vs.iter().any(|v| glob.is_match(v)))
            }
            Self::Exists(field) => field.values(record).is_some(),
            Self::NotExists(field) => field.values(record).is_none(),
        }
    }
}

fn compile(condition: &Condition) -> Result<Predicate<'_>, QueryError> {
    let field = &condition.field;
    let value = || {
        condition.value.clone().ok_or_else(|| QueryError::MissingValue {
            field: field.to_string(),
            operator: condition.operator,
        })
    };
    Ok(match condition.operator {
        Operator::Equals => Predicate::Equals(field, field.normalize(&value()?)),
        Operator::Contains => Predicate::Contains(field, field.normalize(&value()?)),
        Operator::Matches => {
            let pattern = value()?;
            let glob = GlobBuilder::new(&pattern)
                .case_insensitive(!field.case_sensitive())
                .build()
                .map_err(|source| QueryError::InvalidPattern { pattern: pattern.clone(), source })?;
            Predicate::Matches(field, glob.compile_matcher())
        }
        Operator::Exists => Predicate::Exists(field),
        Operator::NotExists => Predicate::NotExists(field),
    })
}

/// Candidate paths from an index, when one applies to this condition.
fn index_candidates(
    storage: &MultiIndexStorage,
    condition: &Condition,
) -> Option<BTreeSet<PathBuf>> {
    let value = condition.value.as_deref();
    let paths = match (&condition.field, condition.operator, value) {
        (Field::Tag, Operator::Equals, Some(v)) => storage.by_tag(v),
        (Field::ExactTag, Operator::Equals, Some(v)) => storage.by_exact_tag(v),
        (Field::Title | Field::Alias, Operator::Equals, Some(v)) => storage.by_title(v),
        (Field::File(FileField::Folder), Operator::Equals, Some(v)) => storage.by_path_prefix(v),
        (Field::File(FileField::Name), Operator::Equals, Some(v)) => {
            let stem = v.rsplit_once('.').map_or(v, |(s, _)| s);
            let mut paths = storage.by_name(v);
            paths.extend(storage.by_name(stem));
            paths
        }
        (Field::Frontmatter(key), Operator::Equals, Some(v)) => storage.by_property(key, v),
        (Field::Frontmatter(key), Operator::Exists, _) => storage.by_property_key(key),
        _ => return None,
    };
    Some(paths.into_iter().collect())
}

/// Evaluate `query` against `storage`.
///
/// The smallest index-backed candidate set is filtered by every condition;
/// without any usable index every record is scanned. Results are sorted by
/// relative path.
pub fn evaluate<'s>(
    storage: &'s MultiIndexStorage,
    query: &Query,
) -> Result<Vec<&'s DocumentRecord>, QueryError> {
    let predicates = query.conditions.iter().map(compile).collect::<Result<Vec<_>, _>>()?;

    let candidates = query
        .conditions
        .iter()
        .filter_map(|c| index_candidates(storage, c))
        .min_by_key(BTreeSet::len);

    let pool: Vec<&DocumentRecord> = match candidates {
        Some(paths) => {
            let mut docs: Vec<_> = paths.iter().filter_map(|p| storage.get(p)).collect();
            docs.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
            docs
        }
        None => storage.all_documents(),
    };

    Ok(pool.into_iter().filter(|doc| predicates.iter().all(|p| p.test(doc))).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::{FileStats, extract};
    use chrono::Utc;
    use rstest::rstest;
    use std::path::Path;

    fn storage() -> MultiIndexStorage {
        let root = Path::new("/v");
        let now = Utc::now();
        let mut storage = MultiIndexStorage::new();
        let files = [
            ("projects/alpha.md", "---\nstatus: active\ntags: [project/alpha]\n---\n# Alpha\n"),
            ("projects/beta.md", "---\nstatus: paused\n---\n# Beta Plan\n#work\n"),
            ("daily/2024-05-01.md", "---\naliases: [May Day]\n---\nLog #work\n"),
            ("inbox.md", "just text"),
        ];
        for (relative, content) in files {
            let stats = FileStats { size: content.len() as u64, modified: now, created: now };
            storage.add_document(extract(&root.join(relative), root, content, &stats));
        }
        storage
    }

    fn paths(query: &Query) -> Vec<String> {
        let storage = storage();
        evaluate(&storage, query).unwrap().iter().map(|d| d.relative_path.clone()).collect()
    }

    #[rstest]
    #[case("tag:work", vec!["daily/2024-05-01.md", "projects/beta.md"])]
    #[case("tag:project", vec!["projects/alpha.md"])]
    #[case("exact-tag:#work", vec!["daily/2024-05-01.md", "projects/beta.md"])]
    #[case("fm.status:active", vec!["projects/alpha.md"])]
    #[case("fm.status?", vec!["projects/alpha.md", "projects/beta.md"])]
    #[case("!fm.status", vec!["daily/2024-05-01.md", "inbox.md"])]
    #[case("title:beta*", vec!["projects/beta.md"])]
    #[case("alias:may*", vec!["daily/2024-05-01.md"])]
    #[case("file.folder:projects", vec!["projects/alpha.md", "projects/beta.md"])]
    #[case("file.name:inbox.md", vec!["inbox.md"])]
    #[case("title~plan", vec!["projects/beta.md"])]
    #[case("file.path:daily/*", vec!["daily/2024-05-01.md"])]
    #[case("tag:work fm.status:paused", vec!["projects/beta.md"])]
    fn text_queries(#[case] text: &str, #[case] expected: Vec<&str>) {
        assert_eq!(paths(&Query::parse(text).unwrap()), expected);
    }

    #[test]
    fn terms_may_contain_spaces() {
        let query = Query::parse_terms(["alias:May Day"]).unwrap();
        assert_eq!(paths(&query), vec!["daily/2024-05-01.md"]);
    }

    #[test]
    fn empty_query_returns_everything_sorted() {
        assert_eq!(paths(&Query::new()).len(), 4);
    }

    #[test]
    fn title_index_candidates_are_filtered_by_field() {
        // "may day" is an alias, not a title
        let query = Query::new().with(Condition::from_raw(Field::Title, "May Day"));
        assert!(paths(&query).is_empty());
    }

    #[rstest]
    #[case(Field::Title, " Alpha", 1)]
    #[case(Field::Title, "BETA PLAN ", 1)]
    #[case(Field::Alias, "  may day", 1)]
    #[case(Field::Tag, " #Work", 2)]
    fn surrounding_whitespace_is_ignored(
        #[case] field: Field,
        #[case] value: &str,
        #[case] expected: usize,
    ) {
        let query = Query::new().with(Condition::from_raw(field, value));
        assert_eq!(paths(&query).len(), expected);
    }

    #[test]
    fn exact_tag_is_case_sensitive() {
        assert!(paths(&Query::parse("exact-tag:#WORK").unwrap()).is_empty());
    }

    #[rstest]
    #[case("bogus:1")]
    #[case("file.inode:3")]
    fn unknown_fields_are_rejected(#[case] text: &str) {
        assert!(matches!(Query::parse(text), Err(QueryParseError::UnknownField(_))));
    }

    #[test]
    fn missing_value_is_rejected() {
        assert!(matches!(Query::parse("title:"), Err(QueryParseError::MissingValue(_))));
        assert!(matches!(Query::parse("title"), Err(QueryParseError::MissingValue(_))));
    }

    #[test]
    fn wildcard_selects_pattern_match() {
        let condition = Condition::from_raw(Field::Title, "a?c");
        assert_eq!(condition.operator, Operator::Matches);
        assert_eq!(Condition::from_raw(Field::Title, "abc").operator, Operator::Equals);
    }

    #[test]
    fn invalid_glob_is_an_error() {
        let storage = storage();
        let query = Query::new().with(Condition::new(
            Field::Title,
            Operator::Matches,
            Some("[unclosed".to_string()),
        ));
        assert!(matches!(evaluate(&storage, &query), Err(QueryError::InvalidPattern { .. })));
    }
}
