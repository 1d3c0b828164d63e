//! Declarative AND/OR filter collections.
//!
//! A [`FilterCollection`] is a flat list of typed conditions combined by one
//! top-level [`FilterLogic`]. It is compiled once per evaluation and shared by
//! query-time filtering and the pipeline runner.

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::DocumentRecord;
use crate::frontmatter::value_strings;

static RELATIVE_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([+-]?)(\d+)([hdwmy])$").unwrap());

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid regular expression '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid date '{0}' (expected YYYY-MM-DD, RFC 3339, -30d, -2w, -1m, -1y, -12h or today)")]
    InvalidDate(String),

    #[error("{0} filter with a range operator needs an end value")]
    MissingEnd(&'static str),

    #[error("metadata filter on '{0}' needs a value")]
    MissingValue(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterLogic {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringOperator {
    Contains,
    NotContains,
    Equals,
    NotEquals,
    StartsWith,
    EndsWith,
    /// Regular expression, as written.
    Matches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayOperator {
    /// Every given value is present.
    Contains,
    /// None of the given values is present.
    NotContains,
    ContainsAll,
    ContainsAny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOperator {
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    NotBetween,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberOperator {
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataOperator {
    Exists,
    NotExists,
    Equals,
    NotEquals,
    Contains,
}

/// A single value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn values(&self) -> &[String] {
        match self {
            Self::One(v) => std::slice::from_ref(v),
            Self::Many(vs) => vs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FilterCondition {
    /// File stem.
    Name { operator: StringOperator, value: String },
    /// Raw file content, loaded on demand.
    Content { operator: StringOperator, value: String },
    /// Ancestor folders of the document (`a`, `a/b` for `a/b/x.md`).
    Folders { operator: ArrayOperator, value: OneOrMany },
    /// Normalized tags.
    Tags { operator: ArrayOperator, value: OneOrMany },
    /// A frontmatter key.
    Metadata {
        key: String,
        operator: MetadataOperator,
        #[serde(default)]
        value: Option<String>,
    },
    Modified {
        operator: DateOperator,
        value: String,
        #[serde(default)]
        end: Option<String>,
    },
    /// Size in bytes.
    Size {
        operator: NumberOperator,
        value: u64,
        #[serde(default)]
        end: Option<u64>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCollection {
    #[serde(default)]
    pub logic: FilterLogic,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
}

impl FilterCollection {
    pub fn all(conditions: Vec<FilterCondition>) -> Self {
        Self { logic: FilterLogic::And, conditions }
    }

    pub fn any(conditions: Vec<FilterCondition>) -> Self {
        Self { logic: FilterLogic::Or, conditions }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// What a filter is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct FilterSubject<'a> {
    pub record: &'a DocumentRecord,
    /// Raw content; only consulted by content conditions.
    pub content: Option<&'a str>,
}

/// A date bound: whole days compare by calendar date, instants exactly.
#[derive(Debug, Clone, Copy)]
enum DateBound {
    Day(NaiveDate),
    Instant(DateTime<Utc>),
}

impl DateBound {
    fn parse(value: &str, now: DateTime<Utc>) -> Result<Self, FilterError> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("today") {
            return Ok(Self::Day(now.date_naive()));
        }
        if let Some(caps) = RELATIVE_DATE_RE.captures(value) {
            let amount: u32 =
                caps[2].parse().map_err(|_| FilterError::InvalidDate(value.to_string()))?;
            let forward = &caps[1] == "+";
            let shifted = match &caps[3] {
                "h" => shift(now, Duration::hours(i64::from(amount)), forward),
                "d" => shift(now, Duration::days(i64::from(amount)), forward),
                "w" => shift(now, Duration::weeks(i64::from(amount)), forward),
                "m" => shift_months(now, amount, forward),
                _ => shift_months(now, amount.saturating_mul(12), forward),
            };
            return shifted.map(Self::Instant).ok_or_else(|| FilterError::InvalidDate(value.to_string()));
        }
        if let Ok(day) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
            return Ok(Self::Day(day));
        }
        DateTime::parse_from_rfc3339(value)
            .map(|dt| Self::Instant(dt.with_timezone(&Utc)))
            .map_err(|_| FilterError::InvalidDate(value.to_string()))
    }

    /// Ordering of `at` relative to this bound.
    fn compare(&self, at: &DateTime<Utc>) -> Ordering {
        match self {
            Self::Day(day) => at.date_naive().cmp(day),
            Self::Instant(instant) => at.cmp(instant),
        }
    }
}

fn shift(now: DateTime<Utc>, by: Duration, forward: bool) -> Option<DateTime<Utc>> {
    if forward { now.checked_add_signed(by) } else { now.checked_sub_signed(by) }
}

fn shift_months(now: DateTime<Utc>, months: u32, forward: bool) -> Option<DateTime<Utc>> {
    if forward {
        now.checked_add_months(Months::new(months))
    } else {
        now.checked_sub_months(Months::new(months))
    }
}

#[derive(Debug)]
enum StringMatcher {
    Plain { operator: StringOperator, needle: String },
    Regex(Regex),
}

impl StringMatcher {
    fn new(operator: StringOperator, value: &str) -> Result<Self, FilterError> {
        if operator == StringOperator::Matches {
            return Regex::new(value)
                .map(Self::Regex)
                .map_err(|source| FilterError::InvalidRegex { pattern: value.to_string(), source });
        }
        Ok(Self::Plain { operator, needle: value.to_lowercase() })
    }

    fn test(&self, haystack: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(haystack),
            Self::Plain { operator, needle } => {
                let haystack = haystack.to_lowercase();
                match operator {
                    StringOperator::Contains => haystack.contains(needle.as_str()),
                    StringOperator::NotContains => !haystack.contains(needle.as_str()),
                    StringOperator::Equals => haystack == *needle,
                    StringOperator::NotEquals => haystack != *needle,
                    StringOperator::StartsWith => haystack.starts_with(needle.as_str()),
                    StringOperator::EndsWith => haystack.ends_with(needle.as_str()),
                    StringOperator::Matches => false,
                }
            }
        }
    }
}

#[derive(Debug)]
enum Compiled {
    Name(StringMatcher),
    Content(StringMatcher),
    Folders(ArrayOperator, Vec<String>),
    Tags(ArrayOperator, Vec<String>),
    Metadata { key: String, operator: MetadataOperator, value: Option<String> },
    Modified { operator: DateOperator, start: DateBound, end: Option<DateBound> },
    Size { operator: NumberOperator, value: u64, end: Option<u64> },
}

/// A filter with regexes and dates resolved, ready to run over many records.
#[derive(Debug)]
pub struct CompiledFilter {
    logic: FilterLogic,
    conditions: Vec<Compiled>,
}

impl CompiledFilter {
    /// Compile `filter`, resolving relative dates against `now`.
    pub fn compile(filter: &FilterCollection, now: DateTime<Utc>) -> Result<Self, FilterError> {
        let conditions = filter
            .conditions
            .iter()
            .map(|c| compile_condition(c, now))
            .collect::<Result<_, _>>()?;
        Ok(Self { logic: filter.logic, conditions })
    }

    /// Whether any condition looks at file content.
    pub fn needs_content(&self) -> bool {
        self.conditions.iter().any(|c| matches!(c, Compiled::Content(_)))
    }

    pub fn matches(&self, subject: &FilterSubject<'_>) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        match self.logic {
            FilterLogic::And => self.conditions.iter().all(|c| check(c, subject)),
            FilterLogic::Or => self.conditions.iter().any(|c| check(c, subject)),
        }
    }
}

fn compile_condition(
    condition: &FilterCondition,
    now: DateTime<Utc>,
) -> Result<Compiled, FilterError> {
    Ok(match condition {
        FilterCondition::Name { operator, value } => {
            Compiled::Name(StringMatcher::new(*operator, value)?)
        }
        FilterCondition::Content { operator, value } => {
            Compiled::Content(StringMatcher::new(*operator, value)?)
        }
        FilterCondition::Folders { operator, value } => Compiled::Folders(
            *operator,
            value.values().iter().map(|f| f.trim_matches('/').to_string()).collect(),
        ),
        FilterCondition::Tags { operator, value } => Compiled::Tags(
            *operator,
            value.values().iter().map(|t| t.trim_start_matches('#').to_lowercase()).collect(),
        ),
        FilterCondition::Metadata { key, operator, value } => {
            let needs_value = !matches!(operator, MetadataOperator::Exists | MetadataOperator::NotExists);
            if needs_value && value.is_none() {
                return Err(FilterError::MissingValue(key.clone()));
            }
            Compiled::Metadata {
                key: key.clone(),
                operator: *operator,
                value: value.as_ref().map(|v| v.to_lowercase()),
            }
        }
        FilterCondition::Modified { operator, value, end } => {
            let is_range = matches!(operator, DateOperator::Between | DateOperator::NotBetween);
            let end = match end {
                Some(end) => Some(DateBound::parse(end, now)?),
                None if is_range => return Err(FilterError::MissingEnd("modified")),
                None => None,
            };
            Compiled::Modified { operator: *operator, start: DateBound::parse(value, now)?, end }
        }
        FilterCondition::Size { operator, value, end } => {
            if *operator == NumberOperator::Between && end.is_none() {
                return Err(FilterError::MissingEnd("size"));
            }
            Compiled::Size { operator: *operator, value: *value, end: *end }
        }
    })
}

fn check(condition: &Compiled, subject: &FilterSubject<'_>) -> bool {
    let record = subject.record;
    match condition {
        Compiled::Name(matcher) => matcher.test(&record.name),
        Compiled::Content(matcher) => matcher.test(subject.content.unwrap_or("")),
        Compiled::Folders(operator, wanted) => {
            let mut ancestors = Vec::new();
            let mut prefix = String::new();
            for segment in record.folder.split('/').filter(|s| !s.is_empty()) {
                if !prefix.is_empty() {
                    prefix.push('/');
                }
                prefix.push_str(segment);
                ancestors.push(prefix.clone());
            }
            array_test(*operator, wanted, |w| ancestors.iter().any(|a| a == w))
        }
        Compiled::Tags(operator, wanted) => {
            array_test(*operator, wanted, |w| record.tags.contains(w))
        }
        Compiled::Metadata { key, operator, value } => {
            let field = record.frontmatter.get(key);
            let values: Vec<String> =
                field.map(value_strings).unwrap_or_default().iter().map(|v| v.to_lowercase()).collect();
            let expected = value.as_deref().unwrap_or("");
            match operator {
                MetadataOperator::Exists => field.is_some(),
                MetadataOperator::NotExists => field.is_none(),
                MetadataOperator::Equals => values.iter().any(|v| v == expected),
                MetadataOperator::NotEquals => !values.iter().any(|v| v == expected),
                MetadataOperator::Contains => values.iter().any(|v| v.contains(expected)),
            }
        }
        Compiled::Modified { operator, start, end } => {
            let at = &record.modified;
            let within = || {
                end.as_ref().is_some_and(|end| {
                    start.compare(at) != Ordering::Less && end.compare(at) != Ordering::Greater
                })
            };
            match operator {
                DateOperator::Gt => start.compare(at) == Ordering::Greater,
                DateOperator::Gte => start.compare(at) != Ordering::Less,
                DateOperator::Lt => start.compare(at) == Ordering::Less,
                DateOperator::Lte => start.compare(at) != Ordering::Greater,
                DateOperator::Between => within(),
                DateOperator::NotBetween => !within(),
            }
        }
        Compiled::Size { operator, value, end } => {
            let size = record.size;
            match operator {
                NumberOperator::Gt => size > *value,
                NumberOperator::Gte => size >= *value,
                NumberOperator::Lt => size < *value,
                NumberOperator::Lte => size <= *value,
                NumberOperator::Between => end.is_some_and(|end| size >= *value && size <= end),
            }
        }
    }
}

fn array_test(operator: ArrayOperator, wanted: &[String], has: impl Fn(&String) -> bool) -> bool {
    match operator {
        ArrayOperator::Contains | ArrayOperator::ContainsAll => wanted.iter().all(&has),
        ArrayOperator::NotContains => !wanted.iter().any(&has),
        ArrayOperator::ContainsAny => wanted.iter().any(&has),
    }
}

/// Evaluate `filter` against one subject.
pub fn matches(subject: &FilterSubject<'_>, filter: &FilterCollection) -> Result<bool, FilterError> {
    Ok(CompiledFilter::compile(filter, Utc::now())?.matches(subject))
}

/// Keep the documents matching `filter`, preserving input order.
///
/// `load_content` is only called when the filter has a content condition.
/// Documents whose content cannot be loaded are evaluated with empty content.
pub fn apply<T, F>(
    docs: Vec<T>,
    filter: &FilterCollection,
    now: DateTime<Utc>,
    mut load_content: F,
) -> Result<Vec<T>, FilterError>
where
    T: Borrow<DocumentRecord>,
    F: FnMut(&DocumentRecord) -> Option<String>,
{
    if filter.is_empty() {
        return Ok(docs);
    }
    let compiled = CompiledFilter::compile(filter, now)?;
    let needs_content = compiled.needs_content();
    Ok(docs
        .into_iter()
        .filter(|doc| {
            let record = doc.borrow();
            let content = if needs_content { load_content(record) } else { None };
            compiled.matches(&FilterSubject { record, content: content.as_deref() })
        })
        .collect())
}
