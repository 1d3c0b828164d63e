//! Document content extraction: title, aliases, tags, headings, links.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;
use tracing::warn;

use super::fs::FileStats;
use super::hasher::content_hash;
use super::paths::to_slash;
use crate::frontmatter;
use crate::index::types::{
    DocumentRecord, Heading, LinkKind, LinkSyntax, RawLink, TaskCounts,
};

static WIKILINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    // [[target]], [[target|alias]], [[target#section|alias]], ![[embed]]
    Regex::new(r"(!?)\[\[([^\]\|#]*)(?:#([^\]\|]*))?(?:\|([^\]]*))?\]\]").unwrap()
});

static MARKDOWN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    // [text](url) or [text](url "title"), optionally embedded with !
    Regex::new(r#"(!?)\[([^\]]*)\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#).unwrap()
});

static INLINE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s(\[,;])(#[\p{L}\p{N}_\-/]+)").unwrap()
});

static INLINE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`[^`]*`").unwrap());

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})(?:\s+(.*?))?\s*#*\s*$").unwrap());

static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+(.*)$").unwrap());

static TASK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\[([ xX])\]").unwrap());

static TAG_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,\s]+").unwrap());

/// Build the record for a file from its content and stats.
///
/// Pure: identical inputs give an identical record.
pub fn extract(
    path: &Path,
    vault_root: &Path,
    content: &str,
    stats: &FileStats,
) -> DocumentRecord {
    let parsed = frontmatter::parse(content).unwrap_or_else(|e| {
        warn!("ignoring frontmatter in {}: {}", path.display(), e);
        frontmatter::ParsedDocument {
            frontmatter: None,
            body: content.to_string(),
            body_offset: 0,
        }
    });
    let fields: BTreeMap<String, Value> =
        parsed.frontmatter.map(|fm| fm.fields).unwrap_or_default();

    let relative = path.strip_prefix(vault_root).unwrap_or(path);
    let relative_path = to_slash(relative);
    let folder = relative.parent().map(to_slash).unwrap_or_default();
    let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();

    let mut headings = Vec::new();
    let mut list_items = 0;
    let mut tasks = TaskCounts::default();
    let mut inline_tags = Vec::new();

    for line in content_lines(&parsed.body) {
        if let Some(caps) = HEADING_RE.captures(line) {
            let level = caps[1].len() as u8;
            let text = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("").to_string();
            collect_inline_tags(&text, &mut inline_tags);
            headings.push(Heading { level, slug: slugify(&text), text });
            continue;
        }

        if let Some(caps) = LIST_ITEM_RE.captures(line) {
            list_items += 1;
            if let Some(task) = TASK_RE.captures(&caps[1]) {
                tasks.total += 1;
                if &task[1] != " " {
                    tasks.completed += 1;
                }
            }
        }

        collect_inline_tags(line, &mut inline_tags);
    }

    let title = headings
        .iter()
        .find(|h| h.level == 1 && !h.text.is_empty())
        .map(|h| h.text.clone())
        .unwrap_or_else(|| prettify_name(&name));

    let aliases = string_list(fields.get("aliases").or_else(|| fields.get("alias")), false);

    let mut tags = BTreeSet::new();
    let mut exact_tags = BTreeSet::new();
    let frontmatter_tags = string_list(fields.get("tags").or_else(|| fields.get("tag")), true);
    for tag in frontmatter_tags.into_iter().chain(inline_tags) {
        expand_tag(&tag, &mut tags);
        exact_tags.insert(tag);
    }

    DocumentRecord {
        path: path.to_path_buf(),
        relative_path,
        folder,
        name,
        title,
        aliases,
        created: stats.created,
        modified: stats.modified,
        size: stats.size,
        tags,
        exact_tags,
        frontmatter: fields,
        headings,
        list_items,
        tasks,
        content_hash: content_hash(content),
    }
}

/// Find every link in `content`, skipping frontmatter, fenced code and
/// inline code spans. Markdown links count only when they point at a
/// note: no extension, or the vault's `extension`.
pub fn extract_links(content: &str, extension: &str) -> Vec<RawLink> {
    let body_start = frontmatter::parse(content).map(|p| p.body_offset).unwrap_or(0);
    let mut links = Vec::new();
    let mut in_fence = false;
    let mut offset = 0;

    for (index, raw_line) in content.split_inclusive('\n').enumerate() {
        let line_start = offset;
        offset += raw_line.len();
        if line_start < body_start {
            continue;
        }
        let line = raw_line.trim_end_matches(['\n', '\r']);
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }

        let code_spans: Vec<Range<usize>> =
            INLINE_CODE_RE.find_iter(line).map(|m| m.range()).collect();
        let in_code = |pos: usize| code_spans.iter().any(|r| r.contains(&pos));
        let position = |start: usize| (index + 1, line[..start].chars().count() + 1);

        for caps in WIKILINK_RE.captures_iter(line) {
            let Some(whole) = caps.get(0) else { continue };
            let target = caps[2].trim();
            if target.is_empty() || in_code(whole.start()) {
                continue;
            }
            let (line_no, column) = position(whole.start());
            links.push(RawLink {
                target: target.to_string(),
                section: caps.get(3).map(|m| m.as_str().trim().to_string()),
                display: caps.get(4).map(|m| m.as_str().trim().to_string()),
                kind: if &caps[1] == "!" { LinkKind::Embed } else { LinkKind::Reference },
                syntax: LinkSyntax::Wiki,
                line: line_no,
                column,
                start: line_start + whole.start(),
                end: line_start + whole.end(),
            });
        }

        for caps in MARKDOWN_LINK_RE.captures_iter(line) {
            let Some(whole) = caps.get(0) else { continue };
            if in_code(whole.start()) || is_inside_wikilink(line, whole.start()) {
                continue;
            }
            let url = &caps[3];
            if !is_local_note_reference(url, extension) {
                continue;
            }
            let (path_part, section) = match url.split_once('#') {
                Some((p, s)) => (p, Some(s.to_string())),
                None => (url, None),
            };
            if path_part.is_empty() {
                continue;
            }
            let (line_no, column) = position(whole.start());
            links.push(RawLink {
                target: path_part.replace("%20", " "),
                section,
                display: Some(caps[2].to_string()),
                kind: if &caps[1] == "!" { LinkKind::Embed } else { LinkKind::Reference },
                syntax: LinkSyntax::Markdown,
                line: line_no,
                column,
                start: line_start + whole.start(),
                end: line_start + whole.end(),
            });
        }
    }

    links.sort_by_key(|l| l.start);
    links
}

/// `#tags` in `line` outside inline code. Purely numeric tags are skipped.
fn collect_inline_tags(line: &str, tags: &mut Vec<String>) {
    let visible = INLINE_CODE_RE.replace_all(line, "");
    for caps in INLINE_TAG_RE.captures_iter(&visible) {
        let tag = caps[1].trim_end_matches('/');
        if tag.chars().skip(1).any(|c| !c.is_ascii_digit()) {
            tags.push(tag.to_string());
        }
    }
}

/// Body lines outside fenced code blocks.
fn content_lines(body: &str) -> impl Iterator<Item = &str> {
    let mut in_fence = false;
    body.lines().filter(move |line| {
        if is_fence(line) {
            in_fence = !in_fence;
            return false;
        }
        !in_fence
    })
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

fn is_inside_wikilink(line: &str, pos: usize) -> bool {
    WIKILINK_RE.find_iter(line).any(|m| m.range().contains(&pos))
}

fn is_local_note_reference(url: &str, extension: &str) -> bool {
    let lower = url.to_lowercase();
    if lower.contains("://") || lower.starts_with("mailto:") || lower.starts_with('#') {
        return false;
    }
    let path = lower.split('#').next().unwrap_or("");
    let last = path.rsplit('/').next().unwrap_or("");
    match last.rsplit_once('.') {
        Some((_, ext)) => ext.eq_ignore_ascii_case(extension.trim_start_matches('.')),
        None => true,
    }
}

/// Values of a string-or-list field. With `split`, strings are split on
/// commas and whitespace.
fn string_list(value: Option<&Value>, split: bool) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::String(s)) if split => {
            TAG_SPLIT_RE.split(s).map(str::to_string).collect()
        }
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Sequence(seq)) => seq
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    items.into_iter().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

/// Insert the normalized tag and every ancestor level.
fn expand_tag(tag: &str, into: &mut BTreeSet<String>) {
    let normalized = tag.trim_start_matches('#').to_lowercase();
    let mut prefix = String::new();
    for segment in normalized.split('/').filter(|s| !s.is_empty()) {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(segment);
        into.insert(prefix.clone());
    }
}

/// `my-great_note.v2` becomes `My Great Note V2`.
pub fn prettify_name(name: &str) -> String {
    name.split(['-', '_', '.'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// URL-safe heading anchor.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if (c.is_whitespace() || c == '-' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}
