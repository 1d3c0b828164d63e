//! Frontmatter parsing from markdown documents.

use super::types::{Frontmatter, ParsedDocument};
use thiserror::Error;

/// Errors that can occur during frontmatter parsing.
#[derive(Debug, Error)]
pub enum FrontmatterParseError {
    #[error("invalid YAML frontmatter: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),
}

/// Parse frontmatter from markdown content.
///
/// Frontmatter is delimited by `---` at the start of the document:
/// ```markdown
/// ---
/// key: value
/// ---
/// # Document content
/// ```
pub fn parse(content: &str) -> Result<ParsedDocument, FrontmatterParseError> {
    let trimmed = content.trim_start();
    let leading = content.len() - trimmed.len();

    if !trimmed.starts_with("---") {
        return Ok(plain(content));
    }

    let after_first = &trimmed[3..];

    // The opening delimiter must be alone on its line
    let after_newline = match after_first
        .strip_prefix('\n')
        .or_else(|| after_first.strip_prefix("\r\n"))
    {
        Some(rest) => rest,
        None => return Ok(plain(content)),
    };
    let yaml_start = leading + (trimmed.len() - after_newline.len());

    let Some((end_pos, delimiter_len)) = find_closing_delimiter(after_newline) else {
        // No closing ---, treat as no frontmatter
        return Ok(plain(content));
    };

    let yaml_content = &after_newline[..end_pos];
    let body_offset = yaml_start + end_pos + delimiter_len;
    let body = content[body_offset..].to_string();

    let frontmatter: Frontmatter = if yaml_content.trim().is_empty() {
        Frontmatter::default()
    } else {
        serde_yaml::from_str(yaml_content.trim())?
    };

    Ok(ParsedDocument { frontmatter: Some(frontmatter), body, body_offset })
}

fn plain(content: &str) -> ParsedDocument {
    ParsedDocument { frontmatter: None, body: content.to_string(), body_offset: 0 }
}

/// Find the closing `---` line.
///
/// Returns the byte position where the delimiter line starts and the length of
/// the delimiter line including its line ending.
fn find_closing_delimiter(content: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if line.trim_end_matches(['\n', '\r']).trim() == "---" {
            return Some((offset, line.len()));
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_no_frontmatter() {
        let content = "# Hello\n\nSome content";
        let result = parse(content).unwrap();
        assert!(result.frontmatter.is_none());
        assert_eq!(result.body, content);
        assert_eq!(result.body_offset, 0);
    }

    #[test]
    fn parse_simple_frontmatter() {
        let content = "---\ntitle: Hello\n---\n# Content";
        let result = parse(content).unwrap();
        let fm = result.frontmatter.unwrap();
        assert_eq!(fm.get("title").and_then(|v| v.as_str()), Some("Hello"));
        assert_eq!(result.body, "# Content");
        assert_eq!(&content[result.body_offset..], "# Content");
    }

    #[test]
    fn parse_frontmatter_with_multiple_fields() {
        let content =
            "---\ntitle: Test\ndate: 2024-01-15\ntags:\n  - rust\n  - cli\n---\n\nBody";
        let result = parse(content).unwrap();
        let fm = result.frontmatter.unwrap();
        assert_eq!(fm.get("title").and_then(|v| v.as_str()), Some("Test"));
        assert!(fm.fields.contains_key("tags"));
        assert_eq!(result.body, "\nBody");
    }

    #[test]
    fn parse_empty_frontmatter() {
        let content = "---\n---\n# Content";
        let result = parse(content).unwrap();
        assert!(result.frontmatter.unwrap().fields.is_empty());
        assert_eq!(result.body, "# Content");
    }

    #[test]
    fn parse_crlf_frontmatter() {
        let content = "---\r\ntitle: Win\r\n---\r\nBody\r\n";
        let result = parse(content).unwrap();
        assert_eq!(
            result.frontmatter.unwrap().get("title").and_then(|v| v.as_str()),
            Some("Win")
        );
        assert_eq!(result.body, "Body\r\n");
    }

    #[test]
    fn unclosed_frontmatter_is_body() {
        let content = "---\ntitle: Open\n# Heading";
        let result = parse(content).unwrap();
        assert!(result.frontmatter.is_none());
        assert_eq!(result.body, content);
    }

    #[test]
    fn horizontal_rule_is_not_frontmatter() {
        let content = "---- not yaml\ntext";
        let result = parse(content).unwrap();
        assert!(result.frontmatter.is_none());
    }

    #[test]
    fn invalid_yaml_is_error() {
        let content = "---\ntitle: [unclosed\n---\nBody";
        assert!(parse(content).is_err());
    }
}
