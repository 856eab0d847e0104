//! Leading `---` header block of a rule file.
//!
//! The block is a flat list of `key: value` lines. Values are split on the
//! first colon only and lose one surrounding quote character on each side.

use std::collections::BTreeMap;

/// Keys that override body-derived rule fields.
pub(crate) const KNOWN_KEYS: [&str; 7] = [
    "title",
    "section",
    "impact",
    "impactDescription",
    "explanation",
    "references",
    "tags",
];

const DELIMITER: &str = "---";

/// Parsed header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct HeaderBlock {
    fields: BTreeMap<String, String>,
}

impl HeaderBlock {
    /// Non-empty value for `key`, if declared.
    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Comma-separated list value, each entry trimmed, empties dropped.
    pub(crate) fn list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(String::from)
                .collect()
        })
    }

    /// Declared keys that no rule field consumes.
    pub(crate) fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.fields
            .keys()
            .map(String::as_str)
            .filter(|k| !KNOWN_KEYS.contains(k))
    }
}

/// Split `content` into an optional header block and the remaining body.
///
/// Returns the block, the body text, and the number of lines the block
/// occupied (including both delimiters) so callers can report file-relative
/// line numbers. Without a closing delimiter the whole content is body.
pub(crate) fn split_header_block(content: &str) -> (Option<HeaderBlock>, &str, usize) {
    let mut lines = content.split_inclusive('\n');

    let Some(first) = lines.next() else {
        return (None, content, 0);
    };
    if first.trim_end() != DELIMITER {
        return (None, content, 0);
    }

    let mut offset = first.len();
    let mut inner: Vec<&str> = Vec::new();

    for line in lines {
        offset += line.len();
        if line.trim() == DELIMITER {
            let block = parse_fields(&inner);
            let consumed = inner.len() + 2;
            return (Some(block), &content[offset..], consumed);
        }
        inner.push(line.trim_end_matches(['\n', '\r']));
    }

    (None, content, 0)
}

fn parse_fields(lines: &[&str]) -> HeaderBlock {
    let mut fields = BTreeMap::new();

    for line in lines {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        fields.insert(key.to_string(), strip_quotes(value.trim()).to_string());
    }

    HeaderBlock { fields }
}

/// Remove one leading and one trailing quote character, independently.
fn strip_quotes(value: &str) -> &str {
    let value = value
        .strip_prefix(['"', '\''])
        .unwrap_or(value);
    value.strip_suffix(['"', '\'']).unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_block_and_body() {
        let content = "---\ntitle: \"Use Seeds\"\nsection: 2\n---\n# Heading\nBody\n";
        let (block, body, consumed) = split_header_block(content);
        let block = block.expect("header block");

        assert_eq!(block.get("title"), Some("Use Seeds"));
        assert_eq!(block.get("section"), Some("2"));
        assert_eq!(body, "# Heading\nBody\n");
        assert_eq!(consumed, 4);
    }

    #[test]
    fn value_keeps_colons_after_the_first() {
        let content = "---\nreferences: https://a.example/x, https://b.example/y\n---\n";
        let (block, _, _) = split_header_block(content);
        let refs = block.expect("block").list("references").expect("list");
        assert_eq!(refs, vec!["https://a.example/x", "https://b.example/y"]);
    }

    #[test]
    fn single_quotes_are_stripped() {
        let content = "---\nimpactDescription: '2-4x fewer retries'\n---\n";
        let (block, _, _) = split_header_block(content);
        assert_eq!(
            block.expect("block").get("impactDescription"),
            Some("2-4x fewer retries")
        );
    }

    #[test]
    fn unterminated_block_is_body() {
        let content = "---\ntitle: Oops\n# Heading\n";
        let (block, body, consumed) = split_header_block(content);
        assert!(block.is_none());
        assert_eq!(body, content);
        assert_eq!(consumed, 0);
    }

    #[test]
    fn no_block_without_leading_delimiter() {
        let content = "# Heading\n---\nmore\n";
        let (block, body, _) = split_header_block(content);
        assert!(block.is_none());
        assert_eq!(body, content);
    }

    #[test]
    fn empty_values_are_absent() {
        let content = "---\ntitle:\ntags: a, ,b\nowner: docs-team\n---\n";
        let (block, _, _) = split_header_block(content);
        let block = block.expect("block");
        assert_eq!(block.get("title"), None);
        assert_eq!(block.list("tags"), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(block.unknown_keys().collect::<Vec<_>>(), vec!["owner"]);
    }
}
