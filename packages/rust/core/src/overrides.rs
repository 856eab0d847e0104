//! Section override document (`_sections.md`).
//!
//! ```text
//! ## 1. Core Principles (core)
//!
//! **Impact:** CRITICAL
//! **Description:** Fundamentals every prompt depends on.
//! ```
//!
//! Each `## <n>. <Title>` heading starts a block; a trailing parenthetical on
//! the heading is dropped from the title.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use rulebook_shared::Impact;

static BLOCK_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^## \d+\. ").expect("block start regex"));

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^## (\d+)\.\s+(.+?)(?:\s+\([^)]+\))?$").expect("section heading regex")
});

static IMPACT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\*\*Impact:\*\*\s+(\w+(?:-\w+)?)").expect("section impact regex")
});

const DESCRIPTION_MARKER: &str = "**Description:**";
const DESCRIPTION_END: &str = "\n\n##";

/// Replacement metadata for one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionOverride {
    pub number: u32,
    pub title: String,
    /// `None` keeps the impact inherited from the section's first rule.
    pub impact: Option<Impact>,
    pub introduction: Option<String>,
}

/// Parse a section override document. Blocks whose heading does not parse
/// are skipped.
pub fn parse_section_overrides(content: &str) -> Vec<SectionOverride> {
    let content = content.replace("\r\n", "\n");

    split_blocks(&content)
        .into_iter()
        .filter_map(parse_block)
        .collect()
}

/// Split into blocks, each starting at a `## <n>. ` line. Text before the
/// first such line is its own block and never parses.
fn split_blocks(content: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = Vec::new();
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if BLOCK_START_RE.is_match(line) {
            starts.push(offset);
        }
        offset += line.len();
    }

    let mut blocks = Vec::with_capacity(starts.len() + 1);
    let mut previous = 0;
    for start in starts {
        if start > previous {
            blocks.push(&content[previous..start]);
        }
        previous = start;
    }
    if previous < content.len() {
        blocks.push(&content[previous..]);
    }
    blocks
}

fn parse_block(block: &str) -> Option<SectionOverride> {
    let heading = block.lines().next()?;
    let caps = HEADING_RE.captures(heading)?;
    let number = caps[1].parse::<u32>().ok()?;
    let title = caps[2].trim().to_string();

    let impact = IMPACT_RE.captures(block).and_then(|c| {
        let word = &c[1];
        let level = Impact::normalize(word);
        if level.is_none() {
            debug!(section = number, word, "unrecognized section impact, keeping inherited");
        }
        level
    });

    Some(SectionOverride {
        number,
        title,
        impact,
        introduction: description(block),
    })
}

/// Text after `**Description:**` up to the next blank-line-separated `##`
/// heading or the end of the block.
fn description(block: &str) -> Option<String> {
    let (_, rest) = block.split_once(DESCRIPTION_MARKER)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let text = match rest.find(DESCRIPTION_END) {
        Some(end) => &rest[..end],
        None => rest,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTIONS: &str = "\
# Sections

This file defines the section titles.

---

## 1. Core Principles (core)

**Impact:** CRITICAL
**Description:** Fundamentals every prompt
depends on.

## 2. Model Selection

**impact:** medium-high

## 3. Text to Image

**Description:** Composition and framing.

## x. Broken heading
";

    #[test]
    fn parses_each_numbered_block() {
        let overrides = parse_section_overrides(SECTIONS);
        assert_eq!(overrides.len(), 3);

        assert_eq!(
            overrides[0],
            SectionOverride {
                number: 1,
                title: "Core Principles".into(),
                impact: Some(Impact::Critical),
                introduction: Some("Fundamentals every prompt\ndepends on.".into()),
            }
        );
        assert_eq!(overrides[1].title, "Model Selection");
        assert_eq!(overrides[1].impact, Some(Impact::MediumHigh));
        assert_eq!(overrides[1].introduction, None);
        assert_eq!(overrides[2].impact, None);
        assert_eq!(
            overrides[2].introduction.as_deref(),
            Some("Composition and framing.")
        );
    }

    #[test]
    fn description_stops_at_next_heading() {
        let block = "## 4. Edits\n\n**Description:** Keep masks tight.\n\n## Notes\nnot part of it\n";
        let overrides = parse_section_overrides(block);
        assert_eq!(
            overrides[0].introduction.as_deref(),
            Some("Keep masks tight.")
        );
    }

    #[test]
    fn unknown_impact_word_is_ignored() {
        let overrides = parse_section_overrides("## 5. JSON\n\n**Impact:** SEVERE\n");
        assert_eq!(overrides[0].number, 5);
        assert_eq!(overrides[0].impact, None);
    }

    #[test]
    fn empty_document_has_no_overrides() {
        assert!(parse_section_overrides("").is_empty());
        assert!(parse_section_overrides("# Just a title\n").is_empty());
    }
}
