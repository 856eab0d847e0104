//! Rule-file parser.
//!
//! Turns the text of one rule file into a [`Rule`] plus the section it
//! belongs to. Parsing never fails on readable text: defects such as a
//! missing title or an unterminated code fence degrade to default field
//! values and are surfaced as [`ParseDiagnostic`]s on the returned
//! [`RuleFile`].

mod frontmatter;
mod scan;

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, instrument};

use rulebook_shared::{Impact, Rule};

use frontmatter::split_header_block;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A parsed rule file, ready for grouping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFile {
    /// File name the rule was parsed from (used for section inference and reporting).
    pub file_name: String,
    /// Resolved section number; 0 means unclassified.
    pub section: u32,
    /// The parsed rule; `id` and `subsection` are left for the assembler.
    pub rule: Rule,
    /// Non-fatal defects found while parsing.
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl RuleFile {
    /// Whether the file produced a rule without a title.
    pub fn is_untitled(&self) -> bool {
        self.diagnostics.contains(&ParseDiagnostic::MissingTitle)
    }
}

/// A non-fatal defect found in a rule file. Line numbers are 1-based and
/// relative to the whole file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseDiagnostic {
    #[error("no title heading found")]
    MissingTitle,

    #[error("code fence opened at line {line} is never closed")]
    UnterminatedCodeFence { line: usize },

    #[error("code block at line {line} is not under any example label and was dropped")]
    OrphanCodeBlock { line: usize },

    #[error("reference line {line} contains no markdown links")]
    UnlinkedReference { line: usize },

    #[error("unknown impact level '{value}' at line {line}, using MEDIUM")]
    UnknownImpact { line: usize, value: String },

    #[error("header block impact '{0}' is not a known level, ignored")]
    UnknownHeaderImpact(String),

    #[error("header block section '{0}' is not a non-negative integer, ignored")]
    InvalidHeaderSection(String),

    #[error("header block key '{0}' is not recognized")]
    UnknownHeaderKey(String),
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse one rule file.
///
/// `file_name` drives section inference against `section_map`; a header
/// block `section` takes priority over it. The returned rule has an empty
/// `id` and no `subsection` until the assembler numbers it.
#[instrument(level = "debug", skip(content, section_map), fields(bytes = content.len()))]
pub fn parse_rule_file(
    content: &str,
    file_name: &str,
    section_map: &BTreeMap<String, u32>,
) -> RuleFile {
    let normalized = content
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n");

    let (header, body, header_lines) = split_header_block(&normalized);
    let header = header.unwrap_or_default();
    let mut diagnostics: Vec<ParseDiagnostic> = header
        .unknown_keys()
        .map(|k| ParseDiagnostic::UnknownHeaderKey(k.to_string()))
        .collect();

    // --- Title: first line starting with `#` ---
    let lines: Vec<&str> = body.lines().collect();
    let title_at = lines.iter().position(|line| line.starts_with('#'));
    let body_title = title_at
        .map(|i| lines[i].trim_start_matches('#').trim().to_string())
        .unwrap_or_default();

    // --- Body scan ---
    let start = title_at.map_or(0, |i| i + 1);
    let mut scanner = scan::Scanner::new();
    for (i, line) in lines.iter().enumerate().skip(start) {
        scanner.feed(header_lines + i + 1, line);
    }
    let scanned = scanner.finish();
    diagnostics.extend(scanned.diagnostics);

    // --- Header block overrides ---
    let title = header
        .get("title")
        .map(String::from)
        .unwrap_or(body_title);
    if title.is_empty() {
        diagnostics.insert(0, ParseDiagnostic::MissingTitle);
    }

    let mut section = infer_section(file_name, section_map).unwrap_or(0);
    if let Some(raw) = header.get("section") {
        match raw.trim().parse::<u32>() {
            Ok(n) => section = n,
            Err(_) => diagnostics.push(ParseDiagnostic::InvalidHeaderSection(raw.to_string())),
        }
    }

    let mut impact = scanned.impact.unwrap_or_default();
    if let Some(raw) = header.get("impact") {
        match Impact::normalize(raw) {
            Some(level) => impact = level,
            None => diagnostics.push(ParseDiagnostic::UnknownHeaderImpact(raw.to_string())),
        }
    }

    let impact_description = header
        .get("impactDescription")
        .map(String::from)
        .or(scanned.impact_description)
        .filter(|d| !d.is_empty());

    let explanation = header
        .get("explanation")
        .map(String::from)
        .unwrap_or(scanned.explanation);

    let references = header.list("references").unwrap_or(scanned.references);

    let rule = Rule {
        id: String::new(),
        title,
        section,
        subsection: None,
        impact,
        impact_description,
        explanation,
        examples: scanned.examples,
        references,
        tags: header.list("tags"),
    };

    debug!(
        title = %rule.title,
        section,
        examples = rule.examples.len(),
        references = rule.references.len(),
        diagnostics = diagnostics.len(),
        "parsed rule file"
    );

    RuleFile {
        file_name: file_name.to_string(),
        section,
        rule,
        diagnostics,
    }
}

/// Infer a section number from a hyphen-delimited file name.
///
/// Tries the longest hyphen-joined prefix of the name's segments first, so
/// `model-flux2-seeds.md` checks `model-flux2-seeds`, `model-flux2`, then
/// `model`.
pub fn infer_section(file_name: &str, section_map: &BTreeMap<String, u32>) -> Option<u32> {
    let name = Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    let stem = name.strip_suffix(".md").unwrap_or(name);
    let parts: Vec<&str> = stem.split('-').collect();

    (1..=parts.len())
        .rev()
        .find_map(|len| section_map.get(&parts[..len].join("-")).copied())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
