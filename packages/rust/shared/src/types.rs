//! Core domain types for compiled rule documents.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Impact
// ---------------------------------------------------------------------------

/// Severity rating of a rule or section, ordered from most to least severe.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Impact {
    #[serde(rename = "CRITICAL")]
    Critical,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "MEDIUM-HIGH")]
    MediumHigh,
    #[default]
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "LOW-MEDIUM")]
    LowMedium,
    #[serde(rename = "LOW")]
    Low,
}

impl Impact {
    /// Every level, most severe first.
    pub const ALL: [Impact; 6] = [
        Impact::Critical,
        Impact::High,
        Impact::MediumHigh,
        Impact::Medium,
        Impact::LowMedium,
        Impact::Low,
    ];

    /// Canonical upper-case label, e.g. `MEDIUM-HIGH`.
    pub fn as_str(self) -> &'static str {
        match self {
            Impact::Critical => "CRITICAL",
            Impact::High => "HIGH",
            Impact::MediumHigh => "MEDIUM-HIGH",
            Impact::Medium => "MEDIUM",
            Impact::LowMedium => "LOW-MEDIUM",
            Impact::Low => "LOW",
        }
    }

    /// Normalize a free-form severity word and look it up.
    ///
    /// Trims, upper-cases, turns spaces and underscores into hyphens and
    /// collapses hyphen runs, so `medium_high`, `Medium High` and
    /// `MEDIUM--HIGH` all resolve to [`Impact::MediumHigh`].
    pub fn normalize(raw: &str) -> Option<Impact> {
        let upper = raw.trim().to_uppercase().replace([' ', '_'], "-");
        let collapsed = upper
            .split('-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");

        Impact::ALL
            .into_iter()
            .find(|level| level.as_str() == collapsed)
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// CodeExample
// ---------------------------------------------------------------------------

/// One labeled illustration attached to a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeExample {
    /// Short category name, e.g. "Good", "Incorrect".
    pub label: String,
    /// Parenthetical clarifier from the label line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Snippet body; empty when the example has no code block.
    #[serde(default)]
    pub code: String,
    /// Code fence language tag.
    #[serde(default = "default_language")]
    pub language: String,
    /// Prose following the code block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_text: Option<String>,
}

/// Language tag used when a fence does not declare one.
pub const DEFAULT_LANGUAGE: &str = "text";

fn default_language() -> String {
    DEFAULT_LANGUAGE.into()
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// One compiled guidance item, parsed from a single rule file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Dotted `section.subsection` identifier; empty until numbered.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Section number; 0 means unclassified.
    pub section: u32,
    /// 1-based position within the section, assigned at numbering time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subsection: Option<u32>,
    pub impact: Impact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_description: Option<String>,
    /// Prose preceding the first example or reference line.
    pub explanation: String,
    #[serde(default)]
    pub examples: Vec<CodeExample>,
    /// Reference URLs in source order (duplicates kept).
    #[serde(default)]
    pub references: Vec<String>,
    /// Free-form labels, present only when declared in the header block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Section
// ---------------------------------------------------------------------------

/// A numbered grouping of rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub number: u32,
    pub title: String,
    pub impact: Impact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
    pub rules: Vec<Rule>,
}

impl Section {
    /// Create an empty section titled `Section {number}`.
    pub fn new(number: u32, impact: Impact) -> Self {
        Self {
            number,
            title: format!("Section {number}"),
            impact,
            impact_description: None,
            introduction: None,
            rules: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// SkillMetadata
// ---------------------------------------------------------------------------

/// Document-level front matter, stored as `metadata.json` next to the rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillMetadata {
    /// Dotted numeric version, e.g. `1.0.3`.
    pub version: String,
    pub organization: String,
    /// Display date, e.g. `January 2026`.
    pub date: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
}
