//! Table of contents and heading anchors.
//!
//! Anchors follow the heading-id convention of common markdown renderers:
//! lowercase, whitespace runs become `-`, and everything that is not an
//! ASCII word character or `-` is dropped.

use std::fmt::Write as _;

use rulebook_shared::{Rule, Section};

/// Slugify heading text into an anchor fragment.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// Anchor of a section heading: `"{number}-{slugified title}"`.
pub fn section_anchor(section: &Section) -> String {
    slugify(&format!("{} {}", section.number, section.title))
}

/// Anchor of a rule heading: `"{id} {title}"` slugified.
pub fn rule_anchor(rule: &Rule) -> String {
    slugify(&format!("{} {}", rule.id, rule.title))
}

/// Render the `## Table of Contents` body: one line per section followed
/// by an indented line per rule.
pub fn render_toc(sections: &[Section]) -> String {
    let mut out = String::new();

    for section in sections {
        let _ = writeln!(
            out,
            "{}. [{}](#{}) - **{}**",
            section.number,
            section.title,
            section_anchor(section),
            section.impact
        );
        for rule in &section.rules {
            let _ = writeln!(out, "   - {} [{}](#{})", rule.id, rule.title, rule_anchor(rule));
        }
    }

    out
}
