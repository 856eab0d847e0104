//! Markdown rendering of the compiled document.
//!
//! Output is a pure function of its inputs; two renders of the same
//! sections and metadata are byte-identical.

use std::fmt::Write as _;

use rulebook_shared::{CodeExample, Impact, Rule, Section, SkillMetadata};

use crate::toc;

/// Document-level title and subject line.
#[derive(Debug, Clone, Copy)]
pub struct DocumentHeader<'a> {
    /// Rendered as the top-level `#` heading.
    pub title: &'a str,
    /// Named in the disclaimer note.
    pub description: &'a str,
}

/// Render the full document: header, abstract, table of contents, sections
/// and the document-level reference list.
pub fn render_document(
    header: DocumentHeader<'_>,
    sections: &[Section],
    metadata: &SkillMetadata,
) -> String {
    let mut md = String::new();

    // --- Header ---
    let _ = write!(md, "# {}\n\n", header.title);
    let _ = write!(md, "**Version {}**  \n", metadata.version);
    let _ = write!(md, "{}  \n", metadata.organization);
    let _ = write!(md, "{}\n\n", metadata.date);
    md.push_str("> **Note:**  \n");
    md.push_str("> This document is for AI agents and LLMs to follow when working with  \n");
    let _ = write!(md, "> {}. Humans may also find it useful,  \n", header.description);
    md.push_str("> but guidance here is optimized for automation and consistency.  \n\n");
    md.push_str("---\n\n");

    // --- Abstract ---
    md.push_str("## Abstract\n\n");
    let _ = write!(md, "{}\n\n", metadata.abstract_text);
    md.push_str("---\n\n");

    // --- Table of contents ---
    md.push_str("## Table of Contents\n\n");
    md.push_str(&toc::render_toc(sections));
    md.push_str("\n---\n\n");

    // --- Sections ---
    for section in sections {
        let _ = write!(md, "## {}. {}\n\n", section.number, section.title);
        md.push_str(&impact_line(section.impact, section.impact_description.as_deref()));
        if let Some(intro) = section.introduction.as_deref().filter(|i| !i.is_empty()) {
            let _ = write!(md, "{intro}\n\n");
        }

        for rule in &section.rules {
            md.push_str(&render_rule(rule));
        }

        md.push_str("---\n\n");
    }

    // --- Document references ---
    if let Some(references) = metadata.references.as_ref().filter(|r| !r.is_empty()) {
        md.push_str("## References\n\n");
        for (i, reference) in references.iter().enumerate() {
            let _ = writeln!(md, "{}. [{reference}]({reference})", i + 1);
        }
    }

    md
}

/// Render one rule: heading, impact, explanation, examples and references.
pub fn render_rule(rule: &Rule) -> String {
    let mut md = String::new();

    let _ = write!(md, "### {} {}\n\n", rule.id, rule.title);
    md.push_str(&impact_line(rule.impact, rule.impact_description.as_deref()));
    let _ = write!(md, "{}\n\n", rule.explanation);

    for example in &rule.examples {
        render_example(&mut md, example);
    }

    if !rule.references.is_empty() {
        let links: Vec<String> = rule
            .references
            .iter()
            .map(|r| format!("[{r}]({r})"))
            .collect();
        let _ = write!(md, "Reference: {}\n\n", links.join(", "));
    }

    md
}

fn render_example(md: &mut String, example: &CodeExample) {
    let text = match example.description.as_deref() {
        Some(description) => format!("{} ({description})", example.label),
        None => example.label.clone(),
    };

    // A bold label cannot carry a colon; fall back to a heading label.
    if text.contains(':') {
        let _ = write!(md, "### {text}\n\n");
    } else {
        let _ = write!(md, "**{text}:**\n\n");
    }

    if !example.code.trim().is_empty() {
        let _ = write!(md, "```{}\n{}\n```\n\n", example.language, example.code);
    }

    if let Some(text) = example.additional_text.as_deref().filter(|t| !t.is_empty()) {
        let _ = write!(md, "{text}\n\n");
    }
}

fn impact_line(impact: Impact, description: Option<&str>) -> String {
    match description.filter(|d| !d.is_empty()) {
        Some(d) => format!("**Impact: {impact} ({d})**\n\n"),
        None => format!("**Impact: {impact}**\n\n"),
    }
}
