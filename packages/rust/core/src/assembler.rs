//! Section grouping and deterministic rule numbering.
//!
//! Numbering is a whole-set operation: every parsed rule must be present
//! before [`group_rules`] runs, since a rule's id depends on where its title
//! sorts among its section siblings.

use std::collections::BTreeMap;

use tracing::{debug, instrument};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use rulebook_shared::{Rule, Section};

use crate::overrides::SectionOverride;

/// Group rules into sections, sort each section by title and assign ids.
///
/// Sections come back in ascending number order. A section's impact is
/// seeded from the first rule assigned to it, in input order. Within a
/// section, rules are ordered by [`collation_key`]; rules whose keys are
/// equal keep their input order. Each rule's `id` becomes
/// `"{section}.{position}"` and `subsection` the 1-based position.
#[instrument(level = "debug", skip_all)]
pub fn group_rules(rules: impl IntoIterator<Item = Rule>) -> Vec<Section> {
    let mut grouped: BTreeMap<u32, Section> = BTreeMap::new();

    for rule in rules {
        grouped
            .entry(rule.section)
            .or_insert_with(|| Section::new(rule.section, rule.impact))
            .rules
            .push(rule);
    }

    let sections: Vec<Section> = grouped
        .into_values()
        .map(|mut section| {
            number_rules(&mut section);
            section
        })
        .collect();

    debug!(
        sections = sections.len(),
        rules = sections.iter().map(|s| s.rules.len()).sum::<usize>(),
        "rules grouped"
    );

    sections
}

fn number_rules(section: &mut Section) {
    // Stable: equal keys keep input order.
    section
        .rules
        .sort_by_cached_key(|rule| collation_key(&rule.title));

    for (i, rule) in section.rules.iter_mut().enumerate() {
        let position = i as u32 + 1;
        rule.id = format!("{}.{position}", section.number);
        rule.subsection = Some(position);
    }
}

/// Sort key that ignores case and accents: canonical decomposition with
/// combining marks dropped, lowercased, then letters with no decomposition
/// (`ø`, `ł`, `æ`, ...) folded to their base letters.
pub fn collation_key(title: &str) -> String {
    let mut key = String::with_capacity(title.len());
    for c in title.nfd().filter(|c| !is_combining_mark(*c)).flat_map(char::to_lowercase) {
        match fold_letter(c) {
            Some(base) => key.push_str(base),
            None => key.push(c),
        }
    }
    key
}

fn fold_letter(c: char) -> Option<&'static str> {
    Some(match c {
        'ø' => "o",
        'ł' => "l",
        'đ' | 'ð' => "d",
        'ħ' => "h",
        'ı' => "i",
        'æ' => "ae",
        'œ' => "oe",
        'ß' => "ss",
        'þ' => "th",
        _ => return None,
    })
}

/// Apply section overrides by number. Overrides for numbers with no
/// section are ignored. An override without an impact keeps the section's
/// inherited one.
pub fn apply_overrides(sections: &mut [Section], overrides: &[SectionOverride]) {
    for section in sections.iter_mut() {
        let Some(over) = overrides.iter().find(|o| o.number == section.number) else {
            continue;
        };

        section.title = over.title.clone();
        if let Some(impact) = over.impact {
            section.impact = impact;
        }
        if over.introduction.is_some() {
            section.introduction = over.introduction.clone();
        }

        debug!(section = section.number, title = %section.title, "section override applied");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
