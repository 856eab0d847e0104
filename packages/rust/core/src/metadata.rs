//! Document metadata (`metadata.json`): loading, defaults and version bumps.

use std::path::Path;

use chrono::Utc;
use tracing::{debug, warn};

use rulebook_shared::{Result, RulebookError, SkillMetadata};

/// Version used when a skill has no metadata file.
pub const INITIAL_VERSION: &str = "1.0.0";

/// Read `metadata.json`. Returns `Ok(None)` when the file does not exist or
/// does not parse; the caller decides on defaults.
pub fn load_metadata(path: &Path) -> Result<Option<SkillMetadata>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no metadata file");
            return Ok(None);
        }
        Err(e) => return Err(RulebookError::io(path, e)),
    };

    match serde_json::from_str(&content) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "metadata file is not valid, using defaults");
            Ok(None)
        }
    }
}

/// Metadata for a skill that has none on disk, dated this month.
pub fn default_metadata(organization: &str, description: &str) -> SkillMetadata {
    SkillMetadata {
        version: INITIAL_VERSION.to_string(),
        organization: organization.to_string(),
        date: Utc::now().format("%B %Y").to_string(),
        abstract_text: format!("Guide for {description}, organized by category."),
        references: None,
    }
}

/// Increment the last dotted component: `1.2.9` → `1.2.10`.
pub fn increment_version(version: &str) -> Result<String> {
    let (head, last) = match version.rsplit_once('.') {
        Some((head, last)) => (Some(head), last),
        None => (None, version),
    };

    let next = last
        .trim()
        .parse::<u64>()
        .map_err(|_| {
            RulebookError::metadata(format!(
                "cannot increment version '{version}': last component '{last}' is not a number"
            ))
        })?
        + 1;

    Ok(match head {
        Some(head) => format!("{head}.{next}"),
        None => next.to_string(),
    })
}

/// Write metadata as pretty JSON with a trailing newline.
pub fn write_metadata(path: &Path, metadata: &SkillMetadata) -> Result<()> {
    let mut json = serde_json::to_string_pretty(metadata)
        .map_err(|e| RulebookError::metadata(format!("JSON serialization failed: {e}")))?;
    json.push('\n');
    std::fs::write(path, json).map_err(|e| RulebookError::io(path, e))?;
    debug!(path = %path.display(), version = %metadata.version, "wrote metadata");
    Ok(())
}
