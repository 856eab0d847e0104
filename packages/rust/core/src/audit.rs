//! Output audit: compare rendered rule headings with the rule files on disk.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{info, instrument, warn};

use rulebook_shared::{Result, RulebookError, SkillConfig};

use crate::pipeline::collect_rule_files;

/// Rendered rule heading: `### <section>.<position> <title>`.
static RULE_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^### \d+\.\d+ ").expect("rule heading regex"));

/// Outcome of auditing one skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuditStatus {
    /// Rules directory absent; nothing to compare.
    Skipped { rules_dir: PathBuf },
    Ok { rules: usize },
    CountMismatch { rule_files: usize, headings: usize },
}

/// Audit result for one skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub skill: String,
    pub output: PathBuf,
    #[serde(flatten)]
    pub status: AuditStatus,
}

/// Count rendered rule headings in a document.
pub fn count_rule_headings(document: &str) -> usize {
    RULE_HEADING_RE.find_iter(document).count()
}

/// Audit one skill's output document. A missing output file is an error.
#[instrument(skip_all, fields(skill = %skill.name))]
pub async fn audit_skill(skill: &SkillConfig, skills_dir: &Path) -> Result<AuditReport> {
    let rules_dir = skill.rules_path(skills_dir);
    let output = skill.output_path(skills_dir);

    if !tokio::fs::try_exists(&rules_dir)
        .await
        .map_err(|e| RulebookError::io(&rules_dir, e))?
    {
        info!(path = %rules_dir.display(), "rules directory does not exist, skipping");
        return Ok(AuditReport {
            skill: skill.name.clone(),
            output,
            status: AuditStatus::Skipped { rules_dir },
        });
    }

    let document = match tokio::fs::read_to_string(&output).await {
        Ok(document) => document,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RulebookError::validation(format!(
                "{}: output {} is missing, run `rulebook build --skill {}`",
                skill.name,
                output.display(),
                skill.name
            )));
        }
        Err(e) => return Err(RulebookError::io(&output, e)),
    };

    let rule_files = collect_rule_files(&rules_dir).await?.len();
    let headings = count_rule_headings(&document);

    let status = if rule_files == headings {
        info!(rules = headings, "output matches rule files");
        AuditStatus::Ok { rules: headings }
    } else {
        warn!(rule_files, headings, "rule count mismatch");
        AuditStatus::CountMismatch {
            rule_files,
            headings,
        }
    };

    Ok(AuditReport {
        skill: skill.name.clone(),
        output,
        status,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::pipeline::{BuildOptions, SilentProgress, build_skill};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rulebook-audit-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn skill() -> SkillConfig {
        SkillConfig::new("api", "API Guide", "API integration", BTreeMap::new())
    }

    fn write_rule(skills_dir: &Path, name: &str, content: &str) {
        let rules = skills_dir.join("api").join("rules");
        std::fs::create_dir_all(&rules).unwrap();
        std::fs::write(rules.join(name), content).unwrap();
    }

    #[test]
    fn counts_only_numbered_rule_headings() {
        let doc = "## 1. Core\n\n### 1.1 First\n\n### 1.2 Second\n\n### Not numbered\n\n```\n### 9 code\n```\n";
        assert_eq!(count_rule_headings(doc), 2);
    }

    #[tokio::test]
    async fn skips_skill_without_rules() {
        let tmp = temp_dir();
        let report = audit_skill(&skill(), &tmp).await.unwrap();
        assert!(matches!(report.status, AuditStatus::Skipped { .. }));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn missing_output_is_an_error() {
        let tmp = temp_dir();
        write_rule(&tmp, "core-a.md", "# A\n");
        let err = audit_skill(&skill(), &tmp).await.unwrap_err();
        assert!(err.to_string().contains("missing"));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn built_output_matches_then_drifts() {
        let tmp = temp_dir();
        write_rule(&tmp, "core-a.md", "# A\nA.\n");
        write_rule(&tmp, "auth-b.md", "# B\nB.\n");

        let options = BuildOptions {
            skills_dir: tmp.clone(),
            organization: "Acme".into(),
            ..BuildOptions::default()
        };
        build_skill(&skill(), &options, &SilentProgress).await.unwrap();

        let report = audit_skill(&skill(), &tmp).await.unwrap();
        assert_eq!(report.status, AuditStatus::Ok { rules: 2 });

        write_rule(&tmp, "core-c.md", "# C\nC.\n");
        let report = audit_skill(&skill(), &tmp).await.unwrap();
        assert_eq!(
            report.status,
            AuditStatus::CountMismatch {
                rule_files: 3,
                headings: 2
            }
        );

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
