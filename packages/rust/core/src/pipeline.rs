//! End-to-end `build` pipeline: rules dir → parse → group → overrides →
//! metadata → render → output document.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use rulebook_parser::{RuleFile, parse_rule_file};
use rulebook_shared::{Result, RulebookError, SkillConfig};

use crate::assembler::{apply_overrides, group_rules};
use crate::metadata::{default_metadata, increment_version, load_metadata, write_metadata};
use crate::overrides::parse_section_overrides;
use crate::render::{DocumentHeader, render_document};

/// File names never treated as rule files.
const EXCLUDED_FILE: &str = "README.md";

/// Options for one `build_skill` run.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Directory holding the skill sub-directories.
    pub skills_dir: PathBuf,
    /// Organization for skills without a metadata file.
    pub organization: String,
    /// Treat title-less rule files as failures.
    pub strict: bool,
    /// Bump the metadata version and rewrite `metadata.json`.
    pub upgrade_version: bool,
}

/// Why a skill produced no document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NothingToBuild {
    RulesDirMissing { path: PathBuf },
    NoRuleFiles { path: PathBuf },
}

impl std::fmt::Display for NothingToBuild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RulesDirMissing { path } => {
                write!(f, "rules directory {} does not exist", path.display())
            }
            Self::NoRuleFiles { path } => write!(f, "no rule files in {}", path.display()),
        }
    }
}

/// Result of the `build_skill` pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    Built(BuildReport),
    NothingToBuild(NothingToBuild),
}

/// A rule file that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub file: String,
    pub reason: String,
}

/// Summary of a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub skill: String,
    /// Path of the written document.
    pub output: PathBuf,
    pub section_count: usize,
    pub rule_count: usize,
    /// Eligible rule files found, including failed ones.
    pub file_count: usize,
    pub failures: Vec<FileFailure>,
    /// Version rendered into the document.
    pub version: String,
    /// SHA-256 of the written document.
    pub sha256: String,
    pub elapsed_ms: u64,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each rule file is parsed (or fails).
    fn file_parsed(&self, file: &str, current: usize, total: usize);
    /// Called when the pipeline completes with a document.
    fn done(&self, report: &BuildReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_parsed(&self, _file: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &BuildReport) {}
}

/// Build one skill's document.
///
/// 1. Collect rule files
/// 2. Parse each file (failures are recorded, not fatal)
/// 3. Group, sort and number rules
/// 4. Apply section overrides
/// 5. Load or default metadata, optionally bump the version
/// 6. Render and write the document atomically
#[instrument(skip_all, fields(skill = %skill.name))]
pub async fn build_skill(
    skill: &SkillConfig,
    options: &BuildOptions,
    progress: &dyn ProgressReporter,
) -> Result<BuildOutcome> {
    let start = Instant::now();
    let rules_dir = skill.rules_path(&options.skills_dir);

    // --- Phase 1: Collect ---
    progress.phase("Collecting rule files");
    if !tokio::fs::try_exists(&rules_dir)
        .await
        .map_err(|e| RulebookError::io(&rules_dir, e))?
    {
        info!(path = %rules_dir.display(), "rules directory does not exist, skipping");
        return Ok(BuildOutcome::NothingToBuild(NothingToBuild::RulesDirMissing {
            path: rules_dir,
        }));
    }

    let files = collect_rule_files(&rules_dir).await?;
    if files.is_empty() {
        info!(path = %rules_dir.display(), "no rule files found");
        return Ok(BuildOutcome::NothingToBuild(NothingToBuild::NoRuleFiles {
            path: rules_dir,
        }));
    }

    // --- Phase 2: Parse ---
    progress.phase("Parsing rules");
    let section_map = skill.effective_section_map();
    let total = files.len();
    let mut parsed: Vec<RuleFile> = Vec::with_capacity(total);
    let mut failures: Vec<FileFailure> = Vec::new();

    for (i, path) in files.iter().enumerate() {
        let file_name = file_name_of(path);

        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                let rule_file = parse_rule_file(&content, &file_name, &section_map);
                for diagnostic in &rule_file.diagnostics {
                    warn!(file = %file_name, %diagnostic, "rule file diagnostic");
                }

                if options.strict && rule_file.is_untitled() {
                    failures.push(FileFailure {
                        file: file_name.clone(),
                        reason: "no title heading found".to_string(),
                    });
                } else {
                    parsed.push(rule_file);
                }
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "failed to read rule file, skipping");
                failures.push(FileFailure {
                    file: file_name.clone(),
                    reason: e.to_string(),
                });
            }
        }

        progress.file_parsed(&file_name, i + 1, total);
    }

    if parsed.is_empty() {
        return Err(RulebookError::validation(format!(
            "none of the {total} rule files in {} could be used",
            rules_dir.display()
        )));
    }

    // --- Phase 3: Assemble ---
    progress.phase("Assembling sections");
    let mut sections = group_rules(parsed.into_iter().map(|f| f.rule));

    let sections_path = skill.sections_path(&options.skills_dir);
    match tokio::fs::read_to_string(&sections_path).await {
        Ok(content) => {
            let overrides = parse_section_overrides(&content);
            debug!(count = overrides.len(), "section overrides loaded");
            apply_overrides(&mut sections, &overrides);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %sections_path.display(), error = %e, "could not read section overrides");
        }
    }

    // --- Phase 4: Metadata ---
    let metadata_path = skill.metadata_path(&options.skills_dir);
    let mut metadata = load_metadata(&metadata_path)?
        .unwrap_or_else(|| default_metadata(&options.organization, &skill.description));

    if options.upgrade_version {
        let previous = std::mem::take(&mut metadata.version);
        metadata.version = increment_version(&previous)?;
        info!(from = %previous, to = %metadata.version, "upgrading version");
        write_metadata(&metadata_path, &metadata)?;
    }

    // --- Phase 5: Render & write ---
    progress.phase("Writing document");
    let header = DocumentHeader {
        title: &skill.title,
        description: &skill.description,
    };
    let document = render_document(header, &sections, &metadata);
    let output = skill.output_path(&options.skills_dir);
    let sha256 = write_atomic(&output, &document).await?;

    let report = BuildReport {
        skill: skill.name.clone(),
        output,
        section_count: sections.len(),
        rule_count: sections.iter().map(|s| s.rules.len()).sum(),
        file_count: total,
        failures,
        version: metadata.version,
        sha256,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };

    progress.done(&report);

    info!(
        sections = report.section_count,
        rules = report.rule_count,
        failures = report.failures.len(),
        output = %report.output.display(),
        elapsed_ms = report.elapsed_ms,
        "build complete"
    );

    Ok(BuildOutcome::Built(report))
}

/// Eligible rule files in `dir`, sorted by name: `*.md`, excluding
/// `_`-prefixed files and `README.md`.
pub async fn collect_rule_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| RulebookError::io(dir, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RulebookError::io(dir, e))?
    {
        let path = entry.path();
        let name = file_name_of(&path);
        if is_rule_file(&name) && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Whether a file name is an eligible rule file.
pub fn is_rule_file(name: &str) -> bool {
    name.ends_with(".md") && !name.starts_with('_') && name != EXCLUDED_FILE
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Write via a temp file in the same directory and rename over the target.
/// Returns the SHA-256 of the content.
async fn write_atomic(target: &Path, content: &str) -> Result<String> {
    let dir = target.parent().unwrap_or(Path::new("."));
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| RulebookError::io(dir, e))?;

    let temp = dir.join(format!(".{}.tmp", file_name_of(target)));
    tokio::fs::write(&temp, content)
        .await
        .map_err(|e| RulebookError::io(&temp, e))?;
    tokio::fs::rename(&temp, target)
        .await
        .map_err(|e| RulebookError::io(target, e))?;

    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    debug!(path = %target.display(), size = content.len(), "wrote document");
    Ok(hash)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rulebook-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn skill() -> SkillConfig {
        SkillConfig::new(
            "flux",
            "FLUX Best Practices",
            "FLUX prompting",
            BTreeMap::from([("core".to_string(), 1), ("t2i".to_string(), 3)]),
        )
    }

    fn options(skills_dir: &Path) -> BuildOptions {
        BuildOptions {
            skills_dir: skills_dir.to_path_buf(),
            organization: "Black Forest Labs".into(),
            strict: false,
            upgrade_version: false,
        }
    }

    fn write_rules(skills_dir: &Path, files: &[(&str, &str)]) -> PathBuf {
        let rules = skills_dir.join("flux").join("rules");
        std::fs::create_dir_all(&rules).unwrap();
        for (name, content) in files {
            std::fs::write(rules.join(name), content).unwrap();
        }
        rules
    }

    fn built(outcome: BuildOutcome) -> BuildReport {
        match outcome {
            BuildOutcome::Built(report) => report,
            other => panic!("expected a built document, got {other:?}"),
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, name: &str) {
            self.events.lock().unwrap().push(format!("phase:{name}"));
        }
        fn file_parsed(&self, file: &str, current: usize, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("file:{file}:{current}/{total}"));
        }
        fn done(&self, report: &BuildReport) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done:{}", report.rule_count));
        }
    }

    #[test]
    fn rule_file_filter() {
        assert!(is_rule_file("core-seeds.md"));
        assert!(!is_rule_file("_sections.md"));
        assert!(!is_rule_file("README.md"));
        assert!(!is_rule_file("notes.txt"));
    }

    #[tokio::test]
    async fn missing_rules_dir_is_nothing_to_build() {
        let tmp = temp_dir();
        let outcome = build_skill(&skill(), &options(&tmp), &SilentProgress)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            BuildOutcome::NothingToBuild(NothingToBuild::RulesDirMissing { .. })
        ));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn no_eligible_files_is_nothing_to_build() {
        let tmp = temp_dir();
        write_rules(&tmp, &[("_sections.md", "## 1. Core\n"), ("README.md", "# Readme\n")]);
        let outcome = build_skill(&skill(), &options(&tmp), &SilentProgress)
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            BuildOutcome::NothingToBuild(NothingToBuild::NoRuleFiles { .. })
        ));
        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn builds_document_with_overrides() {
        let tmp = temp_dir();
        write_rules(
            &tmp,
            &[
                ("t2i-zebra.md", "# Zebra Rule\n**Impact: LOW**\nZ.\n"),
                ("t2i-alpha.md", "# Alpha Rule\n**Impact: HIGH**\nA.\n"),
                ("core-seeds.md", "# Pin Seeds\n**Impact: CRITICAL**\nSeeds.\n"),
                ("_sections.md", "## 3. Text to Image (t2i)\n\n**Impact:** HIGH\n**Description:** Framing.\n"),
            ],
        );

        let progress = RecordingProgress::default();
        let report = built(build_skill(&skill(), &options(&tmp), &progress).await.unwrap());

        assert_eq!(report.section_count, 2);
        assert_eq!(report.rule_count, 3);
        assert_eq!(report.file_count, 3);
        assert!(report.failures.is_empty());
        assert_eq!(report.version, "1.0.0");
        assert_eq!(report.output, tmp.join("flux").join("AGENTS.md"));

        let doc = std::fs::read_to_string(&report.output).unwrap();
        assert!(doc.starts_with("# FLUX Best Practices\n\n"));
        assert!(doc.contains("## 1. Section 1\n\n**Impact: CRITICAL**\n\n### 1.1 Pin Seeds"));
        assert!(doc.contains("## 3. Text to Image\n\n**Impact: HIGH**\n\nFraming.\n\n### 3.1 Alpha Rule"));
        assert!(doc.contains("### 3.2 Zebra Rule"));

        let mut hasher = Sha256::new();
        hasher.update(doc.as_bytes());
        assert_eq!(report.sha256, format!("{:x}", hasher.finalize()));

        let events = progress.events.lock().unwrap();
        assert!(events.contains(&"file:core-seeds.md:1/3".to_string()));
        assert_eq!(events.last().map(String::as_str), Some("done:3"));
        assert!(!tmp.join("flux").join(".AGENTS.md.tmp").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn rebuild_is_byte_identical() {
        let tmp = temp_dir();
        write_rules(
            &tmp,
            &[
                ("core-b.md", "# beta\nB.\n"),
                ("core-a.md", "# Alpha\nA.\n"),
            ],
        );
        std::fs::write(
            tmp.join("flux").join("metadata.json"),
            r#"{"version":"2.0.0","organization":"Acme","date":"May 2026","abstract":"Fixed."}"#,
        )
        .unwrap();

        let first = built(build_skill(&skill(), &options(&tmp), &SilentProgress).await.unwrap());
        let second = built(build_skill(&skill(), &options(&tmp), &SilentProgress).await.unwrap());
        assert_eq!(first.sha256, second.sha256);
        assert_eq!(first.version, "2.0.0");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn strict_mode_skips_untitled_files() {
        let tmp = temp_dir();
        write_rules(
            &tmp,
            &[
                ("core-ok.md", "# Titled\nFine.\n"),
                ("core-bad.md", "No heading here.\n"),
            ],
        );

        let lenient = built(build_skill(&skill(), &options(&tmp), &SilentProgress).await.unwrap());
        assert_eq!(lenient.rule_count, 2);
        assert!(lenient.failures.is_empty());

        let mut opts = options(&tmp);
        opts.strict = true;
        let strict = built(build_skill(&skill(), &opts, &SilentProgress).await.unwrap());
        assert_eq!(strict.rule_count, 1);
        assert_eq!(strict.file_count, 2);
        assert_eq!(strict.failures.len(), 1);
        assert_eq!(strict.failures[0].file, "core-bad.md");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn unreadable_file_is_isolated() {
        let tmp = temp_dir();
        write_rules(&tmp, &[("core-good.md", "# Good\nOk.\n")]);
        std::fs::write(
            tmp.join("flux").join("rules").join("core-binary.md"),
            [0xff, 0xfe, 0x00, 0xc3],
        )
        .unwrap();

        let report = built(build_skill(&skill(), &options(&tmp), &SilentProgress).await.unwrap());
        assert_eq!(report.rule_count, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file, "core-binary.md");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn upgrade_version_rewrites_metadata() {
        let tmp = temp_dir();
        write_rules(&tmp, &[("core-a.md", "# A\nA.\n")]);
        let metadata_path = tmp.join("flux").join("metadata.json");
        std::fs::write(
            &metadata_path,
            r#"{"version":"1.2.9","organization":"Acme","date":"May 2026","abstract":"Fixed."}"#,
        )
        .unwrap();

        let mut opts = options(&tmp);
        opts.upgrade_version = true;
        let report = built(build_skill(&skill(), &opts, &SilentProgress).await.unwrap());

        assert_eq!(report.version, "1.2.10");
        let saved = load_metadata(&metadata_path).unwrap().expect("metadata");
        assert_eq!(saved.version, "1.2.10");
        let doc = std::fs::read_to_string(&report.output).unwrap();
        assert!(doc.contains("**Version 1.2.10**"));

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
