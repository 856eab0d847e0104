//! Application configuration for rulebook.
//!
//! Project config lives at `./rulebook.toml` (or the path given with `--config`).
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, RulebookError};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "rulebook.toml";

// ---------------------------------------------------------------------------
// Config structs (matching rulebook.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Registered skills (one compiled document each).
    #[serde(default = "default_skills")]
    pub skills: Vec<SkillConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            skills: default_skills(),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding one sub-directory per skill.
    #[serde(default = "default_skills_dir")]
    pub skills_dir: String,

    /// Skill built when no `--skill`/`--all` flag is given.
    #[serde(default = "default_skill_name")]
    pub default_skill: String,

    /// Organization used when a skill has no `metadata.json`.
    #[serde(default = "default_organization")]
    pub organization: String,

    /// Skip rule files that have no title instead of emitting them.
    #[serde(default)]
    pub strict: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            skills_dir: default_skills_dir(),
            default_skill: default_skill_name(),
            organization: default_organization(),
            strict: false,
        }
    }
}

fn default_skills_dir() -> String {
    "skills".into()
}
fn default_skill_name() -> String {
    "flux-best-practices".into()
}
fn default_organization() -> String {
    "Black Forest Labs".into()
}

/// `[[skills]]` entry — one rules directory compiled into one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillConfig {
    /// Registry key, e.g. `flux-best-practices`.
    pub name: String,
    /// Document title rendered as the top-level heading.
    pub title: String,
    /// Short subject description used in the disclaimer and default abstract.
    pub description: String,
    /// Skill directory relative to `skills_dir` (defaults to `name`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// Rules directory relative to the skill directory.
    #[serde(default = "default_rules_dir")]
    pub rules_dir: String,
    /// Metadata file relative to the skill directory.
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,
    /// Output document relative to the skill directory.
    #[serde(default = "default_output_file")]
    pub output_file: String,
    /// Section override document relative to the rules directory.
    #[serde(default = "default_sections_file")]
    pub sections_file: String,
    /// Filename-prefix token → section number.
    #[serde(default)]
    pub section_map: BTreeMap<String, u32>,
}

fn default_rules_dir() -> String {
    "rules".into()
}
fn default_metadata_file() -> String {
    "metadata.json".into()
}
fn default_output_file() -> String {
    "AGENTS.md".into()
}
fn default_sections_file() -> String {
    "_sections.md".into()
}

impl SkillConfig {
    /// Create a skill entry with default file layout.
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        section_map: BTreeMap<String, u32>,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            description: description.into(),
            dir: None,
            rules_dir: default_rules_dir(),
            metadata_file: default_metadata_file(),
            output_file: default_output_file(),
            sections_file: default_sections_file(),
            section_map,
        }
    }

    /// Skill root directory under `skills_dir`.
    pub fn root(&self, skills_dir: &Path) -> PathBuf {
        skills_dir.join(self.dir.as_deref().unwrap_or(&self.name))
    }

    pub fn rules_path(&self, skills_dir: &Path) -> PathBuf {
        self.root(skills_dir).join(&self.rules_dir)
    }

    pub fn metadata_path(&self, skills_dir: &Path) -> PathBuf {
        self.root(skills_dir).join(&self.metadata_file)
    }

    pub fn output_path(&self, skills_dir: &Path) -> PathBuf {
        self.root(skills_dir).join(&self.output_file)
    }

    pub fn sections_path(&self, skills_dir: &Path) -> PathBuf {
        self.rules_path(skills_dir).join(&self.sections_file)
    }

    /// The token table used for section inference; falls back to
    /// [`default_section_map`] when the skill declares none.
    pub fn effective_section_map(&self) -> BTreeMap<String, u32> {
        if self.section_map.is_empty() {
            default_section_map()
        } else {
            self.section_map.clone()
        }
    }
}

/// Built-in token table used when a skill declares no `section_map`.
pub fn default_section_map() -> BTreeMap<String, u32> {
    section_map(&[
        ("core", 1),
        ("model", 2),
        ("t2i", 3),
        ("i2i", 4),
        ("json", 5),
        ("hex", 6),
        ("typography", 7),
        ("multi", 8),
        ("negative", 9),
    ])
}

fn section_map(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
    entries
        .iter()
        .map(|(token, number)| ((*token).to_string(), *number))
        .collect()
}

fn default_skills() -> Vec<SkillConfig> {
    vec![
        SkillConfig::new(
            "flux-best-practices",
            "FLUX Best Practices",
            "FLUX image generation prompting and workflows",
            section_map(&[
                ("core", 1),
                ("model", 2),
                ("flux2", 2),
                ("flux1", 2),
                ("t2i", 3),
                ("i2i", 4),
                ("json", 5),
                ("hex", 6),
                ("typography", 7),
                ("multi", 8),
                ("negative", 9),
            ]),
        ),
        SkillConfig::new(
            "bfl-api",
            "BFL API Integration",
            "BFL FLUX API integration patterns",
            section_map(&[
                ("endpoint", 1),
                ("auth", 2),
                ("polling", 3),
                ("rate", 4),
                ("error", 5),
                ("webhook", 6),
            ]),
        ),
    ]
}

impl AppConfig {
    /// Directory holding the skill sub-directories.
    pub fn skills_dir(&self) -> PathBuf {
        PathBuf::from(&self.defaults.skills_dir)
    }

    /// Look up a skill by name.
    pub fn skill(&self, name: &str) -> Result<&SkillConfig> {
        self.skills
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| RulebookError::UnknownSkill {
                name: name.to_string(),
                available: self.skill_names().join(", "),
            })
    }

    /// The skill built when none is selected explicitly.
    pub fn default_skill(&self) -> Result<&SkillConfig> {
        self.skill(&self.defaults.default_skill)
    }

    pub fn skill_names(&self) -> Vec<&str> {
        self.skills.iter().map(|s| s.name.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the application config.
///
/// An explicit path must exist. Without one, `./rulebook.toml` is used when
/// present and the built-in defaults otherwise.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    let path = PathBuf::from(CONFIG_FILE_NAME);
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| RulebookError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        RulebookError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    if config.skills.is_empty() {
        return Err(RulebookError::config(format!(
            "{} declares no skills",
            path.display()
        )));
    }

    Ok(config)
}

/// Write a default config file into `dir`. Refuses to overwrite an existing one.
/// Returns the path to the created file.
pub fn init_config(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(RulebookError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| RulebookError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| RulebookError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("skills_dir"));
        assert!(toml_str.contains("flux-best-practices"));
        assert!(toml_str.contains("webhook"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.default_skill, "flux-best-practices");
        assert_eq!(parsed.skills.len(), 2);
        assert_eq!(parsed.skills[0].section_map["flux2"], 2);
    }

    #[test]
    fn config_with_custom_skill() {
        let toml_str = r#"
[defaults]
skills_dir = "/tmp/skills"
default_skill = "style"

[[skills]]
name = "style"
title = "Style Guide"
description = "house writing style"
output_file = "STYLE.md"

[skills.section_map]
tone = 1
grammar = 2
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.skills.len(), 1);

        let skill = config.default_skill().expect("default skill");
        assert_eq!(skill.rules_dir, "rules");
        assert_eq!(skill.section_map["grammar"], 2);
        assert_eq!(
            skill.output_path(&config.skills_dir()),
            PathBuf::from("/tmp/skills/style/STYLE.md")
        );
        assert_eq!(
            skill.sections_path(&config.skills_dir()),
            PathBuf::from("/tmp/skills/style/rules/_sections.md")
        );
    }

    #[test]
    fn unknown_skill_lists_available() {
        let config = AppConfig::default();
        let err = config.skill("nope").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("nope"));
        assert!(msg.contains("bfl-api"));
    }

    #[test]
    fn empty_section_map_falls_back_to_builtin_tokens() {
        let skill = SkillConfig::new("x", "X", "x things", BTreeMap::new());
        let map = skill.effective_section_map();
        assert_eq!(map["core"], 1);
        assert_eq!(map["negative"], 9);
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = std::env::temp_dir().join(format!("rulebook-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create dir");

        let path = init_config(&dir).expect("first init");
        let loaded = load_config_from(&path).expect("load written config");
        assert_eq!(loaded.skills.len(), 2);

        assert!(init_config(&dir).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
