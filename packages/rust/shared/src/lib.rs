//! Shared types, error model, and configuration for rulebook.
//!
//! This crate is the foundation depended on by all other rulebook crates.
//! It provides:
//! - [`RulebookError`] — the unified error type
//! - Domain types ([`Rule`], [`Section`], [`CodeExample`], [`Impact`], [`SkillMetadata`])
//! - Configuration ([`AppConfig`], [`SkillConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, DefaultsConfig, SkillConfig, default_section_map, init_config,
    load_config, load_config_from,
};
pub use error::{Result, RulebookError};
pub use types::{CodeExample, DEFAULT_LANGUAGE, Impact, Rule, Section, SkillMetadata};
