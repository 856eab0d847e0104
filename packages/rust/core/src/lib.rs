//! Document assembly for rulebook.
//!
//! Groups parsed rules into numbered sections, applies section overrides,
//! renders the compiled document and drives the end-to-end `build_skill`
//! and `audit_skill` workflows.

pub mod assembler;
pub mod audit;
pub mod metadata;
pub mod overrides;
pub mod pipeline;
pub mod render;
pub mod toc;

pub use assembler::{apply_overrides, collation_key, group_rules};
pub use audit::{AuditReport, AuditStatus, audit_skill, count_rule_headings};
pub use overrides::{SectionOverride, parse_section_overrides};
pub use pipeline::{
    BuildOptions, BuildOutcome, BuildReport, FileFailure, NothingToBuild, ProgressReporter,
    SilentProgress, build_skill,
};
pub use render::{DocumentHeader, render_document, render_rule};
