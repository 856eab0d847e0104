//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use rulebook_core::{
    AuditStatus, BuildOptions, BuildOutcome, BuildReport, ProgressReporter, SilentProgress,
    audit_skill, build_skill,
};
use rulebook_shared::{AppConfig, SkillConfig, init_config, load_config};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// rulebook: compile rule files into agent guidance documents.
#[derive(Parser)]
#[command(
    name = "rulebook",
    version,
    about = "Compile per-rule markdown files into one numbered AGENTS.md per skill.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ./rulebook.toml, then built-in defaults).
    #[arg(long, global = true, env = "RULEBOOK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Which skills a command applies to.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct SkillSelection {
    /// Skill name from the configuration.
    #[arg(long, conflicts_with = "all")]
    pub skill: Option<String>,

    /// Every configured skill.
    #[arg(long)]
    pub all: bool,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Compile rule files into the skill's output document.
    Build {
        #[command(flatten)]
        selection: SkillSelection,

        /// Increment the metadata version before building.
        #[arg(long)]
        upgrade_version: bool,

        /// Skip rule files that have no title.
        #[arg(long)]
        strict: bool,

        /// Print build reports as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check that each output document has one heading per rule file.
    Validate {
        #[command(flatten)]
        selection: SkillSelection,
    },

    /// List configured skills.
    List,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "rulebook=info",
        1 => "rulebook=debug",
        _ => "rulebook=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Build {
            selection,
            upgrade_version,
            strict,
            json,
        } => cmd_build(config_path, &selection, upgrade_version, strict, json).await,
        Command::Validate { selection } => cmd_validate(config_path, &selection).await,
        Command::List => cmd_list(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

/// Resolve the selected skills. Without `--skill` or `--all`, `fallback_all`
/// decides between every skill and the configured default.
fn select_skills<'a>(
    config: &'a AppConfig,
    selection: &SkillSelection,
    fallback_all: bool,
) -> Result<Vec<&'a SkillConfig>> {
    if let Some(name) = selection.skill.as_deref() {
        return Ok(vec![config.skill(name)?]);
    }
    if selection.all || fallback_all {
        return Ok(config.skills.iter().collect());
    }
    Ok(vec![config.default_skill()?])
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(
    config_path: Option<&Path>,
    selection: &SkillSelection,
    upgrade_version: bool,
    strict: bool,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let skills = select_skills(&config, selection, false)?;

    let options = BuildOptions {
        skills_dir: config.skills_dir(),
        organization: config.defaults.organization.clone(),
        strict: strict || config.defaults.strict,
        upgrade_version,
    };

    info!(
        skills = skills.len(),
        strict = options.strict,
        upgrade_version,
        "building documents"
    );

    let (outcomes, failed) = build_skills(&skills, &options, json).await;

    if json {
        write_json(&outcomes)?;
    }

    if !failed.is_empty() {
        return Err(eyre!("build failed for: {}", failed.join(", ")));
    }

    Ok(())
}

/// Build each skill in turn. A skill whose build errors is logged and
/// named in the returned list; the remaining skills still build.
async fn build_skills(
    skills: &[&SkillConfig],
    options: &BuildOptions,
    json: bool,
) -> (Vec<BuildOutcome>, Vec<String>) {
    let mut outcomes: Vec<BuildOutcome> = Vec::with_capacity(skills.len());
    let mut failed: Vec<String> = Vec::new();

    for skill in skills.iter().copied() {
        let result = if json {
            build_skill(skill, options, &SilentProgress).await
        } else {
            let reporter = CliProgress::new();
            let result = build_skill(skill, options, &reporter).await;
            reporter.spinner.finish_and_clear();
            result
        };

        match result {
            Ok(outcome) => {
                if !json {
                    print_outcome(skill, &outcome);
                }
                outcomes.push(outcome);
            }
            Err(e) => {
                warn!(skill = %skill.name, error = %e, "build failed");
                if !json {
                    println!("  {}: build failed, {e}", skill.name);
                }
                failed.push(skill.name.clone());
            }
        }
    }

    (outcomes, failed)
}

fn print_outcome(skill: &SkillConfig, outcome: &BuildOutcome) {
    match outcome {
        BuildOutcome::NothingToBuild(reason) => {
            println!("  {}: skipped, {reason}", skill.name);
        }
        BuildOutcome::Built(report) => {
            println!();
            println!("  {} built", report.skill);
            println!("  Sections: {}", report.section_count);
            println!("  Rules:    {} of {} files", report.rule_count, report.file_count);
            println!("  Version:  {}", report.version);
            println!("  Output:   {}", report.output.display());
            println!("  SHA-256:  {}", report.sha256);
            for failure in &report.failures {
                println!("  Skipped:  {} ({})", failure.file, failure.reason);
            }
            println!();
        }
    }
}

async fn cmd_validate(config_path: Option<&Path>, selection: &SkillSelection) -> Result<()> {
    let config = load_config(config_path)?;
    let skills = select_skills(&config, selection, true)?;
    let skills_dir = config.skills_dir();

    let mut missing: Vec<String> = Vec::new();

    for skill in skills {
        match audit_skill(skill, &skills_dir).await {
            Ok(report) => match report.status {
                AuditStatus::Skipped { rules_dir } => {
                    println!("  {}: skipped, no rules directory at {}", skill.name, rules_dir.display());
                }
                AuditStatus::Ok { rules } => {
                    println!("  {}: ok, {rules} rules in {}", skill.name, report.output.display());
                }
                AuditStatus::CountMismatch {
                    rule_files,
                    headings,
                } => {
                    println!(
                        "  {}: WARNING {rule_files} rule files but {headings} rules in {}, run `rulebook build --skill {}`",
                        skill.name,
                        report.output.display(),
                        skill.name
                    );
                }
            },
            Err(e) => {
                warn!(skill = %skill.name, error = %e, "validation failed");
                println!("  {}: {e}", skill.name);
                missing.push(skill.name.clone());
            }
        }
    }

    if !missing.is_empty() {
        return Err(eyre!("validation failed for: {}", missing.join(", ")));
    }

    Ok(())
}

async fn cmd_list(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let skills_dir = config.skills_dir();

    for skill in &config.skills {
        let marker = if skill.name == config.defaults.default_skill {
            " (default)"
        } else {
            ""
        };
        println!("{}{marker}", skill.name);
        println!("  title:  {}", skill.title);
        println!("  rules:  {}", skill.rules_path(&skills_dir).display());
        println!("  output: {}", skill.output_path(&skills_dir).display());
    }

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let cwd = std::env::current_dir().map_err(|e| eyre!("cannot determine working directory: {e}"))?;
    let path = init_config(&cwd)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn write_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn file_parsed(&self, file: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Parsing [{current}/{total}] {file}"));
    }

    fn done(&self, _report: &BuildReport) {
        self.spinner.finish_and_clear();
    }
}
