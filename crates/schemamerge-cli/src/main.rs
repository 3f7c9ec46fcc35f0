//! schemamerge - detect merge conflicts between two DDL schema versions

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use schemamerge_core::{ConflictLevel, ConflictRecord, DetectionReport, DetectorConfig};
use schemamerge_engine::Detector;

/// Config file picked up from the working directory
const DEFAULT_CONFIG: &str = "schemamerge.toml";

/// SchemaMerge - Schema conflict detection for DDL scripts
#[derive(Parser)]
#[command(name = "schemamerge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base schema (DDL file)
    #[arg(long = "a", value_name = "FILE")]
    base: PathBuf,

    /// Target schema (DDL file)
    #[arg(long = "b", value_name = "FILE")]
    target: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Path to config file (default: schemamerge.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Markdown,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run(&cli) {
        Ok(true) => ExitCode::from(1),
        Ok(false) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

/// Run detection and emit the report; returns whether the merge is blocked
fn run(cli: &Cli) -> Result<bool> {
    let config = load_config(cli.config.as_deref(), cli.verbose)?;

    let sql_a = std::fs::read_to_string(&cli.base)
        .with_context(|| format!("Failed to read base schema {}", cli.base.display()))?;
    let sql_b = std::fs::read_to_string(&cli.target)
        .with_context(|| format!("Failed to read target schema {}", cli.target.display()))?;

    let detector = Detector::new(config).context("Invalid configuration")?;

    if cli.verbose {
        eprintln!(
            "{} {} -> {}",
            "Comparing".cyan(),
            cli.base.display(),
            cli.target.display()
        );
    }

    let report = detector.detect(&sql_a, &sql_b);
    tracing::debug!(status = ?report.status, conflicts = report.conflicts.len(), "Report ready");

    let rendered = match cli.format {
        OutputFormat::Json => report.to_json().context("Failed to serialize report")?,
        OutputFormat::Text => render_text(&report),
        OutputFormat::Markdown => render_markdown(&report),
    };

    match &cli.out {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if cli.verbose {
                eprintln!("{} {}", "Report saved to:".green(), path.display());
            }
        }
        None => println!("{}", rendered),
    }

    Ok(report.merge_blocked())
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<DetectorConfig> {
    let config = if let Some(path) = path {
        DetectorConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?
    } else if Path::new(DEFAULT_CONFIG).exists() {
        DetectorConfig::from_file(Path::new(DEFAULT_CONFIG))
            .with_context(|| format!("Failed to load config {}", DEFAULT_CONFIG))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        DetectorConfig::default()
    };

    Ok(config)
}

fn level_label(level: ConflictLevel) -> colored::ColoredString {
    match level {
        ConflictLevel::Critical => level.as_str().red().bold(),
        ConflictLevel::High => level.as_str().yellow().bold(),
        ConflictLevel::Medium => level.as_str().yellow(),
        ConflictLevel::Low => level.as_str().cyan(),
    }
}

fn detail_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(detail_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Human-readable report for the terminal
fn render_text(report: &DetectionReport) -> String {
    let mut out = Vec::new();

    out.push(format!("\n{}", "=".repeat(60).bright_blue()));
    out.push(format!("{}", "Schema Conflict Report".bold().bright_blue()));
    out.push(format!("{}", "=".repeat(60).bright_blue()));
    out.push(String::new());

    out.push(format!("Version: {}", report.version));
    out.push(format!("Timestamp: {}", report.metadata.timestamp));
    out.push(String::new());

    if let Some(error) = &report.error {
        out.push(format!("{} [{}] {}", "Detection failed:".red().bold(), error.kind, error.message));
        out.push(String::new());
    }

    out.push(format!("{}", "Summary:".bold()));
    out.push(format!("  Total conflicts: {}", report.summary.total_conflicts));
    for level in ConflictLevel::all_descending() {
        let count = match level {
            ConflictLevel::Critical => report.summary.critical,
            ConflictLevel::High => report.summary.high,
            ConflictLevel::Medium => report.summary.medium,
            ConflictLevel::Low => report.summary.low,
        };
        out.push(format!("  {:<9} {}", format!("{}:", level_label(level)), count));
    }
    out.push(String::new());

    if report.conflicts.is_empty() {
        out.push(format!("{}", "✓ No conflicts found!".green().bold()));
    } else {
        out.push(format!("{}", "Conflicts:".bold()));
        for conflict in &report.conflicts {
            out.extend(text_conflict(conflict));
        }
    }

    out.push(String::new());
    if report.merge_blocked() {
        out.push(format!("{}", "✗ Merge blocked".red().bold()));
    } else {
        out.push(format!("{}", "✓ Safe to merge".green().bold()));
    }
    out.push(format!("{}", "=".repeat(60).bright_blue()));

    out.join("\n")
}

fn text_conflict(conflict: &ConflictRecord) -> Vec<String> {
    let mut lines = vec![format!(
        "  [{}] {}: {}",
        level_label(conflict.level),
        conflict.rule,
        conflict.message
    )];

    for (key, value) in &conflict.details {
        lines.push(format!("    {}: {}", key, detail_value(value)));
    }

    lines
}

/// Markdown report, suitable for pull request comments
fn render_markdown(report: &DetectionReport) -> String {
    let mut md = String::new();

    md.push_str("# Schema Conflict Report\n\n");
    md.push_str(&format!("**Version:** {}\n\n", report.version));
    md.push_str(&format!("**Timestamp:** {}\n\n", report.metadata.timestamp));

    if let Some(error) = &report.error {
        md.push_str(&format!("**Detection failed:** `{}` {}\n\n", error.kind, error.message));
    }

    md.push_str("## Summary\n\n");
    md.push_str(&format!("- Total conflicts: {}\n", report.summary.total_conflicts));
    md.push_str(&format!("- Critical: {}\n", report.summary.critical));
    md.push_str(&format!("- High: {}\n", report.summary.high));
    md.push_str(&format!("- Medium: {}\n", report.summary.medium));
    md.push_str(&format!("- Low: {}\n", report.summary.low));
    md.push('\n');

    if report.merge_blocked() {
        md.push_str("❌ **Merge blocked**\n\n");
    } else {
        md.push_str("✅ **Safe to merge**\n\n");
    }

    if !report.conflicts.is_empty() {
        md.push_str("## Conflicts\n\n");

        for conflict in &report.conflicts {
            let emoji = match conflict.level {
                ConflictLevel::Critical => "❌",
                ConflictLevel::High => "⚠️",
                ConflictLevel::Medium => "🔶",
                ConflictLevel::Low => "ℹ️",
            };

            md.push_str(&format!("### {} {} - {}\n\n", emoji, conflict.level, conflict.rule));
            md.push_str(&format!("{}\n\n", conflict.message));

            if !conflict.details.is_empty() {
                for (key, value) in &conflict.details {
                    md.push_str(&format!("- **{}:** `{}`\n", key, detail_value(value)));
                }
                md.push('\n');
            }
        }
    }

    if !report.statistics.is_empty() {
        md.push_str("## Rules\n\n");
        md.push_str("| Rule | Name | Applied | Conflicts |\n");
        md.push_str("|---|---|---|---|\n");
        for stat in &report.statistics {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                stat.rule_id,
                stat.rule_name,
                if stat.applied { "yes" } else { "no" },
                stat.conflicts_found
            ));
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked_report() -> DetectionReport {
        let conflict = ConflictRecord::new("R1", ConflictLevel::Critical, "Table public.users removed")
            .with_detail("table", "public.users")
            .with_detail("referenced_by", vec!["public.orders"]);
        DetectionReport::from_conflicts(vec![conflict], 100)
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_format_and_paths() {
        let cli = Cli::try_parse_from([
            "schemamerge", "--a", "base.sql", "--b", "target.sql", "--format", "markdown",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Markdown);
        assert_eq!(cli.base, PathBuf::from("base.sql"));
        assert!(cli.out.is_none());
    }

    #[test]
    fn markdown_lists_conflicts() {
        let md = render_markdown(&blocked_report());

        assert!(md.contains("Merge blocked"));
        assert!(md.contains("CRITICAL - R1"));
        assert!(md.contains("- **referenced_by:** `public.orders`"));
    }

    #[test]
    fn text_report_shows_verdict() {
        colored::control::set_override(false);

        let text = render_text(&blocked_report());
        assert!(text.contains("[CRITICAL] R1: Table public.users removed"));
        assert!(text.contains("Merge blocked"));

        let clean = render_text(&DetectionReport::from_conflicts(Vec::new(), 100));
        assert!(clean.contains("No conflicts found"));
    }
}
