//! PidGuard CLI - BWMS P&ID design-rule checks from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pidguard::rules::generate_sample_rules;
use pidguard::{
    Calibration, CheckOptions, CheckReport, Checker, PatternCatalogue, RulesEngine, Severity,
    Violation,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pidguard")]
#[command(about = "BWMS P&ID design-rule validation tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a recognised drawing (detector/OCR JSON)
    Check {
        /// Path to the drawing JSON
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Dynamic rule set to load (rule-set object or array of records)
        #[arg(long, value_name = "RULES")]
        rules: Option<PathBuf>,

        /// Run only these built-in rules (repeatable)
        #[arg(long = "enable", value_name = "ID")]
        enable: Vec<String>,

        /// Drawing scale in pixels per metre
        #[arg(long, value_name = "PX_PER_M")]
        scale: Option<f64>,

        /// Calibration overrides (JSON)
        #[arg(long, value_name = "FILE")]
        calibration: Option<PathBuf>,

        /// Equipment and valve tag patterns (JSON)
        #[arg(long, value_name = "FILE")]
        catalogue: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with error code if violations found at this severity or higher
        #[arg(long, value_enum)]
        fail_on: Option<FailOnSeverity>,
    },

    /// List built-in rules
    Rules {
        /// Show descriptions, standards and suggestions
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print a sample dynamic rule set
    Template,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
    /// GitHub Actions annotations
    Github,
}

#[derive(Clone, ValueEnum)]
enum FailOnSeverity {
    Error,
    Warning,
    Info,
}

impl From<&FailOnSeverity> for Severity {
    fn from(s: &FailOnSeverity) -> Self {
        match s {
            FailOnSeverity::Error => Severity::Error,
            FailOnSeverity::Warning => Severity::Warning,
            FailOnSeverity::Info => Severity::Info,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Check {
            file,
            rules,
            enable,
            scale,
            calibration,
            catalogue,
            format,
            fail_on,
        } => {
            let args = CheckArgs {
                file,
                rules,
                enable,
                scale,
                calibration,
                catalogue,
            };
            match handle_check(&args) {
                Ok(report) => {
                    output_report(&args.file, &report, &format);
                    match fail_on {
                        Some(severity) if report.has_at_least((&severity).into()) => 1,
                        _ => 0,
                    }
                }
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    1
                }
            }
        }
        Commands::Rules { verbose } => {
            handle_rules(verbose);
            0
        }
        Commands::Template => match serde_json::to_string_pretty(&generate_sample_rules()) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
    };

    process::exit(exit_code);
}

struct CheckArgs {
    file: PathBuf,
    rules: Option<PathBuf>,
    enable: Vec<String>,
    scale: Option<f64>,
    calibration: Option<PathBuf>,
    catalogue: Option<PathBuf>,
}

fn handle_check(args: &CheckArgs) -> Result<CheckReport> {
    let mut checker = Checker::new();
    if let Some(path) = &args.calibration {
        let calibration = Calibration::from_json_file(path)
            .with_context(|| format!("loading calibration {}", path.display()))?;
        checker = checker.with_calibration(calibration);
    }
    if let Some(path) = &args.catalogue {
        let catalogue = PatternCatalogue::from_json_file(path)
            .with_context(|| format!("loading catalogue {}", path.display()))?;
        checker = checker.with_catalogue(catalogue);
    }

    if let Some(path) = &args.rules {
        let load = checker
            .upload_rules_file(path)
            .with_context(|| format!("loading rules {}", path.display()))?;
        for (id, reason) in &load.skipped {
            eprintln!("Warning: skipped rule {}: {}", id, reason);
        }
        tracing::info!("Loaded {} dynamic rules", load.loaded.len());
    }

    let options = CheckOptions {
        enabled_rules: (!args.enable.is_empty()).then(|| args.enable.clone()),
        scale_px_per_m: args.scale,
    };

    checker
        .check_file(&args.file, &options)
        .with_context(|| format!("checking {}", args.file.display()))
}

fn output_report(file: &Path, report: &CheckReport, format: &OutputFormat) {
    match format {
        OutputFormat::Human => output_human(file, report),
        OutputFormat::Json => output_json(report),
        OutputFormat::Github => output_github(file, report),
    }
}

fn print_violations(title: &str, violations: &[&Violation]) {
    if violations.is_empty() {
        return;
    }
    println!("\n  {}:", title);
    for v in violations {
        println!("    - [{}] {}", v.rule_id, v.description);
        if !v.affected_elements.is_empty() {
            println!("      Affected: {}", v.affected_elements.join(", "));
        }
        if !v.suggestion.is_empty() {
            println!("      Fix: {}", v.suggestion);
        }
    }
}

fn output_human(file: &Path, report: &CheckReport) {
    println!("\nFile: {}", file.display());
    println!("{}", "─".repeat(60));

    let summary = &report.summary;
    if summary.equipment_found == 0 {
        println!("  No equipment identified");
        return;
    }
    if let Some(product) = &summary.product_type {
        println!("  Product: {}", product);
    }

    if report.violations.is_empty() {
        println!("  No violations found");
    }
    for (title, severity) in [
        ("ERROR", Severity::Error),
        ("WARNING", Severity::Warning),
        ("INFO", Severity::Info),
    ] {
        let matching: Vec<&Violation> = report
            .violations
            .iter()
            .filter(|v| v.severity == severity)
            .collect();
        print_violations(title, &matching);
    }

    let advisories: Vec<&Violation> = report.advisories.iter().collect();
    print_violations("ADVISORY", &advisories);

    if !report.manual_review.is_empty() {
        println!("\n  MANUAL REVIEW:");
        for m in &report.manual_review {
            println!("    - [{}] {}: {}", m.rule_id, m.rule_name, m.reason);
        }
    }

    println!("\n  Summary:");
    println!("    Equipment: {}", summary.equipment_found);
    println!(
        "    Rules:     {} ({} built-in, {} dynamic)",
        summary.rules_checked, summary.builtin_rules_checked, summary.dynamic_rules_checked
    );
    println!("    Errors:    {}", summary.errors);
    println!("    Warnings:  {}", summary.warnings);
    println!("    Info:      {}", summary.info);
}

fn output_json(report: &CheckReport) {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: {}", e),
    }
}

fn output_github(file: &Path, report: &CheckReport) {
    for v in &report.violations {
        let level = match v.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "notice",
        };
        println!(
            "::{} file={},title={}::{}",
            level,
            file.display(),
            v.rule_id,
            v.description.replace('\n', " ")
        );
    }
}

fn handle_rules(verbose: bool) {
    println!("Built-in rules:\n");

    let engine = RulesEngine::with_default_rules();
    for rule in engine.definitions() {
        println!("  {} [{}] {}", rule.id, rule.severity, rule.name_en);
        println!("    {} | {} | product: {}", rule.name, rule.check_type, rule.product_type);
        if verbose {
            println!("    {}", rule.description);
            if !rule.standard.is_empty() {
                println!("    Standard: {}", rule.standard);
            }
            if !rule.suggestion.is_empty() {
                println!("    Fix: {}", rule.suggestion);
            }
        }
        println!();
    }
}
