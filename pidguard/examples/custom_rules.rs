//! Example: uploading dynamic rules and evaluating them next to the built-ins.
//! Run with: cargo run --example custom_rules [rules.json] [drawing.json]

use pidguard::rules::generate_sample_rules;
use pidguard::{CheckOptions, Checker, PidGuardError, Severity};
use std::path::Path;

fn main() -> Result<(), PidGuardError> {
    let mut args = std::env::args().skip(1);
    let rules_path = args.next();
    let drawing = args
        .next()
        .unwrap_or_else(|| "tests/fixtures/compliant_ecs.json".to_string());

    let checker = Checker::new();
    let load = match rules_path {
        Some(p) => checker.upload_rules_file(Path::new(&p))?,
        None => checker.upload_rules(&serde_json::to_string(&generate_sample_rules())?)?,
    };
    println!("Loaded {} dynamic rules", load.loaded.len());
    for (id, reason) in &load.skipped {
        println!("  skipped {}: {}", id, reason);
    }

    let report = checker.check_file(Path::new(&drawing), &CheckOptions::default())?;

    println!("{} violations for {}", report.violations.len(), drawing);
    for v in &report.violations {
        println!("  [{}] {} {}", v.severity, v.rule_id, v.description);
    }
    for a in &report.advisories {
        println!("  [advisory] {} {}", a.rule_id, a.description);
    }
    for m in &report.manual_review {
        println!("  [manual] {} {}", m.rule_id, m.reason);
    }

    let errors = report.violations.iter().filter(|v| v.severity == Severity::Error).count();
    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}
