//! Simple validation example: check a drawing and print results.

use pidguard::prelude::*;
use std::path::Path;

fn main() -> Result<(), PidGuardError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/compliant_ecs.json".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example simple_validation [path/to/drawing.json]");
        std::process::exit(1);
    }

    let report = Checker::new().check_file(path, &CheckOptions::default())?;

    println!("Check results for: {}", path.display());
    println!(
        "Equipment found: {}, rules checked: {}",
        report.summary.equipment_found, report.summary.rules_checked
    );
    println!("Total violations: {}", report.total_violations());
    println!();

    if report.has_errors() {
        println!("ERROR violations:");
        for v in report.violations.iter().filter(|v| v.severity == Severity::Error) {
            println!("  - {} {}", v.rule_id, v.description);
            if !v.affected_elements.is_empty() {
                println!("    Affected: {}", v.affected_elements.join(", "));
            }
        }
        println!("\nCheck failed (error violations).");
        std::process::exit(1);
    }

    println!("Check passed (no error violations).");
    Ok(())
}
