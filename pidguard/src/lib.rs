//! PidGuard - P&ID design-rule validation for ballast water management systems
//!
//! Takes the output of a drawing-recognition pipeline (detected symbols,
//! connections, line segments and OCR text), identifies BWMS equipment,
//! builds a directed flow graph and checks it against a built-in rule
//! catalogue plus rules uploaded at runtime.
//!
//! # Quick Start
//!
//! ```no_run
//! use pidguard::{CheckOptions, Checker};
//! use std::path::Path;
//!
//! let checker = Checker::new();
//! let report = checker
//!     .check_file(Path::new("drawing.json"), &CheckOptions::default())
//!     .unwrap();
//!
//! for v in &report.violations {
//!     println!("[{}] {}: {}", v.severity, v.rule_id, v.description);
//! }
//! ```
//!
//! # Features
//!
//! - **Equipment identification**: priority-ordered label patterns over
//!   symbols and OCR, with symbol/OCR de-duplication
//! - **Flow graph**: `petgraph` digraph with connectivity and reachability
//! - **Built-in rules**: BWMS-001..009 (position, sequence, distance,
//!   capacity, containment)
//! - **Dynamic rules**: tabular uploads with check types and check logic

pub mod analyzer;
pub mod catalogue;
pub mod config;
pub mod core;
pub mod flow;
pub mod parser;
pub mod rules;

// Re-export main types
pub use analyzer::dynamic::{ManualReview, RuleOutcome};
pub use analyzer::rules::{Rule, RulesEngine, Violation};
pub use catalogue::patterns::PatternCatalogue;
pub use config::Calibration;
pub use core::{CheckOptions, CheckReport, Checker, PidGuardError, Summary};
pub use flow::{Equipment, EquipmentType, FlowGraph};
pub use parser::schema::DrawingInput;
pub use rules::{ProductType, RuleDefinition, RuleRecord, RuleTable, Severity};

/// Check a drawing JSON file with the built-in rules (convenience wrapper).
pub fn check_drawing(path: &std::path::Path) -> Result<CheckReport, PidGuardError> {
    Checker::new().check_file(path, &CheckOptions::default())
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        CheckOptions, CheckReport, Checker, DrawingInput, PidGuardError, Severity, Violation,
    };
}
