//! Core checking pipeline shared by the library API and the CLI.
//!
//! identify → build flow graph → built-in checks → dynamic rules → summary.
//! Each run is synchronous and owns all of its intermediate state; the
//! dynamic rule table is the only thing shared between runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use crate::analyzer::dynamic::{
    evaluate_with_logic, infer_product_type, should_apply_rule, ManualReview, RuleOutcome,
};
use crate::analyzer::identifier::EquipmentIdentifier;
use crate::analyzer::rules::{CheckContext, RulesEngine, Violation};
use crate::catalogue::patterns::PatternCatalogue;
use crate::catalogue::CatalogueError;
use crate::config::Calibration;
use crate::flow::graph::FlowGraph;
use crate::flow::schema::EquipmentType;
use crate::parser::{DrawingInput, InputError};
use crate::rules::definition::{ProductType, Severity};
use crate::rules::loader::load_rules_str;
use crate::rules::table::{LoadReport, RuleTable};
use crate::rules::RuleError;

#[derive(Debug, thiserror::Error)]
pub enum PidGuardError {
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] InputError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Rule error: {0}")]
    Rules(#[from] RuleError),
    #[error("Catalogue error: {0}")]
    Catalogue(#[from] CatalogueError),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Options for a single run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CheckOptions {
    /// Built-in rule ids to run; `None` runs them all
    pub enabled_rules: Option<Vec<String>>,
    /// Drawing scale in pixels per metre, if known
    pub scale_px_per_m: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub equipment_found: usize,
    pub equipment_by_type: BTreeMap<EquipmentType, usize>,
    pub product_type: Option<ProductType>,
    pub rules_checked: usize,
    pub builtin_rules_checked: usize,
    pub dynamic_rules_checked: usize,
    pub total_violations: usize,
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
    pub advisories: usize,
    pub manual_review: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub violations: Vec<Violation>,
    pub advisories: Vec<Violation>,
    pub manual_review: Vec<ManualReview>,
    pub summary: Summary,
}

impl CheckReport {
    fn new(summary: Summary) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            violations: Vec::new(),
            advisories: Vec::new(),
            manual_review: Vec::new(),
            summary,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    /// Any violation at or above `threshold`.
    pub fn has_at_least(&self, threshold: Severity) -> bool {
        self.violations.iter().any(|v| v.severity.rank() >= threshold.rank())
    }

    pub fn total_violations(&self) -> usize {
        self.violations.len()
    }
}

fn count_severities(summary: &mut Summary, violations: &[Violation]) {
    for v in violations {
        match v.severity {
            Severity::Error => summary.errors += 1,
            Severity::Warning => summary.warnings += 1,
            Severity::Info => summary.info += 1,
        }
    }
    summary.total_violations = violations.len();
}

/// Rejects coordinates no detector can produce.
fn validate_geometry(input: &DrawingInput) -> Result<(), InputError> {
    for s in &input.symbols {
        let b = &s.bbox;
        let finite = [s.position.x, s.position.y, b.min_x, b.min_y, b.max_x, b.max_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(InputError::Structure(format!(
                "symbol '{}' has non-finite coordinates",
                s.id
            )));
        }
    }
    Ok(())
}

/// Drawing checker. Immutable apart from its dynamic rule table, so one
/// instance can serve concurrent runs.
pub struct Checker {
    catalogue: PatternCatalogue,
    calibration: Calibration,
    engine: RulesEngine,
    rules: RuleTable,
}

impl Checker {
    pub fn new() -> Self {
        Self {
            catalogue: PatternCatalogue::builtin(),
            calibration: Calibration::default(),
            engine: RulesEngine::with_default_rules(),
            rules: RuleTable::new(),
        }
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_catalogue(mut self, catalogue: PatternCatalogue) -> Self {
        self.catalogue = catalogue;
        self
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn catalogue(&self) -> &PatternCatalogue {
        &self.catalogue
    }

    pub fn builtin_rules(&self) -> &RulesEngine {
        &self.engine
    }

    /// The dynamic rule table.
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Replace the dynamic rule table from a rule-set or record-array JSON.
    pub fn upload_rules(&self, json: &str) -> Result<LoadReport, PidGuardError> {
        let records = load_rules_str(json)?;
        Ok(self.rules.replace_all(records))
    }

    pub fn upload_rules_file(&self, path: &Path) -> Result<LoadReport, PidGuardError> {
        let content = std::fs::read_to_string(path)?;
        self.upload_rules(&content)
    }

    /// Identify equipment and connect it, without running any rule.
    pub fn build_graph(&self, input: &DrawingInput) -> FlowGraph {
        let identifier =
            EquipmentIdentifier::new(&self.catalogue, self.calibration.dedup_radius_px);
        let equipment = identifier.identify(&input.symbols, &input.texts);
        FlowGraph::build(equipment, &input.connections)
    }

    pub fn run_all(
        &self,
        input: &DrawingInput,
        options: &CheckOptions,
    ) -> Result<CheckReport, PidGuardError> {
        validate_geometry(input)?;

        let graph = self.build_graph(input);
        if graph.is_empty() {
            tracing::info!("No equipment identified, nothing to check");
            return Ok(CheckReport::new(Summary::default()));
        }

        let product = infer_product_type(&graph);
        let mut summary = Summary {
            equipment_found: graph.len(),
            equipment_by_type: graph.counts_by_type(),
            product_type: Some(product.clone()),
            ..Default::default()
        };
        let mut report = CheckReport::new(Summary::default());

        let ctx = CheckContext {
            graph: &graph,
            symbols: &input.symbols,
            texts: &input.texts,
            lines: &input.lines,
            catalogue: &self.catalogue,
            calibration: &self.calibration,
            scale_px_per_m: options.scale_px_per_m,
        };

        for (definition, rule) in self.engine.iter() {
            let selected = options
                .enabled_rules
                .as_ref()
                .map_or(true, |ids| ids.iter().any(|id| id == &definition.id));
            if !selected || !definition.enabled {
                continue;
            }
            if !should_apply_rule(definition, &graph) {
                tracing::debug!(
                    "Skipping {} for {} drawing ({} only)",
                    definition.id,
                    product,
                    definition.product_type
                );
                continue;
            }
            summary.builtin_rules_checked += 1;
            report.violations.extend(rule.check(&ctx, definition));
        }

        // Held until every dynamic rule has been evaluated.
        let dynamic = self.rules.read();
        for rule in dynamic.values() {
            if !rule.definition.enabled || !should_apply_rule(&rule.definition, &graph) {
                continue;
            }
            match evaluate_with_logic(rule, &graph, &input.texts) {
                RuleOutcome::Violations(v) => {
                    summary.dynamic_rules_checked += 1;
                    report.violations.extend(v);
                }
                RuleOutcome::Advisory(v) => {
                    summary.dynamic_rules_checked += 1;
                    report.advisories.extend(v);
                }
                RuleOutcome::ManualReview(m) => {
                    summary.dynamic_rules_checked += 1;
                    report.manual_review.push(m);
                }
                RuleOutcome::NotApplicable(reason) => {
                    tracing::debug!("Rule {} not applicable: {}", rule.id(), reason);
                }
            }
        }
        drop(dynamic);

        summary.rules_checked = summary.builtin_rules_checked + summary.dynamic_rules_checked;
        summary.advisories = report.advisories.len();
        summary.manual_review = report.manual_review.len();
        count_severities(&mut summary, &report.violations);
        report.summary = summary;

        tracing::info!(
            "Checked {} equipment against {} rules: {} violations ({} errors)",
            report.summary.equipment_found,
            report.summary.rules_checked,
            report.summary.total_violations,
            report.summary.errors
        );
        Ok(report)
    }

    /// Normalise a loosely-shaped drawing payload, then run.
    pub fn run_all_json(
        &self,
        payload: &Value,
        options: &CheckOptions,
    ) -> Result<CheckReport, PidGuardError> {
        let input = DrawingInput::from_json(payload)?;
        self.run_all(&input, options)
    }

    pub fn check_file(
        &self,
        path: &Path,
        options: &CheckOptions,
    ) -> Result<CheckReport, PidGuardError> {
        let content = std::fs::read_to_string(path)?;
        let payload: Value = serde_json::from_str(&content)?;
        self.run_all_json(&payload, options)
    }
}

impl Default for Checker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::schema::{BBox, Position, Symbol};

    fn symbol(id: &str, label: &str, x: f64, y: f64) -> Symbol {
        Symbol {
            id: id.to_string(),
            label: label.to_string(),
            class: None,
            tag_number: None,
            position: Position::new(x, y),
            width: 40.0,
            height: 40.0,
            bbox: BBox::from_center(Position::new(x, y), 40.0, 40.0),
            confidence: None,
        }
    }

    #[test]
    fn test_checker_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Checker>();
    }

    #[test]
    fn test_enabled_rules_filter() {
        let checker = Checker::new();
        let input = DrawingInput {
            symbols: vec![
                symbol("sp", "SAMPLING PORT", 100.0, 100.0),
                symbol("ecu", "ECU", 300.0, 100.0),
            ],
            ..Default::default()
        };

        let all = checker.run_all(&input, &CheckOptions::default()).unwrap();
        assert_eq!(all.summary.total_violations, 1);

        let options = CheckOptions {
            enabled_rules: Some(vec!["BWMS-003".to_string()]),
            ..Default::default()
        };
        let only_gds = checker.run_all(&input, &options).unwrap();
        assert_eq!(only_gds.summary.builtin_rules_checked, 1);
        assert!(only_gds.violations.is_empty());
    }

    #[test]
    fn test_non_finite_geometry_rejected() {
        let checker = Checker::new();
        let input = DrawingInput {
            symbols: vec![symbol("bad", "ECU", f64::NAN, 0.0)],
            ..Default::default()
        };
        assert!(matches!(
            checker.run_all(&input, &CheckOptions::default()),
            Err(PidGuardError::InvalidInput(_))
        ));
    }
}
