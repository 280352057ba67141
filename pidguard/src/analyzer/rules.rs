use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analyzer::checks::*;
use crate::catalogue::patterns::PatternCatalogue;
use crate::catalogue::rules::builtin_rule;
use crate::config::Calibration;
use crate::flow::graph::FlowGraph;
use crate::flow::schema::EquipmentType;
use crate::parser::schema::{LineSegment, Position, Symbol, TextFragment};
use crate::rules::definition::{RuleDefinition, Severity};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    pub rule_id: String,
    pub rule_name: String,
    pub rule_name_en: String,
    pub description: String,
    pub severity: Severity,
    pub standard: String,
    pub location: Option<Position>,
    pub affected_elements: Vec<String>,
    pub suggestion: String,
}

impl Violation {
    pub fn new(definition: &RuleDefinition, description: impl Into<String>) -> Self {
        Self {
            rule_id: definition.id.clone(),
            rule_name: definition.name.clone(),
            rule_name_en: definition.name_en.clone(),
            description: description.into(),
            severity: definition.severity,
            standard: definition.standard.clone(),
            location: None,
            affected_elements: Vec::new(),
            suggestion: definition.suggestion.clone(),
        }
    }

    pub fn at(mut self, location: Position) -> Self {
        self.location = Some(location);
        self
    }

    pub fn affecting<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.affected_elements.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = suggestion.into();
        self
    }
}

/// Everything a built-in check may read. Immutable for the whole run.
pub struct CheckContext<'a> {
    pub graph: &'a FlowGraph,
    /// Raw symbols, for attributes the graph does not carry (capacities, valves)
    pub symbols: &'a [Symbol],
    pub texts: &'a [TextFragment],
    pub lines: &'a [LineSegment],
    pub catalogue: &'a PatternCatalogue,
    pub calibration: &'a Calibration,
    /// Drawing scale in pixels per metre, when the caller knows it
    pub scale_px_per_m: Option<f64>,
}

impl CheckContext<'_> {
    /// Caller scale if usable, otherwise the calibrated default. The flag is
    /// true when the default was used.
    pub fn px_per_m(&self) -> (f64, bool) {
        match self.scale_px_per_m {
            Some(s) if s.is_finite() && s > 0.0 => (s, false),
            _ => (self.calibration.default_px_per_m, true),
        }
    }

    /// Rated capacity (m3/h) for an equipment type, from symbol labels first,
    /// then OCR text.
    pub fn capacity_of(&self, equipment_type: EquipmentType) -> Option<f64> {
        let from_symbols = self
            .symbols
            .iter()
            .filter(|s| self.catalogue.classify_symbol(s) == Some(equipment_type))
            .find_map(|s| s.match_fields().find_map(parse_capacity));

        from_symbols.or_else(|| {
            self.texts
                .iter()
                .filter(|t| self.catalogue.classify(&t.text) == Some(equipment_type))
                .find_map(|t| parse_capacity(&t.text))
        })
    }
}

// Group 1: comma as thousands separator ("1,500"). Group 2: plain number,
// where a single comma is a decimal mark ("1,5").
static CAPACITY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:(\d{1,3}(?:,\d{3})+(?:\.\d+)?)|(\d+(?:[.,]\d+)?))\s*m(?:3|³)\s*/\s*h(?:r)?\b",
    )
    .unwrap()
});

/// Extract a `<number> m3/h` capacity.
pub fn parse_capacity(text: &str) -> Option<f64> {
    let caps = CAPACITY_REGEX.captures(text)?;
    let number = match (caps.get(1), caps.get(2)) {
        (Some(grouped), _) => grouped.as_str().replace(',', ""),
        (None, Some(plain)) => plain.as_str().replace(',', "."),
        (None, None) => return None,
    };
    number.parse::<f64>().ok()
}

pub trait Rule: Send + Sync {
    fn id(&self) -> &str;
    fn check(&self, ctx: &CheckContext<'_>, definition: &RuleDefinition) -> Vec<Violation>;
}

/// Built-in rules paired with their catalogue records.
pub struct RulesEngine {
    rules: Vec<(RuleDefinition, Arc<dyn Rule>)>,
}

impl RulesEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_default_rules() -> Self {
        let implementations: Vec<Arc<dyn Rule>> = vec![
            Arc::new(SamplingPortDownstreamRule),
            Arc::new(FilterUpstreamRule),
            Arc::new(GasDetectorAboveEcuRule),
            Arc::new(TsuSamplingDistanceRule),
            Arc::new(MixingPumpCapacityRule),
            Arc::new(IsolationValveAreaRule),
            Arc::new(FlowMeterInletRule),
            Arc::new(NeutralisationDownstreamRule),
            Arc::new(DegasTankAfterHguRule),
        ];

        let mut engine = Self::new();
        for rule in implementations {
            match builtin_rule(rule.id()) {
                Some(definition) => engine.add_rule(definition.clone(), rule),
                None => tracing::warn!("No catalogue record for built-in rule {}", rule.id()),
            }
        }
        engine
    }

    pub fn add_rule(&mut self, definition: RuleDefinition, rule: Arc<dyn Rule>) {
        self.rules.push((definition, rule));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RuleDefinition, &dyn Rule)> {
        self.rules.iter().map(|(d, r)| (d, r.as_ref()))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &RuleDefinition> {
        self.rules.iter().map(|(d, _)| d)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RulesEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}
