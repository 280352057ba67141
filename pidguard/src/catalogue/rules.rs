//! Built-in rule catalogue
//!
//! The BWMS rule records are embedded JSON, parsed once on first use. The
//! matching check implementations live in `analyzer::checks`.

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::rules::definition::RuleDefinition;

const EMBEDDED_BWMS_RULES: &str = include_str!("../../catalogue/bwms_rules.json");

#[derive(Debug, Deserialize)]
struct CatalogueDocument {
    name: String,
    version: String,
    rules: Vec<RuleDefinition>,
}

static BUILTIN_RULES: Lazy<Vec<RuleDefinition>> = Lazy::new(|| {
    match serde_json::from_str::<CatalogueDocument>(EMBEDDED_BWMS_RULES) {
        Ok(doc) => {
            tracing::debug!("Loaded {} v{} ({} rules)", doc.name, doc.version, doc.rules.len());
            doc.rules
        }
        Err(e) => {
            tracing::warn!("Failed to parse embedded rule catalogue: {}", e);
            Vec::new()
        }
    }
});

/// All built-in rule records, in catalogue order.
pub fn builtin_rules() -> &'static [RuleDefinition] {
    &BUILTIN_RULES
}

pub fn builtin_rule(id: &str) -> Option<&'static RuleDefinition> {
    BUILTIN_RULES.iter().find(|r| r.id == id)
}
