//! Rule schema, dynamic rule upload and the runtime rule table.

pub mod compiled;
pub mod definition;
pub mod loader;
pub mod table;

use thiserror::Error;

pub use compiled::{CompiledRule, Condition, EquipmentSelector};
pub use definition::{CheckLogic, CheckType, ProductType, RuleDefinition, Severity};
pub use loader::{generate_sample_rules, load_rules_file, load_rules_str, RuleRecord, RuleSet};
pub use table::{LoadReport, RuleTable};

/// Configuration errors in a rule definition. The offending rule is skipped.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse rules JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown check_type '{0}'")]
    UnknownCheckType(String),

    #[error("Unknown check_logic '{0}'")]
    UnknownCheckLogic(String),

    #[error("Unknown condition '{condition}' for {check_type} check")]
    UnknownCondition {
        check_type: CheckType,
        condition: String,
    },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid equipment pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),
}
