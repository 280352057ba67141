//! Dynamic rule upload
//!
//! Rules arrive as tabular records (one spreadsheet row each, every cell a
//! string). They are converted to [`RuleDefinition`]s here; rows that fail
//! conversion are reported back instead of aborting the upload.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::compiled::split_list;
use super::definition::{CheckLogic, CheckType, ProductType, RuleDefinition, Severity};
use super::RuleError;

/// One uploaded rule row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleRecord {
    pub id: String,
    pub name: String,
    pub name_en: String,
    pub description: String,
    pub severity: String,
    pub standard: String,
    pub product_type: String,
    pub check_type: String,
    pub equipment: String,
    pub condition: String,
    pub condition_value: String,
    pub check_logic: String,
    pub depends_on: String,
    pub context_check: String,
    pub suggestion: String,
    pub enabled: Option<bool>,
}

impl TryFrom<RuleRecord> for RuleDefinition {
    type Error = RuleError;

    fn try_from(record: RuleRecord) -> Result<Self, Self::Error> {
        let id = record.id.trim().to_string();
        if id.is_empty() {
            return Err(RuleError::MissingField("id"));
        }

        let check_type: CheckType = record.check_type.parse()?;
        let check_logic: CheckLogic = record.check_logic.parse()?;

        let severity = if record.severity.trim().is_empty() {
            Severity::default()
        } else {
            record.severity.parse().unwrap_or_else(|e| {
                tracing::warn!("Rule {}: {}, defaulting to warning", id, e);
                Severity::default()
            })
        };

        let name = if record.name.trim().is_empty() {
            id.clone()
        } else {
            record.name.trim().to_string()
        };
        let context_check = Some(record.context_check.trim().to_string()).filter(|s| !s.is_empty());

        Ok(RuleDefinition {
            id,
            name,
            name_en: record.name_en.trim().to_string(),
            description: record.description.trim().to_string(),
            severity,
            standard: record.standard.trim().to_string(),
            product_type: ProductType::from(record.product_type),
            check_type,
            equipment: split_list(&record.equipment),
            condition: record.condition.trim().to_string(),
            condition_value: record.condition_value.trim().to_string(),
            check_logic,
            depends_on: split_list(&record.depends_on),
            context_check,
            suggestion: record.suggestion.trim().to_string(),
            enabled: record.enabled.unwrap_or(true),
        })
    }
}

/// A named batch of uploaded rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rules: Vec<RuleRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleUpload {
    Set(RuleSet),
    Records(Vec<RuleRecord>),
}

/// Parse either a rule-set object or a bare array of records.
pub fn load_rules_str(json: &str) -> Result<Vec<RuleRecord>, RuleError> {
    let upload: RuleUpload = serde_json::from_str(json)?;
    Ok(match upload {
        RuleUpload::Set(set) => {
            tracing::info!(
                "Loaded rule set '{}' {} with {} rules",
                set.name,
                set.version,
                set.rules.len()
            );
            set.rules
        }
        RuleUpload::Records(records) => records,
    })
}

pub fn load_rules_file(path: &Path) -> Result<Vec<RuleRecord>, RuleError> {
    let content = std::fs::read_to_string(path)?;
    load_rules_str(&content)
}

/// Sample upload showing every check type and check logic.
pub fn generate_sample_rules() -> RuleSet {
    // (id, name, check_type, equipment, condition, condition_value, check_logic)
    let record = |cells: [&str; 7]| {
        let [id, name, check_type, equipment, condition, value, logic] = cells;
        RuleRecord {
            id: id.to_string(),
            name: name.to_string(),
            severity: "warning".to_string(),
            product_type: "ALL".to_string(),
            check_type: check_type.to_string(),
            equipment: equipment.to_string(),
            condition: condition.to_string(),
            condition_value: value.to_string(),
            check_logic: logic.to_string(),
            ..Default::default()
        }
    };

    RuleSet {
        name: "Yard BWMS Drawing Rules".to_string(),
        version: "1.0.0".to_string(),
        description: Some(
            "Project-specific additions to the built-in BWMS catalogue".to_string(),
        ),
        rules: vec![
            RuleRecord {
                description: "TRO sensor unit must be mounted above the ECU outlet".to_string(),
                suggestion: "Relocate the TSU above the ECU".to_string(),
                ..record([
                    "DYN-001",
                    "TSU above ECU",
                    "position",
                    "TSU",
                    "above",
                    "ECU",
                    "exists",
                ])
            },
            RuleRecord {
                severity: "error".to_string(),
                description: "Strainer must precede the ballast pump".to_string(),
                ..record([
                    "DYN-002",
                    "Strainer before ballast pump",
                    "sequence",
                    "STRAINER",
                    "before",
                    "BALLAST_PUMP",
                    "exists",
                ])
            },
            RuleRecord {
                severity: "error".to_string(),
                product_type: "ECS".to_string(),
                description: "ECS installations require a power rectifier unit".to_string(),
                ..record([
                    "DYN-003",
                    "PRU required",
                    "existence",
                    "PRU",
                    "required",
                    "",
                    "exists",
                ])
            },
            RuleRecord {
                description: "Filter or strainer required upstream of treatment".to_string(),
                context_check: "FILTER".to_string(),
                ..record([
                    "DYN-004",
                    "Pre-treatment present",
                    "existence",
                    "FILTER, STRAINER",
                    "required",
                    "",
                    "or_exists",
                ])
            },
            RuleRecord {
                product_type: "HYCHLOR".to_string(),
                depends_on: "HGU".to_string(),
                ..record([
                    "DYN-005",
                    "Degas tank with HGU",
                    "existence",
                    "DEGAS_TANK",
                    "required",
                    "",
                    "conditional",
                ])
            },
            RuleRecord {
                severity: "info".to_string(),
                ..record([
                    "DYN-006",
                    "Blower above ECU",
                    "position",
                    "BLOWER",
                    "above",
                    "ECU",
                    "optional",
                ])
            },
            RuleRecord {
                description: "Overboard discharge within 10 m of ANU".to_string(),
                ..record([
                    "DYN-007",
                    "ANU near overboard",
                    "distance",
                    "ANU",
                    "",
                    "10",
                    "exists",
                ])
            },
        ],
    }
}
