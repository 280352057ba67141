//! Rule definition schema shared by built-in and dynamic rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::RuleError;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    #[default]
    Warning,
    Info,
}

impl Severity {
    /// Higher is more severe.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Error => 2,
            Severity::Warning => 1,
            Severity::Info => 0,
        }
    }
}

impl FromStr for Severity {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" | "critical" => Ok(Severity::Error),
            "warning" | "warn" => Ok(Severity::Warning),
            "info" | "information" => Ok(Severity::Info),
            other => Err(RuleError::Parse(format!("unknown severity '{}'", other))),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

/// Product line a rule applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProductType {
    #[default]
    All,
    /// Full-flow electrolysis line
    Ecs,
    /// Side-stream hypochlorite line
    Hychlor,
    Other(String),
}

impl From<String> for ProductType {
    fn from(s: String) -> Self {
        match s.trim().to_uppercase().as_str() {
            "" | "ALL" => ProductType::All,
            "ECS" => ProductType::Ecs,
            "HYCHLOR" => ProductType::Hychlor,
            other => ProductType::Other(other.to_string()),
        }
    }
}

impl From<ProductType> for String {
    fn from(p: ProductType) -> Self {
        p.to_string()
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductType::All => f.write_str("ALL"),
            ProductType::Ecs => f.write_str("ECS"),
            ProductType::Hychlor => f.write_str("HYCHLOR"),
            ProductType::Other(s) => f.write_str(s),
        }
    }
}

/// Which comparison a rule performs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Position,
    Sequence,
    Existence,
    Distance,
    Capacity,
    Manual,
}

impl FromStr for CheckType {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "position" => Ok(CheckType::Position),
            "sequence" => Ok(CheckType::Sequence),
            "existence" => Ok(CheckType::Existence),
            "distance" => Ok(CheckType::Distance),
            "capacity" => Ok(CheckType::Capacity),
            "manual" => Ok(CheckType::Manual),
            _ => Err(RuleError::UnknownCheckType(s.to_string())),
        }
    }
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckType::Position => "position",
            CheckType::Sequence => "sequence",
            CheckType::Existence => "existence",
            CheckType::Distance => "distance",
            CheckType::Capacity => "capacity",
            CheckType::Manual => "manual",
        })
    }
}

/// How presence/absence of the checked equipment is interpreted.
///
/// Independent of [`CheckType`]: an `optional` position check and a
/// `conditional` existence check are both valid rules.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CheckLogic {
    #[default]
    Exists,
    OrExists,
    NotExists,
    Optional,
    Conditional,
}

impl FromStr for CheckLogic {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "" | "exists" => Ok(CheckLogic::Exists),
            "or_exists" => Ok(CheckLogic::OrExists),
            "not_exists" => Ok(CheckLogic::NotExists),
            "optional" => Ok(CheckLogic::Optional),
            "conditional" => Ok(CheckLogic::Conditional),
            _ => Err(RuleError::UnknownCheckLogic(s.to_string())),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A design rule, built-in or uploaded at runtime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub name_en: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
    /// Class society / IMO guideline the rule derives from
    #[serde(default)]
    pub standard: String,
    #[serde(default)]
    pub product_type: ProductType,
    pub check_type: CheckType,
    /// Target equipment: type codes or label patterns
    #[serde(default)]
    pub equipment: Vec<String>,
    #[serde(default)]
    pub condition: String,
    /// Reference equipment for position/sequence, threshold for distance/capacity
    #[serde(default)]
    pub condition_value: String,
    #[serde(default)]
    pub check_logic: CheckLogic,
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Keyword that satisfies an `or_exists` rule when found in the OCR text
    #[serde(default)]
    pub context_check: Option<String>,
    #[serde(default)]
    pub suggestion: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl RuleDefinition {
    /// Numeric `condition_value`, if it parses.
    pub fn threshold(&self) -> Option<f64> {
        self.condition_value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_type_strings() {
        assert_eq!(ProductType::from("hychlor".to_string()), ProductType::Hychlor);
        assert_eq!(ProductType::from(String::new()), ProductType::All);
        assert_eq!(
            ProductType::from("purimar".to_string()),
            ProductType::Other("PURIMAR".to_string())
        );
        let json = serde_json::to_string(&ProductType::Ecs).unwrap();
        assert_eq!(json, "\"ECS\"");
    }

    #[test]
    fn test_check_logic_parsing() {
        assert_eq!("".parse::<CheckLogic>().unwrap(), CheckLogic::Exists);
        assert_eq!("Not-Exists".parse::<CheckLogic>().unwrap(), CheckLogic::NotExists);
        assert!(matches!(
            "sometimes".parse::<CheckLogic>(),
            Err(RuleError::UnknownCheckLogic(_))
        ));
    }

    #[test]
    fn test_definition_defaults() {
        let def: RuleDefinition = serde_json::from_str(
            r#"{"id": "R1", "name": "Existence", "check_type": "existence", "equipment": ["ECU"]}"#,
        )
        .unwrap();
        assert!(def.enabled);
        assert_eq!(def.severity, Severity::Warning);
        assert_eq!(def.product_type, ProductType::All);
        assert_eq!(def.check_logic, CheckLogic::Exists);
        assert_eq!(def.threshold(), None);
    }
}
