//! Validated, ready-to-evaluate form of a [`RuleDefinition`].

use regex::{Regex, RegexBuilder};
use std::fmt;

use super::definition::{CheckLogic, CheckType, RuleDefinition};
use super::RuleError;
use crate::flow::graph::FlowGraph;
use crate::flow::schema::{Equipment, EquipmentType};

/// Picks equipment out of the flow graph.
#[derive(Debug, Clone)]
pub enum EquipmentSelector {
    Type(EquipmentType),
    /// Case-insensitive regex over the equipment label
    Label(Regex),
}

impl EquipmentSelector {
    /// A known type code selects by type; anything else is a label pattern.
    pub fn parse(raw: &str) -> Result<Self, RuleError> {
        let raw = raw.trim();
        if let Ok(t) = raw.parse::<EquipmentType>() {
            return Ok(EquipmentSelector::Type(t));
        }
        RegexBuilder::new(raw)
            .case_insensitive(true)
            .build()
            .map(EquipmentSelector::Label)
            .map_err(|source| RuleError::InvalidPattern {
                pattern: raw.to_string(),
                source,
            })
    }

    pub fn matches(&self, equipment: &Equipment) -> bool {
        match self {
            EquipmentSelector::Type(t) => equipment.equipment_type == *t,
            EquipmentSelector::Label(re) => re.is_match(&equipment.label),
        }
    }

    pub fn select<'g>(&self, graph: &'g FlowGraph) -> Vec<&'g Equipment> {
        graph.equipment().filter(|e| self.matches(e)).collect()
    }
}

impl fmt::Display for EquipmentSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EquipmentSelector::Type(t) => write!(f, "{}", t),
            EquipmentSelector::Label(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Parsed `condition` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Above,
    Below,
    UpstreamOf,
    DownstreamOf,
    Before,
    After,
    Required,
    /// Existence rule whose condition is anything but `required`
    NotRequired,
    /// Check types that carry no machine-readable condition
    Unspecified,
}

impl Condition {
    fn parse(check_type: CheckType, raw: &str) -> Result<Self, RuleError> {
        let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");
        let unknown = || RuleError::UnknownCondition {
            check_type,
            condition: raw.to_string(),
        };
        match check_type {
            CheckType::Position => match normalized.as_str() {
                "above" => Ok(Condition::Above),
                "below" => Ok(Condition::Below),
                "upstream_of" | "upstream" => Ok(Condition::UpstreamOf),
                "downstream_of" | "downstream" => Ok(Condition::DownstreamOf),
                _ => Err(unknown()),
            },
            CheckType::Sequence => match normalized.as_str() {
                "before" => Ok(Condition::Before),
                "after" => Ok(Condition::After),
                _ => Err(unknown()),
            },
            CheckType::Existence => Ok(if normalized == "required" {
                Condition::Required
            } else {
                Condition::NotRequired
            }),
            CheckType::Distance | CheckType::Capacity | CheckType::Manual => {
                Ok(Condition::Unspecified)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub definition: RuleDefinition,
    pub condition: Condition,
    pub targets: Vec<EquipmentSelector>,
    pub references: Vec<EquipmentSelector>,
    pub depends_on: Vec<EquipmentSelector>,
}

/// Entries are split with [`split_list`] whatever their source. An entry of
/// `|`-joined type codes becomes one type selector per code; any other entry
/// containing `|` is a single label regex with alternation.
fn parse_selectors(raw: &[String]) -> Result<Vec<EquipmentSelector>, RuleError> {
    let mut selectors = Vec::new();
    for entry in raw.iter().flat_map(|cell| split_list(cell)) {
        let types: Option<Vec<EquipmentType>> = entry
            .split('|')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().ok())
            .collect();
        match types {
            Some(types) if !types.is_empty() => {
                selectors.extend(types.into_iter().map(EquipmentSelector::Type));
            }
            _ => selectors.push(EquipmentSelector::parse(&entry)?),
        }
    }
    Ok(selectors)
}

/// Split a tabular list cell on `,` or `/`. `|` is left alone so label
/// regexes keep their alternation.
pub fn split_list(cell: &str) -> Vec<String> {
    cell.split([',', '/'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

impl CompiledRule {
    pub fn compile(definition: RuleDefinition) -> Result<Self, RuleError> {
        let condition = Condition::parse(definition.check_type, &definition.condition)?;
        let targets = parse_selectors(&definition.equipment)?;
        let depends_on = parse_selectors(&definition.depends_on)?;

        let references = match definition.check_type {
            CheckType::Position | CheckType::Sequence => {
                let refs = parse_selectors(&split_list(&definition.condition_value))?;
                if refs.is_empty() {
                    return Err(RuleError::MissingField("condition_value"));
                }
                refs
            }
            _ => Vec::new(),
        };

        let needs_targets = matches!(
            definition.check_type,
            CheckType::Position | CheckType::Sequence | CheckType::Existence
        ) || matches!(
            definition.check_logic,
            CheckLogic::OrExists | CheckLogic::NotExists
        );
        if needs_targets && targets.is_empty() {
            return Err(RuleError::MissingField("equipment"));
        }
        if definition.check_logic == CheckLogic::Conditional && depends_on.is_empty() {
            return Err(RuleError::MissingField("depends_on"));
        }

        Ok(Self {
            definition,
            condition,
            targets,
            references,
            depends_on,
        })
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    /// Equipment matched by any target selector, in graph order.
    pub fn select_targets<'g>(&self, graph: &'g FlowGraph) -> Vec<&'g Equipment> {
        select_any(&self.targets, graph)
    }

    pub fn select_references<'g>(&self, graph: &'g FlowGraph) -> Vec<&'g Equipment> {
        select_any(&self.references, graph)
    }

    pub fn dependency_present(&self, graph: &FlowGraph) -> bool {
        graph
            .equipment()
            .any(|e| self.depends_on.iter().any(|s| s.matches(e)))
    }
}

fn select_any<'g>(selectors: &[EquipmentSelector], graph: &'g FlowGraph) -> Vec<&'g Equipment> {
    graph
        .equipment()
        .filter(|e| selectors.iter().any(|s| s.matches(e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::definition::{ProductType, Severity};

    fn definition(
        check_type: CheckType,
        equipment: &[&str],
        condition: &str,
        value: &str,
    ) -> RuleDefinition {
        RuleDefinition {
            id: "T-1".to_string(),
            name: "test".to_string(),
            name_en: String::new(),
            description: String::new(),
            severity: Severity::Warning,
            standard: String::new(),
            product_type: ProductType::All,
            check_type,
            equipment: equipment.iter().map(|s| s.to_string()).collect(),
            condition: condition.to_string(),
            condition_value: value.to_string(),
            check_logic: CheckLogic::Exists,
            depends_on: Vec::new(),
            context_check: None,
            suggestion: String::new(),
            enabled: true,
        }
    }

    #[test]
    fn test_selector_parsing() {
        assert!(matches!(
            EquipmentSelector::parse("tsu").unwrap(),
            EquipmentSelector::Type(EquipmentType::Tsu)
        ));
        assert!(matches!(
            EquipmentSelector::parse("UV\\s*REACTOR").unwrap(),
            EquipmentSelector::Label(_)
        ));
        assert!(matches!(
            EquipmentSelector::parse("[unclosed"),
            Err(RuleError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_position_requires_reference_and_known_condition() {
        let ok = CompiledRule::compile(definition(CheckType::Position, &["GDS"], "above", "ECU"))
            .unwrap();
        assert_eq!(ok.condition, Condition::Above);
        assert_eq!(ok.references.len(), 1);

        assert!(matches!(
            CompiledRule::compile(definition(CheckType::Position, &["GDS"], "above", "")),
            Err(RuleError::MissingField("condition_value"))
        ));
        assert!(matches!(
            CompiledRule::compile(definition(CheckType::Position, &["GDS"], "beside", "ECU")),
            Err(RuleError::UnknownCondition { .. })
        ));
    }

    #[test]
    fn test_existence_condition() {
        let req = CompiledRule::compile(definition(CheckType::Existence, &["PRU"], "Required", ""))
            .unwrap();
        assert_eq!(req.condition, Condition::Required);
        let rec =
            CompiledRule::compile(definition(CheckType::Existence, &["PRU"], "recommended", ""))
                .unwrap();
        assert_eq!(rec.condition, Condition::NotRequired);
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("FILTER, STRAINER / ECU "), vec!["FILTER", "STRAINER", "ECU"]);
        assert_eq!(split_list("UV|OZONE REACTOR, ECU"), vec!["UV|OZONE REACTOR", "ECU"]);
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn test_label_regex_keeps_alternation() {
        let rule = CompiledRule::compile(definition(
            CheckType::Position,
            &["GDS"],
            "above",
            "UV|OZONE REACTOR",
        ))
        .unwrap();
        assert_eq!(rule.references.len(), 1);
        assert!(matches!(
            &rule.references[0],
            EquipmentSelector::Label(re) if re.as_str() == "UV|OZONE REACTOR"
        ));
    }

    #[test]
    fn test_piped_type_codes_select_by_type() {
        let rule =
            CompiledRule::compile(definition(CheckType::Position, &["GDS|TSU"], "above", "ECU"))
                .unwrap();
        assert!(matches!(
            rule.targets.as_slice(),
            [
                EquipmentSelector::Type(EquipmentType::Gds),
                EquipmentSelector::Type(EquipmentType::Tsu)
            ]
        ));
    }

    #[test]
    fn test_definition_lists_are_split_like_records() {
        let rule = CompiledRule::compile(definition(
            CheckType::Existence,
            &["FILTER, STRAINER"],
            "required",
            "",
        ))
        .unwrap();
        assert!(matches!(
            rule.targets.as_slice(),
            [
                EquipmentSelector::Type(EquipmentType::Filter),
                EquipmentSelector::Type(EquipmentType::Strainer)
            ]
        ));
    }
}
