//! Dynamic rule evaluation
//!
//! Uploaded rules are evaluated against the flow graph only. Position and
//! sequence use drawing geometry (x grows downstream, y grows downwards);
//! existence counts selector matches. Distance, capacity and manual rules
//! need measurements a drawing does not carry and are routed to manual
//! review instead of being guessed at.

use serde::{Deserialize, Serialize};

use crate::analyzer::rules::Violation;
use crate::flow::graph::FlowGraph;
use crate::flow::schema::{Equipment, EquipmentType};
use crate::parser::schema::TextFragment;
use crate::rules::compiled::{CompiledRule, Condition, EquipmentSelector};
use crate::rules::definition::{CheckLogic, CheckType, ProductType, RuleDefinition};

/// A rule that could not be decided automatically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManualReview {
    pub rule_id: String,
    pub rule_name: String,
    pub check_type: CheckType,
    pub reason: String,
}

impl ManualReview {
    fn new(definition: &RuleDefinition, reason: impl Into<String>) -> Self {
        Self {
            rule_id: definition.id.clone(),
            rule_name: definition.name.clone(),
            check_type: definition.check_type,
            reason: reason.into(),
        }
    }
}

/// Result of evaluating one dynamic rule with its check logic applied.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// Checked; empty means the rule passed
    Violations(Vec<Violation>),
    /// Checked, but the rule is optional so findings are not violations
    Advisory(Vec<Violation>),
    ManualReview(ManualReview),
    /// Not evaluated; the reason is logged
    NotApplicable(String),
}

/// HGU only appears in hypochlorite installations.
pub fn infer_product_type(graph: &FlowGraph) -> ProductType {
    if graph.has_type(EquipmentType::Hgu) {
        ProductType::Hychlor
    } else {
        ProductType::Ecs
    }
}

pub fn should_apply_rule(rule: &RuleDefinition, graph: &FlowGraph) -> bool {
    match &rule.product_type {
        ProductType::All => true,
        product => *product == infer_product_type(graph),
    }
}

/// Plain check-type evaluation, ignoring check logic. Checks that cannot be
/// decided from the drawing come back as [`RuleOutcome::ManualReview`], never
/// as an empty violation list.
pub fn evaluate(rule: &CompiledRule, graph: &FlowGraph) -> RuleOutcome {
    let definition = &rule.definition;
    match definition.check_type {
        CheckType::Position => RuleOutcome::Violations(check_position(rule, graph)),
        CheckType::Sequence => RuleOutcome::Violations(check_sequence(rule, graph)),
        CheckType::Existence => RuleOutcome::Violations(check_existence(rule, graph)),
        CheckType::Distance | CheckType::Capacity => {
            tracing::info!(
                "Rule {} ({} check) needs measured values, routed to manual review",
                definition.id,
                definition.check_type
            );
            RuleOutcome::ManualReview(ManualReview::new(
                definition,
                format!(
                    "{} check against '{}' cannot be measured from the drawing",
                    definition.check_type, definition.condition_value
                ),
            ))
        }
        CheckType::Manual => RuleOutcome::ManualReview(ManualReview::new(
            definition,
            "Requires review by an engineer",
        )),
    }
}

/// Evaluate with the rule's check logic layered over its check type.
pub fn evaluate_with_logic(
    rule: &CompiledRule,
    graph: &FlowGraph,
    texts: &[TextFragment],
) -> RuleOutcome {
    let definition = &rule.definition;
    match definition.check_logic {
        CheckLogic::Exists => evaluate(rule, graph),

        CheckLogic::OrExists => {
            let targets = rule.select_targets(graph);
            let keyword = definition.context_check.as_deref();
            let mentioned = keyword.is_some_and(|k| text_mentions(texts, k));
            if targets.is_empty() && !mentioned {
                let mut description = format!("None of {} found", selector_list(&rule.targets));
                if let Some(k) = keyword {
                    description.push_str(&format!(" and no '{}' reference in drawing text", k));
                }
                return RuleOutcome::Violations(vec![Violation::new(definition, description)]);
            }
            if definition.check_type == CheckType::Existence {
                RuleOutcome::Violations(Vec::new())
            } else {
                evaluate(rule, graph)
            }
        }

        CheckLogic::NotExists => {
            let present = rule.select_targets(graph);
            let Some(first) = present.first() else {
                return RuleOutcome::Violations(Vec::new());
            };
            let ids: Vec<&str> = present.iter().map(|e| e.id.as_str()).collect();
            RuleOutcome::Violations(vec![Violation::new(
                definition,
                format!("Prohibited equipment present: {}", ids.join(", ")),
            )
            .at(first.position())
            .affecting(ids)])
        }

        CheckLogic::Optional => match evaluate(rule, graph) {
            RuleOutcome::Violations(v) => RuleOutcome::Advisory(v),
            other => other,
        },

        CheckLogic::Conditional => {
            if rule.dependency_present(graph) {
                evaluate(rule, graph)
            } else {
                let reason = format!(
                    "depends on {} which is not present",
                    selector_list(&rule.depends_on)
                );
                tracing::debug!("Rule {} skipped: {}", definition.id, reason);
                RuleOutcome::NotApplicable(reason)
            }
        }
    }
}

fn text_mentions(texts: &[TextFragment], keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    texts.iter().any(|t| t.text.to_lowercase().contains(&keyword))
}

fn selector_list(selectors: &[EquipmentSelector]) -> String {
    selectors
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Each (target, reference) pair on the wrong side violates. Pairs on the
/// same coordinate do not.
fn check_position(rule: &CompiledRule, graph: &FlowGraph) -> Vec<Violation> {
    match rule.condition {
        Condition::Above | Condition::Below | Condition::UpstreamOf | Condition::DownstreamOf => {
            pairwise(rule, graph)
        }
        _ => Vec::new(),
    }
}

/// Sequence is judged along x, the drawn flow direction.
fn check_sequence(rule: &CompiledRule, graph: &FlowGraph) -> Vec<Violation> {
    match rule.condition {
        Condition::Before | Condition::After => pairwise(rule, graph),
        _ => Vec::new(),
    }
}

fn relation(condition: Condition) -> &'static str {
    match condition {
        Condition::Above => "above",
        Condition::Below => "below",
        Condition::UpstreamOf => "upstream of",
        Condition::DownstreamOf => "downstream of",
        Condition::Before => "before",
        Condition::After => "after",
        _ => "related to",
    }
}

fn on_wrong_side(condition: Condition, target: &Equipment, reference: &Equipment) -> bool {
    match condition {
        Condition::Above => target.y > reference.y,
        Condition::Below => target.y < reference.y,
        Condition::UpstreamOf | Condition::Before => target.x > reference.x,
        Condition::DownstreamOf | Condition::After => target.x < reference.x,
        _ => false,
    }
}

fn pairwise(rule: &CompiledRule, graph: &FlowGraph) -> Vec<Violation> {
    let targets = rule.select_targets(graph);
    let references = rule.select_references(graph);
    let mut violations = Vec::new();

    for target in &targets {
        for reference in &references {
            if target.id == reference.id || !on_wrong_side(rule.condition, target, reference) {
                continue;
            }
            violations.push(
                Violation::new(
                    &rule.definition,
                    format!(
                        "{} ({}) at ({:.0}, {:.0}) is not {} {} ({}) at ({:.0}, {:.0})",
                        target.label,
                        target.id,
                        target.x,
                        target.y,
                        relation(rule.condition),
                        reference.label,
                        reference.id,
                        reference.x,
                        reference.y
                    ),
                )
                .at(target.position())
                .affecting([target.id.as_str(), reference.id.as_str()]),
            );
        }
    }
    violations
}

fn check_existence(rule: &CompiledRule, graph: &FlowGraph) -> Vec<Violation> {
    if rule.condition != Condition::Required || !rule.select_targets(graph).is_empty() {
        return Vec::new();
    }
    vec![Violation::new(
        &rule.definition,
        format!("Required equipment not found: {}", selector_list(&rule.targets)),
    )]
}
