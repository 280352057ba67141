pub mod checks;
pub mod dynamic;
pub mod identifier;
pub mod rules;

pub use dynamic::{
    evaluate, evaluate_with_logic, infer_product_type, should_apply_rule, ManualReview, RuleOutcome,
};
pub use identifier::EquipmentIdentifier;
pub use rules::{CheckContext, Rule, RulesEngine, Violation};
