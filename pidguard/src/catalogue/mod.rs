//! Static catalogues: equipment/valve tag patterns and built-in rule records.

pub mod patterns;
pub mod rules;

use thiserror::Error;

pub use patterns::{PatternCatalogue, PatternSpec, ValveKind};
pub use rules::{builtin_rule, builtin_rules};

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("Failed to read catalogue: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalogue JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid tag pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Duplicate pattern priority {0}")]
    DuplicatePriority(u32),
}
