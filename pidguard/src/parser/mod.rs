pub mod normalize;
pub mod schema;

use thiserror::Error;

pub use schema::*;

/// Errors raised while normalising a raw drawing payload.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid structure: {0}")]
    Structure(String),

    #[error("Symbol '{0}' has neither x/y nor a bbox")]
    MissingPosition(String),
}
