//! Error types for KshetraNav

use thiserror::Error;

use crate::planning::PlanError;

/// KshetraNav error type
#[derive(Error, Debug)]
pub enum NavError {
    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("No map snapshot loaded")]
    NoMap,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Planning failed: {0}")]
    Plan(#[from] PlanError),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
