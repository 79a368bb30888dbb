//! Error types for Setlog

use thiserror::Error;

/// Result type alias using Setlog's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Setlog error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Session errors (E001-E099)
    #[error("Another workout session owner is already live in this process.")]
    SessionOwnerBusy,

    #[error("No workout in progress. Start one with `setlog start`.")]
    NoActiveSession,

    #[error("Exercise '{0}' not found in the current workout. Run `setlog status` to see the roster.")]
    ExerciseNotFound(String),

    #[error("Set {1} not found for exercise '{0}'.")]
    SetNotFound(String, usize),

    // Template errors (E100-E199)
    #[error("Workout template is invalid: {0}")]
    TemplateInvalid(String),

    // Storage errors (E400-E499)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    Config(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Runtime errors (E900-E999)
    #[error("Runtime error: {0}")]
    Runtime(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionOwnerBusy => "E001",
            Self::NoActiveSession => "E002",
            Self::ExerciseNotFound(_) => "E003",
            Self::SetNotFound(..) => "E004",
            Self::TemplateInvalid(_) => "E100",
            Self::Database(_) => "E400",
            Self::Storage(_) => "E401",
            Self::Serialization(_) => "E402",
            Self::Config(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Runtime(_) => "E900",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NoActiveSession => Some("setlog start".to_string()),
            Self::ExerciseNotFound(_) | Self::SetNotFound(..) => Some("setlog status".to_string()),
            Self::Config(_) => Some("setlog config list".to_string()),
            _ => None,
        }
    }
}
