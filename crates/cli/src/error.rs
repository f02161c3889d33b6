//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file could not be loaded
    #[error("Failed to load configuration from {path}: {message}")]
    ConfigLoad { path: String, message: String },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    /// A component could not be started (fatal before Running)
    #[error("Failed to start {component}: {message}")]
    Startup {
        component: &'static str,
        message: String,
    },

    /// Graceful shutdown error
    #[error("Error during shutdown: {message}")]
    Shutdown { message: String },
}

impl CliError {
    pub fn config_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn config_validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    pub fn startup(component: &'static str, message: impl ToString) -> Self {
        Self::Startup {
            component,
            message: message.to_string(),
        }
    }

    pub fn shutdown(message: impl ToString) -> Self {
        Self::Shutdown {
            message: message.to_string(),
        }
    }
}
