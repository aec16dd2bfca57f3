//! Top-level error types for tollgate
//!
//! This module provides a simplified, user-facing error type that flattens
//! the per-module error enums into actionable categories.

use thiserror::Error;

use crate::config::ConfigError;
use crate::conversation::{ModelError, TurnError};
use crate::registry::RegistryError;
use crate::schema::SchemaError;
use crate::session::SessionError;
use crate::tool::ToolError;

/// Top-level error type for tollgate operations
///
/// - [`Error::Config`] - Fix the configuration file or environment
/// - [`Error::Registration`] - A tool could not be registered; fatal at startup
/// - [`Error::Tool`] - Tool execution failed
/// - [`Error::Model`] - The function-calling model failed
/// - [`Error::Session`] - The caller's session is gone
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (unreadable file, bad JSON)
    #[error("configuration error: {0}")]
    Config(String),

    /// Tool registration error (duplicate name, untranslatable schema)
    #[error("registration error: {0}")]
    Registration(String),

    /// Tool execution failed
    #[error("tool error: {0}")]
    Tool(String),

    /// Model error
    #[error("model error: {0}")]
    Model(String),

    /// Session closed or never opened
    #[error("session error: {0}")]
    Session(String),
}

impl Error {
    /// Returns true if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a registration error
    pub fn is_registration(&self) -> bool {
        matches!(self, Self::Registration(_))
    }

    /// Returns true if this is a tool error
    pub fn is_tool(&self) -> bool {
        matches!(self, Self::Tool(_))
    }

    /// Returns true if this is a model error
    pub fn is_model(&self) -> bool {
        matches!(self, Self::Model(_))
    }

    /// Returns true if this is a session error
    pub fn is_session(&self) -> bool {
        matches!(self, Self::Session(_))
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<RegistryError> for Error {
    fn from(err: RegistryError) -> Self {
        Self::Registration(err.to_string())
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Self::Registration(err.to_string())
    }
}

impl From<ToolError> for Error {
    fn from(err: ToolError) -> Self {
        Self::Tool(err.to_string())
    }
}

impl From<ModelError> for Error {
    fn from(err: ModelError) -> Self {
        Self::Model(err.to_string())
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        Self::Session(err.to_string())
    }
}

impl From<TurnError> for Error {
    fn from(err: TurnError) -> Self {
        match err {
            TurnError::Model(e) => e.into(),
            TurnError::Session(e) => e.into(),
            TurnError::TooManyRounds(n) => {
                Self::Model(format!("turn exceeded {} model rounds", n))
            }
        }
    }
}

/// Result type for tollgate operations
pub type Result<T> = std::result::Result<T, Error>;
