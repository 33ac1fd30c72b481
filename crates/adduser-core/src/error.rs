//! Error types for account provisioning.
//!
//! Every failure the tool can report is a variant of [`Error`]. Variants carry a stable machine
//! code and the process exit code the binary terminates with.

use thiserror::Error;

/// Main error type for provisioning operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The directory rejected the bind credentials
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// An entry for the login already exists
    #[error("User `{0}` already exists")]
    AccountAlreadyExists(String),

    /// Interactive input or account data failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The two password entries differ
    #[error("Passwords don't match")]
    PasswordMismatch,

    /// The operator declined the confirmation
    #[error("Account creation cancelled")]
    UserCancelled,

    /// Directory transport or schema failure
    #[error("Directory error: {message}")]
    DirectoryError {
        /// Message reported by the directory layer
        message: String,
    },

    /// Reading from or writing to the terminal failed
    #[error("Prompt failed: {0}")]
    PromptError(String),

    /// No numeric identifier above the observed maximum is representable
    #[error("No free uid number above {0}")]
    IdentifierExhausted(u32),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Specialized result type for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::AuthError(_) => "AUTH_ERROR",
            Self::AccountAlreadyExists(_) => "ACCOUNT_ALREADY_EXISTS",
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::PasswordMismatch => "PASSWORD_MISMATCH",
            Self::UserCancelled => "USER_CANCELLED",
            Self::DirectoryError { .. } => "DIRECTORY_ERROR",
            Self::PromptError(_) => "PROMPT_ERROR",
            Self::IdentifierExhausted(_) => "IDENTIFIER_EXHAUSTED",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the process exit code associated with this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::ConfigError(_) => 2,
            Self::AuthError(_) => 3,
            Self::AccountAlreadyExists(_) => 4,
            Self::UserCancelled => 5,
            _ => 1,
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::InternalError(_) | Self::ConfigError(_) | Self::DirectoryError { .. }
        )
    }

    /// Builds a [`Error::DirectoryError`] from any displayable message.
    #[must_use]
    pub fn directory(message: impl std::fmt::Display) -> Self {
        Self::DirectoryError {
            message: message.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(format!("invalid directory URL: {err}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::PromptError(err.to_string())
    }
}
