//! error types for groundwave-types

use thiserror::Error;

/// errors from validating domain values and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// `GROUNDWAVE_ENV` held something other than development/production
    #[error("invalid runtime environment '{0}': expected development, dev, production or prod")]
    InvalidEnv(String),

    #[error("invalid role '{0}': expected admin or member")]
    InvalidRole(String),

    #[error("invalid chat platform '{0}'")]
    InvalidPlatform(String),

    #[error("invalid chat sender '{0}': expected me or them")]
    InvalidSender(String),

    /// chat messages must contain something besides whitespace
    #[error("chat message is empty")]
    EmptyMessage,

    /// a required setting was not provided by file, env or cli
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
