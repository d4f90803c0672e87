use thiserror::Error;

use crate::model::ValidationError;
use crate::providers::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    User,
    RateLimited,
    Upstream,
    Runtime,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            Self::User => "user.invalid_input",
            Self::RateLimited => "user.rate_limited",
            Self::Upstream => "runtime.upstream_failed",
            Self::Runtime => "runtime.config_invalid",
        }
    }

    /// HTTP-style status carried in failure envelopes.
    pub fn status(self) -> u16 {
        match self {
            Self::User => 400,
            Self::RateLimited => 429,
            Self::Upstream => 502,
            Self::Runtime => 500,
        }
    }

    pub fn exit_code(self) -> i32 {
        match self {
            Self::User => 2,
            Self::RateLimited => 3,
            Self::Upstream | Self::Runtime => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AppError {
    pub fn user(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream, message)
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn status(&self) -> u16 {
        self.kind.status()
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AppError {}

impl From<ValidationError> for AppError {
    fn from(value: ValidationError) -> Self {
        Self::user(value.to_string())
    }
}

impl From<ProviderError> for AppError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::RateLimited { .. } => Self::rate_limited(value.to_string()),
            other => Self::upstream(other.to_string()),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::runtime(value.to_string())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing API key for provider {provider}: set {env}")]
    MissingApiKey {
        provider: &'static str,
        env: &'static str,
    },
    #[error("unknown weather provider '{0}': expected openweather or weatherstack")]
    UnknownProvider(String),
}
