use thiserror::Error;

use crate::models::Role;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("role {0} is not allowed to resolve alerts")]
    PermissionDenied(Role),
    #[error("alert not found: {0}")]
    NotFound(String),
    #[error("alert already resolved: {0}")]
    AlreadyResolved(String),
    #[error("alert store failed: {0}")]
    Store(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid thresholds: {0}")]
    InvalidThresholds(String),
}
