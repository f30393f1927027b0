//! Crate-level error type.
//!
//! No-match and hook cancellation are not errors: they surface as a
//! 404 `ResolvedRoute` and `NavigationOutcome::Cancelled`.

use thiserror::Error;

use crate::config::ConfigError;
use crate::location::InvalidUrlError;
use crate::marshal::MarshalError;
use crate::registry::{HistoryError, RegistryError};
use crate::routing::{HookError, PatternError};

#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    InvalidUrl(#[from] InvalidUrlError),

    #[error(transparent)]
    Marshal(#[from] MarshalError),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    History(#[from] HistoryError),
}

pub type Result<T, E = RouterError> = std::result::Result<T, E>;
