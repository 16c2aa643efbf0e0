use thiserror::Error;

use storefront_auth::AuthzError;
use storefront_core::DomainError;
use storefront_infra::command_dispatcher::DispatchError;
use storefront_infra::config::ConfigError;
use storefront_infra::event_store::EventStoreError;
use storefront_infra::projections::ProjectionError;

/// Coarse classification callers branch on (e.g. to pick a transport status).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidState,
    Validation,
    Forbidden,
    /// Lost an optimistic concurrency race; the caller may retry.
    Concurrency,
    Internal,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Forbidden(#[from] AuthzError),

    #[error("concurrent modification: {0}")]
    Concurrency(String),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_) => ErrorKind::Conflict,
            AppError::InvalidState(_) => ErrorKind::InvalidState,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Forbidden(_) => ErrorKind::Forbidden,
            AppError::Concurrency(_) => ErrorKind::Concurrency,
            AppError::Projection(_) | AppError::Config(_) | AppError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<DispatchError> for AppError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::NotFound(what) => AppError::NotFound(what),
            DispatchError::Conflict(msg) => AppError::Conflict(msg),
            DispatchError::InvalidState(msg) => AppError::InvalidState(msg),
            DispatchError::Validation(msg) => AppError::Validation(msg),
            DispatchError::Concurrency(msg) => AppError::Concurrency(msg),
            DispatchError::Unauthorized => AppError::Forbidden(AuthzError::NotOwner),
            other @ (DispatchError::Deserialize(_)
            | DispatchError::CorruptStream(_)
            | DispatchError::Store(_)
            | DispatchError::Publish(_)) => AppError::Internal(other.to_string()),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(value: DomainError) -> Self {
        DispatchError::from(value).into()
    }
}

impl From<EventStoreError> for AppError {
    fn from(value: EventStoreError) -> Self {
        DispatchError::from(value).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_their_kind() {
        assert_eq!(
            AppError::from(DomainError::conflict("already in cart")).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AppError::from(DomainError::invalid_state("out of stock")).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            AppError::from(DomainError::not_found("cart")).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn store_races_are_concurrency_errors() {
        let err = AppError::from(EventStoreError::Concurrency("expected 3, found 4".into()));
        assert_eq!(err.kind(), ErrorKind::Concurrency);
    }

    #[test]
    fn broken_streams_are_internal() {
        let err = AppError::from(DispatchError::CorruptStream("gap".into()));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
