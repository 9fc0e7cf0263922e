//! Service error types

use thiserror::Error;

use crate::model::ModelError;
use crate::store::StoreError;

/// Errors behind a failed service operation
///
/// Public operations report these through the notifier; the type shows up in
/// logs and in the internal `try_*` helpers.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
