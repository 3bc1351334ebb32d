use thiserror::Error;

use crate::{
    db_types::Role,
    traits::{OrderFlowError, WalletLedgerError},
};

/// Errors that can occur on the wallet API surface.
#[derive(Debug, Error)]
pub enum WalletApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The caller does not have the required role ({0})")]
    Forbidden(Role),
    #[error("No stepper profile is registered for user {0}")]
    StepperNotFound(String),
    #[error(transparent)]
    LedgerError(#[from] WalletLedgerError),
}

impl From<OrderFlowError> for WalletApiError {
    fn from(e: OrderFlowError) -> Self {
        match e {
            OrderFlowError::WalletError(e) => Self::LedgerError(e),
            OrderFlowError::StepperNotFound(user_id) => Self::StepperNotFound(user_id),
            OrderFlowError::DatabaseError(e) => Self::DatabaseError(e),
            other => Self::DatabaseError(other.to_string()),
        }
    }
}
