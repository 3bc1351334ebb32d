use serde::{Deserialize, Serialize};

use crate::db_types::{Wallet, WithdrawalRequest};

/// The result of a withdrawal operation: the request as stored, plus a confirmation message for the stepper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub request: WithdrawalRequest,
    pub message: String,
}

impl WithdrawalReceipt {
    pub fn new<S: Into<String>>(request: WithdrawalRequest, message: S) -> Self {
        Self { request, message: message.into() }
    }
}

/// The result of a deposit operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositReceipt {
    pub wallet: Wallet,
    pub message: String,
}

impl DepositReceipt {
    pub fn new<S: Into<String>>(wallet: Wallet, message: S) -> Self {
        Self { wallet, message: message.into() }
    }
}
