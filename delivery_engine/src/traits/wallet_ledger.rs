use thiserror::Error;

use crate::db_types::{Cedi, CommissionRecord, Wallet, WithdrawalRequest, WithdrawalStatus};

/// The stepper wallet ledger.
///
/// The wallet row is the single point of contention per stepper. Every balance-affecting method here must run as
/// one atomic unit under the database's native transaction isolation; no application-level locks are held.
#[allow(async_fn_in_trait)]
pub trait WalletLedger: Clone {
    /// Fetches the wallet for the given stepper.
    async fn wallet_for_stepper(&self, stepper_id: i64) -> Result<Wallet, WalletLedgerError>;

    /// All commission credits ever recorded for the stepper, newest first.
    async fn commission_history(&self, stepper_id: i64) -> Result<Vec<CommissionRecord>, WalletLedgerError>;

    /// All withdrawal requests for the stepper that are still pending.
    async fn pending_withdrawals(&self, stepper_id: i64) -> Result<Vec<WithdrawalRequest>, WalletLedgerError>;

    async fn withdrawal_by_id(&self, withdrawal_id: i64) -> Result<Option<WithdrawalRequest>, WalletLedgerError>;

    /// Creates a new withdrawal request in `Pending` status.
    ///
    /// In a single atomic transaction:
    /// * the wallet balance and the sum of all pending withdrawal amounts are read,
    /// * `available = balance - pending_sum` is checked against `amount`, failing with
    ///   [`WalletLedgerError::InsufficientBalance`] on a shortfall (no request row is created),
    /// * the request is inserted with the given 2FA code.
    ///
    /// Reading and inserting inside one transaction is what stops two concurrent requests from both observing a
    /// stale balance and both succeeding.
    async fn create_withdrawal(
        &self,
        stepper_id: i64,
        amount: Cedi,
        two_factor_code: String,
    ) -> Result<WithdrawalRequest, WalletLedgerError>;

    /// Approves a pending withdrawal and deducts the funds.
    ///
    /// The request must be `Pending`. In a single atomic transaction the wallet balance is re-read (it may have
    /// dropped since the request was created if other withdrawals were approved first), checked against the
    /// request amount, decremented, and the request marked `Approved` with `processed_at` set. On an
    /// [`WalletLedgerError::InsufficientBalance`] failure the request stays `Pending` and nothing is deducted.
    async fn approve_withdrawal(&self, withdrawal_id: i64) -> Result<WithdrawalRequest, WalletLedgerError>;

    /// Rejects a pending withdrawal. No balance change: funds were never deducted at request time.
    async fn reject_withdrawal(
        &self,
        withdrawal_id: i64,
        reason: Option<&str>,
    ) -> Result<WithdrawalRequest, WalletLedgerError>;

    /// Records a direct security-deposit contribution. Increments `deposit_amount` only; spendable balance is
    /// untouched. See [`Self::confirm_deposit`] for the gateway-confirmed path.
    async fn record_deposit(&self, stepper_id: i64, amount: Cedi) -> Result<Wallet, WalletLedgerError>;

    /// Credits a gateway-verified deposit. Increments both `deposit_amount` and `balance`, and stamps
    /// `investment_start_date` (first time only) and `last_growth_update` to mark the start of the
    /// interest-accrual period. Driven by the payment-gateway success webhook, not by user calls.
    async fn confirm_deposit(&self, stepper_id: i64, amount: Cedi) -> Result<Wallet, WalletLedgerError>;
}

#[derive(Debug, Clone, Error)]
pub enum WalletLedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("No wallet exists for stepper #{0}")]
    WalletNotFound(i64),
    #[error("Withdrawal request #{0} does not exist")]
    WithdrawalNotFound(i64),
    #[error("Insufficient available balance. Available: {available}, Pending withdrawals: {pending}")]
    InsufficientBalance { available: Cedi, pending: Cedi },
    #[error("Withdrawal request is {0}, expected Pending")]
    InvalidWithdrawalState(WithdrawalStatus),
    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Cedi),
}

impl From<sqlx::Error> for WalletLedgerError {
    fn from(e: sqlx::Error) -> Self {
        WalletLedgerError::DatabaseError(e.to_string())
    }
}
