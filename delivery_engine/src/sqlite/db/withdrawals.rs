use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Cedi, WithdrawalRequest, WithdrawalStatus},
    traits::WalletLedgerError,
};

/// Sum of all pending withdrawal amounts for the stepper. Read this inside the same transaction as the balance
/// check; that is what makes the available-balance invariant hold under concurrent requests.
pub async fn pending_sum(stepper_id: i64, conn: &mut SqliteConnection) -> Result<Cedi, WalletLedgerError> {
    let total: (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount), 0) FROM withdrawals WHERE stepper_id = $1 AND status = 'Pending'",
    )
    .bind(stepper_id)
    .fetch_one(conn)
    .await?;
    Ok(Cedi::from_pesewas(total.0))
}

pub async fn pending_withdrawals(
    stepper_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<WithdrawalRequest>, WalletLedgerError> {
    let requests = sqlx::query_as::<_, WithdrawalRequest>(
        "SELECT * FROM withdrawals WHERE stepper_id = $1 AND status = 'Pending' ORDER BY created_at ASC, id ASC",
    )
    .bind(stepper_id)
    .fetch_all(conn)
    .await?;
    Ok(requests)
}

pub async fn withdrawal_by_id(
    withdrawal_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<WithdrawalRequest>, WalletLedgerError> {
    let request = sqlx::query_as::<_, WithdrawalRequest>("SELECT * FROM withdrawals WHERE id = $1")
        .bind(withdrawal_id)
        .fetch_optional(conn)
        .await?;
    Ok(request)
}

pub(crate) async fn insert_withdrawal(
    stepper_id: i64,
    amount: Cedi,
    two_factor_code: &str,
    conn: &mut SqliteConnection,
) -> Result<WithdrawalRequest, WalletLedgerError> {
    let request = sqlx::query_as::<_, WithdrawalRequest>(
        "INSERT INTO withdrawals (stepper_id, amount, two_factor_code) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(stepper_id)
    .bind(amount)
    .bind(two_factor_code)
    .fetch_one(conn)
    .await?;
    debug!("💸️ Withdrawal request #{} for {amount} created by stepper #{stepper_id}", request.id);
    Ok(request)
}

/// Stamps the terminal status and `processed_at` on a request. The caller has already verified the request is
/// Pending inside the surrounding transaction.
pub(crate) async fn mark_processed(
    withdrawal_id: i64,
    status: WithdrawalStatus,
    reason: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<WithdrawalRequest, WalletLedgerError> {
    let now = Utc::now();
    let request = sqlx::query_as::<_, WithdrawalRequest>(
        r#"
            UPDATE withdrawals
            SET status = $1, reason = COALESCE($2, reason), processed_at = $3
            WHERE id = $4
            RETURNING *
        "#,
    )
    .bind(status.to_string())
    .bind(reason)
    .bind(now)
    .bind(withdrawal_id)
    .fetch_optional(conn)
    .await?
    .ok_or(WalletLedgerError::WithdrawalNotFound(withdrawal_id))?;
    debug!("💸️ Withdrawal request #{withdrawal_id} marked {status}");
    Ok(request)
}
