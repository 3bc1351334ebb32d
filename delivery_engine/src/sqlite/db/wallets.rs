use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Cedi, CommissionRecord, Order, Wallet},
    traits::WalletLedgerError,
};

/// Creates the zeroed wallet for a freshly registered stepper. Call inside the same transaction as the stepper
/// profile insert.
pub async fn insert_wallet(stepper_id: i64, conn: &mut SqliteConnection) -> Result<Wallet, WalletLedgerError> {
    let wallet = sqlx::query_as::<_, Wallet>("INSERT INTO wallets (stepper_id) VALUES ($1) RETURNING *")
        .bind(stepper_id)
        .fetch_one(conn)
        .await?;
    Ok(wallet)
}

pub async fn wallet_for_stepper(stepper_id: i64, conn: &mut SqliteConnection) -> Result<Option<Wallet>, WalletLedgerError> {
    let wallet = sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE stepper_id = $1")
        .bind(stepper_id)
        .fetch_optional(conn)
        .await?;
    Ok(wallet)
}

pub async fn commission_history(
    stepper_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionRecord>, WalletLedgerError> {
    let history = sqlx::query_as::<_, CommissionRecord>(
        "SELECT * FROM commissions WHERE stepper_id = $1 ORDER BY created_at DESC, id DESC",
    )
    .bind(stepper_id)
    .fetch_all(conn)
    .await?;
    Ok(history)
}

/// Credits the delivery commission for an order to the given stepper's wallet.
///
/// The commission row insert and the wallet increment run on the same connection; embed this call in a
/// transaction to make them one atomic unit. `INSERT OR IGNORE` against the `UNIQUE(order_id)` constraint is the
/// idempotency guard: if the order was already credited, nothing is inserted, the wallet is untouched, and
/// `None` is returned.
pub(crate) async fn credit_commission(
    order: &Order,
    stepper_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Cedi>, WalletLedgerError> {
    let commission = order.commission();
    let result = sqlx::query("INSERT OR IGNORE INTO commissions (order_id, stepper_id, amount) VALUES ($1, $2, $3)")
        .bind(order.id)
        .bind(stepper_id)
        .bind(commission)
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        trace!("💰️ Order {} was already credited. Skipping.", order.order_id);
        return Ok(None);
    }
    let updated = sqlx::query(
        r#"
            UPDATE wallets SET
                balance = balance + $1,
                total_earned = total_earned + $1,
                updated_at = CURRENT_TIMESTAMP
            WHERE stepper_id = $2
        "#,
    )
    .bind(commission)
    .bind(stepper_id)
    .execute(conn)
    .await?;
    // A commission row without the matching wallet increment must never commit.
    if updated.rows_affected() == 0 {
        return Err(WalletLedgerError::WalletNotFound(stepper_id));
    }
    debug!("💰️ {commission} commission credited to stepper #{stepper_id} for order {}", order.order_id);
    Ok(Some(commission))
}

/// Deducts an approved withdrawal from the wallet balance. Returns the updated wallet.
pub(crate) async fn debit_balance(
    stepper_id: i64,
    amount: Cedi,
    conn: &mut SqliteConnection,
) -> Result<Wallet, WalletLedgerError> {
    let wallet = sqlx::query_as::<_, Wallet>(
        r#"
            UPDATE wallets SET
                balance = balance - $1,
                updated_at = CURRENT_TIMESTAMP
            WHERE stepper_id = $2
            RETURNING *
        "#,
    )
    .bind(amount)
    .bind(stepper_id)
    .fetch_optional(conn)
    .await?
    .ok_or(WalletLedgerError::WalletNotFound(stepper_id))?;
    Ok(wallet)
}

/// Records direct security-deposit principal. Only `deposit_amount` moves; the spendable balance is untouched.
pub async fn record_deposit(
    stepper_id: i64,
    amount: Cedi,
    conn: &mut SqliteConnection,
) -> Result<Wallet, WalletLedgerError> {
    let wallet = sqlx::query_as::<_, Wallet>(
        r#"
            UPDATE wallets SET
                deposit_amount = deposit_amount + $1,
                updated_at = CURRENT_TIMESTAMP
            WHERE stepper_id = $2
            RETURNING *
        "#,
    )
    .bind(amount)
    .bind(stepper_id)
    .fetch_optional(conn)
    .await?
    .ok_or(WalletLedgerError::WalletNotFound(stepper_id))?;
    debug!("💰️ {amount} deposit principal recorded for stepper #{stepper_id}");
    Ok(wallet)
}

/// Credits a gateway-verified deposit: principal and spendable balance both move, and the accrual clock is
/// stamped. `investment_start_date` is only set the first time.
pub async fn confirm_deposit(
    stepper_id: i64,
    amount: Cedi,
    conn: &mut SqliteConnection,
) -> Result<Wallet, WalletLedgerError> {
    let wallet = sqlx::query_as::<_, Wallet>(
        r#"
            UPDATE wallets SET
                deposit_amount = deposit_amount + $1,
                balance = balance + $1,
                investment_start_date = COALESCE(investment_start_date, CURRENT_TIMESTAMP),
                last_growth_update = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE stepper_id = $2
            RETURNING *
        "#,
    )
    .bind(amount)
    .bind(stepper_id)
    .fetch_optional(conn)
    .await?
    .ok_or(WalletLedgerError::WalletNotFound(stepper_id))?;
    debug!("💰️ {amount} gateway deposit confirmed for stepper #{stepper_id}");
    Ok(wallet)
}
