//! `SqliteDatabase` is a concrete implementation of a delivery engine backend.
//!
//! Unsurprisingly, it uses SQLite and implements all the traits defined in the [`crate::traits`] module. Each
//! money-moving method opens one transaction; the wallet row (per stepper) and the order row (per order) are the
//! serialization points, via the database's own isolation rather than application locks.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, new_pool, orders, steppers, wallets, withdrawals};
use crate::{
    db_types::{
        Cedi,
        CommissionRecord,
        NewOrder,
        NewRating,
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        StepperProfile,
        Wallet,
        WithdrawalRequest,
        WithdrawalStatus,
    },
    order_objects::OrderQueryFilter,
    traits::{DeliveryDatabase, OrderFlowError, OrderManagement, WalletLedger, WalletLedgerError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl OrderManagement for SqliteDatabase {
    async fn order_by_id(&self, order_id: &OrderId) -> Result<Option<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_order_id(order_id, &mut conn).await
    }

    async fn available_orders(&self) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_available_orders(&mut conn).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        orders::search_orders(query, &mut conn).await
    }

    async fn order_items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut conn)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        orders::fetch_order_items(order.id, &mut conn).await
    }
}

impl DeliveryDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order [{}] has been saved in the DB with id {}", order.order_id, order.id);
        Ok(order)
    }

    async fn transition_order(
        &self,
        order_id: &OrderId,
        new_status: OrderStatus,
    ) -> Result<(Order, Option<Cedi>), OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let old_status = order.status;
        if !old_status.can_transition_to(new_status) {
            return Err(OrderFlowError::InvalidTransition { from: old_status, to: new_status });
        }
        orders::update_order_status(order.id, new_status, &mut tx).await?;
        // Crediting rides in the same transaction as the status write. The unique constraint on
        // commissions.order_id turns a repeated Delivered transition into a crediting no-op.
        let credited = match (new_status, order.stepper_id) {
            (OrderStatus::Delivered, Some(stepper_id)) => {
                wallets::credit_commission(&order, stepper_id, &mut tx).await.map_err(OrderFlowError::from)?
            },
            _ => None,
        };
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} moved {old_status} → {new_status}");
        Ok((order, credited))
    }

    async fn assign_stepper(&self, order_id: &OrderId, stepper_id: i64) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        let stepper = steppers::stepper_by_id(stepper_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::StepperNotFound(format!("#{stepper_id}")))?;
        if !stepper.is_available {
            return Err(OrderFlowError::StepperUnavailable(stepper_id));
        }
        // The IS NULL guard in the UPDATE decides the race; a pre-read of stepper_id would be stale by now.
        let n = orders::try_assign_stepper(order.id, stepper_id, &mut tx).await?;
        if n == 0 {
            info!("🗃️ Stepper #{stepper_id} lost the race for order {order_id}");
            return Err(OrderFlowError::AlreadyAssigned(order_id.clone()));
        }
        let order = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))?;
        tx.commit().await?;
        debug!("🗃️ Stepper #{stepper_id} assigned to order {order_id}");
        Ok(order)
    }

    async fn record_rating(&self, rating: NewRating) -> Result<Order, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_order_id(&rating.order_id, &mut tx)
            .await?
            .ok_or_else(|| OrderFlowError::OrderNotFound(rating.order_id.clone()))?;
        if order.status != OrderStatus::Completed {
            return Err(OrderFlowError::RatingNotAllowed(order.status));
        }
        orders::insert_rating(order.id, &rating, &mut tx).await?;
        if let (Some(_), Some(stepper_id)) = (rating.stepper_rating, order.stepper_id) {
            steppers::recalculate_rating(stepper_id, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Rating recorded for order {}", order.order_id);
        Ok(order)
    }

    async fn stepper_by_user_id(&self, user_id: &str) -> Result<Option<StepperProfile>, OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        steppers::stepper_by_user_id(user_id, &mut conn).await
    }

    async fn register_stepper(&self, user_id: &str) -> Result<StepperProfile, OrderFlowError> {
        let mut tx = self.pool.begin().await?;
        let stepper = steppers::insert_stepper(user_id, &mut tx).await?;
        let wallet = wallets::insert_wallet(stepper.id, &mut tx).await.map_err(OrderFlowError::from)?;
        tx.commit().await?;
        debug!("🗃️ Stepper #{} registered with wallet #{}", stepper.id, wallet.id);
        Ok(stepper)
    }

    async fn set_stepper_availability(&self, stepper_id: i64, available: bool) -> Result<(), OrderFlowError> {
        let mut conn = self.pool.acquire().await?;
        steppers::set_availability(stepper_id, available, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), OrderFlowError> {
        self.pool.close().await;
        Ok(())
    }
}

impl WalletLedger for SqliteDatabase {
    async fn wallet_for_stepper(&self, stepper_id: i64) -> Result<Wallet, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        wallets::wallet_for_stepper(stepper_id, &mut conn)
            .await?
            .ok_or(WalletLedgerError::WalletNotFound(stepper_id))
    }

    async fn commission_history(&self, stepper_id: i64) -> Result<Vec<CommissionRecord>, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        wallets::commission_history(stepper_id, &mut conn).await
    }

    async fn pending_withdrawals(&self, stepper_id: i64) -> Result<Vec<WithdrawalRequest>, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        withdrawals::pending_withdrawals(stepper_id, &mut conn).await
    }

    async fn withdrawal_by_id(&self, withdrawal_id: i64) -> Result<Option<WithdrawalRequest>, WalletLedgerError> {
        let mut conn = self.pool.acquire().await?;
        withdrawals::withdrawal_by_id(withdrawal_id, &mut conn).await
    }

    async fn create_withdrawal(
        &self,
        stepper_id: i64,
        amount: Cedi,
        two_factor_code: String,
    ) -> Result<WithdrawalRequest, WalletLedgerError> {
        if !amount.is_positive() {
            return Err(WalletLedgerError::InvalidAmount(amount));
        }
        let mut tx = self.pool.begin().await?;
        let wallet = wallets::wallet_for_stepper(stepper_id, &mut tx)
            .await?
            .ok_or(WalletLedgerError::WalletNotFound(stepper_id))?;
        let pending = withdrawals::pending_sum(stepper_id, &mut tx).await?;
        let available = wallet.balance - pending;
        if available < amount {
            // Dropping the transaction rolls it back; no request row survives a failed check.
            return Err(WalletLedgerError::InsufficientBalance { available, pending });
        }
        let request = withdrawals::insert_withdrawal(stepper_id, amount, &two_factor_code, &mut tx).await?;
        tx.commit().await?;
        Ok(request)
    }

    async fn approve_withdrawal(&self, withdrawal_id: i64) -> Result<WithdrawalRequest, WalletLedgerError> {
        let mut tx = self.pool.begin().await?;
        let request = withdrawals::withdrawal_by_id(withdrawal_id, &mut tx)
            .await?
            .ok_or(WalletLedgerError::WithdrawalNotFound(withdrawal_id))?;
        if request.status != WithdrawalStatus::Pending {
            return Err(WalletLedgerError::InvalidWithdrawalState(request.status));
        }
        // The balance may have dropped since the request was created, so it is checked again here, inside the
        // deduction transaction.
        let wallet = wallets::wallet_for_stepper(request.stepper_id, &mut tx)
            .await?
            .ok_or(WalletLedgerError::WalletNotFound(request.stepper_id))?;
        if wallet.balance < request.amount {
            let pending = withdrawals::pending_sum(request.stepper_id, &mut tx).await?;
            return Err(WalletLedgerError::InsufficientBalance { available: wallet.balance, pending });
        }
        wallets::debit_balance(request.stepper_id, request.amount, &mut tx).await?;
        let request = withdrawals::mark_processed(withdrawal_id, WithdrawalStatus::Approved, None, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Withdrawal #{withdrawal_id} approved; {} deducted from stepper #{}", request.amount, request.stepper_id);
        Ok(request)
    }

    async fn reject_withdrawal(
        &self,
        withdrawal_id: i64,
        reason: Option<&str>,
    ) -> Result<WithdrawalRequest, WalletLedgerError> {
        let mut tx = self.pool.begin().await?;
        let request = withdrawals::withdrawal_by_id(withdrawal_id, &mut tx)
            .await?
            .ok_or(WalletLedgerError::WithdrawalNotFound(withdrawal_id))?;
        if request.status != WithdrawalStatus::Pending {
            return Err(WalletLedgerError::InvalidWithdrawalState(request.status));
        }
        let request = withdrawals::mark_processed(withdrawal_id, WithdrawalStatus::Rejected, reason, &mut tx).await?;
        tx.commit().await?;
        Ok(request)
    }

    async fn record_deposit(&self, stepper_id: i64, amount: Cedi) -> Result<Wallet, WalletLedgerError> {
        if !amount.is_positive() {
            return Err(WalletLedgerError::InvalidAmount(amount));
        }
        let mut conn = self.pool.acquire().await?;
        wallets::record_deposit(stepper_id, amount, &mut conn).await
    }

    async fn confirm_deposit(&self, stepper_id: i64, amount: Cedi) -> Result<Wallet, WalletLedgerError> {
        if !amount.is_positive() {
            return Err(WalletLedgerError::InvalidAmount(amount));
        }
        let mut conn = self.pool.acquire().await?;
        wallets::confirm_deposit(stepper_id, amount, &mut conn).await
    }
}
