use std::fmt::Debug;

use log::*;

use crate::{
    cde_api::{
        errors::WalletApiError,
        has_role,
        wallet_objects::{DepositReceipt, WithdrawalReceipt},
    },
    db_types::{Caller, Cedi, CommissionRecord, Role, Wallet, WithdrawalRequest},
    events::{EventProducers, WithdrawalRequestedEvent},
    helpers::generate_two_factor_code,
    traits::DeliveryDatabase,
};

/// `WalletApi` is the stepper-facing view of the wallet ledger: balances, commission history, the withdrawal
/// workflow and security deposits. Funds only ever leave a wallet through an admin-approved withdrawal.
pub struct WalletApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> WalletApi<B>
where B: DeliveryDatabase
{
    /// The caller's wallet.
    pub async fn my_wallet(&self, caller: &Caller) -> Result<Wallet, WalletApiError> {
        let stepper_id = self.stepper_id_for(caller).await?;
        Ok(self.db.wallet_for_stepper(stepper_id).await?)
    }

    /// The caller's commission history, newest first.
    pub async fn my_commissions(&self, caller: &Caller) -> Result<Vec<CommissionRecord>, WalletApiError> {
        let stepper_id = self.stepper_id_for(caller).await?;
        Ok(self.db.commission_history(stepper_id).await?)
    }

    /// The caller's withdrawal requests that are still pending.
    pub async fn my_pending_withdrawals(&self, caller: &Caller) -> Result<Vec<WithdrawalRequest>, WalletApiError> {
        let stepper_id = self.stepper_id_for(caller).await?;
        Ok(self.db.pending_withdrawals(stepper_id).await?)
    }

    /// Request a withdrawal of `amount` from the caller's wallet.
    ///
    /// Funds are *earmarked*, not deducted: the request fails if `amount` exceeds the balance minus the sum of
    /// all withdrawals already pending, so a stepper can never queue up requests totalling more than they hold.
    /// A 6-digit verification code is generated once, stored on the request, and dispatched to the stepper by
    /// the email sink subscribed to the withdrawal event. Actual deduction happens at admin approval.
    pub async fn request_withdrawal(&self, caller: &Caller, amount: Cedi) -> Result<WithdrawalReceipt, WalletApiError> {
        let stepper_id = self.stepper_id_for(caller).await?;
        let code = generate_two_factor_code();
        let request = self.db.create_withdrawal(stepper_id, amount, code).await?;
        info!("💸️ Stepper #{stepper_id} requested a withdrawal of {amount} (request #{})", request.id);
        self.call_withdrawal_requested_hook(&request).await;
        let message =
            format!("Withdrawal request for {amount} submitted. A verification code has been sent to your email");
        Ok(WithdrawalReceipt::new(request, message))
    }

    /// Admin approves a pending withdrawal, deducting the funds. The balance is re-checked at approval time, so
    /// a request that was affordable when created can still bounce here if other approvals drained the wallet
    /// first; in that case the request stays `Pending` and nothing is deducted.
    pub async fn approve_withdrawal(&self, caller: &Caller, withdrawal_id: i64) -> Result<WithdrawalReceipt, WalletApiError> {
        if caller.role != Role::Admin {
            return Err(WalletApiError::Forbidden(Role::Admin));
        }
        let request = self.db.approve_withdrawal(withdrawal_id).await?;
        info!("💸️ Withdrawal #{withdrawal_id} approved, {} deducted from stepper #{}", request.amount, request.stepper_id);
        let message = format!("Withdrawal #{withdrawal_id} approved and {} deducted", request.amount);
        Ok(WithdrawalReceipt::new(request, message))
    }

    /// Admin rejects a pending withdrawal, optionally with a reason. No balance change, since funds were never
    /// deducted at request time.
    pub async fn reject_withdrawal(
        &self,
        caller: &Caller,
        withdrawal_id: i64,
        reason: Option<&str>,
    ) -> Result<WithdrawalReceipt, WalletApiError> {
        if caller.role != Role::Admin {
            return Err(WalletApiError::Forbidden(Role::Admin));
        }
        let request = self.db.reject_withdrawal(withdrawal_id, reason).await?;
        info!("💸️ Withdrawal #{withdrawal_id} rejected");
        Ok(WithdrawalReceipt::new(request, format!("Withdrawal #{withdrawal_id} rejected")))
    }

    /// Record a direct security-deposit contribution for the caller. Only the deposit principal is incremented;
    /// the spendable balance is untouched until the payment gateway confirms.
    pub async fn make_deposit(&self, caller: &Caller, amount: Cedi) -> Result<DepositReceipt, WalletApiError> {
        let stepper_id = self.stepper_id_for(caller).await?;
        let wallet = self.db.record_deposit(stepper_id, amount).await?;
        info!("💸️ Deposit of {amount} recorded for stepper #{stepper_id}");
        Ok(DepositReceipt::new(wallet, format!("Deposit of {amount} recorded")))
    }

    /// Gateway-confirmed deposit credit. No caller: this is driven by the payment provider's success webhook,
    /// which authenticates with the provider's signature upstream.
    pub async fn confirm_deposit(&self, stepper_id: i64, amount: Cedi) -> Result<DepositReceipt, WalletApiError> {
        let wallet = self.db.confirm_deposit(stepper_id, amount).await?;
        info!("💸️ Gateway confirmed a deposit of {amount} for stepper #{stepper_id}");
        Ok(DepositReceipt::new(wallet, format!("Deposit of {amount} confirmed and credited")))
    }

    async fn stepper_id_for(&self, caller: &Caller) -> Result<i64, WalletApiError> {
        if !has_role(caller, Role::Stepper) {
            return Err(WalletApiError::Forbidden(Role::Stepper));
        }
        let profile = self
            .db
            .stepper_by_user_id(&caller.user_id)
            .await?
            .ok_or_else(|| WalletApiError::StepperNotFound(caller.user_id.clone()))?;
        Ok(profile.id)
    }

    async fn call_withdrawal_requested_hook(&self, request: &WithdrawalRequest) {
        for emitter in &self.producers.withdrawal_producer {
            trace!("💸️ Notifying withdrawal hook subscribers");
            let event = WithdrawalRequestedEvent { request: request.clone() };
            emitter.publish_event(event).await;
        }
    }
}
