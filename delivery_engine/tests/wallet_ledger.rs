use cde_common::Cedi;
use delivery_engine::{
    db_types::{Caller, Role, WithdrawalStatus},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    DeliveryDatabase,
    EventProducers,
    SqliteDatabase,
    WalletApi,
    WalletApiError,
    WalletLedger,
    WalletLedgerError,
};

async fn new_api() -> WalletApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    WalletApi::new(db, EventProducers::default())
}

/// Registers a stepper and puts `balance` of confirmed funds in their wallet.
async fn stepper_with_balance(api: &WalletApi<SqliteDatabase>, user_id: &str, balance: Cedi) -> i64 {
    let profile = api.db().register_stepper(user_id).await.unwrap();
    api.confirm_deposit(profile.id, balance).await.unwrap();
    profile.id
}

#[tokio::test]
async fn pending_withdrawals_earmark_the_balance() {
    let api = new_api().await;
    stepper_with_balance(&api, "kwame", Cedi::from_cedis(100)).await;
    let kwame = Caller::stepper("kwame");

    let first = api.request_withdrawal(&kwame, Cedi::from_cedis(60)).await.unwrap();
    assert_eq!(first.request.status, WithdrawalStatus::Pending);
    assert_eq!(first.request.two_factor_code.len(), 6);
    assert!(first.message.contains("verification code"), "got: {}", first.message);

    // 60 of the 100 is earmarked, so only 40 is available
    let err = api.request_withdrawal(&kwame, Cedi::from_cedis(50)).await.unwrap_err();
    match err {
        WalletApiError::LedgerError(WalletLedgerError::InsufficientBalance { available, pending }) => {
            assert_eq!(available, Cedi::from_cedis(40));
            assert_eq!(pending, Cedi::from_cedis(60));
        },
        e => panic!("unexpected error: {e}"),
    }
    // and nothing was deducted by either call
    let wallet = api.my_wallet(&kwame).await.unwrap();
    assert_eq!(wallet.balance, Cedi::from_cedis(100));

    api.request_withdrawal(&kwame, Cedi::from_cedis(30)).await.unwrap();
    assert_eq!(api.my_pending_withdrawals(&kwame).await.unwrap().len(), 2);
}

#[tokio::test]
async fn concurrent_requests_cannot_oversubscribe_the_balance() {
    let api = new_api().await;
    stepper_with_balance(&api, "kwame", Cedi::from_cedis(100)).await;
    let kwame = Caller::stepper("kwame");

    let rival = WalletApi::new(api.db().clone(), EventProducers::default());
    let race = tokio::spawn(async move {
        rival.request_withdrawal(&Caller::stepper("kwame"), Cedi::from_cedis(60)).await
    });
    let ours = api.request_withdrawal(&kwame, Cedi::from_cedis(60)).await;
    let theirs = race.await.unwrap();

    // Both requests saw a full balance when they started, but only one may land
    let successes = [ours.is_ok(), theirs.is_ok()].iter().filter(|s| **s).count();
    assert_eq!(successes, 1);
    let wallet = api.my_wallet(&kwame).await.unwrap();
    let pending: Cedi = api.my_pending_withdrawals(&kwame).await.unwrap().iter().map(|w| w.amount).sum();
    assert_eq!(pending, Cedi::from_cedis(60));
    assert!(pending <= wallet.balance, "pending {pending} exceeds balance {}", wallet.balance);
}

#[tokio::test]
async fn approval_deducts_and_rejection_does_not() {
    let api = new_api().await;
    let stepper_id = stepper_with_balance(&api, "adjoa", Cedi::from_cedis(100)).await;
    let adjoa = Caller::stepper("adjoa");
    let admin = Caller::admin("ops");

    let w1 = api.request_withdrawal(&adjoa, Cedi::from_cedis(60)).await.unwrap().request;
    let w2 = api.request_withdrawal(&adjoa, Cedi::from_cedis(30)).await.unwrap().request;

    let approved = api.approve_withdrawal(&admin, w1.id).await.unwrap().request;
    assert_eq!(approved.status, WithdrawalStatus::Approved);
    assert!(approved.processed_at.is_some());
    let wallet = api.db().wallet_for_stepper(stepper_id).await.unwrap();
    assert_eq!(wallet.balance, Cedi::from_cedis(40));
    // total_earned is lifetime earnings; withdrawals never touch it
    assert_eq!(wallet.total_earned, Cedi::zero());

    let rejected = api.reject_withdrawal(&admin, w2.id, Some("Momo number mismatch")).await.unwrap().request;
    assert_eq!(rejected.status, WithdrawalStatus::Rejected);
    assert_eq!(rejected.reason.as_deref(), Some("Momo number mismatch"));
    let wallet = api.db().wallet_for_stepper(stepper_id).await.unwrap();
    assert_eq!(wallet.balance, Cedi::from_cedis(40));

    // Processed requests cannot be processed again
    let err = api.approve_withdrawal(&admin, w2.id).await.unwrap_err();
    assert!(matches!(
        err,
        WalletApiError::LedgerError(WalletLedgerError::InvalidWithdrawalState(WithdrawalStatus::Rejected))
    ));
}

#[tokio::test]
async fn approval_rechecks_the_balance() {
    let api = new_api().await;
    let stepper_id = stepper_with_balance(&api, "kofi", Cedi::from_cedis(100)).await;
    let kofi = Caller::stepper("kofi");
    let admin = Caller::admin("ops");

    let request = api.request_withdrawal(&kofi, Cedi::from_cedis(80)).await.unwrap().request;
    // The wallet drains between request and approval (e.g. an adjustment applied directly by support)
    sqlx::query("UPDATE wallets SET balance = $1 WHERE stepper_id = $2")
        .bind(Cedi::from_cedis(20))
        .bind(stepper_id)
        .execute(api.db().pool())
        .await
        .unwrap();

    let err = api.approve_withdrawal(&admin, request.id).await.unwrap_err();
    assert!(matches!(err, WalletApiError::LedgerError(WalletLedgerError::InsufficientBalance { .. })));
    // The request survives, still pending, and nothing was deducted
    let pending = api.my_pending_withdrawals(&kofi).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, request.id);
    let wallet = api.db().wallet_for_stepper(stepper_id).await.unwrap();
    assert_eq!(wallet.balance, Cedi::from_cedis(20));
}

#[tokio::test]
async fn withdrawal_amounts_must_be_positive() {
    let api = new_api().await;
    stepper_with_balance(&api, "kwame", Cedi::from_cedis(100)).await;
    let kwame = Caller::stepper("kwame");
    let err = api.request_withdrawal(&kwame, Cedi::zero()).await.unwrap_err();
    assert!(matches!(err, WalletApiError::LedgerError(WalletLedgerError::InvalidAmount(_))));
    let err = api.request_withdrawal(&kwame, Cedi::from_cedis(-5)).await.unwrap_err();
    assert!(matches!(err, WalletApiError::LedgerError(WalletLedgerError::InvalidAmount(_))));
}

#[tokio::test]
async fn only_admins_process_withdrawals() {
    let api = new_api().await;
    stepper_with_balance(&api, "kwame", Cedi::from_cedis(100)).await;
    let kwame = Caller::stepper("kwame");
    let request = api.request_withdrawal(&kwame, Cedi::from_cedis(10)).await.unwrap().request;
    let err = api.approve_withdrawal(&kwame, request.id).await.unwrap_err();
    assert!(matches!(err, WalletApiError::Forbidden(Role::Admin)));
    let err = api.reject_withdrawal(&kwame, request.id, None).await.unwrap_err();
    assert!(matches!(err, WalletApiError::Forbidden(Role::Admin)));
}

#[tokio::test]
async fn users_without_a_stepper_profile_have_no_wallet() {
    let api = new_api().await;
    let err = api.my_wallet(&Caller::stepper("ghost")).await.unwrap_err();
    assert!(matches!(err, WalletApiError::StepperNotFound(_)));
    let err = api.my_wallet(&Caller::customer("ama")).await.unwrap_err();
    assert!(matches!(err, WalletApiError::Forbidden(Role::Stepper)));
}

#[tokio::test]
async fn direct_deposits_do_not_touch_the_spendable_balance() {
    let api = new_api().await;
    api.db().register_stepper("adjoa").await.unwrap();
    let adjoa = Caller::stepper("adjoa");

    let receipt = api.make_deposit(&adjoa, Cedi::from_cedis(50)).await.unwrap();
    assert_eq!(receipt.wallet.deposit_amount, Cedi::from_cedis(50));
    assert_eq!(receipt.wallet.balance, Cedi::zero());
    assert!(receipt.wallet.investment_start_date.is_none());
}

#[tokio::test]
async fn confirmed_deposits_credit_and_start_the_clock_once() {
    let api = new_api().await;
    let profile = api.db().register_stepper("kofi").await.unwrap();

    let first = api.confirm_deposit(profile.id, Cedi::from_cedis(50)).await.unwrap().wallet;
    assert_eq!(first.deposit_amount, Cedi::from_cedis(50));
    assert_eq!(first.balance, Cedi::from_cedis(50));
    let started = first.investment_start_date.expect("start date should be set");

    let second = api.confirm_deposit(profile.id, Cedi::from_cedis(25)).await.unwrap().wallet;
    assert_eq!(second.deposit_amount, Cedi::from_cedis(75));
    assert_eq!(second.balance, Cedi::from_cedis(75));
    // The accrual clock starts on the first confirmed deposit and stays put
    assert_eq!(second.investment_start_date, Some(started));
    assert!(second.last_growth_update.is_some());
}
