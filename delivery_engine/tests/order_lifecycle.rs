use std::sync::{Arc, Mutex};

use delivery_engine::{
    db_types::*,
    order_objects::OrderQueryFilter,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    DeliveryDatabase,
    EventHandlers,
    EventHooks,
    EventProducers,
    OrderFlowApi,
    OrderFlowError,
    OrderManagement,
    SqliteDatabase,
    WalletLedger,
    WalletLedgerError,
};

async fn new_api() -> OrderFlowApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    OrderFlowApi::new(db, EventProducers::default())
}

fn jollof_order(order_id: &str, customer: &str, vendor: &str) -> NewOrder {
    NewOrder::new(OrderId::from(order_id), customer.to_string(), vendor.to_string())
        .with_item("jollof-large", 2, Cedi::from_cedis(25))
        .with_item("sobolo", 1, Cedi::from_cedis(5))
        .with_delivery_address("Pentagon Hostel, Room 12")
}

#[tokio::test]
async fn full_lifecycle_credits_commission_exactly_once() {
    let api = new_api().await;
    let stepper = api.register_stepper("kwame").await.unwrap();
    let placed = api.process_new_order(jollof_order("ord-100", "ama", "auntie-muni")).await.unwrap();
    assert_eq!(placed.order.status, OrderStatus::Placed);
    assert_eq!(placed.order.total, Cedi::from_cedis(55));

    let oid = OrderId::from("ord-100");
    let rider = Caller::stepper("kwame");
    let vendor = Caller::vendor("auntie-muni");

    let accepted = api.accept_order(&rider, &oid).await.unwrap();
    assert_eq!(accepted.order.status, OrderStatus::Accepted);
    assert_eq!(accepted.order.stepper_id, Some(stepper.id));

    api.update_status(&vendor, &oid, OrderStatus::Preparing).await.unwrap();
    api.update_status(&vendor, &oid, OrderStatus::Ready).await.unwrap();
    api.update_status(&rider, &oid, OrderStatus::OutForDelivery).await.unwrap();
    let delivered = api.update_status(&rider, &oid, OrderStatus::Delivered).await.unwrap();
    // No delivery fee on the order, so the default GHC 5.00 fee applies: 80% of it is GHC 4.00
    assert!(delivered.message.contains("GHC 4.00 commission credited"), "got: {}", delivered.message);

    let wallet = api.db().wallet_for_stepper(stepper.id).await.unwrap();
    assert_eq!(wallet.balance, Cedi::from_cedis(4));
    assert_eq!(wallet.total_earned, Cedi::from_cedis(4));
    let history = api.db().commission_history(stepper.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, Cedi::from_cedis(4));

    // A repeated Delivered transition is rejected by the state machine and never re-credits
    let err = api.update_status(&rider, &oid, OrderStatus::Delivered).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidTransition { .. }));
    let wallet = api.db().wallet_for_stepper(stepper.id).await.unwrap();
    assert_eq!(wallet.balance, Cedi::from_cedis(4));

    let done = api.update_status(&vendor, &oid, OrderStatus::Completed).await.unwrap();
    assert_eq!(done.order.status, OrderStatus::Completed);
}

#[tokio::test]
async fn commission_uses_the_recorded_delivery_fee() {
    let api = new_api().await;
    let stepper = api.register_stepper("adjoa").await.unwrap();
    let order = jollof_order("ord-101", "ama", "auntie-muni").with_delivery_fee(Cedi::from_cedis(10));
    api.process_new_order(order).await.unwrap();

    let oid = OrderId::from("ord-101");
    let rider = Caller::stepper("adjoa");
    let vendor = Caller::vendor("auntie-muni");
    api.accept_order(&rider, &oid).await.unwrap();
    api.update_status(&vendor, &oid, OrderStatus::Preparing).await.unwrap();
    api.update_status(&vendor, &oid, OrderStatus::Ready).await.unwrap();
    api.update_status(&rider, &oid, OrderStatus::OutForDelivery).await.unwrap();
    api.update_status(&rider, &oid, OrderStatus::Delivered).await.unwrap();

    let wallet = api.db().wallet_for_stepper(stepper.id).await.unwrap();
    assert_eq!(wallet.balance, Cedi::from_cedis(8));
}

#[tokio::test]
async fn duplicate_order_ids_are_rejected() {
    let api = new_api().await;
    api.process_new_order(jollof_order("ord-102", "ama", "auntie-muni")).await.unwrap();
    let err = api.process_new_order(jollof_order("ord-102", "kofi", "auntie-muni")).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderAlreadyExists(_)));
}

#[tokio::test]
async fn edges_are_gated_by_role_and_ownership() {
    let api = new_api().await;
    api.register_stepper("kwame").await.unwrap();
    api.process_new_order(jollof_order("ord-103", "ama", "auntie-muni")).await.unwrap();
    let oid = OrderId::from("ord-103");

    // A customer cannot accept their own order on the vendor's behalf
    let err = api.update_status(&Caller::customer("ama"), &oid, OrderStatus::Accepted).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Forbidden(Role::Vendor)));
    // Nor can a different vendor
    let err = api.update_status(&Caller::vendor("chop-bar"), &oid, OrderStatus::Accepted).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Forbidden(Role::Vendor)));
    // The vendor on the order can
    api.update_status(&Caller::vendor("auntie-muni"), &oid, OrderStatus::Accepted).await.unwrap();
    // Admins may drive any legal edge
    api.update_status(&Caller::admin("ops"), &oid, OrderStatus::Preparing).await.unwrap();
    // Only the assigned stepper may take it out for delivery; this order has none
    api.update_status(&Caller::vendor("auntie-muni"), &oid, OrderStatus::Ready).await.unwrap();
    let err = api.update_status(&Caller::stepper("kwame"), &oid, OrderStatus::OutForDelivery).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Forbidden(Role::Stepper)));
}

#[tokio::test]
async fn illegal_jumps_are_rejected() {
    let api = new_api().await;
    api.process_new_order(jollof_order("ord-104", "ama", "auntie-muni")).await.unwrap();
    let oid = OrderId::from("ord-104");
    let err = api.update_status(&Caller::admin("ops"), &oid, OrderStatus::Delivered).await.unwrap_err();
    assert!(matches!(
        err,
        OrderFlowError::InvalidTransition { from: OrderStatus::Placed, to: OrderStatus::Delivered }
    ));
}

#[tokio::test]
async fn cancellation_window_closes_when_preparation_starts() {
    let api = new_api().await;
    api.process_new_order(jollof_order("ord-105", "ama", "auntie-muni")).await.unwrap();
    let oid = OrderId::from("ord-105");
    let vendor = Caller::vendor("auntie-muni");

    // Another customer cannot cancel someone else's order
    let err = api.cancel_order(&Caller::customer("kofi"), &oid).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::Forbidden(Role::Customer)));

    api.update_status(&vendor, &oid, OrderStatus::Accepted).await.unwrap();
    api.update_status(&vendor, &oid, OrderStatus::Preparing).await.unwrap();
    let err = api.cancel_order(&Caller::customer("ama"), &oid).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::CancellationBlocked(OrderStatus::Preparing)));

    // A fresh order cancels fine, and the record survives
    api.process_new_order(jollof_order("ord-106", "ama", "auntie-muni")).await.unwrap();
    let oid = OrderId::from("ord-106");
    let cancelled = api.cancel_order(&Caller::customer("ama"), &oid).await.unwrap();
    assert_eq!(cancelled.order.status, OrderStatus::Cancelled);
    let order = api.db().order_by_id(&oid).await.unwrap();
    assert!(order.is_some());
}

#[tokio::test]
async fn an_order_takes_exactly_one_stepper() {
    let api = new_api().await;
    api.register_stepper("kwame").await.unwrap();
    api.register_stepper("adjoa").await.unwrap();
    api.process_new_order(jollof_order("ord-107", "ama", "auntie-muni")).await.unwrap();
    let oid = OrderId::from("ord-107");

    api.accept_order(&Caller::stepper("kwame"), &oid).await.unwrap();
    let err = api.accept_order(&Caller::stepper("adjoa"), &oid).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::AlreadyAssigned(_)));
}

#[tokio::test]
async fn new_steppers_can_claim_orders_right_away() {
    let api = new_api().await;
    let profile = api.register_stepper("kwame").await.unwrap();
    assert!(profile.is_available);
    api.process_new_order(jollof_order("ord-109", "ama", "auntie-muni")).await.unwrap();
    let accepted = api.accept_order(&Caller::stepper("kwame"), &OrderId::from("ord-109")).await.unwrap();
    assert_eq!(accepted.order.stepper_id, Some(profile.id));
}

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let api = new_api().await;
    api.register_stepper("kwame").await.unwrap();
    api.register_stepper("adjoa").await.unwrap();
    api.process_new_order(jollof_order("ord-150", "ama", "auntie-muni")).await.unwrap();
    let oid = OrderId::from("ord-150");

    let rival = OrderFlowApi::new(api.db().clone(), EventProducers::default());
    let rival_oid = oid.clone();
    let race = tokio::spawn(async move { rival.accept_order(&Caller::stepper("adjoa"), &rival_oid).await });
    let ours = api.accept_order(&Caller::stepper("kwame"), &oid).await;
    let theirs = race.await.unwrap();

    let winners = [&ours, &theirs].iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "ours: {ours:?}, theirs: {theirs:?}");
    // Whoever lost, the order ends up Accepted with exactly one stepper on it
    let order = api.db().order_by_id(&oid).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Accepted);
    assert!(order.stepper_id.is_some());
}

#[tokio::test]
async fn a_failed_commission_credit_rolls_back_the_delivery() {
    let api = new_api().await;
    let stepper = api.register_stepper("kwame").await.unwrap();
    api.process_new_order(jollof_order("ord-160", "ama", "auntie-muni")).await.unwrap();
    let oid = OrderId::from("ord-160");
    let rider = Caller::stepper("kwame");
    let vendor = Caller::vendor("auntie-muni");
    api.accept_order(&rider, &oid).await.unwrap();
    api.update_status(&vendor, &oid, OrderStatus::Preparing).await.unwrap();
    api.update_status(&vendor, &oid, OrderStatus::Ready).await.unwrap();
    api.update_status(&rider, &oid, OrderStatus::OutForDelivery).await.unwrap();

    // The wallet row vanishes out-of-band
    sqlx::query("DELETE FROM wallets WHERE stepper_id = $1")
        .bind(stepper.id)
        .execute(api.db().pool())
        .await
        .unwrap();

    let err = api.update_status(&rider, &oid, OrderStatus::Delivered).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::WalletError(WalletLedgerError::WalletNotFound(_))));
    // The status write and the commission row rolled back together
    let order = api.db().order_by_id(&oid).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::OutForDelivery);
    assert!(api.db().commission_history(stepper.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unavailable_steppers_cannot_take_orders() {
    let api = new_api().await;
    api.register_stepper("kwame").await.unwrap();
    api.set_availability(&Caller::stepper("kwame"), false).await.unwrap();
    api.process_new_order(jollof_order("ord-108", "ama", "auntie-muni")).await.unwrap();
    let err = api.accept_order(&Caller::stepper("kwame"), &OrderId::from("ord-108")).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::StepperUnavailable(_)));
}

#[tokio::test]
async fn available_orders_are_unassigned_and_oldest_first() {
    let api = new_api().await;
    api.register_stepper("kwame").await.unwrap();
    for i in 0..3 {
        api.process_new_order(jollof_order(&format!("ord-11{i}"), "ama", "auntie-muni")).await.unwrap();
    }
    api.accept_order(&Caller::stepper("kwame"), &OrderId::from("ord-110")).await.unwrap();

    let available = api.available_orders().await.unwrap();
    let ids = available.iter().map(|o| o.order_id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["ord-111", "ord-112"]);
}

#[tokio::test]
async fn orders_can_be_searched_and_itemised() {
    let api = new_api().await;
    api.process_new_order(jollof_order("ord-130", "ama", "auntie-muni")).await.unwrap();
    api.process_new_order(jollof_order("ord-131", "kofi", "auntie-muni")).await.unwrap();
    let oid = OrderId::from("ord-131");
    api.cancel_order(&Caller::customer("kofi"), &oid).await.unwrap();

    let query = OrderQueryFilter::default().with_customer_id("kofi").with_status(OrderStatus::Cancelled);
    let found = api.db().search_orders(query).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].order_id, oid);

    let query = OrderQueryFilter::default().with_vendor_id("auntie-muni");
    assert_eq!(api.db().search_orders(query).await.unwrap().len(), 2);

    let items = api.db().order_items(&oid).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].product_id, "jollof-large");
    assert_eq!(items[0].price * items[0].quantity + items[1].price * items[1].quantity, found[0].total);
}

#[tokio::test]
async fn status_events_fire_after_each_transition() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let mut hooks = EventHooks::default();
    hooks.on_order_status_changed(move |ev| {
        let sink = Arc::clone(&sink);
        Box::pin(async move {
            sink.lock().unwrap().push((ev.old_status, ev.order.status, ev.customer_message));
        })
    });
    let mut handlers = EventHandlers::new(10, hooks);
    let api = OrderFlowApi::new(db, handlers.producers());

    api.register_stepper("kwame").await.unwrap();
    api.process_new_order(jollof_order("ord-140", "ama", "auntie-muni")).await.unwrap();
    let oid = OrderId::from("ord-140");
    api.accept_order(&Caller::stepper("kwame"), &oid).await.unwrap();
    api.update_status(&Caller::vendor("auntie-muni"), &oid, OrderStatus::Preparing).await.unwrap();

    // Dropping the api drops the producers, which lets the handler drain and shut down
    drop(api);
    handlers.on_order_status_changed.take().unwrap().start_handler().await;

    let events = seen.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!((events[0].0, events[0].1), (OrderStatus::Placed, OrderStatus::Accepted));
    assert_eq!(events[0].2, "Your order has been accepted by the vendor");
    assert_eq!((events[1].0, events[1].1), (OrderStatus::Accepted, OrderStatus::Preparing));
    assert_eq!(events[1].2, "Your order is being prepared");
}

#[tokio::test]
async fn ratings_require_a_completed_order_and_happen_once() {
    let api = new_api().await;
    let stepper = api.register_stepper("kwame").await.unwrap();
    api.process_new_order(jollof_order("ord-120", "ama", "auntie-muni")).await.unwrap();
    let oid = OrderId::from("ord-120");
    let rider = Caller::stepper("kwame");
    let vendor = Caller::vendor("auntie-muni");
    let customer = Caller::customer("ama");

    api.accept_order(&rider, &oid).await.unwrap();
    let early = NewRating::for_order(oid.clone()).with_stepper_rating(5);
    let err = api.rate_order(&customer, early).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::RatingNotAllowed(OrderStatus::Accepted)));

    api.update_status(&vendor, &oid, OrderStatus::Preparing).await.unwrap();
    api.update_status(&vendor, &oid, OrderStatus::Ready).await.unwrap();
    api.update_status(&rider, &oid, OrderStatus::OutForDelivery).await.unwrap();
    api.update_status(&rider, &oid, OrderStatus::Delivered).await.unwrap();
    api.update_status(&vendor, &oid, OrderStatus::Completed).await.unwrap();

    let rating = NewRating::for_order(oid.clone()).with_stepper_rating(4).with_comment("Fast and friendly");
    api.rate_order(&customer, rating).await.unwrap();
    let profile = api.db().stepper_by_user_id("kwame").await.unwrap().unwrap();
    assert_eq!(profile.rating, 4.0);
    assert_eq!(profile.id, stepper.id);

    let again = NewRating::for_order(oid.clone()).with_stepper_rating(1);
    let err = api.rate_order(&customer, again).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::AlreadyRated(_)));
}
