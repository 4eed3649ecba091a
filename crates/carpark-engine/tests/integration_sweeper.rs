//! Background maintenance: expiring transactions and retiring subscriptions

mod common;

use carpark_engine::EngineError;
use carpark_types::{
    FailureReason, PaymentMethod, SessionStatus, SlotStatus, SubscriptionStatus, TransactionStatus,
    VehicleType,
};
use chrono::Duration;
use common::{customer, Harness};

#[tokio::test]
async fn test_sweep_expires_stale_pending_transactions() {
    let h = Harness::new().await;
    h.provision(0, 2).await;

    let session = h
        .engine
        .sessions
        .check_in("29A-12345", VehicleType::Car)
        .await
        .unwrap();
    let txn = h
        .engine
        .sessions
        .checkout(&session.vehicle_id, PaymentMethod::Cash, "exit".into())
        .await
        .unwrap()
        .transaction
        .unwrap();

    // Too early: nothing to do.
    h.clock.advance(Duration::minutes(10));
    assert_eq!(h.engine.sweeper.sweep_transactions().await.unwrap(), 0);

    h.clock.advance(Duration::minutes(21));
    assert_eq!(h.engine.sweeper.sweep_transactions().await.unwrap(), 1);

    let row = h.engine.transactions.get(&txn.transaction_id).await.unwrap();
    assert_eq!(row.status, TransactionStatus::Failed);
    assert_eq!(row.failure_reason, Some(FailureReason::Expired));

    // The expiry is announced, not just logged.
    assert_eq!(h.notifier.expired_transactions(), vec![txn.transaction_id]);

    // The vehicle itself is untouched; only the payment attempt died.
    let open = h.engine.sessions.get_session(&session.vehicle_id).await.unwrap();
    assert_eq!(open.status, SessionStatus::Parking);
}

#[tokio::test]
async fn test_sweep_beats_a_late_settlement() {
    let h = Harness::new().await;
    h.provision(0, 1).await;

    let session = h
        .engine
        .sessions
        .check_in("29A-12345", VehicleType::Car)
        .await
        .unwrap();
    let txn = h
        .engine
        .sessions
        .checkout(&session.vehicle_id, PaymentMethod::Card, "exit".into())
        .await
        .unwrap()
        .transaction
        .unwrap();

    h.clock.advance(Duration::minutes(31));
    h.engine.sweeper.sweep_transactions().await.unwrap();

    // A stale gateway callback arrives after the sweep: terminal guard wins.
    let err = h.engine.transactions.settle(&txn.transaction_id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::AlreadyTerminal { status: TransactionStatus::Failed, .. }
    ));
}

#[tokio::test]
async fn test_sweep_retires_lapsed_subscription_and_frees_slot() {
    let h = Harness::new().await;
    h.provision(0, 2).await;

    let receipt = h
        .engine
        .subscriptions
        .register(carpark_engine::RegisterSubscription {
            license_plate: "51H-99999".to_string(),
            vehicle_type: VehicleType::Car,
            customer: customer(),
            months: 1,
            method: PaymentMethod::Cash,
            idempotency_key: "reg-1".into(),
        })
        .await
        .unwrap();
    let vehicle_id = receipt.subscription.vehicle_id.clone();
    let slot_id = receipt.subscription.fixed_slot_id.clone().unwrap();

    h.clock.advance(Duration::days(40));
    assert_eq!(h.engine.sweeper.sweep_subscriptions().await.unwrap(), 1);
    // A second pass finds nothing left.
    assert_eq!(h.engine.sweeper.sweep_subscriptions().await.unwrap(), 0);

    let sub = h.engine.subscriptions.get(&vehicle_id).await.unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Expired);
    let slot = h.engine.slots.get(&slot_id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Available);
    assert_eq!(h.notifier.expired(), vec![vehicle_id]);
}

#[tokio::test]
async fn test_occupied_fixed_slot_frees_on_exit_not_on_sweep() {
    let h = Harness::new().await;
    h.provision(0, 2).await;

    let receipt = h
        .engine
        .subscriptions
        .register(carpark_engine::RegisterSubscription {
            license_plate: "51H-99999".to_string(),
            vehicle_type: VehicleType::Car,
            customer: customer(),
            months: 1,
            method: PaymentMethod::Cash,
            idempotency_key: "reg-1".into(),
        })
        .await
        .unwrap();
    let slot_id = receipt.subscription.fixed_slot_id.clone().unwrap();

    let session = h
        .engine
        .sessions
        .check_in("51H-99999", VehicleType::Car)
        .await
        .unwrap();

    // The package lapses while the car is parked in its slot.
    h.clock.advance(Duration::days(40));
    assert_eq!(h.engine.sweeper.sweep_subscriptions().await.unwrap(), 1);

    let slot = h.engine.slots.get(&slot_id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Occupied);

    // The exit finally releases the slot to the general pool.
    h.engine
        .sessions
        .checkout(&session.vehicle_id, PaymentMethod::Cash, "exit".into())
        .await
        .unwrap();
    let slot = h.engine.slots.get(&slot_id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Available);
}

#[tokio::test]
async fn test_expiry_warnings_cover_only_the_window() {
    let h = Harness::new().await;
    h.provision(0, 3).await;

    // Ends in ~1 month: outside the 3-day window.
    h.engine
        .subscriptions
        .register(carpark_engine::RegisterSubscription {
            license_plate: "51H-11111".to_string(),
            vehicle_type: VehicleType::Car,
            customer: customer(),
            months: 1,
            method: PaymentMethod::Cash,
            idempotency_key: "reg-far".into(),
        })
        .await
        .unwrap();

    assert!(h.engine.sweeper.warn_expiring().await.unwrap().is_empty());

    // Walk to two days before the end date.
    h.clock.advance(Duration::days(29));
    let expiring = h.engine.sweeper.warn_expiring().await.unwrap();
    assert_eq!(expiring.len(), 1);
    assert_eq!(expiring[0].license_plate, "51H-11111");

    let warned = h.notifier.warned();
    assert_eq!(warned.len(), 1);
    assert!(warned[0].1 <= 3, "warning landed outside the window");
}
