//! Payment state machine: idempotency, terminal protection, expiry

mod common;

use carpark_engine::EngineError;
use carpark_types::{
    FailureReason, PaymentMethod, SessionStatus, TransactionKind, TransactionStatus, VehicleType,
};
use chrono::Duration;
use common::Harness;

#[tokio::test]
async fn test_checkout_is_idempotent_on_key() {
    let h = Harness::new().await;
    h.provision(0, 1).await;

    let session = h
        .engine
        .sessions
        .check_in("29A-12345", VehicleType::Car)
        .await
        .unwrap();

    let first = h
        .engine
        .sessions
        .checkout(&session.vehicle_id, PaymentMethod::Card, "kiosk-42".into())
        .await
        .unwrap()
        .transaction
        .unwrap();

    // The kiosk retries: same key, same transaction, no second charge.
    let second = h
        .engine
        .sessions
        .checkout(&session.vehicle_id, PaymentMethod::Card, "kiosk-42".into())
        .await
        .unwrap()
        .transaction
        .unwrap();
    assert_eq!(first.transaction_id, second.transaction_id);
    assert_eq!(first.amount, second.amount);
    assert_eq!(second.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn test_completed_transaction_is_immutable() {
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
        .checkout(&session.vehicle_id, PaymentMethod::Cash, "exit".into())
        .await
        .unwrap()
        .transaction
        .unwrap();
    h.engine.sessions.complete_checkout(&txn.transaction_id).await.unwrap();

    // Settling again hits the terminal guard.
    let err = h.engine.transactions.settle(&txn.transaction_id).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::AlreadyTerminal { status: TransactionStatus::Completed, .. }
    ));

    // So does an operator cancel.
    let err = h.engine.transactions.cancel(&txn.transaction_id).await.unwrap_err();
    assert!(err.is_conflict());

    // A re-run of complete_checkout is a harmless resume, not a second charge.
    let closed = h
        .engine
        .sessions
        .complete_checkout(&txn.transaction_id)
        .await
        .unwrap();
    assert_eq!(closed.status, SessionStatus::Exited);

    // Exactly one completion event went out across all of that.
    assert_eq!(h.notifier.completed_transactions(), vec![txn.transaction_id]);
}

#[tokio::test]
async fn test_expired_pending_cannot_complete_and_session_stays_open() {
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
        .checkout(&session.vehicle_id, PaymentMethod::Cash, "exit-1".into())
        .await
        .unwrap()
        .transaction
        .unwrap();

    // The customer wanders off past the pending TTL.
    h.clock.advance(Duration::minutes(31));

    let err = h
        .engine
        .sessions
        .complete_checkout(&txn.transaction_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TransactionExpired(_)));

    let row = h.engine.transactions.get(&txn.transaction_id).await.unwrap();
    assert_eq!(row.status, TransactionStatus::Failed);
    assert_eq!(row.failure_reason, Some(FailureReason::Expired));

    // The vehicle is still physically inside; a fresh checkout succeeds.
    let open = h.engine.sessions.get_session(&session.vehicle_id).await.unwrap();
    assert_eq!(open.status, SessionStatus::Parking);

    let retry = h
        .engine
        .sessions
        .checkout(&session.vehicle_id, PaymentMethod::Cash, "exit-2".into())
        .await
        .unwrap()
        .transaction
        .unwrap();
    let closed = h
        .engine
        .sessions
        .complete_checkout(&retry.transaction_id)
        .await
        .unwrap();
    assert_eq!(closed.status, SessionStatus::Exited);
}

#[tokio::test]
async fn test_gateway_decline_keeps_session_open() {
    let h = Harness::new().await;
    h.provision(0, 1).await;
    h.gateway.decline_with("insufficient funds");

    let session = h
        .engine
        .sessions
        .check_in("29A-12345", VehicleType::Car)
        .await
        .unwrap();
    let txn = h
        .engine
        .sessions
        .checkout(&session.vehicle_id, PaymentMethod::Card, "card-1".into())
        .await
        .unwrap()
        .transaction
        .unwrap();

    let err = h
        .engine
        .sessions
        .complete_checkout(&txn.transaction_id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::PaymentDeclined { .. }));

    let row = h.engine.transactions.get(&txn.transaction_id).await.unwrap();
    assert_eq!(row.failure_reason, Some(FailureReason::GatewayDeclined));
    let open = h.engine.sessions.get_session(&session.vehicle_id).await.unwrap();
    assert_eq!(open.status, SessionStatus::Parking);

    // Second card works.
    h.gateway.approve();
    let retry = h
        .engine
        .sessions
        .checkout(&session.vehicle_id, PaymentMethod::Card, "card-2".into())
        .await
        .unwrap()
        .transaction
        .unwrap();
    h.engine.sessions.complete_checkout(&retry.transaction_id).await.unwrap();
}

#[tokio::test]
async fn test_cash_never_reaches_the_gateway() {
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
        .checkout(&session.vehicle_id, PaymentMethod::Cash, "cash-1".into())
        .await
        .unwrap()
        .transaction
        .unwrap();
    h.engine.sessions.complete_checkout(&txn.transaction_id).await.unwrap();

    assert!(h.gateway.charges().is_empty());
}

#[tokio::test]
async fn test_refund_is_a_new_record() {
    let h = Harness::new().await;
    h.provision(0, 1).await;

    let session = h
        .engine
        .sessions
        .check_in("29A-12345", VehicleType::Car)
        .await
        .unwrap();
    let original = h
        .engine
        .sessions
        .checkout(&session.vehicle_id, PaymentMethod::Cash, "exit".into())
        .await
        .unwrap()
        .transaction
        .unwrap();
    h.engine
        .sessions
        .complete_checkout(&original.transaction_id)
        .await
        .unwrap();

    let refund = h
        .engine
        .transactions
        .refund(&original.transaction_id, "refund-1".into())
        .await
        .unwrap();
    assert_ne!(refund.transaction_id, original.transaction_id);
    assert_eq!(refund.kind, TransactionKind::Refund);
    assert_eq!(refund.status, TransactionStatus::Completed);
    assert_eq!(refund.amount, original.amount);

    // The original row is untouched.
    let kept = h.engine.transactions.get(&original.transaction_id).await.unwrap();
    assert_eq!(kept.status, TransactionStatus::Completed);
    assert_eq!(kept.kind, TransactionKind::ParkingFee);

    // A retried refund returns the same record instead of paying out twice.
    let again = h
        .engine
        .transactions
        .refund(&original.transaction_id, "refund-1".into())
        .await
        .unwrap();
    assert_eq!(again.transaction_id, refund.transaction_id);
}

#[tokio::test]
async fn test_pending_transaction_cannot_be_refunded() {
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
        .checkout(&session.vehicle_id, PaymentMethod::Cash, "exit".into())
        .await
        .unwrap()
        .transaction
        .unwrap();

    let err = h
        .engine
        .transactions
        .refund(&txn.transaction_id, "refund-1".into())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
}
