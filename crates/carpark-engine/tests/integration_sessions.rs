//! Check-in and checkout flows over the in-memory store

mod common;

use carpark_engine::EngineError;
use carpark_types::{PaymentMethod, SessionStatus, SlotStatus, VehicleType};
use common::Harness;
use std::sync::Arc;

#[tokio::test]
async fn test_casual_car_check_in_and_paid_checkout() {
    let h = Harness::new().await;
    h.provision(2, 2).await;

    let session = h
        .engine
        .sessions
        .check_in("29A-12345", VehicleType::Car)
        .await
        .unwrap();
    assert_eq!(session.vehicle_id.as_str(), "C001");
    assert_eq!(session.slot_id.as_str(), "C001");
    assert_eq!(session.status, SessionStatus::Parking);
    assert!(!session.monthly_subscriber);

    let slot = h.engine.slots.get(&session.slot_id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Occupied);

    let outcome = h
        .engine
        .sessions
        .checkout(&session.vehicle_id, PaymentMethod::Cash, "checkout-1".into())
        .await
        .unwrap();
    assert_eq!(outcome.amount_due, 30_000);
    let txn = outcome.transaction.expect("casual checkout owes a fee");

    // Unpaid: still inside.
    let open = h.engine.sessions.get_session(&session.vehicle_id).await.unwrap();
    assert_eq!(open.status, SessionStatus::Parking);

    let closed = h
        .engine
        .sessions
        .complete_checkout(&txn.transaction_id)
        .await
        .unwrap();
    assert_eq!(closed.status, SessionStatus::Exited);
    assert!(closed.exit_time.is_some());

    let slot = h.engine.slots.get(&session.slot_id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Available);
    assert!(slot.current_vehicle_id.is_none());
}

#[tokio::test]
async fn test_duplicate_plate_rejected_until_exit() {
    let h = Harness::new().await;
    h.provision(0, 3).await;

    let first = h
        .engine
        .sessions
        .check_in("29A-12345", VehicleType::Car)
        .await
        .unwrap();

    let err = h
        .engine
        .sessions
        .check_in("29A-12345", VehicleType::Car)
        .await
        .unwrap_err();
    match err {
        EngineError::DuplicateActiveSession { existing, .. } => {
            assert_eq!(existing, first.vehicle_id);
        }
        other => panic!("expected duplicate rejection, got {other}"),
    }

    // The rejected attempt must not have consumed a slot.
    let occupied: u64 = h
        .engine
        .slots
        .occupancy()
        .await
        .unwrap()
        .iter()
        .filter(|c| c.status == SlotStatus::Occupied)
        .map(|c| c.count)
        .sum();
    assert_eq!(occupied, 1);

    // After the paid exit the plate can come back.
    let outcome = h
        .engine
        .sessions
        .checkout(&first.vehicle_id, PaymentMethod::Cash, "checkout-1".into())
        .await
        .unwrap();
    h.engine
        .sessions
        .complete_checkout(&outcome.transaction.unwrap().transaction_id)
        .await
        .unwrap();

    let second = h
        .engine
        .sessions
        .check_in("29A-12345", VehicleType::Car)
        .await
        .unwrap();
    assert_eq!(second.vehicle_id.as_str(), "C002");
}

#[tokio::test]
async fn test_capacity_exceeded_and_recovered() {
    let h = Harness::new().await;
    h.provision(0, 1).await;

    let first = h
        .engine
        .sessions
        .check_in("30B-00001", VehicleType::Car)
        .await
        .unwrap();

    let err = h
        .engine
        .sessions
        .check_in("30B-00002", VehicleType::Car)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CapacityExceeded { vehicle_type: VehicleType::Car }));

    let outcome = h
        .engine
        .sessions
        .checkout(&first.vehicle_id, PaymentMethod::Cash, "exit-1".into())
        .await
        .unwrap();
    h.engine
        .sessions
        .complete_checkout(&outcome.transaction.unwrap().transaction_id)
        .await
        .unwrap();

    // Slot freed; the lot accepts cars again.
    h.engine
        .sessions
        .check_in("30B-00002", VehicleType::Car)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_concurrent_check_ins_for_one_slot_admit_exactly_one() {
    let h = Harness::new().await;
    h.provision(0, 1).await;
    let engine = Arc::new(h.engine);

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .sessions
                .check_in(&format!("30B-{i:05}"), VehicleType::Car)
                .await
        }));
    }

    let mut admitted = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(session) => admitted.push(session),
            Err(EngineError::CapacityExceeded { .. }) => {}
            Err(other) => panic!("unexpected rejection: {other}"),
        }
    }
    assert_eq!(admitted.len(), 1);
    assert_eq!(admitted[0].slot_id.as_str(), "C001");

    // The losing attempts left no trace: the winner's exit frees the one
    // slot and the lot accepts the next customer.
    let outcome = engine
        .sessions
        .checkout(&admitted[0].vehicle_id, PaymentMethod::Cash, "exit".into())
        .await
        .unwrap();
    engine
        .sessions
        .complete_checkout(&outcome.transaction.unwrap().transaction_id)
        .await
        .unwrap();
    engine
        .sessions
        .check_in("51G-99999", VehicleType::Car)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_motorbike_fee_and_id_sequences() {
    let h = Harness::new().await;
    h.provision(2, 2).await;

    let car = h.engine.sessions.check_in("29A-1", VehicleType::Car).await.unwrap();
    let moto = h
        .engine
        .sessions
        .check_in("59X1-2", VehicleType::Motorbike)
        .await
        .unwrap();
    let car2 = h.engine.sessions.check_in("29A-3", VehicleType::Car).await.unwrap();

    // Sequences are independent per vehicle type.
    assert_eq!(car.vehicle_id.as_str(), "C001");
    assert_eq!(moto.vehicle_id.as_str(), "M001");
    assert_eq!(car2.vehicle_id.as_str(), "C002");
    assert_eq!(moto.slot_id.as_str(), "M001");

    let outcome = h
        .engine
        .sessions
        .checkout(&moto.vehicle_id, PaymentMethod::Cash, "moto-exit".into())
        .await
        .unwrap();
    assert_eq!(outcome.amount_due, 10_000);
}

#[tokio::test]
async fn test_blank_plate_rejected() {
    let h = Harness::new().await;
    h.provision(1, 1).await;

    let err = h
        .engine
        .sessions
        .check_in("   ", VehicleType::Car)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
}

#[tokio::test]
async fn test_checkout_of_unknown_or_closed_session() {
    let h = Harness::new().await;
    h.provision(0, 1).await;

    let err = h
        .engine
        .sessions
        .checkout(&"C999".into(), PaymentMethod::Cash, "nope".into())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let session = h
        .engine
        .sessions
        .check_in("29A-12345", VehicleType::Car)
        .await
        .unwrap();
    let outcome = h
        .engine
        .sessions
        .checkout(&session.vehicle_id, PaymentMethod::Cash, "exit".into())
        .await
        .unwrap();
    h.engine
        .sessions
        .complete_checkout(&outcome.transaction.unwrap().transaction_id)
        .await
        .unwrap();

    let err = h
        .engine
        .sessions
        .checkout(&session.vehicle_id, PaymentMethod::Cash, "again".into())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::SessionClosed(_)));
}

#[tokio::test]
async fn test_parked_vehicles_lists_only_open_sessions() {
    let h = Harness::new().await;
    h.provision(2, 2).await;

    let a = h.engine.sessions.check_in("29A-1", VehicleType::Car).await.unwrap();
    h.engine
        .sessions
        .check_in("59X1-2", VehicleType::Motorbike)
        .await
        .unwrap();

    let outcome = h
        .engine
        .sessions
        .checkout(&a.vehicle_id, PaymentMethod::Cash, "exit-a".into())
        .await
        .unwrap();
    h.engine
        .sessions
        .complete_checkout(&outcome.transaction.unwrap().transaction_id)
        .await
        .unwrap();

    let parked = h.engine.sessions.parked_vehicles().await.unwrap();
    assert_eq!(parked.len(), 1);
    assert_eq!(parked[0].vehicle_id.as_str(), "M001");
}
