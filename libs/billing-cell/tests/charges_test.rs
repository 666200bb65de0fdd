use std::sync::Arc;

use assert_matches::assert_matches;
use uuid::Uuid;

use billing_cell::models::{
    ChargeError, ChargeKind, ChargeStatus, CreateChargeRequest, PaymentMethod,
};
use billing_cell::services::charges::{ChargeCoordinator, ChargeLedger};
use billing_cell::store::MemoryChargeStore;

fn coordinator() -> ChargeCoordinator {
    ChargeCoordinator::new(Arc::new(MemoryChargeStore::new()))
}

fn charge_request(total_cents: i64, deposit: Option<u8>) -> CreateChargeRequest {
    CreateChargeRequest {
        appointment_id: Uuid::new_v4(),
        total_cents,
        deposit_percentage: deposit,
    }
}

#[tokio::test]
async fn full_charge_has_a_single_pending_row() {
    let coordinator = coordinator();
    let org = Uuid::new_v4();

    let charges = coordinator
        .create_charges(org, charge_request(10_000, None))
        .await
        .unwrap();

    assert_eq!(charges.len(), 1);
    assert_eq!(charges[0].kind, ChargeKind::Full);
    assert_eq!(charges[0].status, ChargeStatus::Pending);
    assert_eq!(charges[0].total_cents, 10_000);
}

#[tokio::test]
async fn deposit_percentage_splits_into_deposit_and_remainder() {
    let coordinator = coordinator();
    let org = Uuid::new_v4();

    let charges = coordinator
        .create_charges(org, charge_request(10_001, Some(30)))
        .await
        .unwrap();

    assert_eq!(charges.len(), 2);
    let deposit = &charges[0];
    let remainder = &charges[1];

    assert_eq!(deposit.kind, ChargeKind::Deposit);
    assert_eq!(deposit.deposit_percentage, Some(30));
    assert_eq!(remainder.kind, ChargeKind::Remainder);
    assert_eq!(remainder.parent_charge_id, Some(deposit.id));
    // Split never loses a cent; the deposit takes the rounding.
    assert_eq!(deposit.total_cents + remainder.total_cents, 10_001);
    assert_eq!(deposit.total_cents, 3_001);
}

#[tokio::test]
async fn invalid_deposit_percentage_is_rejected() {
    let coordinator = coordinator();
    let org = Uuid::new_v4();

    let result = coordinator
        .create_charges(org, charge_request(10_000, Some(100)))
        .await;

    assert_matches!(result, Err(ChargeError::InvalidRequest(_)));
}

#[tokio::test]
async fn partial_payment_accumulates_then_settles() {
    let coordinator = coordinator();
    let org = Uuid::new_v4();
    let charges = coordinator
        .create_charges(org, charge_request(10_000, None))
        .await
        .unwrap();
    let charge_id = charges[0].id;

    let after_first = coordinator
        .process_payment(org, charge_id, 4_000, PaymentMethod::Pix)
        .await
        .unwrap();
    assert_eq!(after_first.status, ChargeStatus::PartiallyPaid);
    assert_eq!(after_first.paid_cents, 4_000);

    let after_second = coordinator
        .process_payment(org, charge_id, 6_000, PaymentMethod::CreditCard)
        .await
        .unwrap();
    assert_eq!(after_second.status, ChargeStatus::Paid);
    assert_eq!(after_second.paid_cents, 10_000);
}

#[tokio::test]
async fn overpayment_is_a_conflict() {
    let coordinator = coordinator();
    let org = Uuid::new_v4();
    let charges = coordinator
        .create_charges(org, charge_request(5_000, None))
        .await
        .unwrap();

    let result = coordinator
        .process_payment(org, charges[0].id, 5_001, PaymentMethod::Cash)
        .await;

    assert_matches!(result, Err(ChargeError::Conflict(_)));
}

#[tokio::test]
async fn paying_a_refunded_charge_is_a_conflict() {
    let coordinator = coordinator();
    let org = Uuid::new_v4();
    let charges = coordinator
        .create_charges(org, charge_request(5_000, None))
        .await
        .unwrap();
    let charge_id = charges[0].id;

    coordinator
        .process_payment(org, charge_id, 5_000, PaymentMethod::Pix)
        .await
        .unwrap();
    coordinator.refund(org, charge_id).await.unwrap();

    let result = coordinator
        .process_payment(org, charge_id, 1_000, PaymentMethod::Pix)
        .await;
    assert_matches!(result, Err(ChargeError::Conflict(_)));
}

#[tokio::test]
async fn refund_requires_collected_funds() {
    let coordinator = coordinator();
    let org = Uuid::new_v4();
    let charges = coordinator
        .create_charges(org, charge_request(5_000, None))
        .await
        .unwrap();

    let result = coordinator.refund(org, charges[0].id).await;
    assert_matches!(result, Err(ChargeError::Conflict(_)));
}

#[tokio::test]
async fn blocking_charges_follow_collected_funds() {
    let coordinator = coordinator();
    let org = Uuid::new_v4();
    let request = charge_request(10_000, Some(50));
    let appointment_id = request.appointment_id;
    let charges = coordinator.create_charges(org, request).await.unwrap();

    // Nothing collected yet: cancellation is free to proceed.
    assert!(coordinator
        .blocking_charges(org, appointment_id)
        .await
        .unwrap()
        .is_empty());

    // A paid deposit blocks, a refund releases.
    coordinator
        .process_payment(org, charges[0].id, 5_000, PaymentMethod::Pix)
        .await
        .unwrap();
    assert_eq!(
        coordinator
            .blocking_charges(org, appointment_id)
            .await
            .unwrap()
            .len(),
        1
    );

    let refunded = coordinator
        .refund_appointment_charges(org, appointment_id)
        .await
        .unwrap();
    assert_eq!(refunded.len(), 1);
    assert!(coordinator
        .blocking_charges(org, appointment_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unknown_charge_is_not_found() {
    let coordinator = coordinator();
    let result = coordinator.get_charge(Uuid::new_v4(), Uuid::new_v4()).await;
    assert_matches!(result, Err(ChargeError::NotFound));
}
