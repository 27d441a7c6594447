//! Payment proof gate tests
//!
//! EFT payments must reference a proof uploaded against the same order
//! within the recency window; failures leave the order untouched.

mod common;

use common::*;
use order_engine_backend::{services::RegisterProofInput, AppError};
use shared::{LaybuyTerms, PaymentMethod, PaymentProof};
use uuid::Uuid;

async fn upload(h: &Harness, order_id: Uuid) -> PaymentProof {
    h.service
        .register_payment_proof(
            &staff(),
            order_id,
            RegisterProofInput {
                file_reference: "proofs/2026/eft-slip.pdf".to_string(),
                amount: Some(dec("300")),
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_eft_deposit_without_proof_is_rejected() {
    let h = harness();
    let order = order_with_total(&h, "1000").await;

    let mut input = cash_deposit("300");
    input.payment_method = PaymentMethod::Eft;
    let result = h.service.update_payment(&staff(), order.id, input).await;
    assert!(matches!(result, Err(AppError::ProofRequired(_))));

    let stored = h.service.get_order(order.id).await.unwrap();
    assert_eq!(stored.deposit_amount, dec("0"));
    assert!(h.service.list_transactions(order.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_eft_deposit_with_matching_proof_is_recorded() {
    let h = harness();
    let order = order_with_total(&h, "1000").await;
    let proof = upload(&h, order.id).await;

    let mut input = cash_deposit("300");
    input.payment_method = PaymentMethod::Eft;
    input.proof_id = Some(proof.id);
    let order = h
        .service
        .update_payment(&staff(), order.id, input)
        .await
        .unwrap();
    assert_eq!(order.deposit_amount, dec("300"));
    assert_eq!(order.payment_method, Some(PaymentMethod::Eft));

    let entries = h.service.list_transactions(order.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].proof_id, Some(proof.id));
    assert_eq!(entries[0].payment_method, Some(PaymentMethod::Eft));
}

#[tokio::test]
async fn test_proof_from_other_order_is_rejected() {
    let h = harness();
    let order = order_with_total(&h, "1000").await;
    let other = order_with_total(&h, "500").await;
    let foreign = upload(&h, other.id).await;

    let mut payment = cash_payment("100");
    h.service
        .convert_to_laybuy(&staff(), order.id, laybuy_input("200", LaybuyTerms::Days60))
        .await
        .unwrap();
    payment.payment_method = PaymentMethod::Eft;
    payment.proof_id = Some(foreign.id);

    let result = h
        .service
        .record_laybuy_payment(&staff(), order.id, payment)
        .await;
    assert!(matches!(result, Err(AppError::ProofMismatch(_))));

    let stored = h.service.get_order(order.id).await.unwrap();
    assert_eq!(stored.laybuy_balance, Some(dec("800")));
}

#[tokio::test]
async fn test_stale_proof_is_rejected() {
    let h = harness();
    let order = order_with_total(&h, "1000").await;
    let proof = upload(&h, order.id).await;

    h.clock.advance_days(31);

    let mut input = cash_deposit("300");
    input.payment_method = PaymentMethod::Eft;
    input.proof_id = Some(proof.id);
    let result = h.service.update_payment(&staff(), order.id, input).await;
    assert!(matches!(result, Err(AppError::ProofMismatch(_))));
}

#[tokio::test]
async fn test_unknown_proof_is_rejected_even_for_cash() {
    let h = harness();
    let order = order_with_total(&h, "1000").await;

    let mut input = cash_deposit("300");
    input.proof_id = Some(Uuid::new_v4());
    let result = h.service.update_payment(&staff(), order.id, input).await;
    assert!(matches!(result, Err(AppError::ProofMismatch(_))));
}

#[tokio::test]
async fn test_eft_laybuy_deposit_needs_proof() {
    let h = harness();
    let order = order_with_total(&h, "1000").await;

    let mut input = laybuy_input("200", LaybuyTerms::Days30);
    input.payment_method = PaymentMethod::Eft;
    let result = h.service.convert_to_laybuy(&staff(), order.id, input).await;
    assert!(matches!(result, Err(AppError::ProofRequired(_))));

    let stored = h.service.get_order(order.id).await.unwrap();
    assert!(!stored.is_laybuy);
}

#[tokio::test]
async fn test_proof_registration_validates_input() {
    let h = harness();
    let order = order_with_total(&h, "1000").await;

    let traversal = h
        .service
        .register_payment_proof(
            &staff(),
            order.id,
            RegisterProofInput {
                file_reference: "../etc/passwd".to_string(),
                amount: None,
            },
        )
        .await;
    assert!(matches!(traversal, Err(AppError::Validation { .. })));

    let missing_order = h
        .service
        .register_payment_proof(
            &staff(),
            Uuid::new_v4(),
            RegisterProofInput {
                file_reference: "proofs/slip.pdf".to_string(),
                amount: None,
            },
        )
        .await;
    assert!(matches!(missing_order, Err(AppError::NotFound(_))));

    upload(&h, order.id).await;
    assert_eq!(h.service.list_proofs(order.id).await.unwrap().len(), 1);
}
