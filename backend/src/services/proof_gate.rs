//! Payment proof gate
//!
//! Methods with the `requires_proof` capability (EFT) must reference a proof
//! document uploaded against the same order within the recency window. A
//! proof supplied for any other method is checked the same way so that a
//! ledger entry never points at a foreign or stale document.

use chrono::{DateTime, Duration, Utc};
use shared::{PaymentMethod, PaymentProof};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Policy check run before any payment mutation
#[derive(Debug, Clone, Copy)]
pub struct ProofGate {
    max_age: Duration,
}

impl ProofGate {
    pub fn new(max_age_days: i64) -> Self {
        Self {
            max_age: Duration::days(max_age_days),
        }
    }

    /// Validate the proof for a payment on `order_id`.
    ///
    /// `proof` is the stored record for `proof_id`, if one was found. Returns
    /// the proof id to record on the ledger entry.
    pub fn check(
        &self,
        order_id: Uuid,
        method: PaymentMethod,
        proof_id: Option<Uuid>,
        proof: Option<&PaymentProof>,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Uuid>> {
        let Some(proof_id) = proof_id else {
            if method.requires_proof() {
                return Err(AppError::ProofRequired(format!(
                    "{} payments must reference an uploaded proof of payment",
                    method
                )));
            }
            return Ok(None);
        };

        let proof = proof.filter(|p| p.id == proof_id).ok_or_else(|| {
            AppError::ProofMismatch(format!("Payment proof {} does not exist", proof_id))
        })?;

        if proof.order_id != order_id {
            return Err(AppError::ProofMismatch(format!(
                "Payment proof {} belongs to a different order",
                proof_id
            )));
        }

        if proof.uploaded_at > now {
            return Err(AppError::ProofMismatch(format!(
                "Payment proof {} has an upload time in the future",
                proof_id
            )));
        }

        if now - proof.uploaded_at > self.max_age {
            return Err(AppError::ProofMismatch(format!(
                "Payment proof {} is older than {} days",
                proof_id,
                self.max_age.num_days()
            )));
        }

        Ok(Some(proof_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proof(order_id: Uuid, uploaded_at: DateTime<Utc>) -> PaymentProof {
        PaymentProof {
            id: Uuid::new_v4(),
            order_id,
            file_reference: "proofs/eft-slip.pdf".to_string(),
            amount: None,
            uploaded_by: None,
            uploaded_at,
        }
    }

    #[test]
    fn test_eft_without_proof_is_rejected() {
        let gate = ProofGate::new(30);
        let result = gate.check(Uuid::new_v4(), PaymentMethod::Eft, None, None, Utc::now());
        assert!(matches!(result, Err(AppError::ProofRequired(_))));
    }

    #[test]
    fn test_cash_without_proof_passes() {
        let gate = ProofGate::new(30);
        let result = gate.check(Uuid::new_v4(), PaymentMethod::Cash, None, None, Utc::now());
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_proof_from_other_order_is_rejected() {
        let gate = ProofGate::new(30);
        let now = Utc::now();
        let foreign = proof(Uuid::new_v4(), now);
        let result = gate.check(Uuid::new_v4(), PaymentMethod::Eft, Some(foreign.id), Some(&foreign), now);
        assert!(matches!(result, Err(AppError::ProofMismatch(_))));
    }

    #[test]
    fn test_unknown_proof_is_rejected() {
        let gate = ProofGate::new(30);
        let result = gate.check(
            Uuid::new_v4(),
            PaymentMethod::Eft,
            Some(Uuid::new_v4()),
            None,
            Utc::now(),
        );
        assert!(matches!(result, Err(AppError::ProofMismatch(_))));
    }

    #[test]
    fn test_stale_proof_is_rejected() {
        let gate = ProofGate::new(30);
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let old = proof(order_id, now - Duration::days(31));
        let result = gate.check(order_id, PaymentMethod::Eft, Some(old.id), Some(&old), now);
        assert!(matches!(result, Err(AppError::ProofMismatch(_))));
    }

    #[test]
    fn test_recent_matching_proof_passes() {
        let gate = ProofGate::new(30);
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let recent = proof(order_id, now - Duration::days(2));
        let result = gate.check(order_id, PaymentMethod::Eft, Some(recent.id), Some(&recent), now);
        assert_eq!(result.unwrap(), Some(recent.id));
    }
}
