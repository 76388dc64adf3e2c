//! Payment gateway contract. Charges are idempotent under a caller-supplied
//! idempotency key: replaying a processed key returns the recorded outcome
//! instead of charging twice.

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount: Decimal,
    pub currency: String,
    pub method: String,
    pub token: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChargeReceipt {
    pub reference: String,
    pub amount: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone)]
enum ChargeRecord {
    Approved(ChargeReceipt),
    Declined(String),
}

/// In-process gateway standing in for the real provider. Declines
/// Stripe-style `tok_…declined…` test tokens; everything else is approved
/// with a generated reference.
#[derive(Default)]
pub struct PaymentGateway {
    processed: DashMap<String, ChargeRecord>,
}

impl PaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn charge(&self, request: ChargeRequest) -> Result<ChargeReceipt, AppError> {
        if let Some(record) = self.processed.get(&request.idempotency_key) {
            return match record.value() {
                ChargeRecord::Approved(receipt) => Ok(receipt.clone()),
                ChargeRecord::Declined(reason) => Err(AppError::PaymentDeclined(reason.clone())),
            };
        }

        if request.amount <= Decimal::ZERO {
            return Err(AppError::Validation(
                "charge amount must be positive".to_string(),
            ));
        }

        // Test tokens spell "declined" in mixed case (`tok_chargeDeclined`).
        if request.token.to_ascii_lowercase().contains("declined") {
            let reason = "card declined".to_string();
            self.processed.insert(
                request.idempotency_key.clone(),
                ChargeRecord::Declined(reason.clone()),
            );
            return Err(AppError::PaymentDeclined(reason));
        }

        let receipt = ChargeReceipt {
            reference: format!("ch_{}", Uuid::new_v4().simple()),
            amount: request.amount,
            currency: request.currency.clone(),
        };

        self.processed.insert(
            request.idempotency_key.clone(),
            ChargeRecord::Approved(receipt.clone()),
        );

        info!(
            reference = %receipt.reference,
            amount = %receipt.amount,
            method = %request.method,
            "charge captured"
        );

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn request(token: &str, key: &str) -> ChargeRequest {
        ChargeRequest {
            amount: dec!(100.00),
            currency: "EUR".to_string(),
            method: "card".to_string(),
            token: token.to_string(),
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn replayed_key_returns_same_reference() {
        let gateway = PaymentGateway::new();
        let first = gateway.charge(request("tok_visa", "inv-1")).await.unwrap();
        let second = gateway.charge(request("tok_visa", "inv-1")).await.unwrap();
        assert_eq!(first.reference, second.reference);
    }

    #[tokio::test]
    async fn declined_token_is_surfaced_and_sticky() {
        let gateway = PaymentGateway::new();
        let err = gateway
            .charge(request("tok_chargeDeclined", "inv-2"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PaymentDeclined(_)));

        let replay = gateway
            .charge(request("tok_chargeDeclined", "inv-2"))
            .await
            .unwrap_err();
        assert!(matches!(replay, AppError::PaymentDeclined(_)));
    }
}
