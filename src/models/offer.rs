use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub load_id: Uuid,
    pub carrier_id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub price: Decimal,
    pub estimated_pickup: DateTime<Utc>,
    pub estimated_delivery: DateTime<Utc>,
    pub message: Option<String>,
    pub status: OfferStatus,
    pub expires_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == OfferStatus::Pending && self.expires_at <= now
    }
}
