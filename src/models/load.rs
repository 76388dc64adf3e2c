use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::LoadType;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// One end of a route: the postal address plus best-effort coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub address: String,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub coords: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadStatus {
    Draft,
    Published,
    InNegotiation,
    Accepted,
    InTransit,
    Delivered,
    Cancelled,
}

impl LoadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadStatus::Delivered | LoadStatus::Cancelled)
    }

    /// Editing terms a carrier has already committed to is disallowed.
    pub fn is_editable(self) -> bool {
        !matches!(
            self,
            LoadStatus::Accepted | LoadStatus::InTransit | LoadStatus::Delivered
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Load {
    pub id: Uuid,
    pub shipper_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub origin: Stop,
    pub dest: Stop,
    pub distance_km: Option<f64>,
    pub duration_min: Option<u32>,
    pub load_type: LoadType,
    pub weight_kg: f64,
    pub volume_m3: Option<f64>,
    pub pallets: Option<u32>,
    pub pickup_date: DateTime<Utc>,
    pub delivery_date: DateTime<Utc>,
    pub suggested_price: Option<Decimal>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    /// Stamped once, when an offer is accepted.
    pub final_price: Option<Decimal>,
    pub requires_insurance: bool,
    pub requires_cmr: bool,
    pub requires_adr: bool,
    pub status: LoadStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
