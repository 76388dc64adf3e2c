use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::load::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofOfDelivery {
    pub signature: Option<String>,
    pub photo: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub load_id: Uuid,
    pub offer_id: Uuid,
    pub carrier_id: Uuid,
    pub vehicle_id: Uuid,
    pub status: TripStatus,
    pub actual_pickup_time: Option<DateTime<Utc>>,
    pub actual_delivery_time: Option<DateTime<Utc>>,
    /// Cached most-recent position; the full series lives in the ping log.
    pub current_position: Option<GeoPoint>,
    pub last_location_update: Option<DateTime<Utc>>,
    pub pickup_checklist: Option<serde_json::Value>,
    pub delivery_checklist: Option<serde_json::Value>,
    pub pod: Option<ProofOfDelivery>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Append-only: pings are only ever created by the trip's carrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationPing {
    pub trip_id: Uuid,
    pub position: GeoPoint,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}
