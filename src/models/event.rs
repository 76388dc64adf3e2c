use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::load::GeoPoint;

/// Broadcast to websocket subscribers whenever a lifecycle transition that
/// downstream consumers care about happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    LoadPublished {
        load_id: Uuid,
        origin_country: String,
        dest_country: String,
    },
    OfferAccepted {
        offer_id: Uuid,
        load_id: Uuid,
        carrier_id: Uuid,
        trip_id: Option<Uuid>,
    },
    TripStarted {
        trip_id: Uuid,
        load_id: Uuid,
    },
    TripLocation {
        trip_id: Uuid,
        position: GeoPoint,
        recorded_at: DateTime<Utc>,
    },
    TripCompleted {
        trip_id: Uuid,
        load_id: Uuid,
        carrier_id: Uuid,
    },
}
