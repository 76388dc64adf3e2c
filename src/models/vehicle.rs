use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehicleType {
    #[serde(rename = "VAN")]
    Van,
    #[serde(rename = "TRUCK_3_5T")]
    Truck3_5T,
    #[serde(rename = "TRUCK_7_5T")]
    Truck7_5T,
    #[serde(rename = "TRUCK_12T")]
    Truck12T,
    #[serde(rename = "TRUCK_18T")]
    Truck18T,
    #[serde(rename = "TRUCK_24T")]
    Truck24T,
    #[serde(rename = "SEMI_TRAILER")]
    SemiTrailer,
    #[serde(rename = "REFRIGERATED")]
    Refrigerated,
    #[serde(rename = "TANKER")]
    Tanker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub plate: String,
    pub vehicle_type: VehicleType,
    pub capacity_kg: f64,
    pub is_active: bool,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}
