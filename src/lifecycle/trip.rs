use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::can_manage;
use crate::models::event::DomainEvent;
use crate::models::load::{GeoPoint, LoadStatus};
use crate::models::trip::{LocationPing, ProofOfDelivery, Trip, TripStatus};
use crate::models::user::User;
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartTrip {
    pub position: Option<GeoPoint>,
    pub pickup_checklist: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPing {
    pub lat: f64,
    pub lng: f64,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteTrip {
    pub position: Option<GeoPoint>,
    pub delivery_checklist: Option<serde_json::Value>,
    pub pod_signature: Option<String>,
    pub pod_photo: Option<String>,
    pub pod_notes: Option<String>,
}

pub fn start(
    state: &AppState,
    actor: &User,
    trip_id: Uuid,
    command: StartTrip,
) -> Result<Trip, AppError> {
    let load_id = {
        let trip = state
            .trips
            .get(&trip_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

        if !can_manage(actor, trip.carrier_id) {
            return Err(AppError::Forbidden(
                "only the assigned carrier can start the trip".to_string(),
            ));
        }

        trip.load_id
    };

    let lock = state.load_lock(load_id);
    let _guard = lock.lock().expect("load lock poisoned");

    let now = Utc::now();
    let started = {
        let mut trip = state
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

        if trip.status != TripStatus::Scheduled {
            return Err(AppError::Conflict("trip is not scheduled".to_string()));
        }

        trip.status = TripStatus::InProgress;
        trip.actual_pickup_time = Some(now);
        trip.pickup_checklist = command.pickup_checklist;
        if let Some(position) = command.position {
            trip.current_position = Some(position);
            trip.last_location_update = Some(now);
        }
        trip.clone()
    };

    if let Some(mut load) = state.loads.get_mut(&load_id) {
        load.status = LoadStatus::InTransit;
        load.updated_at = now;
    }

    if let Some(position) = command.position {
        append_ping(state, trip_id, position, None, None, None);
    }

    state.emit(DomainEvent::TripStarted { trip_id, load_id });
    info!(%trip_id, %load_id, "trip started");

    Ok(started)
}

/// High-frequency append path: refreshes the cached position and appends to
/// the ping series without touching the load lock.
pub fn record_location(
    state: &AppState,
    actor: &User,
    trip_id: Uuid,
    ping: NewPing,
) -> Result<LocationPing, AppError> {
    if !ping.lat.is_finite() || !ping.lng.is_finite() {
        return Err(AppError::Validation(
            "lat and lng must be numbers".to_string(),
        ));
    }

    let now = Utc::now();
    let position = GeoPoint {
        lat: ping.lat,
        lng: ping.lng,
    };

    {
        let mut trip = state
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

        // Pings are owned exclusively by the operating carrier.
        if trip.carrier_id != actor.id {
            return Err(AppError::Forbidden(
                "only the assigned carrier can report positions".to_string(),
            ));
        }

        if trip.status != TripStatus::InProgress {
            return Err(AppError::Conflict("trip is not in progress".to_string()));
        }

        trip.current_position = Some(position);
        trip.last_location_update = Some(now);
    }

    let record = LocationPing {
        trip_id,
        position,
        speed: ping.speed,
        heading: ping.heading,
        accuracy: ping.accuracy,
        recorded_at: now,
    };

    state
        .trip_locations
        .entry(trip_id)
        .or_default()
        .push(record.clone());

    state.metrics.location_pings_total.inc();
    state.emit(DomainEvent::TripLocation {
        trip_id,
        position,
        recorded_at: now,
    });

    Ok(record)
}

pub fn complete(
    state: &AppState,
    actor: &User,
    trip_id: Uuid,
    command: CompleteTrip,
) -> Result<Trip, AppError> {
    let (load_id, carrier_id) = {
        let trip = state
            .trips
            .get(&trip_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

        if !can_manage(actor, trip.carrier_id) {
            return Err(AppError::Forbidden(
                "only the assigned carrier can complete the trip".to_string(),
            ));
        }

        (trip.load_id, trip.carrier_id)
    };

    let lock = state.load_lock(load_id);
    let _guard = lock.lock().expect("load lock poisoned");

    let now = Utc::now();
    let completed = {
        let mut trip = state
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

        if trip.status != TripStatus::InProgress {
            return Err(AppError::Conflict("trip is not in progress".to_string()));
        }

        trip.status = TripStatus::Completed;
        trip.actual_delivery_time = Some(now);
        trip.completed_at = Some(now);
        trip.delivery_checklist = command.delivery_checklist;
        trip.pod = Some(ProofOfDelivery {
            signature: command.pod_signature,
            photo: command.pod_photo,
            notes: command.pod_notes,
        });
        if let Some(position) = command.position {
            trip.current_position = Some(position);
            trip.last_location_update = Some(now);
        }
        trip.clone()
    };

    if let Some(mut load) = state.loads.get_mut(&load_id) {
        load.status = LoadStatus::Delivered;
        load.updated_at = now;
    }

    if let Some(mut carrier) = state.users.get_mut(&carrier_id) {
        carrier.completed_trips += 1;
    }

    if let Some(position) = command.position {
        append_ping(state, trip_id, position, None, None, None);
    }

    state.metrics.trips_completed_total.inc();
    state.emit(DomainEvent::TripCompleted {
        trip_id,
        load_id,
        carrier_id,
    });

    info!(%trip_id, %load_id, "trip completed");
    Ok(completed)
}

/// Cancels the trip and its parent load together, under the same lock.
pub fn cancel(state: &AppState, actor: &User, trip_id: Uuid) -> Result<Trip, AppError> {
    let (load_id, carrier_id) = {
        let trip = state
            .trips
            .get(&trip_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;
        (trip.load_id, trip.carrier_id)
    };

    let shipper_id = {
        let load = state
            .loads
            .get(&load_id)
            .ok_or_else(|| AppError::NotFound(format!("load {load_id} not found")))?;
        load.shipper_id
    };

    if actor.id != carrier_id && !can_manage(actor, shipper_id) {
        return Err(AppError::Forbidden(
            "not a party to this trip".to_string(),
        ));
    }

    let lock = state.load_lock(load_id);
    let _guard = lock.lock().expect("load lock poisoned");

    let now = Utc::now();
    let cancelled = {
        let mut trip = state
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

        if !matches!(trip.status, TripStatus::Scheduled | TripStatus::InProgress) {
            return Err(AppError::Conflict(format!(
                "trip cannot be cancelled in status {:?}",
                trip.status
            )));
        }

        trip.status = TripStatus::Cancelled;
        trip.clone()
    };

    if let Some(mut load) = state.loads.get_mut(&load_id) {
        load.status = LoadStatus::Cancelled;
        load.updated_at = now;
    }

    info!(%trip_id, %load_id, "trip cancelled");
    Ok(cancelled)
}

pub fn get(state: &AppState, trip_id: Uuid) -> Result<Trip, AppError> {
    state
        .trips
        .get(&trip_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))
}

/// Ping history, newest first.
pub fn locations(state: &AppState, trip_id: Uuid, limit: usize) -> Result<Vec<LocationPing>, AppError> {
    if !state.trips.contains_key(&trip_id) {
        return Err(AppError::NotFound(format!("trip {trip_id} not found")));
    }

    let mut pings = state
        .trip_locations
        .get(&trip_id)
        .map(|entry| entry.value().clone())
        .unwrap_or_default();

    pings.reverse();
    pings.truncate(limit);
    Ok(pings)
}

fn append_ping(
    state: &AppState,
    trip_id: Uuid,
    position: GeoPoint,
    speed: Option<f64>,
    heading: Option<f64>,
    accuracy: Option<f64>,
) {
    state.trip_locations.entry(trip_id).or_default().push(LocationPing {
        trip_id,
        position,
        speed,
        heading,
        accuracy,
        recorded_at: Utc::now(),
    });
    state.metrics.location_pings_total.inc();
}
