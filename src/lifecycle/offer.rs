use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::can_manage;
use crate::models::event::DomainEvent;
use crate::models::load::LoadStatus;
use crate::models::offer::{Offer, OfferStatus};
use crate::models::trip::{Trip, TripStatus};
use crate::models::user::{Role, User};
use crate::notify;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewOffer {
    pub load_id: Uuid,
    pub price: Decimal,
    pub estimated_pickup: DateTime<Utc>,
    pub estimated_delivery: DateTime<Utc>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptOutcome {
    pub offer: Offer,
    pub rejected_offers: usize,
    /// Absent when the carrier had no active + available vehicle at
    /// acceptance time; the load is accepted regardless.
    pub trip: Option<Trip>,
}

pub fn create(state: &AppState, actor: &User, new_offer: NewOffer) -> Result<Offer, AppError> {
    if actor.role != Role::Carrier {
        return Err(AppError::Forbidden(
            "only carriers can submit offers".to_string(),
        ));
    }

    if new_offer.price <= Decimal::ZERO {
        return Err(AppError::Validation("price must be positive".to_string()));
    }

    if new_offer.estimated_delivery < new_offer.estimated_pickup {
        return Err(AppError::Validation(
            "estimated_delivery cannot precede estimated_pickup".to_string(),
        ));
    }

    let lock = state.load_lock(new_offer.load_id);
    let _guard = lock.lock().expect("load lock poisoned");

    let mut load = state
        .loads
        .get_mut(&new_offer.load_id)
        .ok_or_else(|| AppError::NotFound(format!("load {} not found", new_offer.load_id)))?;

    if !matches!(
        load.status,
        LoadStatus::Published | LoadStatus::InNegotiation
    ) {
        return Err(AppError::Conflict(
            "load is not open for offers".to_string(),
        ));
    }

    let now = Utc::now();
    if load.expires_at.is_some_and(|expiry| expiry <= now) {
        return Err(AppError::Conflict("load listing has expired".to_string()));
    }

    if load.shipper_id == actor.id {
        return Err(AppError::Validation(
            "cannot submit an offer on your own load".to_string(),
        ));
    }

    let has_pending = state.offers.iter().any(|entry| {
        let offer = entry.value();
        offer.load_id == new_offer.load_id
            && offer.carrier_id == actor.id
            && offer.status == OfferStatus::Pending
    });
    if has_pending {
        return Err(AppError::Conflict(
            "carrier already has a pending offer on this load".to_string(),
        ));
    }

    let offer = Offer {
        id: Uuid::new_v4(),
        load_id: new_offer.load_id,
        carrier_id: actor.id,
        vehicle_id: None,
        price: offer_price(new_offer.price),
        estimated_pickup: new_offer.estimated_pickup,
        estimated_delivery: new_offer.estimated_delivery,
        message: new_offer.message,
        status: OfferStatus::Pending,
        expires_at: now + Duration::hours(state.config.offer_ttl_hours),
        accepted_at: None,
        rejected_at: None,
        created_at: now,
    };

    if load.status == LoadStatus::Published {
        load.status = LoadStatus::InNegotiation;
        load.updated_at = now;
    }
    drop(load);

    state.offers.insert(offer.id, offer.clone());
    state.metrics.offers_total.with_label_values(&["created"]).inc();
    notify::offer_received(offer.load_id, actor.id);

    Ok(offer)
}

fn offer_price(price: Decimal) -> Decimal {
    crate::pricing::round_cents(price)
}

/// Accept one offer: the chosen offer becomes ACCEPTED, every competing
/// PENDING offer is REJECTED, the load is ACCEPTED with its final price
/// stamped, and a trip is scheduled on one of the carrier's eligible
/// vehicles. All of it happens under the load's lock or not at all; a
/// concurrent accept on the same load loses with Conflict.
pub fn accept(state: &AppState, actor: &User, offer_id: Uuid) -> Result<AcceptOutcome, AppError> {
    let start = Instant::now();
    let result = accept_inner(state, actor, offer_id);

    let outcome = if result.is_ok() { "success" } else { "error" };
    state
        .metrics
        .accept_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());

    result
}

fn accept_inner(
    state: &AppState,
    actor: &User,
    offer_id: Uuid,
) -> Result<AcceptOutcome, AppError> {
    // Fail fast before taking the lock; everything is re-checked inside.
    let (load_id, carrier_id) = {
        let offer = state
            .offers
            .get(&offer_id)
            .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;

        if offer.status != OfferStatus::Pending {
            return Err(AppError::Conflict("offer is not pending".to_string()));
        }

        (offer.load_id, offer.carrier_id)
    };

    {
        let load = state
            .loads
            .get(&load_id)
            .ok_or_else(|| AppError::NotFound(format!("load {load_id} not found")))?;

        if !can_manage(actor, load.shipper_id) {
            return Err(AppError::Forbidden(
                "only the load owner can accept offers".to_string(),
            ));
        }
    }

    let lock = state.load_lock(load_id);
    let _guard = lock.lock().expect("load lock poisoned");

    let now = Utc::now();

    // Re-check under the lock: a concurrent accept may have resolved the
    // offer or the load since the fast path.
    {
        let offer = state
            .offers
            .get(&offer_id)
            .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;

        if offer.status != OfferStatus::Pending {
            return Err(AppError::Conflict("offer is not pending".to_string()));
        }

        if offer.is_expired(now) {
            return Err(AppError::Conflict("offer has expired".to_string()));
        }
    }

    {
        let load = state
            .loads
            .get(&load_id)
            .ok_or_else(|| AppError::NotFound(format!("load {load_id} not found")))?;

        if !matches!(
            load.status,
            LoadStatus::Published | LoadStatus::InNegotiation
        ) {
            return Err(AppError::Conflict(
                "load is no longer open for acceptance".to_string(),
            ));
        }
    }

    // Point of no return: all four effects below apply under the lock.
    let accepted = {
        let mut offer = state
            .offers
            .get_mut(&offer_id)
            .ok_or_else(|| AppError::Internal("offer vanished mid-accept".to_string()))?;
        offer.status = OfferStatus::Accepted;
        offer.accepted_at = Some(now);
        offer.clone()
    };

    let competing: Vec<Uuid> = state
        .offers
        .iter()
        .filter(|entry| {
            let other = entry.value();
            other.load_id == load_id
                && other.id != offer_id
                && other.status == OfferStatus::Pending
        })
        .map(|entry| *entry.key())
        .collect();

    for other_id in &competing {
        if let Some(mut other) = state.offers.get_mut(other_id) {
            other.status = OfferStatus::Rejected;
            other.rejected_at = Some(now);
        }
    }

    {
        let mut load = state
            .loads
            .get_mut(&load_id)
            .ok_or_else(|| AppError::Internal("load vanished mid-accept".to_string()))?;
        load.status = LoadStatus::Accepted;
        load.final_price = Some(accepted.price);
        load.updated_at = now;
    }

    let vehicle = state
        .vehicles
        .iter()
        .find(|entry| {
            let vehicle = entry.value();
            vehicle.owner_id == carrier_id && vehicle.is_active && vehicle.is_available
        })
        .map(|entry| entry.value().clone());

    // Reference behavior: with no eligible vehicle the load is accepted and
    // no trip is scheduled; the carrier binds a vehicle later.
    let trip = vehicle.map(|vehicle| {
        let trip = Trip {
            id: Uuid::new_v4(),
            load_id,
            offer_id,
            carrier_id,
            vehicle_id: vehicle.id,
            status: TripStatus::Scheduled,
            actual_pickup_time: None,
            actual_delivery_time: None,
            current_position: None,
            last_location_update: None,
            pickup_checklist: None,
            delivery_checklist: None,
            pod: None,
            created_at: now,
            completed_at: None,
        };
        state.trips.insert(trip.id, trip.clone());
        trip
    });

    state
        .metrics
        .offers_total
        .with_label_values(&["accepted"])
        .inc();
    for _ in &competing {
        state
            .metrics
            .offers_total
            .with_label_values(&["rejected"])
            .inc();
    }

    state.emit(DomainEvent::OfferAccepted {
        offer_id,
        load_id,
        carrier_id,
        trip_id: trip.as_ref().map(|t| t.id),
    });
    notify::offer_accepted(offer_id, carrier_id);

    info!(
        %offer_id,
        %load_id,
        %carrier_id,
        rejected = competing.len(),
        trip_created = trip.is_some(),
        "offer accepted"
    );

    Ok(AcceptOutcome {
        offer: accepted,
        rejected_offers: competing.len(),
        trip,
    })
}

pub fn reject(state: &AppState, actor: &User, offer_id: Uuid) -> Result<Offer, AppError> {
    let load_id = {
        let offer = state
            .offers
            .get(&offer_id)
            .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;
        offer.load_id
    };

    let shipper_id = {
        let load = state
            .loads
            .get(&load_id)
            .ok_or_else(|| AppError::NotFound(format!("load {load_id} not found")))?;
        load.shipper_id
    };

    if !can_manage(actor, shipper_id) {
        return Err(AppError::Forbidden(
            "only the load owner can reject offers".to_string(),
        ));
    }

    let lock = state.load_lock(load_id);
    let _guard = lock.lock().expect("load lock poisoned");

    let mut offer = state
        .offers
        .get_mut(&offer_id)
        .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;

    if offer.status != OfferStatus::Pending {
        return Err(AppError::Conflict("offer is not pending".to_string()));
    }

    offer.status = OfferStatus::Rejected;
    offer.rejected_at = Some(Utc::now());

    state
        .metrics
        .offers_total
        .with_label_values(&["rejected"])
        .inc();

    Ok(offer.clone())
}

pub fn cancel(state: &AppState, actor: &User, offer_id: Uuid) -> Result<Offer, AppError> {
    let load_id = {
        let offer = state
            .offers
            .get(&offer_id)
            .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;

        if !can_manage(actor, offer.carrier_id) {
            return Err(AppError::Forbidden(
                "only the offer's carrier can cancel it".to_string(),
            ));
        }

        offer.load_id
    };

    let lock = state.load_lock(load_id);
    let _guard = lock.lock().expect("load lock poisoned");

    let mut offer = state
        .offers
        .get_mut(&offer_id)
        .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))?;

    if offer.status != OfferStatus::Pending {
        return Err(AppError::Conflict(
            "only pending offers can be cancelled".to_string(),
        ));
    }

    offer.status = OfferStatus::Cancelled;

    state
        .metrics
        .offers_total
        .with_label_values(&["cancelled"])
        .inc();

    Ok(offer.clone())
}

pub fn get(state: &AppState, offer_id: Uuid) -> Result<Offer, AppError> {
    state
        .offers
        .get(&offer_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("offer {offer_id} not found")))
}
