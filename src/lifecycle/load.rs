use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::can_manage;
use crate::models::event::DomainEvent;
use crate::models::load::{Load, LoadStatus, Stop};
use crate::models::offer::OfferStatus;
use crate::models::user::{Role, User};
use crate::notify;
use crate::pricing::{self, LoadType, QuoteParams};
use crate::state::AppState;

/// Validated command for creating or editing a load. Coordinates and route
/// estimates are resolved by the caller (geocoding is best effort).
#[derive(Debug, Clone, Deserialize)]
pub struct LoadDraft {
    pub title: String,
    pub description: Option<String>,
    pub origin: Stop,
    pub dest: Stop,
    pub load_type: LoadType,
    pub weight_kg: f64,
    pub volume_m3: Option<f64>,
    pub pallets: Option<u32>,
    pub pickup_date: DateTime<Utc>,
    pub delivery_date: DateTime<Utc>,
    pub suggested_price: Option<Decimal>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub requires_insurance: bool,
    #[serde(default)]
    pub requires_cmr: bool,
    #[serde(default)]
    pub requires_adr: bool,
    #[serde(skip)]
    pub distance_km: Option<f64>,
    #[serde(skip)]
    pub duration_min: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoadFilter {
    pub status: Option<LoadStatus>,
    pub origin_country: Option<String>,
    pub dest_country: Option<String>,
    pub load_type: Option<LoadType>,
    pub min_weight: Option<f64>,
    pub max_weight: Option<f64>,
}

fn validate_draft(draft: &LoadDraft) -> Result<(), AppError> {
    if draft.title.trim().is_empty() {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }

    if !draft.weight_kg.is_finite() || draft.weight_kg <= 0.0 {
        return Err(AppError::Validation(
            "weight_kg must be positive".to_string(),
        ));
    }

    if draft.delivery_date < draft.pickup_date {
        return Err(AppError::Validation(
            "delivery_date cannot precede pickup_date".to_string(),
        ));
    }

    for (name, price) in [
        ("suggested_price", draft.suggested_price),
        ("min_price", draft.min_price),
        ("max_price", draft.max_price),
    ] {
        if let Some(price) = price {
            if price <= Decimal::ZERO {
                return Err(AppError::Validation(format!("{name} must be positive")));
            }
        }
    }

    Ok(())
}

fn quote_params(draft: &LoadDraft, distance_km: f64) -> QuoteParams {
    QuoteParams {
        distance_km,
        weight_kg: draft.weight_kg,
        load_type: draft.load_type,
        origin_country: draft.origin.country.clone(),
        dest_country: draft.dest.country.clone(),
        requires_insurance: draft.requires_insurance,
        requires_cmr: draft.requires_cmr,
        requires_adr: draft.requires_adr,
    }
}

pub fn create(state: &AppState, actor: &User, draft: LoadDraft) -> Result<Load, AppError> {
    if actor.role != Role::Shipper && !actor.is_admin() {
        return Err(AppError::Forbidden(
            "only shippers can post loads".to_string(),
        ));
    }

    validate_draft(&draft)?;

    // Price suggestion only when the route distance is known.
    let suggested_price = match (draft.suggested_price, draft.distance_km) {
        (Some(price), _) => Some(price),
        (None, Some(distance)) => Some(pricing::compute_price(&quote_params(&draft, distance))?),
        (None, None) => None,
    };

    let now = Utc::now();
    let load = Load {
        id: Uuid::new_v4(),
        shipper_id: actor.id,
        title: draft.title,
        description: draft.description,
        origin: draft.origin,
        dest: draft.dest,
        distance_km: draft.distance_km,
        duration_min: draft.duration_min,
        load_type: draft.load_type,
        weight_kg: draft.weight_kg,
        volume_m3: draft.volume_m3,
        pallets: draft.pallets,
        pickup_date: draft.pickup_date,
        delivery_date: draft.delivery_date,
        suggested_price,
        min_price: draft.min_price,
        max_price: draft.max_price,
        final_price: None,
        requires_insurance: draft.requires_insurance,
        requires_cmr: draft.requires_cmr,
        requires_adr: draft.requires_adr,
        status: LoadStatus::Draft,
        published_at: None,
        expires_at: None,
        created_at: now,
        updated_at: now,
    };

    state.loads.insert(load.id, load.clone());
    Ok(load)
}

pub fn publish(state: &AppState, actor: &User, load_id: Uuid) -> Result<Load, AppError> {
    let lock = state.load_lock(load_id);
    let _guard = lock.lock().expect("load lock poisoned");

    let mut load = state
        .loads
        .get_mut(&load_id)
        .ok_or_else(|| AppError::NotFound(format!("load {load_id} not found")))?;

    if !can_manage(actor, load.shipper_id) {
        return Err(AppError::Forbidden(
            "only the load owner can publish it".to_string(),
        ));
    }

    if load.status != LoadStatus::Draft {
        return Err(AppError::Conflict(
            "only draft loads can be published".to_string(),
        ));
    }

    let now = Utc::now();
    load.status = LoadStatus::Published;
    load.published_at = Some(now);
    load.expires_at = Some(now + Duration::days(state.config.load_ttl_days));
    load.updated_at = now;

    let published = load.clone();
    drop(load);

    state.metrics.loads_published_total.inc();
    state.emit(DomainEvent::LoadPublished {
        load_id: published.id,
        origin_country: published.origin.country.clone(),
        dest_country: published.dest.country.clone(),
    });
    notify::load_published(&published);

    info!(load_id = %published.id, "load published");
    Ok(published)
}

/// Full field update, allowed only while no carrier has committed to the
/// current terms.
pub fn update(
    state: &AppState,
    actor: &User,
    load_id: Uuid,
    draft: LoadDraft,
) -> Result<Load, AppError> {
    validate_draft(&draft)?;

    let lock = state.load_lock(load_id);
    let _guard = lock.lock().expect("load lock poisoned");

    let mut load = state
        .loads
        .get_mut(&load_id)
        .ok_or_else(|| AppError::NotFound(format!("load {load_id} not found")))?;

    if !can_manage(actor, load.shipper_id) {
        return Err(AppError::Forbidden(
            "only the load owner can edit it".to_string(),
        ));
    }

    if !load.status.is_editable() {
        return Err(AppError::Conflict(format!(
            "load cannot be edited in status {:?}",
            load.status
        )));
    }

    load.title = draft.title;
    load.description = draft.description;
    load.origin = draft.origin;
    load.dest = draft.dest;
    load.load_type = draft.load_type;
    load.weight_kg = draft.weight_kg;
    load.volume_m3 = draft.volume_m3;
    load.pallets = draft.pallets;
    load.pickup_date = draft.pickup_date;
    load.delivery_date = draft.delivery_date;
    load.suggested_price = draft.suggested_price.or(load.suggested_price);
    load.min_price = draft.min_price;
    load.max_price = draft.max_price;
    load.requires_insurance = draft.requires_insurance;
    load.requires_cmr = draft.requires_cmr;
    load.requires_adr = draft.requires_adr;
    if draft.distance_km.is_some() {
        load.distance_km = draft.distance_km;
        load.duration_min = draft.duration_min;
    }
    load.updated_at = Utc::now();

    Ok(load.clone())
}

pub fn cancel(state: &AppState, actor: &User, load_id: Uuid) -> Result<Load, AppError> {
    let lock = state.load_lock(load_id);
    let _guard = lock.lock().expect("load lock poisoned");

    let assigned_carrier = state
        .trips
        .iter()
        .find(|entry| entry.value().load_id == load_id)
        .map(|entry| entry.value().carrier_id);

    let mut load = state
        .loads
        .get_mut(&load_id)
        .ok_or_else(|| AppError::NotFound(format!("load {load_id} not found")))?;

    let allowed = can_manage(actor, load.shipper_id) || assigned_carrier == Some(actor.id);
    if !allowed {
        return Err(AppError::Forbidden(
            "not a party to this load".to_string(),
        ));
    }

    if load.status.is_terminal() {
        return Err(AppError::Conflict(format!(
            "load cannot be cancelled in status {:?}",
            load.status
        )));
    }

    load.status = LoadStatus::Cancelled;
    load.updated_at = Utc::now();

    let cancelled = load.clone();
    drop(load);

    notify::load_cancelled(load_id);
    Ok(cancelled)
}

pub fn delete(state: &AppState, actor: &User, load_id: Uuid) -> Result<(), AppError> {
    let lock = state.load_lock(load_id);
    let _guard = lock.lock().expect("load lock poisoned");

    let load = state
        .loads
        .get(&load_id)
        .ok_or_else(|| AppError::NotFound(format!("load {load_id} not found")))?;

    if !can_manage(actor, load.shipper_id) {
        return Err(AppError::Forbidden(
            "only the load owner can delete it".to_string(),
        ));
    }

    if load.status != LoadStatus::Draft {
        return Err(AppError::Conflict(
            "only draft loads can be deleted".to_string(),
        ));
    }

    drop(load);
    state.loads.remove(&load_id);
    Ok(())
}

pub fn get(state: &AppState, load_id: Uuid) -> Result<Load, AppError> {
    state
        .loads
        .get(&load_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("load {load_id} not found")))
}

pub fn list(state: &AppState, filter: &LoadFilter) -> Vec<Load> {
    let mut loads: Vec<Load> = state
        .loads
        .iter()
        .filter(|entry| {
            let load = entry.value();
            filter.status.map_or(true, |s| load.status == s)
                && filter
                    .origin_country
                    .as_deref()
                    .map_or(true, |c| load.origin.country.eq_ignore_ascii_case(c))
                && filter
                    .dest_country
                    .as_deref()
                    .map_or(true, |c| load.dest.country.eq_ignore_ascii_case(c))
                && filter.load_type.map_or(true, |t| load.load_type == t)
                && filter.min_weight.map_or(true, |w| load.weight_kg >= w)
                && filter.max_weight.map_or(true, |w| load.weight_kg <= w)
        })
        .map(|entry| entry.value().clone())
        .collect();

    loads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    loads
}

/// Pending offers on a load, cheapest first. Restricted to the load owner.
pub fn pending_offers(
    state: &AppState,
    actor: &User,
    load_id: Uuid,
) -> Result<Vec<crate::models::offer::Offer>, AppError> {
    let load = get(state, load_id)?;

    if !can_manage(actor, load.shipper_id) {
        return Err(AppError::Forbidden(
            "only the load owner can view its offers".to_string(),
        ));
    }

    let mut offers: Vec<_> = state
        .offers
        .iter()
        .filter(|entry| {
            entry.value().load_id == load_id && entry.value().status == OfferStatus::Pending
        })
        .map(|entry| entry.value().clone())
        .collect();

    offers.sort_by(|a, b| a.price.cmp(&b.price));
    Ok(offers)
}
