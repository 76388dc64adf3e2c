use std::sync::Arc;
use std::sync::Mutex;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::geo::Geocoder;
use crate::models::event::DomainEvent;
use crate::models::invoice::Invoice;
use crate::models::load::Load;
use crate::models::offer::Offer;
use crate::models::rating::Rating;
use crate::models::trip::{LocationPing, Trip};
use crate::models::user::User;
use crate::models::vehicle::Vehicle;
use crate::observability::metrics::Metrics;
use crate::payments::PaymentGateway;

/// The single source of truth for all entities, constructed explicitly and
/// passed into handlers and background tasks.
pub struct AppState {
    pub users: DashMap<Uuid, User>,
    pub sessions: DashMap<String, Uuid>,
    pub vehicles: DashMap<Uuid, Vehicle>,
    pub loads: DashMap<Uuid, Load>,
    pub offers: DashMap<Uuid, Offer>,
    pub trips: DashMap<Uuid, Trip>,
    /// Per-trip append-only ping series, written outside the load lock.
    pub trip_locations: DashMap<Uuid, Vec<LocationPing>>,
    pub ratings: DashMap<Uuid, Rating>,
    pub invoices: DashMap<Uuid, Invoice>,
    load_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    pub events_tx: broadcast::Sender<DomainEvent>,
    pub geocoder: Geocoder,
    pub gateway: PaymentGateway,
    pub metrics: Metrics,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);
        let geocoder = Geocoder::from_config(&config)?;

        Ok(Self {
            users: DashMap::new(),
            sessions: DashMap::new(),
            vehicles: DashMap::new(),
            loads: DashMap::new(),
            offers: DashMap::new(),
            trips: DashMap::new(),
            trip_locations: DashMap::new(),
            ratings: DashMap::new(),
            invoices: DashMap::new(),
            load_locks: DashMap::new(),
            events_tx,
            geocoder,
            gateway: PaymentGateway::new(),
            metrics: Metrics::new(),
            config,
        })
    }

    /// Lock serializing status transitions of one load and its offers/trip.
    /// Location pings do not take this lock.
    pub fn load_lock(&self, load_id: Uuid) -> Arc<Mutex<()>> {
        self.load_locks
            .entry(load_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub fn emit(&self, event: DomainEvent) {
        let _ = self.events_tx.send(event);
    }
}
