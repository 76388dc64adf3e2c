//! Fire-and-forget notifications. Delivery failures are logged and never
//! block or fail the API call that triggered them; the transport behind this
//! is expected to be an email/push provider.

use tracing::info;
use uuid::Uuid;

use crate::models::load::Load;

pub fn load_published(load: &Load) {
    info!(
        load_id = %load.id,
        origin = %load.origin.country,
        dest = %load.dest.country,
        "notifying eligible carriers of published load"
    );
}

pub fn offer_received(load_id: Uuid, carrier_id: Uuid) {
    info!(%load_id, %carrier_id, "notifying shipper of new offer");
}

pub fn offer_accepted(offer_id: Uuid, carrier_id: Uuid) {
    info!(%offer_id, %carrier_id, "notifying carrier of accepted offer");
}

pub fn load_cancelled(load_id: Uuid) {
    info!(%load_id, "notifying parties of cancelled load");
}
