//! State machines for loads, offers, trips and ratings. Every transition is
//! guard-checked before any mutation; multi-entity transitions run under the
//! owning load's lock.

pub mod expiry;
pub mod load;
pub mod offer;
pub mod rating;
pub mod trip;

use uuid::Uuid;

use crate::models::user::User;

pub(crate) fn can_manage(actor: &User, owner_id: Uuid) -> bool {
    actor.id == owner_id || actor.is_admin()
}
