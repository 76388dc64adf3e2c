pub mod event;
pub mod invoice;
pub mod load;
pub mod offer;
pub mod rating;
pub mod trip;
pub mod user;
pub mod vehicle;
