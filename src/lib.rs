pub mod api;
pub mod billing;
pub mod config;
pub mod error;
pub mod geo;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod observability;
pub mod payments;
pub mod pricing;
pub mod state;
