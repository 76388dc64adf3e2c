use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration};
use tracing::info;
use uuid::Uuid;

use crate::models::invoice::InvoiceStatus;
use crate::models::offer::OfferStatus;
use crate::state::AppState;

/// Background task flipping time-based statuses: pending offers past their
/// 48h window become EXPIRED, issued invoices past due become OVERDUE.
pub async fn run_expiry_sweeper(state: Arc<AppState>) {
    info!("expiry sweeper started");

    let mut ticker = interval(Duration::from_secs(state.config.sweep_interval_secs));
    loop {
        ticker.tick().await;
        sweep(&state);
    }
}

pub fn sweep(state: &AppState) {
    let now = Utc::now();

    let expired_offers: Vec<Uuid> = state
        .offers
        .iter()
        .filter(|entry| entry.value().is_expired(now))
        .map(|entry| *entry.key())
        .collect();

    for offer_id in expired_offers {
        if let Some(mut offer) = state.offers.get_mut(&offer_id) {
            if offer.status == OfferStatus::Pending {
                offer.status = OfferStatus::Expired;
                state
                    .metrics
                    .offers_total
                    .with_label_values(&["expired"])
                    .inc();
                info!(%offer_id, "offer expired");
            }
        }
    }

    let overdue_invoices: Vec<Uuid> = state
        .invoices
        .iter()
        .filter(|entry| {
            let invoice = entry.value();
            invoice.status == InvoiceStatus::Issued && invoice.due_date < now
        })
        .map(|entry| *entry.key())
        .collect();

    for invoice_id in overdue_invoices {
        if let Some(mut invoice) = state.invoices.get_mut(&invoice_id) {
            if invoice.status == InvoiceStatus::Issued {
                invoice.status = InvoiceStatus::Overdue;
                info!(%invoice_id, "invoice overdue");
            }
        }
    }
}
