//! Invoices derive their amounts from the accepted offer: subtotal is the
//! load's final price, the platform fee is a fixed share, VAT comes from the
//! configured country table. Charge capture is delegated to the gateway
//! under an idempotency key.

use chrono::{Datelike, Duration, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::lifecycle::can_manage;
use crate::models::invoice::{Invoice, InvoiceStatus};
use crate::models::offer::OfferStatus;
use crate::models::user::User;
use crate::payments::ChargeRequest;
use crate::pricing::{round_cents, PLATFORM_FEE_RATE};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewInvoice {
    pub load_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayInvoice {
    pub method: String,
    pub token: String,
}

pub fn create(state: &AppState, actor: &User, command: NewInvoice) -> Result<Invoice, AppError> {
    let load = state
        .loads
        .get(&command.load_id)
        .ok_or_else(|| AppError::NotFound(format!("load {} not found", command.load_id)))?
        .clone();

    let subtotal = load.final_price.ok_or_else(|| {
        AppError::Conflict("load has no accepted offer to invoice".to_string())
    })?;

    let carrier_id = state
        .offers
        .iter()
        .find(|entry| {
            entry.value().load_id == load.id && entry.value().status == OfferStatus::Accepted
        })
        .map(|entry| entry.value().carrier_id)
        .ok_or_else(|| AppError::Conflict("no accepted offer on this load".to_string()))?;

    // The carrier invoices the shipper.
    if actor.id != carrier_id && !actor.is_admin() {
        return Err(AppError::Forbidden(
            "only the load's carrier can issue the invoice".to_string(),
        ));
    }

    let duplicate = state
        .invoices
        .iter()
        .any(|entry| entry.value().load_id == load.id);
    if duplicate {
        return Err(AppError::Conflict(
            "load already has an invoice".to_string(),
        ));
    }

    let now = Utc::now();
    let vat_rate = state.config.vat.rate_for(&load.origin.country.to_uppercase());
    let vat_amount = round_cents(subtotal * vat_rate);
    let platform_fee = round_cents(subtotal * PLATFORM_FEE_RATE);
    let total = subtotal + vat_amount + platform_fee;

    let number = next_number(state);
    let invoice = Invoice {
        id: Uuid::new_v4(),
        pdf_url: format!("/invoices/{number}.pdf"),
        number,
        load_id: load.id,
        issuer_id: carrier_id,
        recipient_id: load.shipper_id,
        subtotal,
        vat_rate,
        vat_amount,
        platform_fee,
        total,
        currency: "EUR".to_string(),
        status: InvoiceStatus::Issued,
        issue_date: now,
        due_date: now + Duration::days(state.config.invoice_due_days),
        paid_at: None,
        payment_reference: None,
    };

    state.invoices.insert(invoice.id, invoice.clone());
    info!(invoice = %invoice.number, load_id = %load.id, "invoice issued");

    Ok(invoice)
}

pub async fn pay(
    state: &AppState,
    actor: &User,
    invoice_id: Uuid,
    command: PayInvoice,
) -> Result<Invoice, AppError> {
    let invoice = state
        .invoices
        .get(&invoice_id)
        .ok_or_else(|| AppError::NotFound(format!("invoice {invoice_id} not found")))?
        .clone();

    if !can_manage(actor, invoice.recipient_id) {
        return Err(AppError::Forbidden(
            "only the invoice recipient can pay it".to_string(),
        ));
    }

    match invoice.status {
        InvoiceStatus::Issued | InvoiceStatus::Overdue => {}
        InvoiceStatus::Paid => {
            return Err(AppError::Conflict("invoice is already paid".to_string()))
        }
        InvoiceStatus::Cancelled => {
            return Err(AppError::Conflict("invoice is cancelled".to_string()))
        }
    }

    // The invoice is only marked paid after the gateway confirms; a decline
    // leaves it untouched.
    let receipt = state
        .gateway
        .charge(ChargeRequest {
            amount: invoice.total,
            currency: invoice.currency.clone(),
            method: command.method,
            token: command.token,
            idempotency_key: format!("invoice-{invoice_id}"),
        })
        .await?;

    let mut stored = state
        .invoices
        .get_mut(&invoice_id)
        .ok_or_else(|| AppError::Internal("invoice vanished mid-payment".to_string()))?;
    stored.status = InvoiceStatus::Paid;
    stored.paid_at = Some(Utc::now());
    stored.payment_reference = Some(receipt.reference.clone());

    info!(invoice = %stored.number, reference = %receipt.reference, "invoice paid");
    Ok(stored.clone())
}

pub fn cancel(state: &AppState, actor: &User, invoice_id: Uuid) -> Result<Invoice, AppError> {
    if !actor.is_admin() {
        return Err(AppError::Forbidden(
            "only admins can cancel invoices".to_string(),
        ));
    }

    let mut invoice = state
        .invoices
        .get_mut(&invoice_id)
        .ok_or_else(|| AppError::NotFound(format!("invoice {invoice_id} not found")))?;

    if invoice.status == InvoiceStatus::Paid {
        return Err(AppError::Conflict(
            "paid invoices cannot be cancelled".to_string(),
        ));
    }

    invoice.status = InvoiceStatus::Cancelled;
    Ok(invoice.clone())
}

pub fn get(state: &AppState, actor: &User, invoice_id: Uuid) -> Result<Invoice, AppError> {
    let invoice = state
        .invoices
        .get(&invoice_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("invoice {invoice_id} not found")))?;

    let involved = actor.id == invoice.issuer_id || actor.id == invoice.recipient_id;
    if !involved && !actor.is_admin() {
        return Err(AppError::Forbidden(
            "not a party to this invoice".to_string(),
        ));
    }

    Ok(invoice)
}

/// `FB{year}{month}{seq}`, sequence scoped to the current month.
fn next_number(state: &AppState) -> String {
    let now = Utc::now();
    let prefix = format!("FB{}{:02}", now.year(), now.month());
    let count = state
        .invoices
        .iter()
        .filter(|entry| entry.value().number.starts_with(&prefix))
        .count();

    format!("{prefix}{:04}", count + 1)
}
