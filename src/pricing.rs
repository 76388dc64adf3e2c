//! Freight pricing: zone base rates, cargo/weight multipliers, international
//! surcharge, flat add-ons, and the VAT/platform-fee breakdown.
//!
//! All functions are pure. Monetary amounts are `Decimal` rounded
//! half-away-from-zero at cent granularity.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::VatTable;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadType {
    General,
    Palletized,
    Refrigerated,
    Fragile,
    Hazardous,
    Oversized,
    Liquid,
    Bulk,
}

struct Zone {
    countries: &'static [&'static str],
    base_rate: Decimal,
}

/// EU pricing zones, EUR per km. Zone 1 doubles as the fallback for country
/// codes missing from every table; an unknown country is a policy case, not
/// an error.
const ZONES: [Zone; 8] = [
    Zone { countries: &["PT", "ES"], base_rate: dec!(0.85) },
    Zone { countries: &["FR", "BE", "NL", "LU"], base_rate: dec!(0.95) },
    Zone { countries: &["DE", "AT", "CH"], base_rate: dec!(1.05) },
    Zone { countries: &["IT", "GR"], base_rate: dec!(0.90) },
    Zone { countries: &["PL", "CZ", "HU", "SK", "SI", "HR"], base_rate: dec!(0.75) },
    Zone { countries: &["DK", "SE", "FI", "NO"], base_rate: dec!(1.15) },
    Zone { countries: &["EE", "LV", "LT"], base_rate: dec!(0.80) },
    Zone { countries: &["RO", "BG"], base_rate: dec!(0.70) },
];

const INTERNATIONAL_MULTIPLIER: Decimal = dec!(1.25);
/// Shared with billing: invoices charge the same platform share as quotes.
pub const PLATFORM_FEE_RATE: Decimal = dec!(0.10);

const INSURANCE_FEE: Decimal = dec!(50);
const CMR_FEE: Decimal = dec!(30);
const ADR_FEE: Decimal = dec!(100);

const RANGE_LOW: Decimal = dec!(0.85);
const RANGE_HIGH: Decimal = dec!(1.10);

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteParams {
    pub distance_km: f64,
    pub weight_kg: f64,
    pub load_type: LoadType,
    pub origin_country: String,
    pub dest_country: String,
    #[serde(default)]
    pub requires_insurance: bool,
    #[serde(default)]
    pub requires_cmr: bool,
    #[serde(default)]
    pub requires_adr: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Decimal,
    pub platform_fee: Decimal,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub total: Decimal,
    pub currency: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRange {
    pub min_price: Decimal,
    pub suggested_price: Decimal,
    pub max_price: Decimal,
    pub currency: &'static str,
}

pub fn compute_price(params: &QuoteParams) -> Result<Decimal, AppError> {
    validate(params)?;

    let distance = Decimal::from_f64_retain(params.distance_km)
        .ok_or_else(|| AppError::Validation("distance is not representable".to_string()))?;

    let base_rate =
        (zone_rate(&params.origin_country) + zone_rate(&params.dest_country)) / dec!(2);

    let mut price = distance * base_rate;
    price *= load_type_multiplier(params.load_type);
    price *= weight_multiplier(params.weight_kg);

    if !params
        .origin_country
        .eq_ignore_ascii_case(&params.dest_country)
    {
        price *= INTERNATIONAL_MULTIPLIER;
    }

    if params.requires_insurance {
        price += INSURANCE_FEE;
    }
    if params.requires_cmr {
        price += CMR_FEE;
    }
    if params.requires_adr {
        price += ADR_FEE;
    }

    Ok(round_cents(price))
}

/// Each line item is rounded to cents independently before summing, so the
/// total never drifts a cent from the parts.
pub fn price_breakdown(params: &QuoteParams, vat: &VatTable) -> Result<PriceBreakdown, AppError> {
    let subtotal = compute_price(params)?;
    let platform_fee = round_cents(subtotal * PLATFORM_FEE_RATE);
    let vat_rate = vat.rate_for(&params.origin_country.to_uppercase());
    let vat_amount = round_cents(subtotal * vat_rate);
    let total = subtotal + vat_amount + platform_fee;

    Ok(PriceBreakdown {
        subtotal,
        platform_fee,
        vat_rate,
        vat_amount,
        total,
        currency: "EUR",
    })
}

/// Guidance for carriers bidding on a load: [-15%, +10%] around the base price.
pub fn suggested_range(params: &QuoteParams) -> Result<PriceRange, AppError> {
    let base = compute_price(params)?;

    Ok(PriceRange {
        min_price: round_cents(base * RANGE_LOW),
        suggested_price: base,
        max_price: round_cents(base * RANGE_HIGH),
        currency: "EUR",
    })
}

pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn validate(params: &QuoteParams) -> Result<(), AppError> {
    if !params.distance_km.is_finite() || params.distance_km < 0.0 {
        return Err(AppError::Validation(
            "distance_km must be a non-negative number".to_string(),
        ));
    }

    if !params.weight_kg.is_finite() || params.weight_kg < 0.0 {
        return Err(AppError::Validation(
            "weight_kg must be a non-negative number".to_string(),
        ));
    }

    Ok(())
}

fn zone_rate(country: &str) -> Decimal {
    ZONES
        .iter()
        .find(|zone| {
            zone.countries
                .iter()
                .any(|c| c.eq_ignore_ascii_case(country))
        })
        .unwrap_or(&ZONES[0])
        .base_rate
}

fn load_type_multiplier(load_type: LoadType) -> Decimal {
    match load_type {
        LoadType::General => dec!(1.0),
        LoadType::Palletized => dec!(1.1),
        LoadType::Refrigerated => dec!(1.4),
        LoadType::Fragile => dec!(1.2),
        LoadType::Hazardous => dec!(1.8),
        LoadType::Oversized => dec!(1.5),
        LoadType::Liquid => dec!(1.3),
        LoadType::Bulk => dec!(1.15),
    }
}

/// Step function: heavier shipments cost proportionally more per km.
fn weight_multiplier(weight_kg: f64) -> Decimal {
    if weight_kg <= 1_000.0 {
        dec!(1.0)
    } else if weight_kg <= 5_000.0 {
        dec!(1.1)
    } else if weight_kg <= 10_000.0 {
        dec!(1.2)
    } else if weight_kg <= 20_000.0 {
        dec!(1.3)
    } else {
        dec!(1.4)
    }
}
