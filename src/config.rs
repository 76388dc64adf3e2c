use std::collections::HashMap;
use std::env;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub sweep_interval_secs: u64,
    pub offer_ttl_hours: i64,
    pub load_ttl_days: i64,
    pub invoice_due_days: i64,
    pub vat: VatTable,
    pub mapbox_api_key: Option<String>,
    pub geocoding_timeout_ms: u64,
}

/// Country-keyed VAT rates with a flat fallback. Treated as configuration
/// data: overrides come from `VAT_RATES` as `DE=0.19,FR=0.20`.
#[derive(Debug, Clone)]
pub struct VatTable {
    pub default_rate: Decimal,
    pub overrides: HashMap<String, Decimal>,
}

impl VatTable {
    pub fn rate_for(&self, country: &str) -> Decimal {
        self.overrides
            .get(country)
            .copied()
            .unwrap_or(self.default_rate)
    }
}

impl Default for VatTable {
    fn default() -> Self {
        Self {
            default_rate: dec!(0.23),
            overrides: HashMap::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            sweep_interval_secs: 60,
            offer_ttl_hours: 48,
            load_ttl_days: 7,
            invoice_due_days: 30,
            vat: VatTable::default(),
            mapbox_api_key: None,
            geocoding_timeout_ms: 5000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            sweep_interval_secs: parse_or_default("SWEEP_INTERVAL_SECS", 60)?,
            offer_ttl_hours: parse_or_default("OFFER_TTL_HOURS", 48)?,
            load_ttl_days: parse_or_default("LOAD_TTL_DAYS", 7)?,
            invoice_due_days: parse_or_default("INVOICE_DUE_DAYS", 30)?,
            vat: VatTable {
                default_rate: parse_or_default("VAT_DEFAULT_RATE", dec!(0.23))?,
                overrides: parse_vat_overrides(&env::var("VAT_RATES").unwrap_or_default())?,
            },
            mapbox_api_key: env::var("MAPBOX_API_KEY").ok().filter(|k| !k.is_empty()),
            geocoding_timeout_ms: parse_or_default("GEOCODING_TIMEOUT_MS", 5000)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

fn parse_vat_overrides(raw: &str) -> Result<HashMap<String, Decimal>, AppError> {
    let mut overrides = HashMap::new();

    for entry in raw.split(',').filter(|s| !s.trim().is_empty()) {
        let (country, rate) = entry
            .split_once('=')
            .ok_or_else(|| AppError::Internal(format!("invalid VAT_RATES entry: {entry}")))?;
        let rate = rate
            .trim()
            .parse::<Decimal>()
            .map_err(|err| AppError::Internal(format!("invalid VAT rate for {country}: {err}")))?;
        overrides.insert(country.trim().to_uppercase(), rate);
    }

    Ok(overrides)
}
