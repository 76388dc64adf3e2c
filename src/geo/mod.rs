//! Distance and geocoding. The external provider is best-effort: any failure
//! or absence falls back to haversine distance at a fixed average speed and
//! never surfaces to the caller.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::Config;
use crate::error::AppError;
use crate::models::load::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;
const AVERAGE_SPEED_KMH: f64 = 80.0;

#[derive(Debug, Clone, Copy)]
pub struct RouteEstimate {
    pub distance_km: f64,
    pub duration_min: u32,
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn fallback_estimate(origin: &GeoPoint, dest: &GeoPoint) -> RouteEstimate {
    let distance_km = haversine_km(origin, dest);
    let duration_min = (distance_km / AVERAGE_SPEED_KMH * 60.0).round() as u32;

    RouteEstimate {
        distance_km,
        duration_min,
    }
}

pub enum Geocoder {
    Mapbox(MapboxClient),
    Offline,
}

impl Geocoder {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        match &config.mapbox_api_key {
            Some(key) => Ok(Geocoder::Mapbox(MapboxClient::new(
                key.clone(),
                Duration::from_millis(config.geocoding_timeout_ms),
            )?)),
            None => Ok(Geocoder::Offline),
        }
    }

    /// Resolve an address to coordinates. `None` when the provider is absent
    /// or the lookup fails; loads are created without coordinates in that case.
    pub async fn geocode(&self, address: &str) -> Option<GeoPoint> {
        match self {
            Geocoder::Mapbox(client) => match client.geocode(address).await {
                Ok(point) => Some(point),
                Err(err) => {
                    warn!(error = %err, address, "geocoding failed");
                    None
                }
            },
            Geocoder::Offline => None,
        }
    }

    /// Road distance and duration between two points, falling back to a
    /// haversine estimate at a fixed average speed.
    pub async fn route(&self, origin: &GeoPoint, dest: &GeoPoint) -> RouteEstimate {
        match self {
            Geocoder::Mapbox(client) => match client.route(origin, dest).await {
                Ok(estimate) => estimate,
                Err(err) => {
                    warn!(error = %err, "route lookup failed; using haversine estimate");
                    fallback_estimate(origin, dest)
                }
            },
            Geocoder::Offline => fallback_estimate(origin, dest),
        }
    }
}

pub struct MapboxClient {
    http: reqwest::Client,
    api_key: String,
}

#[derive(Deserialize)]
struct GeocodeResponse {
    features: Vec<GeocodeFeature>,
}

#[derive(Deserialize)]
struct GeocodeFeature {
    center: [f64; 2],
}

#[derive(Deserialize)]
struct DirectionsResponse {
    routes: Vec<DirectionsRoute>,
}

#[derive(Deserialize)]
struct DirectionsRoute {
    distance: f64,
    duration: f64,
}

impl MapboxClient {
    fn new(api_key: String, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| AppError::Internal(format!("failed to build http client: {err}")))?;

        Ok(Self { http, api_key })
    }

    async fn geocode(&self, address: &str) -> Result<GeoPoint, AppError> {
        let url = format!(
            "https://api.mapbox.com/geocoding/v5/mapbox.places/{}.json",
            urlencode(address)
        );

        let response: GeocodeResponse = self
            .http
            .get(&url)
            .query(&[("access_token", self.api_key.as_str()), ("limit", "1")])
            .send()
            .await
            .map_err(|err| AppError::ExternalService(format!("geocoding request: {err}")))?
            .json()
            .await
            .map_err(|err| AppError::ExternalService(format!("geocoding response: {err}")))?;

        let feature = response
            .features
            .first()
            .ok_or_else(|| AppError::ExternalService("address not found".to_string()))?;

        Ok(GeoPoint {
            lat: feature.center[1],
            lng: feature.center[0],
        })
    }

    async fn route(&self, origin: &GeoPoint, dest: &GeoPoint) -> Result<RouteEstimate, AppError> {
        let url = format!(
            "https://api.mapbox.com/directions/v5/mapbox/driving/{},{};{},{}",
            origin.lng, origin.lat, dest.lng, dest.lat
        );

        let response: DirectionsResponse = self
            .http
            .get(&url)
            .query(&[("access_token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|err| AppError::ExternalService(format!("directions request: {err}")))?
            .json()
            .await
            .map_err(|err| AppError::ExternalService(format!("directions response: {err}")))?;

        let route = response
            .routes
            .first()
            .ok_or_else(|| AppError::ExternalService("no route found".to_string()))?;

        Ok(RouteEstimate {
            distance_km: route.distance / 1_000.0,
            duration_min: (route.duration / 60.0).round() as u32,
        })
    }
}

fn urlencode(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::{fallback_estimate, haversine_km};
    use crate::models::load::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 38.7223,
            lng: -9.1393,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn lisbon_to_madrid_is_around_500_km() {
        let lisbon = GeoPoint {
            lat: 38.7223,
            lng: -9.1393,
        };
        let madrid = GeoPoint {
            lat: 40.4168,
            lng: -3.7038,
        };
        let distance = haversine_km(&lisbon, &madrid);
        assert!((distance - 502.0).abs() < 10.0);
    }

    #[test]
    fn fallback_assumes_80_kmh() {
        let lisbon = GeoPoint {
            lat: 38.7223,
            lng: -9.1393,
        };
        let madrid = GeoPoint {
            lat: 40.4168,
            lng: -3.7038,
        };
        let estimate = fallback_estimate(&lisbon, &madrid);
        let expected = (estimate.distance_km / 80.0 * 60.0).round() as u32;
        assert_eq!(estimate.duration_min, expected);
    }
}
