//! User location detection for the campus map.
//!
//! DESIGN
//! ======
//! Detection walks a fixed chain and stops at the first success: the location
//! stored earlier in the session, then each provider in order (device first,
//! then IP lookup), then a hard-coded campus default. Whatever wins is written
//! back to the session store, so later page views skip the providers.
//!
//! ERROR HANDLING
//! ==============
//! Provider failures are logged at `warn` and fall through to the next link.
//! Detection itself never fails.

#[cfg(test)]
#[path = "geo_test.rs"]
mod geo_test;

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::net::api::{IP_LOCATION_URL, decode_json};
use crate::net::transport::{ApiRequest, Transport};
use crate::net::types::IpLocationResponse;

/// Session storage key for the detected location.
pub const SESSION_KEY: &str = "userLocation";
pub const IP_ACCURACY_M: f64 = 5000.0;
pub const DEFAULT_ACCURACY_M: f64 = 10_000.0;
pub const DEFAULT_LAT: f64 = -1.2921;
pub const DEFAULT_LNG: f64 = 36.8219;

const DIRECTIONS_URL: &str = "https://www.google.com/maps/dir/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationSource {
    #[serde(rename = "GPS")]
    Gps,
    #[serde(rename = "IP")]
    Ip,
    Default,
}

impl LocationSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gps => "GPS",
            Self::Ip => "IP",
            Self::Default => "Default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    /// Radius in meters.
    pub accuracy: f64,
    pub source: LocationSource,
}

impl Location {
    #[must_use]
    pub fn campus_default() -> Self {
        Self { lat: DEFAULT_LAT, lng: DEFAULT_LNG, accuracy: DEFAULT_ACCURACY_M, source: LocationSource::Default }
    }

    /// Walking directions from this location to a named destination.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the URL cannot be assembled.
    pub fn directions_url(&self, destination: &str) -> Result<String, ClientError> {
        let origin = format!("{},{}", self.lat, self.lng);
        let params = [
            ("api", "1"),
            ("origin", origin.as_str()),
            ("destination", destination),
            ("travelmode", "walking"),
        ];
        Url::parse_with_params(DIRECTIONS_URL, params)
            .map(String::from)
            .map_err(|e| ClientError::InvalidInput(e.to_string()))
    }
}

/// Detected location plus whether it came from the session store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub location: Location,
    pub from_session: bool,
}

// =============================================================================
// SEAMS
// =============================================================================

#[async_trait]
pub trait LocationProvider: Send + Sync {
    fn source(&self) -> LocationSource;

    async fn locate(&self) -> Result<Location, ClientError>;
}

/// Per-session key/value storage (the browser's `sessionStorage`).
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String);
}

#[derive(Debug, Default)]
pub struct MemorySession {
    entries: Mutex<HashMap<String, String>>,
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_owned(), value);
        }
    }
}

// =============================================================================
// PROVIDERS
// =============================================================================

/// Coordinates supplied up front, e.g. a device fix passed on the command line.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    location: Location,
}

impl FixedLocation {
    #[must_use]
    pub fn gps(lat: f64, lng: f64, accuracy: f64) -> Self {
        Self { location: Location { lat, lng, accuracy, source: LocationSource::Gps } }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    fn source(&self) -> LocationSource {
        self.location.source
    }

    async fn locate(&self) -> Result<Location, ClientError> {
        Ok(self.location)
    }
}

/// Approximate location from the caller's public IP.
pub struct IpLocationProvider<T> {
    transport: T,
    url: String,
}

impl<T> IpLocationProvider<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, url: IP_LOCATION_URL.to_owned() }
    }
}

#[async_trait]
impl<T: Transport> LocationProvider for IpLocationProvider<T> {
    fn source(&self) -> LocationSource {
        LocationSource::Ip
    }

    async fn locate(&self) -> Result<Location, ClientError> {
        let response = self.transport.send(ApiRequest::get(self.url.as_str())).await?;
        let reply: IpLocationResponse = decode_json(&response)?;
        match (reply.latitude, reply.longitude) {
            (Some(lat), Some(lng)) if lat.abs() > f64::EPSILON && lng.abs() > f64::EPSILON => {
                Ok(Location { lat, lng, accuracy: IP_ACCURACY_M, source: LocationSource::Ip })
            }
            _ => Err(ClientError::Parse("invalid IP geolocation response".into())),
        }
    }
}

// =============================================================================
// DETECTION
// =============================================================================

/// Resolve the user's location through the session store, `providers` in
/// order, and finally the campus default. The result is stored in `session`.
pub async fn detect_location(session: &dyn SessionStore, providers: &[&dyn LocationProvider]) -> Detection {
    if let Some(location) = stored_location(session) {
        tracing::info!(source = location.source.as_str(), "using stored location");
        return Detection { location, from_session: true };
    }

    let mut detected = None;
    for provider in providers {
        match provider.locate().await {
            Ok(location) => {
                detected = Some(location);
                break;
            }
            Err(e) => {
                tracing::warn!(source = provider.source().as_str(), error = %e, "location provider failed");
            }
        }
    }

    let location = detected.unwrap_or_else(|| {
        tracing::warn!("using default location");
        Location::campus_default()
    });

    match serde_json::to_string(&location) {
        Ok(json) => session.set(SESSION_KEY, json),
        Err(e) => tracing::warn!(error = %e, "could not store location"),
    }
    tracing::info!(source = location.source.as_str(), "location detected");
    Detection { location, from_session: false }
}

fn stored_location(session: &dyn SessionStore) -> Option<Location> {
    let raw = session.get(SESSION_KEY)?;
    serde_json::from_str(&raw)
        .map_err(|e| tracing::warn!(error = %e, "ignoring unreadable stored location"))
        .ok()
}
