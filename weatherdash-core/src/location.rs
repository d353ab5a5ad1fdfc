use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::{fmt::Debug, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::{
    error::{LocationError, WeatherError},
    model::Location,
    provider::{IpLocator, WeatherProvider},
};

/// Candidates requested from forward geocoding.
const SEARCH_LIMIT: u8 = 5;

/// A raw device position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
}

/// Device positioning (GPS, OS location service, user-supplied coordinates).
#[async_trait]
pub trait PositionSource: Send + Sync + Debug {
    /// `max_age` is a hint; the resolver rejects older fixes regardless.
    async fn current_position(&self, max_age: Duration) -> Result<PositionFix, LocationError>;
}

/// Used when the host has no positioning at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPositionSource;

#[async_trait]
impl PositionSource for NoPositionSource {
    async fn current_position(&self, _max_age: Duration) -> Result<PositionFix, LocationError> {
        Err(LocationError::PermissionDenied)
    }
}

/// Coordinates supplied up front, e.g. from the command line.
#[derive(Debug, Clone, Copy)]
pub struct StaticPosition {
    latitude: f64,
    longitude: f64,
    /// `None` means the coordinates are always current.
    captured_at: Option<DateTime<Utc>>,
}

impl StaticPosition {
    /// User-supplied coordinates; every read reports a fresh fix.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude, captured_at: None }
    }

    /// A recorded fix that keeps its original timestamp.
    pub fn from_fix(fix: PositionFix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            captured_at: Some(fix.captured_at),
        }
    }
}

#[async_trait]
impl PositionSource for StaticPosition {
    async fn current_position(&self, _max_age: Duration) -> Result<PositionFix, LocationError> {
        Ok(PositionFix {
            latitude: self.latitude,
            longitude: self.longitude,
            captured_at: self.captured_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Where a resolved location came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSource {
    Cached,
    Device,
    Ip,
    Default,
    Search,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub location: Location,
    pub source: LocationSource,
}

#[derive(Debug, Clone)]
pub struct LocationResolver {
    provider: Arc<dyn WeatherProvider>,
    position: Arc<dyn PositionSource>,
    ip: Arc<dyn IpLocator>,
    default_location: Location,
    timeout: Duration,
    max_age: Duration,
}

impl LocationResolver {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        position: Arc<dyn PositionSource>,
        ip: Arc<dyn IpLocator>,
        default_location: Location,
    ) -> Self {
        Self {
            provider,
            position,
            ip,
            default_location,
            timeout: Duration::from_secs(10),
            max_age: Duration::from_secs(300),
        }
    }

    pub fn with_limits(mut self, timeout: Duration, max_age: Duration) -> Self {
        self.timeout = timeout;
        self.max_age = max_age;
        self
    }

    /// Cached → device → IP → default. Never fails.
    pub async fn resolve(&self, cached: Option<&Location>, force_refresh: bool) -> Resolved {
        if !force_refresh {
            if let Some(location) = cached {
                debug!(name = %location.name, "Using cached location");
                return Resolved { location: location.clone(), source: LocationSource::Cached };
            }
        }

        match self.device_location().await {
            Ok(location) => {
                info!(name = %location.name, "Resolved device location");
                return Resolved { location, source: LocationSource::Device };
            }
            Err(err) => debug!(error = %err, "Device location unavailable, trying IP lookup"),
        }

        match self.ip.locate().await {
            Ok(location) => {
                info!(name = %location.name, "Resolved location from IP");
                Resolved { location, source: LocationSource::Ip }
            }
            Err(err) => {
                warn!(error = %err, "IP lookup failed, using default location");
                Resolved {
                    location: self.default_location.clone(),
                    source: LocationSource::Default,
                }
            }
        }
    }

    async fn device_location(&self) -> Result<Location, LocationError> {
        let fix = tokio::time::timeout(self.timeout, self.position.current_position(self.max_age))
            .await
            .map_err(|_| LocationError::Timeout)??;

        let max_age = TimeDelta::from_std(self.max_age).unwrap_or(TimeDelta::MAX);
        if Utc::now().signed_duration_since(fix.captured_at) > max_age {
            return Err(LocationError::Stale);
        }

        let location = match self.provider.reverse_geocode(fix.latitude, fix.longitude).await {
            Ok(Some(named)) => named,
            Ok(None) => Location::from_coords(fix.latitude, fix.longitude),
            Err(err) => {
                warn!(error = %err, "Reverse geocoding failed, keeping coordinates");
                Location::from_coords(fix.latitude, fix.longitude)
            }
        };
        Ok(location)
    }

    /// Best-ranked geocoding match for `term`. No match is an error, never a default.
    pub async fn search(&self, term: &str) -> Result<Resolved, WeatherError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(WeatherError::NotFound(String::new()));
        }

        let location = self
            .provider
            .geocode(term, SEARCH_LIMIT)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::NotFound(term.to_string()))?;

        info!(term, name = %location.name, "Search resolved");
        Ok(Resolved { location, source: LocationSource::Search })
    }
}
