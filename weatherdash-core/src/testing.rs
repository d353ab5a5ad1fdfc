//! In-process doubles for the provider seams, shared by unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    error::WeatherError,
    model::{CurrentConditions, Forecast, ForecastSample, Location, Unit},
    provider::{IpLocator, WeatherProvider},
};

pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

pub(crate) fn conditions(temperature: f64) -> CurrentConditions {
    CurrentConditions {
        temperature,
        feels_like: temperature - 1.0,
        description: "clear sky".to_string(),
        condition_code: Some(800),
        icon: Some("01d".to_string()),
        wind_speed: 5.0,
        wind_direction: Some(90),
        humidity: 60,
        pressure: 1015,
        visibility: Some(10_000),
        sunrise: None,
        sunset: None,
        observed_at: fixed_now(),
    }
}

/// Five days of 3-hourly samples starting at midnight after `fixed_now`.
pub(crate) fn forecast() -> Forecast {
    let start = Utc.with_ymd_and_hms(2026, 10, 20, 0, 0, 0).unwrap();
    let samples = (0..40)
        .map(|i| ForecastSample {
            timestamp: start + Duration::hours(3 * i),
            temp: 15.0,
            temp_min: 10.0 + (i % 8) as f64,
            temp_max: 12.0 + (i % 8) as f64,
            humidity: 50,
            wind_speed: 4.0,
            condition_code: Some(801),
            icon: Some("02d".to_string()),
            description: "few clouds".to_string(),
            pop: 0.2,
        })
        .collect();
    Forecast { samples, utc_offset_seconds: 0 }
}

fn unavailable() -> WeatherError {
    WeatherError::Status {
        endpoint: "weather",
        status: 503,
        body: "unavailable".to_string(),
    }
}

/// Scriptable provider. The current temperature of a successful call equals
/// the number of `current` calls made so far, so tests can tell attempts apart.
#[derive(Debug, Default)]
pub(crate) struct FakeProvider {
    pub current_failures: AtomicUsize,
    pub forecast_failures: AtomicUsize,
    pub permanent_failure: bool,
    pub current_calls: AtomicUsize,
    pub forecast_calls: AtomicUsize,
    pub units: Mutex<Vec<Unit>>,
    pub geocode_results: Vec<Location>,
    pub reverse_result: Option<Location>,
    pub reverse_fails: bool,
}

impl FakeProvider {
    pub fn failing_current(times: usize) -> Self {
        Self {
            current_failures: AtomicUsize::new(times),
            ..Self::default()
        }
    }

    pub fn with_geocode(results: Vec<Location>) -> Self {
        Self {
            geocode_results: results,
            ..Self::default()
        }
    }

    pub fn requested_units(&self) -> Vec<Unit> {
        self.units.lock().unwrap().clone()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl WeatherProvider for FakeProvider {
    async fn current(
        &self,
        _location: &Location,
        unit: Unit,
    ) -> Result<CurrentConditions, WeatherError> {
        let call = self.current_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.units.lock().unwrap().push(unit);
        if self.permanent_failure {
            return Err(WeatherError::Parse {
                endpoint: "weather",
                message: "garbage".to_string(),
            });
        }
        if Self::take_failure(&self.current_failures) {
            return Err(unavailable());
        }
        Ok(conditions(call as f64))
    }

    async fn forecast(&self, _location: &Location, _unit: Unit) -> Result<Forecast, WeatherError> {
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.forecast_failures) {
            return Err(unavailable());
        }
        Ok(forecast())
    }

    async fn geocode(&self, _query: &str, limit: u8) -> Result<Vec<Location>, WeatherError> {
        Ok(self.geocode_results.iter().take(limit as usize).cloned().collect())
    }

    async fn reverse_geocode(
        &self,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<Option<Location>, WeatherError> {
        if self.reverse_fails {
            return Err(unavailable());
        }
        Ok(self.reverse_result.clone())
    }
}

#[derive(Debug)]
pub(crate) struct FakeIpLocator {
    pub result: Option<Location>,
    pub calls: AtomicUsize,
}

impl FakeIpLocator {
    pub fn returning(location: Location) -> Self {
        Self { result: Some(location), calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { result: None, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl IpLocator for FakeIpLocator {
    async fn locate(&self) -> Result<Location, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().ok_or_else(unavailable)
    }
}
