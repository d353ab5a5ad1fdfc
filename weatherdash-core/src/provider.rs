use crate::{
    Config,
    error::WeatherError,
    model::{CurrentConditions, Forecast, Location, Unit},
    provider::{ipapi::IpApiLocator, openweather::OpenWeatherProvider},
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod ipapi;
pub mod openweather;

/// Remote source of weather data and place names.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn current(
        &self,
        location: &Location,
        unit: Unit,
    ) -> Result<CurrentConditions, WeatherError>;

    /// 5-day forecast in 3-hour steps, oldest first.
    async fn forecast(&self, location: &Location, unit: Unit) -> Result<Forecast, WeatherError>;

    /// Forward geocoding, best-ranked candidate first.
    async fn geocode(&self, query: &str, limit: u8) -> Result<Vec<Location>, WeatherError>;

    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Location>, WeatherError>;
}

/// Coarse location inferred from the caller's IP address.
#[async_trait]
pub trait IpLocator: Send + Sync + Debug {
    async fn locate(&self) -> Result<Location, WeatherError>;
}

/// Construct the weather provider from config.
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn WeatherProvider>, WeatherError> {
    let api_key = config.resolve_api_key().ok_or(WeatherError::MissingApiKey)?;

    let provider = OpenWeatherProvider::new(api_key, config.endpoints.clone())?;
    Ok(Arc::new(provider))
}

pub fn ip_locator_from_config(config: &Config) -> Result<Arc<dyn IpLocator>, WeatherError> {
    Ok(Arc::new(IpApiLocator::new(config.endpoints.ip_lookup.clone())?))
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        if std::env::var(crate::config::API_KEY_ENV).is_ok() {
            return;
        }
        let cfg = Config::default();
        let err = provider_from_config(&cfg).unwrap_err();
        assert!(matches!(err, WeatherError::MissingApiKey));
    }

    #[test]
    fn provider_from_config_works_when_configured() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".to_string());
        assert!(provider_from_config(&cfg).is_ok());
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "é".repeat(150);
        let out = truncate_body(&body);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
