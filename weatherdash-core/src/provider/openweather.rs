use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::{
    config::Endpoints,
    error::WeatherError,
    model::{CurrentConditions, Forecast, ForecastSample, Location, Unit},
};

use super::{WeatherProvider, truncate_body};

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Client for the OpenWeather current, forecast and geocoding endpoints.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    endpoints: Endpoints,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, endpoints: Endpoints) -> Result<Self, WeatherError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { api_key, endpoints, http })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let res = self
            .http
            .get(&url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(WeatherError::Status {
                endpoint,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| WeatherError::Parse {
            endpoint,
            message: e.to_string(),
        })
    }

    fn coordinate_query(location: &Location, unit: Unit) -> Vec<(&'static str, String)> {
        vec![
            ("lat", location.latitude.to_string()),
            ("lon", location.longitude.to_string()),
            ("units", unit.as_str().to_string()),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    temp_min: f64,
    temp_max: f64,
    pressure: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    id: u16,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    #[serde(default)]
    deg: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct OwSys {
    #[serde(default)]
    sunrise: Option<i64>,
    #[serde(default)]
    sunset: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    visibility: Option<u32>,
    #[serde(default)]
    sys: OwSys,
}

#[derive(Debug, Deserialize)]
struct OwCity {
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    #[serde(default)]
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    pop: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct OwGeoEntry {
    name: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    country: String,
}

impl From<OwGeoEntry> for Location {
    fn from(entry: OwGeoEntry) -> Self {
        Location::new(entry.lat, entry.lon, entry.name, entry.country)
    }
}

impl OwCurrentResponse {
    fn into_conditions(self) -> CurrentConditions {
        let weather = self.weather.into_iter().next();
        CurrentConditions {
            temperature: self.main.temp,
            feels_like: self.main.feels_like.unwrap_or(self.main.temp),
            description: weather
                .as_ref()
                .map(|w| w.description.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            condition_code: weather.as_ref().map(|w| w.id),
            icon: weather.map(|w| w.icon),
            wind_speed: self.wind.speed,
            wind_direction: self.wind.deg,
            humidity: self.main.humidity,
            pressure: self.main.pressure.round() as u32,
            visibility: self.visibility,
            sunrise: self.sys.sunrise.and_then(unix_to_utc),
            sunset: self.sys.sunset.and_then(unix_to_utc),
            observed_at: unix_to_utc(self.dt).unwrap_or_else(Utc::now),
        }
    }
}

impl OwForecastEntry {
    fn into_sample(self) -> Option<ForecastSample> {
        let timestamp = unix_to_utc(self.dt)?;
        let weather = self.weather.into_iter().next();
        Some(ForecastSample {
            timestamp,
            temp: self.main.temp,
            temp_min: self.main.temp_min,
            temp_max: self.main.temp_max,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
            condition_code: weather.as_ref().map(|w| w.id),
            description: weather
                .as_ref()
                .map(|w| w.description.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            icon: weather.map(|w| w.icon),
            pop: self.pop,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(
        skip(self, location, unit),
        fields(lat = %location.latitude, lon = %location.longitude, unit = %unit)
    )]
    async fn current(
        &self,
        location: &Location,
        unit: Unit,
    ) -> Result<CurrentConditions, WeatherError> {
        let url = format!("{}/weather", self.endpoints.weather);
        let parsed: OwCurrentResponse = self
            .get_json("weather", url, &Self::coordinate_query(location, unit))
            .await?;
        debug!("Received current conditions");
        Ok(parsed.into_conditions())
    }

    #[instrument(
        skip(self, location, unit),
        fields(lat = %location.latitude, lon = %location.longitude, unit = %unit)
    )]
    async fn forecast(&self, location: &Location, unit: Unit) -> Result<Forecast, WeatherError> {
        let url = format!("{}/forecast", self.endpoints.weather);
        let parsed: OwForecastResponse = self
            .get_json("forecast", url, &Self::coordinate_query(location, unit))
            .await?;

        let mut samples: Vec<ForecastSample> =
            parsed.list.into_iter().filter_map(OwForecastEntry::into_sample).collect();
        samples.sort_by_key(|s| s.timestamp);
        debug!(samples = samples.len(), "Received forecast");

        Ok(Forecast { samples, utc_offset_seconds: parsed.city.timezone })
    }

    #[instrument(skip(self))]
    async fn geocode(&self, query: &str, limit: u8) -> Result<Vec<Location>, WeatherError> {
        let url = format!("{}/direct", self.endpoints.geocoding);
        let entries: Vec<OwGeoEntry> = self
            .get_json(
                "geocoding",
                url,
                &[("q", query.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        Ok(entries.into_iter().map(Location::from).collect())
    }

    #[instrument(skip(self))]
    async fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<Location>, WeatherError> {
        let url = format!("{}/reverse", self.endpoints.geocoding);
        let entries: Vec<OwGeoEntry> = self
            .get_json(
                "reverse geocoding",
                url,
                &[
                    ("lat", latitude.to_string()),
                    ("lon", longitude.to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        // Keep the device coordinates; only the name comes from the lookup.
        Ok(entries
            .into_iter()
            .next()
            .map(|e| Location::new(latitude, longitude, e.name, e.country)))
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_response_maps_all_fields() {
        let body = r#"{
            "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"}],
            "main": {
                "temp": 14.2, "feels_like": 13.1, "temp_min": 12.0, "temp_max": 15.0,
                "pressure": 1012, "humidity": 81
            },
            "visibility": 9000,
            "wind": {"speed": 4.1, "deg": 230},
            "dt": 1760868000,
            "sys": {"country": "GB", "sunrise": 1760855000, "sunset": 1760893000},
            "timezone": 3600,
            "name": "London"
        }"#;
        let parsed: OwCurrentResponse = serde_json::from_str(body).expect("parse");
        let c = parsed.into_conditions();

        assert_eq!(c.condition_code, Some(500));
        assert_eq!(c.icon.as_deref(), Some("10d"));
        assert_eq!(c.description, "light rain");
        assert_eq!(c.pressure, 1012);
        assert_eq!(c.visibility, Some(9000));
        assert_eq!(c.wind_direction, Some(230));
        assert_eq!(c.observed_at.timestamp(), 1_760_868_000);
        assert!(c.sunrise.is_some() && c.sunset.is_some());
    }

    #[test]
    fn current_response_without_weather_entry_is_unknown() {
        let body = r#"{
            "weather": [],
            "main": {
                "temp": 1.0, "temp_min": 0.0, "temp_max": 2.0, "pressure": 1000, "humidity": 50
            },
            "wind": {"speed": 0.0},
            "dt": 0
        }"#;
        let parsed: OwCurrentResponse = serde_json::from_str(body).expect("parse");
        let c = parsed.into_conditions();
        assert_eq!(c.description, "Unknown");
        assert_eq!(c.condition_code, None);
        assert_eq!(c.feels_like, 1.0);
    }

    #[test]
    fn forecast_entry_defaults_pop() {
        let body = r#"{
            "dt": 1760868000,
            "main": {
                "temp": 10.0, "temp_min": 9.0, "temp_max": 11.0, "pressure": 1010, "humidity": 70
            },
            "weather": [{"id": 801, "description": "few clouds", "icon": "02n"}],
            "wind": {"speed": 2.0}
        }"#;
        let entry: OwForecastEntry = serde_json::from_str(body).expect("parse");
        let s = entry.into_sample().expect("valid timestamp");
        assert_eq!(s.pop, 0.0);
        assert_eq!(s.condition_code, Some(801));
    }
}
