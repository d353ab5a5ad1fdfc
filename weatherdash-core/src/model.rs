use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit system sent to the provider as the `units` request parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Metric,
    Imperial,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Metric => "metric",
            Unit::Imperial => "imperial",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Unit::Metric => Unit::Imperial,
            Unit::Imperial => Unit::Metric,
        }
    }

    pub fn temperature_suffix(&self) -> &'static str {
        match self {
            Unit::Metric => "°C",
            Unit::Imperial => "°F",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Unit {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "metric" | "c" | "celsius" => Ok(Unit::Metric),
            "imperial" | "f" | "fahrenheit" => Ok(Unit::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown unit system '{value}'. Supported: metric, imperial."
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Theme {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(anyhow::anyhow!("Unknown theme '{value}'. Supported: light, dark.")),
        }
    }
}

/// A resolved place on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    /// ISO 3166 country code, empty when the source did not report one.
    pub country: String,
}

impl Location {
    pub fn new(
        latitude: f64,
        longitude: f64,
        name: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            name: name.into(),
            country: country.into(),
        }
    }

    /// Placeholder name used when a position could not be named.
    pub fn from_coords(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, format!("{latitude:.4}, {longitude:.4}"), "")
    }

    pub fn display_name(&self) -> String {
        if self.country.is_empty() {
            self.name.clone()
        } else {
            format!("{}, {}", self.name, self.country)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub feels_like: f64,
    pub description: String,
    /// Provider condition code, e.g. 800 for clear sky.
    pub condition_code: Option<u16>,
    /// Provider icon code, e.g. "01d".
    pub icon: Option<String>,
    /// m/s in metric, mph in imperial.
    pub wind_speed: f64,
    /// Meteorological degrees.
    pub wind_direction: Option<u16>,
    pub humidity: u8,
    /// hPa.
    pub pressure: u32,
    /// Metres.
    pub visibility: Option<u32>,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
    pub observed_at: DateTime<Utc>,
}

/// One 3-hour forecast step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub timestamp: DateTime<Utc>,
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub condition_code: Option<u16>,
    pub icon: Option<String>,
    pub description: String,
    /// Probability of precipitation, 0.0..=1.0.
    pub pop: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Forecast {
    /// Oldest first.
    pub samples: Vec<ForecastSample>,
    /// UTC offset of the forecast location, used for day and hour labels.
    pub utc_offset_seconds: i32,
}

/// Result of one successful fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherBundle {
    pub location: Location,
    pub unit: Unit,
    pub current: CurrentConditions,
    pub forecast: Forecast,
    pub fetched_at: DateTime<Utc>,
}

/// Last successful bundle, persisted for offline fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub bundle: WeatherBundle,
    pub captured_at: DateTime<Utc>,
}

impl CachedSnapshot {
    pub fn capture(bundle: WeatherBundle) -> Self {
        let captured_at = bundle.fetched_at;
        Self { bundle, captured_at }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_parse_and_toggle() {
        assert_eq!(Unit::try_from("Imperial").unwrap(), Unit::Imperial);
        assert_eq!(Unit::try_from("c").unwrap(), Unit::Metric);
        assert!(Unit::try_from("kelvin").is_err());
        assert_eq!(Unit::Metric.toggled(), Unit::Imperial);
        assert_eq!(Unit::Imperial.toggled().as_str(), "metric");
    }

    #[test]
    fn theme_parse_and_toggle() {
        assert_eq!(Theme::try_from("DARK").unwrap(), Theme::Dark);
        assert_eq!(Theme::Dark.toggled(), Theme::Light);
    }

    #[test]
    fn unit_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Unit::Imperial).unwrap(), "\"imperial\"");
    }

    #[test]
    fn display_name_omits_empty_country() {
        assert_eq!(Location::new(1.0, 2.0, "Paris", "FR").display_name(), "Paris, FR");
        assert_eq!(Location::from_coords(1.5, -2.25).display_name(), "1.5000, -2.2500");
    }
}
