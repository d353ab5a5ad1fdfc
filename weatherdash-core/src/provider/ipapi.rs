use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::instrument;

use crate::{error::WeatherError, model::Location};

use super::{IpLocator, truncate_body};

const REQUEST_TIMEOUT_SECS: u64 = 5;

/// IP geolocation through an ipapi.co-compatible JSON endpoint.
#[derive(Debug, Clone)]
pub struct IpApiLocator {
    url: String,
    http: Client,
}

impl IpApiLocator {
    pub fn new(url: String) -> Result<Self, WeatherError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { url, http })
    }
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
}

impl IpApiResponse {
    fn into_location(self) -> Result<Location, WeatherError> {
        let (Some(lat), Some(lon)) = (self.latitude, self.longitude) else {
            return Err(WeatherError::Parse {
                endpoint: "ip lookup",
                message: "response has no coordinates".to_string(),
            });
        };

        Ok(match self.city.filter(|c| !c.is_empty()) {
            Some(city) => Location::new(lat, lon, city, self.country_code.unwrap_or_default()),
            None => Location::from_coords(lat, lon),
        })
    }
}

#[async_trait]
impl IpLocator for IpApiLocator {
    #[instrument(skip(self))]
    async fn locate(&self) -> Result<Location, WeatherError> {
        let res = self.http.get(&self.url).send().await?;
        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(WeatherError::Status {
                endpoint: "ip lookup",
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: IpApiResponse = serde_json::from_str(&body).map_err(|e| WeatherError::Parse {
            endpoint: "ip lookup",
            message: e.to_string(),
        })?;

        parsed.into_location()
    }
}
