//! Core library for the `weatherdash` dashboard.
//!
//! This crate defines:
//! - Configuration & persisted preferences
//! - The OpenWeather and IP-geolocation clients
//! - Location resolution, fetching with retry, forecast aggregation
//! - The dashboard state, its commands and its text presentation
//!
//! It is used by `weatherdash-cli`, but any host that can issue [`Command`]s
//! and show a [`DashboardView`] can drive it.

pub mod aggregate;
pub mod app;
pub mod config;
pub mod error;
pub mod fetch;
pub mod icons;
pub mod location;
pub mod model;
pub mod present;
pub mod provider;
pub mod schedule;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{AppState, Command, Dashboard, Status};
pub use config::Config;
pub use error::{LocationError, StoreError, WeatherError};
pub use location::{LocationResolver, NoPositionSource, PositionSource, StaticPosition};
pub use model::{
    CachedSnapshot, CurrentConditions, Forecast, ForecastSample, Location, Theme, Unit,
    WeatherBundle,
};
pub use present::{DashboardView, Tab};
pub use provider::{IpLocator, WeatherProvider};
pub use schedule::{RefreshGate, RefreshScheduler, RefreshTick, TickKind};
pub use store::{FileStore, KeyValueStore, MemoryStore, Preferences};
