use thiserror::Error;

/// Failures of the weather provider and location lookups.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// The request never produced a response (DNS, connect, timeout, body read).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("{endpoint} request failed with status {status}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to parse {endpoint} response: {message}")]
    Parse {
        endpoint: &'static str,
        message: String,
    },

    /// Geocoding returned no candidates for a search term.
    #[error("Location not found: {0}")]
    NotFound(String),

    #[error(
        "No API key configured.\n\
         Hint: run `weatherdash configure` or set OPENWEATHERMAP_API_KEY."
    )]
    MissingApiKey,

    /// The operation was abandoned because the dashboard is shutting down.
    #[error("Operation cancelled")]
    Cancelled,
}

impl WeatherError {
    /// Network failures and error statuses are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, WeatherError::Network(_) | WeatherError::Status { .. })
    }

    /// True when the client could not reach the provider at all.
    pub fn is_offline(&self) -> bool {
        match self {
            WeatherError::Network(err) => err.is_connect() || err.is_timeout(),
            _ => false,
        }
    }
}

/// Failures of device positioning. These never reach the user; the resolver
/// falls through to the next source instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location request timed out")]
    Timeout,
    #[error("Position fix is older than the allowed maximum age")]
    Stale,
    #[error("Location service unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the preference / snapshot store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Storage encoding error: {0}")]
    Json(#[from] serde_json::Error),
}
