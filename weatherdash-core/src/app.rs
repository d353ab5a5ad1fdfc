//! Application state and command dispatch.
//!
//! Every user action maps to one [`Command`]; [`Dashboard::dispatch`] runs
//! the matching pipeline step (resolve → fetch → state update → persist).
//! Nothing dispatched here is fatal: failures end up in [`AppState::status`].

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    Config,
    error::WeatherError,
    fetch::{FetchOutcome, RetryPolicy, WeatherFetcher},
    location::{LocationResolver, PositionSource, Resolved},
    model::{CachedSnapshot, Location, Theme, Unit, WeatherBundle},
    present::{self, DashboardView, Tab},
    provider::{self, IpLocator, WeatherProvider},
    schedule::{RefreshGate, RefreshTick, TickKind},
    store::Preferences,
};

/// What the status banner should say.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Status {
    #[default]
    Idle,
    Live,
    Cached { captured_at: DateTime<Utc> },
    Error(String),
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub unit: Unit,
    pub theme: Theme,
    pub tab: Tab,
    pub location: Option<Location>,
    pub weather: Option<WeatherBundle>,
    pub status: Status,
}

impl AppState {
    pub fn new(unit: Unit, theme: Theme) -> Self {
        Self {
            unit,
            theme,
            tab: Tab::Home,
            location: None,
            weather: None,
            status: Status::Idle,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Resolve the startup location and load weather for it.
    Start,
    Locate { force: bool },
    Search(String),
    /// 1-based index into the popular cities list.
    SelectCity(usize),
    ToggleUnit,
    SetUnit(Unit),
    ToggleTheme,
    SetTheme(Theme),
    Navigate(Tab),
    Refresh { manual: bool },
    /// One attempt, no retries, to find out whether the provider is back.
    CheckConnection,
}

impl From<RefreshTick> for Command {
    fn from(tick: RefreshTick) -> Self {
        match tick.kind {
            TickKind::Refresh => Command::Refresh { manual: false },
            TickKind::Reconnect => Command::CheckConnection,
        }
    }
}

#[derive(Debug)]
pub struct Dashboard {
    state: AppState,
    prefs: Preferences,
    resolver: LocationResolver,
    fetcher: WeatherFetcher,
    gate: RefreshGate,
    cancel: CancellationToken,
    short_range_days: usize,
}

impl Dashboard {
    pub fn new(
        config: &Config,
        prefs: Preferences,
        provider: Arc<dyn WeatherProvider>,
        position: Arc<dyn PositionSource>,
        ip: Arc<dyn IpLocator>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let resolver = LocationResolver::new(
            provider.clone(),
            position,
            ip,
            config.default_location.clone(),
        )
        .with_limits(config.geolocation_timeout(), config.geolocation_max_age());
        let fetcher = WeatherFetcher::new(provider, RetryPolicy::from_config(config))
            .with_cancellation(cancel.clone());

        let mut state = AppState::new(
            prefs.unit().unwrap_or(config.default_unit),
            prefs.theme().unwrap_or_default(),
        );
        state.location = prefs.location();

        Self {
            state,
            prefs,
            resolver,
            fetcher,
            gate: RefreshGate::new(),
            cancel,
            short_range_days: config.short_range_days,
        }
    }

    /// Wire the dashboard to the real remote services.
    pub fn from_config(
        config: &Config,
        prefs: Preferences,
        position: Arc<dyn PositionSource>,
    ) -> Result<Self, WeatherError> {
        let provider = provider::provider_from_config(config)?;
        let ip = provider::ip_locator_from_config(config)?;
        Ok(Self::new(config, prefs, provider, position, ip))
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    /// Shared with the refresh scheduler.
    pub fn gate(&self) -> RefreshGate {
        self.gate.clone()
    }

    /// Cancelling this aborts pending backoff and in-flight cancellable dispatches.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn view(&self, now: DateTime<Utc>) -> DashboardView {
        present::present(&self.state, now, self.short_range_days)
    }

    pub async fn dispatch(&mut self, command: Command) -> &AppState {
        debug!(?command, "Dispatching");

        match command {
            Command::Start => {
                let resolved = self.resolver.resolve(self.state.location.as_ref(), false).await;
                self.apply_location(resolved);
                self.refresh().await;
            }
            Command::Locate { force } => {
                let resolved = self.resolver.resolve(self.state.location.as_ref(), force).await;
                self.apply_location(resolved);
                self.refresh().await;
            }
            Command::Search(term) => self.search(&term).await,
            Command::SelectCity(index) => {
                match index.checked_sub(1).and_then(|i| present::POPULAR_CITIES.get(i)) {
                    Some(city) => self.search(city).await,
                    None => self.state.status = Status::NotFound(format!("city #{index}")),
                }
            }
            Command::ToggleUnit => {
                let unit = self.state.unit.toggled();
                self.change_unit(unit).await;
            }
            Command::SetUnit(unit) => {
                if unit != self.state.unit {
                    self.change_unit(unit).await;
                }
            }
            Command::ToggleTheme => {
                let theme = self.state.theme.toggled();
                self.set_theme(theme);
            }
            Command::SetTheme(theme) => self.set_theme(theme),
            Command::Navigate(tab) => self.state.tab = tab,
            Command::Refresh { manual } => {
                debug!(manual, "Refresh requested");
                if self.state.location.is_none() {
                    let resolved = self.resolver.resolve(None, false).await;
                    self.apply_location(resolved);
                }
                self.refresh().await;
            }
            Command::CheckConnection => self.check_connection().await,
        }

        &self.state
    }

    /// Run `command` unless the dashboard is cancelled first.
    ///
    /// On cancellation the in-flight work is dropped and the state keeps
    /// whatever the command had already applied.
    pub async fn dispatch_cancellable(&mut self, command: Command) -> Result<(), WeatherError> {
        let cancel = self.cancel.clone();
        if cancel.is_cancelled() {
            return Err(WeatherError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Dispatch abandoned on cancellation");
                Err(WeatherError::Cancelled)
            }
            _ = self.dispatch(command) => Ok(()),
        }
    }

    /// Final best-effort persist; cancels any pending backoff.
    pub fn shutdown(&mut self) {
        self.cancel.cancel();
        self.prefs.set_unit(self.state.unit);
        self.prefs.set_theme(self.state.theme);
        if let Some(location) = &self.state.location {
            self.prefs.set_location(location);
        }
        if self.state.status == Status::Live {
            if let Some(bundle) = &self.state.weather {
                self.prefs.set_snapshot(&CachedSnapshot::capture(bundle.clone()));
            }
        }
        info!("Dashboard state persisted");
    }

    fn apply_location(&mut self, resolved: Resolved) {
        debug!(source = ?resolved.source, name = %resolved.location.name, "Location applied");
        self.prefs.set_location(&resolved.location);
        self.state.location = Some(resolved.location);
    }

    async fn search(&mut self, term: &str) {
        match self.resolver.search(term).await {
            Ok(resolved) => {
                self.apply_location(resolved);
                self.refresh().await;
            }
            Err(WeatherError::NotFound(term)) => {
                info!(term = %term, "Search found nothing");
                self.state.status = Status::NotFound(term);
            }
            Err(err) => {
                warn!(error = %err, "Search failed");
                self.state.status = Status::Error(err.to_string());
            }
        }
    }

    async fn change_unit(&mut self, unit: Unit) {
        self.state.unit = unit;
        self.prefs.set_unit(unit);
        if self.state.location.is_some() {
            self.refresh().await;
        }
    }

    fn set_theme(&mut self, theme: Theme) {
        self.state.theme = theme;
        self.prefs.set_theme(theme);
    }

    async fn refresh(&mut self) {
        let Some(location) = self.state.location.clone() else {
            return;
        };

        // The in-memory bundle stands in when persistence is unavailable.
        let snapshot = self
            .prefs
            .snapshot()
            .or_else(|| self.state.weather.clone().map(CachedSnapshot::capture));

        match self.fetcher.fetch_with_fallback(&location, self.state.unit, snapshot).await {
            FetchOutcome::Live(bundle) => self.apply_live(bundle),
            FetchOutcome::Cached { snapshot, error } => {
                if error.is_offline() {
                    self.gate.set_online(false);
                }
                self.state.status = Status::Cached { captured_at: snapshot.captured_at };
                self.state.weather = Some(snapshot.bundle);
            }
            FetchOutcome::Failed(error) => {
                if error.is_offline() {
                    self.gate.set_online(false);
                }
                self.state.weather = None;
                self.state.status = Status::Error(error.to_string());
            }
        }
    }

    fn apply_live(&mut self, bundle: WeatherBundle) {
        self.gate.set_online(true);
        self.prefs.set_snapshot(&CachedSnapshot::capture(bundle.clone()));
        self.state.weather = Some(bundle);
        self.state.status = Status::Live;
    }

    /// Single attempt while offline. The view is only touched on success.
    async fn check_connection(&mut self) {
        let Some(location) = self.state.location.clone() else {
            return;
        };

        match self.fetcher.fetch_once(&location, self.state.unit).await {
            Ok(bundle) => {
                info!(name = %location.name, "Connectivity restored");
                self.apply_live(bundle);
            }
            Err(err) if err.is_offline() => debug!(error = %err, "Still offline"),
            Err(err) => {
                // Reachable, so the next scheduled refresh runs the full cycle.
                info!(error = %err, "Provider reachable again");
                self.gate.set_online(true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        location::NoPositionSource,
        testing::{FakeIpLocator, FakeProvider, fixed_now},
    };
    use std::{sync::atomic::Ordering, time::Duration};

    fn paris() -> Location {
        Location::new(48.8566, 2.3522, "Paris", "FR")
    }

    fn dashboard(provider: Arc<FakeProvider>, prefs: Preferences) -> Dashboard {
        Dashboard::new(
            &Config::default(),
            prefs,
            provider,
            Arc::new(NoPositionSource),
            Arc::new(FakeIpLocator::returning(paris())),
        )
    }

    #[tokio::test]
    async fn start_loads_weather_and_persists_snapshot() {
        let provider = Arc::new(FakeProvider::default());
        let mut dash = dashboard(provider, Preferences::in_memory());

        let state = dash.dispatch(Command::Start).await;
        assert_eq!(state.status, Status::Live);
        assert_eq!(state.location, Some(paris()));
        assert!(state.weather.is_some());

        assert_eq!(dash.preferences().location(), Some(paris()));
        assert!(dash.preferences().snapshot().is_some());
    }

    #[tokio::test]
    async fn startup_reads_preferences() {
        let mut prefs = Preferences::in_memory();
        prefs.set_unit(Unit::Imperial);
        prefs.set_theme(Theme::Dark);
        prefs.set_location(&Location::new(35.68, 139.69, "Tokyo", "JP"));

        let provider = Arc::new(FakeProvider::default());
        let mut dash = dashboard(provider.clone(), prefs);
        assert_eq!(dash.state().theme, Theme::Dark);

        let state = dash.dispatch(Command::Start).await;
        assert_eq!(state.location.as_ref().map(|l| l.name.as_str()), Some("Tokyo"));
        assert_eq!(provider.requested_units(), vec![Unit::Imperial]);
    }

    #[tokio::test]
    async fn unit_toggle_refetches_with_new_unit() {
        let provider = Arc::new(FakeProvider::default());
        let mut dash = dashboard(provider.clone(), Preferences::in_memory());
        dash.dispatch(Command::Start).await;

        let state = dash.dispatch(Command::ToggleUnit).await;
        assert_eq!(state.unit, Unit::Imperial);
        let bundle = state.weather.as_ref().expect("weather");
        assert_eq!(bundle.unit, Unit::Imperial);
        // The provider's value is shown as-is, not converted locally.
        assert_eq!(bundle.current.temperature, 2.0);

        assert_eq!(provider.requested_units(), vec![Unit::Metric, Unit::Imperial]);
        assert_eq!(dash.preferences().unit(), Some(Unit::Imperial));

        dash.dispatch(Command::SetUnit(Unit::Imperial)).await;
        assert_eq!(provider.current_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn search_without_match_reports_not_found() {
        let provider = Arc::new(FakeProvider::default());
        let mut dash = dashboard(provider.clone(), Preferences::in_memory());
        dash.dispatch(Command::Start).await;
        let calls = provider.current_calls.load(Ordering::SeqCst);

        let state = dash.dispatch(Command::Search("Atlantis".into())).await;
        assert_eq!(state.status, Status::NotFound("Atlantis".into()));
        assert_eq!(state.location, Some(paris()));
        assert_eq!(provider.current_calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn popular_city_is_searched() {
        let provider = Arc::new(FakeProvider::with_geocode(vec![Location::new(
            -33.87, 151.21, "Sydney", "AU",
        )]));
        let mut dash = dashboard(provider, Preferences::in_memory());

        let state = dash.dispatch(Command::SelectCity(4)).await;
        assert_eq!(state.status, Status::Live);
        assert_eq!(state.location.as_ref().map(|l| l.country.as_str()), Some("AU"));

        let state = dash.dispatch(Command::SelectCity(9)).await;
        assert!(matches!(state.status, Status::NotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_on_third_attempt_without_banner() {
        let provider = Arc::new(FakeProvider::failing_current(2));
        let mut dash = dashboard(provider, Preferences::in_memory());

        dash.dispatch(Command::Start).await;
        let view = dash.view(fixed_now());
        assert!(view.banner.is_none());
        assert_eq!(view.current.map(|c| c.temperature), Some("3°C".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_fall_back_to_snapshot() {
        let provider = Arc::new(FakeProvider::default());
        let mut dash = dashboard(provider.clone(), Preferences::in_memory());
        dash.dispatch(Command::Start).await;

        provider.current_failures.store(10, Ordering::SeqCst);
        let state = dash.dispatch(Command::Refresh { manual: true }).await;
        assert!(matches!(state.status, Status::Cached { .. }));
        assert_eq!(state.weather.as_ref().map(|w| w.current.temperature), Some(1.0));

        let view = dash.view(fixed_now());
        assert!(view.banner.unwrap().contains("cached data"));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_without_snapshot_show_error() {
        let provider = Arc::new(FakeProvider::failing_current(10));
        let mut dash = dashboard(provider, Preferences::in_memory());

        let state = dash.dispatch(Command::Start).await;
        assert!(matches!(state.status, Status::Error(_)));
        assert!(state.weather.is_none());
        assert!(dash.view(fixed_now()).banner.unwrap().starts_with("Weather unavailable"));
    }

    #[tokio::test]
    async fn theme_and_navigation_do_not_fetch() {
        let provider = Arc::new(FakeProvider::default());
        let mut dash = dashboard(provider.clone(), Preferences::in_memory());

        dash.dispatch(Command::ToggleTheme).await;
        let state = dash.dispatch(Command::Navigate(Tab::News)).await;
        assert_eq!(state.theme, Theme::Dark);
        assert_eq!(state.tab, Tab::News);
        assert_eq!(provider.current_calls.load(Ordering::SeqCst), 0);
        assert_eq!(dash.preferences().theme(), Some(Theme::Dark));
    }

    #[tokio::test]
    async fn reconnect_success_restores_live_data() {
        let provider = Arc::new(FakeProvider::default());
        let mut dash = dashboard(provider.clone(), Preferences::in_memory());
        dash.dispatch(Command::Start).await;
        dash.gate().set_online(false);

        let tick = RefreshTick { at: tokio::time::Instant::now(), kind: TickKind::Reconnect };
        let state = dash.dispatch(tick.into()).await;
        assert_eq!(state.status, Status::Live);
        assert_eq!(state.weather.as_ref().map(|w| w.current.temperature), Some(2.0));
        assert!(dash.gate().allows_refresh());
    }

    #[tokio::test]
    async fn connection_check_makes_a_single_attempt() {
        let provider = Arc::new(FakeProvider::default());
        let mut dash = dashboard(provider.clone(), Preferences::in_memory());
        dash.dispatch(Command::Start).await;
        dash.gate().set_online(false);
        provider.current_failures.store(5, Ordering::SeqCst);

        let state = dash.dispatch(Command::CheckConnection).await;
        // The server answered, so the previous view stays and the gate reopens.
        assert_eq!(state.status, Status::Live);
        assert_eq!(state.weather.as_ref().map(|w| w.current.temperature), Some(1.0));
        assert_eq!(provider.current_calls.load(Ordering::SeqCst), 2);
        assert!(dash.gate().is_online());
    }

    #[test]
    fn ticks_map_to_commands() {
        let at = tokio::time::Instant::now();
        let refresh = RefreshTick { at, kind: TickKind::Refresh };
        assert_eq!(Command::from(refresh), Command::Refresh { manual: false });
        let reconnect = RefreshTick { at, kind: TickKind::Reconnect };
        assert_eq!(Command::from(reconnect), Command::CheckConnection);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_dispatch_in_backoff() {
        let provider = Arc::new(FakeProvider::failing_current(10));
        let mut dash = dashboard(provider.clone(), Preferences::in_memory());
        let token = dash.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });

        let start = tokio::time::Instant::now();
        let result = dash.dispatch_cancellable(Command::Start).await;
        assert!(matches!(result, Err(WeatherError::Cancelled)));
        // The first backoff alone is a full second.
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(provider.current_calls.load(Ordering::SeqCst), 1);

        // Teardown still persists what was resolved before cancelling.
        dash.shutdown();
        assert_eq!(dash.preferences().location(), Some(paris()));
        assert!(matches!(
            dash.dispatch_cancellable(Command::Refresh { manual: true }).await,
            Err(WeatherError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn shutdown_persists_state() {
        let provider = Arc::new(FakeProvider::default());
        let mut dash = dashboard(provider, Preferences::in_memory());
        dash.dispatch(Command::Start).await;
        dash.dispatch(Command::SetTheme(Theme::Dark)).await;

        dash.shutdown();
        let prefs = dash.preferences();
        assert_eq!(prefs.theme(), Some(Theme::Dark));
        assert_eq!(prefs.unit(), Some(Unit::Metric));
        assert!(prefs.snapshot().is_some());
    }
}
