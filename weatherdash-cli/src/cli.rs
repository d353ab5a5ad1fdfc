use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use crossterm::{
    cursor, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use inquire::{CustomType, Select, Text};
use std::{
    io::{self, Write},
    sync::Arc,
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::{Instant, Interval, MissedTickBehavior},
};
use tracing::{debug, info};
use weatherdash_core::{
    Command as DashCommand, Config, Dashboard, NoPositionSource, PositionSource, Preferences,
    RefreshScheduler, StaticPosition, Tab, Theme, Unit,
    present::{self, LineStyle},
    store,
};

/// How often the watch view redraws so the header date stays current.
const CLOCK_REDRAW: Duration = Duration::from_secs(60);

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weatherdash", version, about = "Terminal weather dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct LocationArgs {
    /// City to search for instead of the current location.
    #[arg(long, conflicts_with_all = ["lat", "lon", "locate"])]
    city: Option<String>,

    /// Device latitude; skips IP lookup.
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Device longitude; skips IP lookup.
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Resolve the location again instead of using the remembered one.
    #[arg(long)]
    locate: bool,
}

#[derive(Debug, Args)]
pub struct DisplayArgs {
    /// Tab to show: home, forecast, cities, map, news (or 1-5).
    #[arg(long, default_value = "home")]
    tab: String,

    /// Unit system for this and later runs: metric or imperial.
    #[arg(long)]
    units: Option<String>,

    /// Disable ANSI colours.
    #[arg(long)]
    no_color: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the API key and defaults interactively.
    Configure,

    /// Render the dashboard once.
    Show {
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        display: DisplayArgs,
    },

    /// Keep the dashboard open, refreshing in the background.
    Watch {
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        display: DisplayArgs,
    },

    /// Remember a unit system.
    Units {
        /// metric or imperial
        unit: String,
    },

    /// Remember a theme; toggles when omitted.
    Theme {
        /// light or dark
        theme: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { location, display } => show(location, display).await,
            Command::Watch { location, display } => watch(location, display).await,
            Command::Units { unit } => {
                let unit = Unit::try_from(unit.as_str())?;
                open_preferences().set_unit(unit);
                println!("Units set to {unit}.");
                Ok(())
            }
            Command::Theme { theme } => {
                let mut prefs = open_preferences();
                let theme = match theme {
                    Some(t) => Theme::try_from(t.as_str())?,
                    None => prefs.theme().unwrap_or_default().toggled(),
                };
                prefs.set_theme(theme);
                println!("Theme set to {theme}.");
                Ok(())
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Text::new("OpenWeather API key:")
        .with_help_message("Create one at https://home.openweathermap.org/api_keys")
        .with_initial_value(config.api_key.as_deref().unwrap_or_default())
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key.trim().to_string());
    }

    let units = vec![Unit::Metric, Unit::Imperial];
    let start = units.iter().position(|u| *u == config.default_unit).unwrap_or(0);
    config.default_unit = Select::new("Default units:", units)
        .with_starting_cursor(start)
        .prompt()
        .context("Failed to read default units")?;

    config.refresh.interval_secs = CustomType::<u64>::new("Background refresh interval (seconds):")
        .with_default(config.refresh.interval_secs)
        .prompt()
        .context("Failed to read refresh interval")?;

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

fn open_preferences() -> Preferences {
    Preferences::new(store::open_or_memory(Config::state_file_path().ok()))
}

/// Build the dashboard and load the first view.
async fn start(
    location: &LocationArgs,
    display: &DisplayArgs,
) -> anyhow::Result<(Config, Dashboard)> {
    let config = Config::load()?;
    let tab = Tab::try_from(display.tab.as_str())?;

    let mut prefs = open_preferences();
    if let Some(units) = &display.units {
        // Written before construction so the first fetch already uses it.
        prefs.set_unit(Unit::try_from(units.as_str())?);
    }

    let position: Arc<dyn PositionSource> = match (location.lat, location.lon) {
        (Some(lat), Some(lon)) => Arc::new(StaticPosition::new(lat, lon)),
        _ => Arc::new(NoPositionSource),
    };
    let force_locate = location.locate || location.lat.is_some();

    let mut dash = Dashboard::from_config(&config, prefs, position)?;
    dash.dispatch(DashCommand::Navigate(tab)).await;

    let first = match &location.city {
        Some(city) => DashCommand::Search(city.clone()),
        None if force_locate => DashCommand::Locate { force: true },
        None => DashCommand::Start,
    };
    dash.dispatch(first).await;

    Ok((config, dash))
}

fn accent(theme: Theme) -> Color {
    match theme {
        Theme::Light => Color::Blue,
        Theme::Dark => Color::Magenta,
    }
}

/// Draw the current view. Without colour the output is plain text and the
/// screen is never cleared, so it can be piped.
fn print_dashboard(dash: &Dashboard, color: bool, clear: bool) -> io::Result<()> {
    let view = dash.view(chrono::Utc::now());
    let mut out = io::stdout().lock();

    if clear && color {
        queue!(out, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    }

    for line in present::render(&view) {
        match line.style {
            LineStyle::Heading if color => queue!(
                out,
                SetForegroundColor(accent(view.theme)),
                SetAttribute(Attribute::Bold),
                Print(&line.text),
                SetAttribute(Attribute::Reset),
                ResetColor
            )?,
            LineStyle::Banner if color => queue!(
                out,
                SetForegroundColor(Color::Yellow),
                Print(&line.text),
                ResetColor
            )?,
            _ => queue!(out, Print(&line.text))?,
        }
        queue!(out, Print("\n"))?;
    }

    out.flush()
}

async fn show(location: LocationArgs, display: DisplayArgs) -> anyhow::Result<()> {
    let (_config, mut dash) = start(&location, &display).await?;
    print_dashboard(&dash, !display.no_color, false)?;
    dash.shutdown();
    Ok(())
}

/// A line typed into the watch session.
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Dispatch(DashCommand),
    TogglePause,
    Redraw,
    Help,
    Quit,
    Unknown(String),
}

const WATCH_HELP: &str = "\
r refresh · u units · t theme · l locate · p pause/resume · q quit
s <city> search · c <n> popular city · 1-5 or tab name to switch tabs";

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head.to_lowercase().as_str() {
        "" => Input::Redraw,
        "q" | "quit" | "exit" => Input::Quit,
        "h" | "help" | "?" => Input::Help,
        "p" | "pause" => Input::TogglePause,
        "r" | "refresh" => Input::Dispatch(DashCommand::Refresh { manual: true }),
        "u" | "units" => Input::Dispatch(DashCommand::ToggleUnit),
        "t" | "theme" => Input::Dispatch(DashCommand::ToggleTheme),
        "l" | "locate" => Input::Dispatch(DashCommand::Locate { force: true }),
        "s" | "search" if !rest.is_empty() => {
            Input::Dispatch(DashCommand::Search(rest.to_string()))
        }
        "c" | "city" => match rest.parse::<usize>() {
            Ok(n) => Input::Dispatch(DashCommand::SelectCity(n)),
            Err(_) => Input::Unknown(line.to_string()),
        },
        _ => match Tab::try_from(line) {
            Ok(tab) => Input::Dispatch(DashCommand::Navigate(tab)),
            Err(_) => Input::Unknown(line.to_string()),
        },
    }
}

/// Ticks once a minute, first one a minute from now.
fn redraw_clock() -> Interval {
    let mut clock = tokio::time::interval_at(Instant::now() + CLOCK_REDRAW, CLOCK_REDRAW);
    clock.set_missed_tick_behavior(MissedTickBehavior::Skip);
    clock
}

async fn watch(location: LocationArgs, display: DisplayArgs) -> anyhow::Result<()> {
    let color = !display.no_color;
    let (config, mut dash) = start(&location, &display).await?;

    let gate = dash.gate();
    let cancel = dash.cancellation_token();
    let (scheduler, mut ticks) = RefreshScheduler::spawn(config.refresh_interval(), gate.clone());
    info!(interval = ?config.refresh_interval(), "Watching");

    // Ctrl-C cancels the dashboard, which also aborts an in-flight fetch.
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let mut clock = redraw_clock();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_dashboard(&dash, color, true)?;
    println!("\n{WATCH_HELP}");

    loop {
        let command = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(tick) = ticks.recv() => {
                debug!(?tick, "Automatic refresh");
                Some(DashCommand::from(tick))
            }
            _ = clock.tick() => None,
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    break;
                };
                match parse_input(&line) {
                    Input::Quit => break,
                    Input::Dispatch(command) => Some(command),
                    Input::TogglePause => {
                        gate.set_visible(!gate.is_visible());
                        None
                    }
                    Input::Redraw => None,
                    Input::Help => {
                        println!("{WATCH_HELP}");
                        continue;
                    }
                    Input::Unknown(text) => {
                        println!("Unknown input '{text}'.\n{WATCH_HELP}");
                        continue;
                    }
                }
            }
        };

        if let Some(command) = command {
            if dash.dispatch_cancellable(command).await.is_err() {
                break;
            }
        }

        print_dashboard(&dash, color, true)?;
        if !gate.is_visible() {
            println!("\n(paused: automatic refresh is off, press p to resume)");
        }
    }

    interrupt.abort();
    scheduler.shutdown().await;
    dash.shutdown();
    Ok(())
}
