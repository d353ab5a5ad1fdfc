//! Turns application state into a view model and the view model into text.
//!
//! Both steps are pure: the same state and clock always give the same output.

use chrono::{DateTime, FixedOffset, Utc};

use crate::{
    aggregate::{self, DayBucket, HourlyEntry, fixed_offset},
    app::{AppState, Status},
    icons::{self, Glyph},
    model::{CurrentConditions, Location, Theme, Unit},
};

pub const POPULAR_CITIES: [&str; 5] = ["New York", "London", "Tokyo", "Sydney", "Paris"];

/// Navigation tabs of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tab {
    #[default]
    Home,
    Forecast,
    Cities,
    Map,
    News,
}

impl Tab {
    pub const fn all() -> &'static [Tab] {
        &[Tab::Home, Tab::Forecast, Tab::Cities, Tab::Map, Tab::News]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tab::Home => "home",
            Tab::Forecast => "forecast",
            Tab::Cities => "cities",
            Tab::Map => "map",
            Tab::News => "news",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Home => "Home",
            Tab::Forecast => "Forecast",
            Tab::Cities => "Cities",
            Tab::Map => "Map",
            Tab::News => "News",
        }
    }
}

impl TryFrom<&str> for Tab {
    type Error = anyhow::Error;

    /// Accepts a tab name or its 1-based position.
    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.trim().to_lowercase();
        if let Ok(n) = lower.parse::<usize>() {
            if let Some(tab) = n.checked_sub(1).and_then(|i| Tab::all().get(i)) {
                return Ok(*tab);
            }
        }
        Tab::all()
            .iter()
            .find(|t| t.as_str() == lower)
            .copied()
            .ok_or_else(|| {
                anyhow::anyhow!("Unknown tab '{value}'. Tabs: home, forecast, cities, map, news.")
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentPanel {
    pub glyph: Glyph,
    pub temperature: String,
    pub condition: String,
    pub feels_like: String,
    pub wind: String,
    pub humidity: String,
    pub pressure: String,
    pub visibility: String,
    pub sunrise: String,
    pub sunset: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourCard {
    pub label: String,
    pub glyph: Glyph,
    pub temperature: String,
    pub precipitation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayCard {
    pub label: String,
    pub glyph: Glyph,
    pub condition: String,
    pub max: String,
    pub min: String,
    /// Only filled for the extended view.
    pub humidity: Option<String>,
    pub wind: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    pub title: &'static str,
    pub source: &'static str,
}

const NEWS: [NewsItem; 3] = [
    NewsItem {
        title: "Autumn storms expected to bring heavy rain to the coast",
        source: "Weather Desk",
    },
    NewsItem {
        title: "How to read a 5-day forecast like a meteorologist",
        source: "Explainers",
    },
    NewsItem {
        title: "Record warm October nights reported across the region",
        source: "Climate Watch",
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub tab: Tab,
    pub theme: Theme,
    pub unit: Unit,
    pub city: String,
    pub date: String,
    pub banner: Option<String>,
    pub current: Option<CurrentPanel>,
    pub hourly: Vec<HourCard>,
    pub short_range: Vec<DayCard>,
    pub extended: Vec<DayCard>,
    pub cities: Vec<String>,
    pub map: String,
    pub news: Vec<NewsItem>,
}

pub fn present(state: &AppState, now: DateTime<Utc>, short_range_days: usize) -> DashboardView {
    let offset = state
        .weather
        .as_ref()
        .map(|w| fixed_offset(w.forecast.utc_offset_seconds))
        .unwrap_or_else(|| fixed_offset(0));

    let city = state
        .weather
        .as_ref()
        .map(|w| w.location.display_name())
        .or_else(|| state.location.as_ref().map(Location::display_name))
        .unwrap_or_else(|| "Locating…".to_string());

    // Values are shown in the unit they were fetched in.
    let unit = state.weather.as_ref().map(|w| w.unit).unwrap_or(state.unit);

    let (current, hourly, short_range, extended) = match &state.weather {
        Some(weather) => {
            let views = aggregate::aggregate(&weather.forecast, now, short_range_days);
            (
                Some(current_panel(&weather.current, unit, offset)),
                views.hourly.iter().map(|h| hour_card(h, unit)).collect(),
                views.short_range.iter().map(|d| day_card(d, unit, false)).collect(),
                views.extended.iter().map(|d| day_card(d, unit, true)).collect(),
            )
        }
        None => (None, Vec::new(), Vec::new(), Vec::new()),
    };

    DashboardView {
        tab: state.tab,
        theme: state.theme,
        unit,
        city,
        date: now.with_timezone(&offset).format("%A, %B %-d, %Y").to_string(),
        banner: banner(&state.status, offset),
        current,
        hourly,
        short_range,
        extended,
        cities: POPULAR_CITIES.iter().map(|c| c.to_string()).collect(),
        map: map_placeholder(state.location.as_ref()),
        news: NEWS.to_vec(),
    }
}

fn banner(status: &Status, offset: FixedOffset) -> Option<String> {
    match status {
        Status::Idle | Status::Live => None,
        Status::Cached { captured_at } => Some(format!(
            "Using cached data from {}. Live update failed.",
            captured_at.with_timezone(&offset).format("%b %-d, %-I:%M %p")
        )),
        Status::Error(message) => Some(format!(
            "Weather unavailable: {message}. Press r to retry or run `weatherdash show` again."
        )),
        Status::NotFound(term) if term.is_empty() => {
            Some("Enter a city name to search.".to_string())
        }
        Status::NotFound(term) => Some(format!("Location not found: {term}")),
    }
}

fn temperature(value: f64, unit: Unit) -> String {
    format!("{}{}", value.round() as i64, unit.temperature_suffix())
}

/// Provider sends m/s for metric; shown as km/h.
fn wind_speed(value: f64, unit: Unit) -> String {
    match unit {
        Unit::Metric => format!("{} km/h", (value * 3.6).round() as i64),
        Unit::Imperial => format!("{} mph", value.round() as i64),
    }
}

fn visibility(metres: Option<u32>, unit: Unit) -> String {
    match metres {
        None => "n/a".to_string(),
        Some(m) => match unit {
            Unit::Metric => format!("{:.1} km", f64::from(m) / 1000.0),
            Unit::Imperial => format!("{:.1} mi", f64::from(m) / 1609.344),
        },
    }
}

pub fn compass(degrees: u16) -> &'static str {
    const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let index = ((f64::from(degrees % 360) / 45.0).round() as usize) % 8;
    POINTS[index]
}

fn clock(time: Option<DateTime<Utc>>, offset: FixedOffset) -> String {
    time.map(|t| t.with_timezone(&offset).format("%-I:%M %p").to_string())
        .unwrap_or_else(|| "n/a".to_string())
}

fn current_panel(current: &CurrentConditions, unit: Unit, offset: FixedOffset) -> CurrentPanel {
    let wind = match current.wind_direction {
        Some(deg) => format!("{} {}", wind_speed(current.wind_speed, unit), compass(deg)),
        None => wind_speed(current.wind_speed, unit),
    };

    CurrentPanel {
        glyph: icons::glyph(current.condition_code, current.icon.as_deref()),
        temperature: temperature(current.temperature, unit),
        condition: capitalize(&current.description),
        feels_like: temperature(current.feels_like, unit),
        wind,
        humidity: format!("{}%", current.humidity),
        pressure: format!("{} hPa", current.pressure),
        visibility: visibility(current.visibility, unit),
        sunrise: clock(current.sunrise, offset),
        sunset: clock(current.sunset, offset),
    }
}

fn hour_card(entry: &HourlyEntry, unit: Unit) -> HourCard {
    let s = &entry.sample;
    HourCard {
        label: entry.label.clone(),
        glyph: icons::glyph(s.condition_code, s.icon.as_deref()),
        temperature: temperature(s.temp, unit),
        precipitation: format!("{}%", (s.pop * 100.0).round() as i64),
    }
}

fn day_card(bucket: &DayBucket, unit: Unit, with_averages: bool) -> DayCard {
    DayCard {
        label: bucket.label.clone(),
        glyph: icons::glyph(bucket.condition_code, bucket.icon.as_deref()),
        condition: capitalize(&bucket.description),
        max: temperature(bucket.temp_max, unit),
        min: temperature(bucket.temp_min, unit),
        humidity: with_averages.then(|| format!("{}%", bucket.average_humidity())),
        wind: with_averages.then(|| wind_speed(bucket.average_wind_speed(), unit)),
    }
}

fn map_placeholder(location: Option<&Location>) -> String {
    match location {
        Some(loc) => format!(
            "Interactive map unavailable in the terminal. Centre: {:.4}°{}, {:.4}°{}",
            loc.latitude.abs(),
            if loc.latitude >= 0.0 { "N" } else { "S" },
            loc.longitude.abs(),
            if loc.longitude >= 0.0 { "E" } else { "W" },
        ),
        None => "Interactive map unavailable in the terminal.".to_string(),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// How the host should emphasise a rendered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Plain,
    /// Header and section titles, drawn in the theme accent.
    Heading,
    Banner,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub style: LineStyle,
    pub text: String,
}

#[derive(Debug, Default)]
struct Lines(Vec<Line>);

impl Lines {
    fn push(&mut self, style: LineStyle, text: impl Into<String>) {
        self.0.push(Line { style, text: text.into() });
    }

    fn plain(&mut self, text: impl Into<String>) {
        self.push(LineStyle::Plain, text);
    }

    fn heading(&mut self, text: impl Into<String>) {
        self.push(LineStyle::Heading, text);
    }

    fn blank(&mut self) {
        self.plain("");
    }
}

/// Lay out the active tab as styled lines. Colouring is left to the host.
pub fn render(view: &DashboardView) -> Vec<Line> {
    let mut out = Lines::default();

    let nav: Vec<String> = Tab::all()
        .iter()
        .enumerate()
        .map(|(i, t)| {
            if *t == view.tab {
                format!("[{} {}]", i + 1, t.title())
            } else {
                format!(" {} {} ", i + 1, t.title())
            }
        })
        .collect();
    out.plain(nav.join(" "));
    out.heading(format!(
        "{}  ·  {}  ·  {} / {}",
        view.city, view.date, view.unit, view.theme
    ));

    if let Some(banner) = &view.banner {
        out.push(LineStyle::Banner, format!("! {banner}"));
    }
    out.blank();

    match view.tab {
        Tab::Home => {
            match &view.current {
                Some(c) => {
                    out.heading("Current conditions");
                    out.plain(format!("  {} {}  {}", c.glyph.symbol(), c.temperature, c.condition));
                    out.plain(format!(
                        "  Feels like {}  ·  Wind {}  ·  Humidity {}",
                        c.feels_like, c.wind, c.humidity
                    ));
                    out.plain(format!(
                        "  Pressure {}  ·  Visibility {}",
                        c.pressure, c.visibility
                    ));
                    out.plain(format!("  Sunrise {}  ·  Sunset {}", c.sunrise, c.sunset));
                }
                None => out.plain("  No weather data yet."),
            }

            if !view.hourly.is_empty() {
                out.blank();
                out.heading("Next 24 hours");
                for h in &view.hourly {
                    out.plain(format!(
                        "  {:>5}  {} {:>5}  rain {:>4}",
                        h.label,
                        h.glyph.symbol(),
                        h.temperature,
                        h.precipitation
                    ));
                }
            }

            if !view.short_range.is_empty() {
                out.blank();
                out.heading("5-day forecast");
                for d in &view.short_range {
                    out.plain(format!(
                        "  {:<10} {} {:>5} / {:<5} {}",
                        d.label,
                        d.glyph.symbol(),
                        d.max,
                        d.min,
                        d.condition
                    ));
                }
            }
        }
        Tab::Forecast => {
            out.heading("7-day forecast");
            if view.extended.is_empty() {
                out.plain("  No forecast available.");
            }
            for d in &view.extended {
                out.plain(format!(
                    "  {:<10} {} {:>5} / {:<5} humidity {:>4}  wind {:>8}  {}",
                    d.label,
                    d.glyph.symbol(),
                    d.max,
                    d.min,
                    d.humidity.as_deref().unwrap_or("n/a"),
                    d.wind.as_deref().unwrap_or("n/a"),
                    d.condition
                ));
            }
        }
        Tab::Cities => {
            out.heading("Popular cities");
            for (i, city) in view.cities.iter().enumerate() {
                out.plain(format!("  {}. {city}", i + 1));
            }
        }
        Tab::Map => {
            out.heading("Map");
            out.plain(format!("  {}", view.map));
        }
        Tab::News => {
            out.heading("Weather news");
            for item in &view.news {
                out.plain(format!("  • {} ({})", item.title, item.source));
            }
        }
    }

    out.0
}

/// [`render`] flattened to plain text, one line per row.
pub fn render_text(view: &DashboardView) -> String {
    render(view).into_iter().fold(String::new(), |mut text, line| {
        text.push_str(&line.text);
        text.push('\n');
        text
    })
}
