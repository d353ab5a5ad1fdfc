//! Condition code → glyph lookup.
//!
//! See: https://openweathermap.org/weather-conditions

/// Closed set of weather glyphs the dashboard can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Glyph {
    Thunderstorm,
    Drizzle,
    Rain,
    Snow,
    Atmosphere,
    ClearDay,
    ClearNight,
    FewCloudsDay,
    FewCloudsNight,
    Clouds,
    /// Anything the tables below do not know.
    Generic,
}

impl Glyph {
    /// Font Awesome class list.
    pub fn css_class(&self) -> &'static str {
        match self {
            Glyph::Thunderstorm => "fas fa-bolt",
            Glyph::Drizzle => "fas fa-cloud-rain",
            Glyph::Rain => "fas fa-cloud-showers-heavy",
            Glyph::Snow => "fas fa-snowflake",
            Glyph::Atmosphere => "fas fa-smog",
            Glyph::ClearDay => "fas fa-sun",
            Glyph::ClearNight => "fas fa-moon",
            Glyph::FewCloudsDay => "fas fa-cloud-sun",
            Glyph::FewCloudsNight => "fas fa-cloud-moon",
            Glyph::Clouds => "fas fa-cloud",
            Glyph::Generic => "fas fa-temperature-half",
        }
    }

    /// Terminal rendering.
    pub fn symbol(&self) -> &'static str {
        match self {
            Glyph::Thunderstorm => "⛈",
            Glyph::Drizzle => "🌦",
            Glyph::Rain => "🌧",
            Glyph::Snow => "❄",
            Glyph::Atmosphere => "🌫",
            Glyph::ClearDay => "☀",
            Glyph::ClearNight => "🌙",
            Glyph::FewCloudsDay => "⛅",
            Glyph::FewCloudsNight => "☁",
            Glyph::Clouds => "☁",
            Glyph::Generic => "🌡",
        }
    }
}

/// Pick a glyph from the condition code, falling back to the icon code.
pub fn glyph(condition_code: Option<u16>, icon: Option<&str>) -> Glyph {
    let night = icon.is_some_and(|i| i.ends_with('n'));

    condition_code
        .and_then(|code| from_condition_code(code, night))
        .or_else(|| icon.and_then(from_icon_code))
        .unwrap_or(Glyph::Generic)
}

fn from_condition_code(code: u16, night: bool) -> Option<Glyph> {
    let glyph = match code {
        200..=232 => Glyph::Thunderstorm,
        300..=321 => Glyph::Drizzle,
        511 => Glyph::Snow, // freezing rain
        500..=531 => Glyph::Rain,
        600..=622 => Glyph::Snow,
        701..=781 => Glyph::Atmosphere,
        800 if night => Glyph::ClearNight,
        800 => Glyph::ClearDay,
        801 if night => Glyph::FewCloudsNight,
        801 => Glyph::FewCloudsDay,
        802..=804 => Glyph::Clouds,
        _ => return None,
    };
    Some(glyph)
}

fn from_icon_code(icon: &str) -> Option<Glyph> {
    let (kind, suffix) = icon.split_at_checked(2)?;
    let night = match suffix {
        "d" => false,
        "n" => true,
        _ => return None,
    };

    let glyph = match kind {
        "01" if night => Glyph::ClearNight,
        "01" => Glyph::ClearDay,
        "02" if night => Glyph::FewCloudsNight,
        "02" => Glyph::FewCloudsDay,
        "03" | "04" => Glyph::Clouds,
        "09" => Glyph::Drizzle,
        "10" => Glyph::Rain,
        "11" => Glyph::Thunderstorm,
        "13" => Glyph::Snow,
        "50" => Glyph::Atmosphere,
        _ => return None,
    };
    Some(glyph)
}
