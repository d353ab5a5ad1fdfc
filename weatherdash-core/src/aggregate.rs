//! Regroups 3-hourly forecast samples into per-day buckets.
//!
//! Buckets are keyed by weekday name in the location's UTC offset, in
//! first-seen order. Two samples on different dates with the same weekday
//! name land in the same bucket; the provider's window is 5 days, so this
//! only shows up with longer inputs.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::model::{Forecast, ForecastSample};

/// Samples shown in the hourly strip (~24 hours).
pub const HOURLY_SAMPLES: usize = 8;
/// Samples per day that feed the extended view.
pub const EXTENDED_SAMPLES_PER_DAY: usize = 3;
/// Day cards in the extended view.
pub const EXTENDED_DAYS: usize = 7;

#[derive(Debug, Clone, PartialEq)]
pub struct DayBucket {
    pub label: String,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Condition of the first sample seen for this day.
    pub condition_code: Option<u16>,
    pub icon: Option<String>,
    pub description: String,
    pub samples: usize,
    humidity_sum: f64,
    wind_sum: f64,
}

impl DayBucket {
    fn start(label: String, sample: &ForecastSample) -> Self {
        Self {
            label,
            temp_min: sample.temp_min,
            temp_max: sample.temp_max,
            condition_code: sample.condition_code,
            icon: sample.icon.clone(),
            description: sample.description.clone(),
            samples: 1,
            humidity_sum: f64::from(sample.humidity),
            wind_sum: sample.wind_speed,
        }
    }

    fn merge(&mut self, sample: &ForecastSample) {
        self.temp_min = self.temp_min.min(sample.temp_min);
        self.temp_max = self.temp_max.max(sample.temp_max);
        self.humidity_sum += f64::from(sample.humidity);
        self.wind_sum += sample.wind_speed;
        self.samples += 1;
    }

    /// Mean humidity of the contributing samples, rounded.
    pub fn average_humidity(&self) -> u8 {
        (self.humidity_sum / self.samples as f64).round() as u8
    }

    /// Mean wind speed of the contributing samples, in provider units.
    pub fn average_wind_speed(&self) -> f64 {
        self.wind_sum / self.samples as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HourlyEntry {
    /// 12-hour clock label, e.g. "3 PM".
    pub label: String,
    pub sample: ForecastSample,
}

/// Everything the forecast cards need, derived from one forecast.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastViews {
    pub hourly: Vec<HourlyEntry>,
    pub short_range: Vec<DayBucket>,
    pub extended: Vec<DayBucket>,
}

pub fn aggregate(
    forecast: &Forecast,
    now: DateTime<Utc>,
    short_range_days: usize,
) -> ForecastViews {
    let offset = fixed_offset(forecast.utc_offset_seconds);
    ForecastViews {
        hourly: hourly(&forecast.samples, offset),
        short_range: short_range(&forecast.samples, offset, now, short_range_days),
        extended: extended(&forecast.samples, offset),
    }
}

/// Offsets outside ±24h are treated as UTC.
pub fn fixed_offset(seconds: i32) -> FixedOffset {
    FixedOffset::east_opt(seconds).unwrap_or_else(|| Utc.fix())
}

pub fn day_label(timestamp: DateTime<Utc>, offset: FixedOffset) -> String {
    timestamp.with_timezone(&offset).format("%A").to_string()
}

pub fn hour_label(timestamp: DateTime<Utc>, offset: FixedOffset) -> String {
    timestamp.with_timezone(&offset).format("%-I %p").to_string()
}

/// Group samples by weekday name, optionally keeping only the first
/// `per_day_cap` samples of each day.
pub fn group_by_day(
    samples: &[ForecastSample],
    offset: FixedOffset,
    per_day_cap: Option<usize>,
) -> Vec<DayBucket> {
    let mut buckets: Vec<DayBucket> = Vec::new();

    for sample in samples {
        let label = day_label(sample.timestamp, offset);
        match buckets.iter_mut().find(|b| b.label == label) {
            Some(bucket) => {
                if per_day_cap.is_some_and(|cap| bucket.samples >= cap) {
                    continue;
                }
                bucket.merge(sample);
            }
            None => buckets.push(DayBucket::start(label, sample)),
        }
    }

    buckets
}

/// The first `days` buckets, skipping the bucket for today.
pub fn short_range(
    samples: &[ForecastSample],
    offset: FixedOffset,
    now: DateTime<Utc>,
    days: usize,
) -> Vec<DayBucket> {
    let today = day_label(now, offset);
    group_by_day(samples, offset, None)
        .into_iter()
        .filter(|b| b.label != today)
        .take(days)
        .collect()
}

pub fn hourly(samples: &[ForecastSample], offset: FixedOffset) -> Vec<HourlyEntry> {
    samples
        .iter()
        .take(HOURLY_SAMPLES)
        .map(|s| HourlyEntry {
            label: hour_label(s.timestamp, offset),
            sample: s.clone(),
        })
        .collect()
}

pub fn extended(samples: &[ForecastSample], offset: FixedOffset) -> Vec<DayBucket> {
    let mut buckets = group_by_day(samples, offset, Some(EXTENDED_SAMPLES_PER_DAY));
    buckets.truncate(EXTENDED_DAYS);
    buckets
}
