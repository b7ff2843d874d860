//! Broadcast seasons.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Days before a season starts at which the next season is considered imminent.
pub const IMMINENT_DAYS: i64 = 21;

/// An anime broadcast season, as understood by AniList.
#[derive(
    Clone,
    Copy,
    Debug,
    Display,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    EnumString,
    Deserialize,
    Serialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    /// The season containing `month` (1-12).
    pub fn of(month: u32) -> Self {
        match month {
            1..=3 => Self::Winter,
            4..=6 => Self::Spring,
            7..=9 => Self::Summer,
            _ => Self::Fall,
        }
    }

    /// The season and year containing `today`.
    pub fn current(today: NaiveDate) -> (Self, i32) {
        (Self::of(today.month()), today.year())
    }

    /// The season after the one containing `today`, with its year.
    pub fn next(today: NaiveDate) -> (Self, i32) {
        let year = today.year();
        match Self::of(today.month()) {
            Self::Winter => (Self::Spring, year),
            Self::Spring => (Self::Summer, year),
            Self::Summer => (Self::Fall, year),
            Self::Fall => (Self::Winter, year + 1),
        }
    }

    /// The position of this season within a year, starting from winter.
    pub fn order(&self) -> u8 {
        match self {
            Self::Winter => 0,
            Self::Spring => 1,
            Self::Summer => 2,
            Self::Fall => 3,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Spring => "🌸",
            Self::Summer => "☀️",
            Self::Fall => "🍂",
            Self::Winter => "❄️",
        }
    }

    /// The season name in title case, e.g. "Spring".
    pub fn title(&self) -> &'static str {
        match self {
            Self::Winter => "Winter",
            Self::Spring => "Spring",
            Self::Summer => "Summer",
            Self::Fall => "Fall",
        }
    }
}

/// Emoji for a free-form season label, such as one read back from a data file.
pub fn emoji_for(label: &str) -> &'static str {
    match label.to_uppercase().as_str() {
        "AUTUMN" => Season::Fall.emoji(),
        upper => upper
            .parse::<Season>()
            .map(|season| season.emoji())
            .unwrap_or("🎭"),
    }
}

/// The first day of the season after the one containing `today`.
pub fn next_season_start(today: NaiveDate) -> NaiveDate {
    [1, 4, 7, 10]
        .into_iter()
        .find(|&month| month > today.month())
        .and_then(|month| NaiveDate::from_ymd_opt(today.year(), month, 1))
        .or_else(|| NaiveDate::from_ymd_opt(today.year() + 1, 1, 1))
        .unwrap_or(today)
}

/// Whole days from `now` until midnight at the start of the next season.
///
/// Partial days are dropped, so at any time after midnight this is one less than the number of
/// calendar days remaining.
pub fn days_until_next_season(now: NaiveDateTime) -> i64 {
    (next_season_start(now.date()).and_time(NaiveTime::MIN) - now).num_days()
}

/// Whether the next season starts within [`IMMINENT_DAYS`].
pub fn next_season_imminent(now: NaiveDateTime) -> bool {
    days_until_next_season(now) <= IMMINENT_DAYS
}
