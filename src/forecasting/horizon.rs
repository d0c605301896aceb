use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use super::calendar;

/// How far ahead the forecast looks.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Horizon {
    /// Through the end of the current calendar quarter.
    #[default]
    Quarter,
    /// Six months from today.
    Semester,
    /// Through December 31 of the current year.
    Year,
}

impl Horizon {
    /// Parses a query value. Unknown or empty values yield `None` so callers
    /// can fall back to their configured default.
    pub fn from_param(raw: Option<&str>) -> Option<Self> {
        raw.map(str::trim)
            .filter(|value| !value.is_empty())
            .and_then(|value| value.parse().ok())
    }

    /// Last day covered by the horizon.
    pub fn end_date(self, today: NaiveDate) -> NaiveDate {
        match self {
            Horizon::Quarter => calendar::quarter_end(today),
            Horizon::Semester => calendar::add_months(today, 6),
            Horizon::Year => calendar::year_end(today),
        }
    }
}

/// Probability adjustment scenario.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Scenario {
    Pessimistic,
    #[default]
    Realistic,
    Optimistic,
}

impl Scenario {
    pub fn from_param(raw: Option<&str>) -> Option<Self> {
        raw.map(str::trim)
            .filter(|value| !value.is_empty())
            .and_then(|value| value.parse().ok())
    }

    /// Inclusive bounds of the multiplier, in whole percent.
    pub fn multiplier_percent_bounds(self) -> (u32, u32) {
        match self {
            Scenario::Pessimistic => (60, 80),
            Scenario::Realistic => (90, 100),
            Scenario::Optimistic => (110, 130),
        }
    }
}
