//! Trailing won-deal history, bucketed by close month.

use chrono::NaiveDate;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::{calendar, opportunity::Opportunity};

pub const DEFAULT_HISTORY_MONTHS: u32 = 6;
pub const DEFAULT_FALLBACK_AVERAGE: Decimal = dec!(50000);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoricalMonth {
    /// `YYYY-MM`
    pub month: String,
    pub label: String,
    pub count: u32,
    #[schema(value_type = String)]
    pub total: Decimal,
    #[schema(value_type = String)]
    pub average: Decimal,
}

/// Won-deal history. `Synthetic` marks placeholder figures generated
/// because no deal closed inside the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "source", content = "months", rename_all = "snake_case")]
pub enum HistoricalSeries {
    Recorded(Vec<HistoricalMonth>),
    Synthetic(Vec<HistoricalMonth>),
}

impl HistoricalSeries {
    pub fn months(&self) -> &[HistoricalMonth] {
        match self {
            HistoricalSeries::Recorded(months) | HistoricalSeries::Synthetic(months) => months,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, HistoricalSeries::Synthetic(_))
    }
}

/// Window length and the baseline used when placeholder data is needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryWindow {
    pub months: u32,
    pub fallback_average: Decimal,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self {
            months: DEFAULT_HISTORY_MONTHS,
            fallback_average: DEFAULT_FALLBACK_AVERAGE,
        }
    }
}

impl HistoryWindow {
    /// Earliest close date that still counts.
    pub fn since(&self, today: NaiveDate) -> NaiveDate {
        calendar::sub_months(today, self.months)
    }
}

/// Groups converted opportunities closed inside `[since, today]` by close
/// month, oldest first. Close dates after `today` are ignored.
///
/// When nothing qualifies, returns `Synthetic` months derived from
/// `baseline_average` (or the window's fallback when that is `None`).
pub fn aggregate_history<R: Rng + ?Sized>(
    opportunities: &[Opportunity],
    baseline_average: Option<Decimal>,
    window: HistoryWindow,
    today: NaiveDate,
    rng: &mut R,
) -> HistoricalSeries {
    let since = window.since(today);
    let mut buckets: BTreeMap<NaiveDate, (u32, Decimal)> = BTreeMap::new();

    for opportunity in opportunities.iter().filter(|o| o.is_won()) {
        let Some(closed) = opportunity.actual_close_date else {
            continue;
        };
        if closed < since || closed > today {
            continue;
        }
        let entry = buckets
            .entry(calendar::first_of_month(closed))
            .or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += opportunity.amount;
    }

    if buckets.is_empty() {
        let base = baseline_average.unwrap_or(window.fallback_average);
        return HistoricalSeries::Synthetic(synthesize(base, window.months, today, rng));
    }

    let months = buckets
        .into_iter()
        .map(|(month_start, (count, total))| HistoricalMonth {
            month: calendar::month_key(month_start),
            label: calendar::month_label(month_start),
            count,
            total,
            average: (total / Decimal::from(count)).round_dp(2),
        })
        .collect();

    HistoricalSeries::Recorded(months)
}

fn synthesize<R: Rng + ?Sized>(
    base: Decimal,
    months: u32,
    today: NaiveDate,
    rng: &mut R,
) -> Vec<HistoricalMonth> {
    let current = calendar::first_of_month(today);
    (0..months)
        .rev()
        .map(|offset| {
            let month_start = calendar::sub_months(current, offset);
            let count: u32 = rng.gen_range(3..=8);
            let variation = Decimal::new(rng.gen_range(80..=120), 2);
            let average = (base * variation).round_dp(2).max(Decimal::ZERO);
            HistoricalMonth {
                month: calendar::month_key(month_start),
                label: calendar::month_label(month_start),
                count,
                total: average * Decimal::from(count),
                average,
            }
        })
        .collect()
}
