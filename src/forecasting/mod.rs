//! Sales forecasting and pipeline analytics.
//!
//! Everything in here is pure computation over opportunity records: callers
//! supply the records, a point in time and (where the result is randomized)
//! a random source. Data access lives in [`crate::repositories`] and the
//! orchestration in [`crate::services::forecasting`].

pub mod calculator;
pub mod calendar;
pub mod clock;
pub mod conversion;
pub mod historical;
pub mod horizon;
pub mod opportunity;
pub mod pipeline;
pub mod stage;

pub use calculator::{
    adjust_probability, calculate_forecast, Forecast, ForecastBucket, ForecastPeriod,
    ForecastTotals,
};
pub use clock::{Clock, FixedClock, SystemClock};
pub use conversion::{estimate_conversion_rates, ConversionEdge, ConversionRates, OverallConversion};
pub use historical::{aggregate_history, HistoricalMonth, HistoricalSeries, HistoryWindow};
pub use horizon::{Horizon, Scenario};
pub use opportunity::Opportunity;
pub use pipeline::{analyze_pipeline, StageBucket};
pub use stage::Stage;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The full analytics payload served by the forecast endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ForecastReport {
    pub forecasts: Forecast,
    pub historical_data: HistoricalSeries,
    pub pipeline_analysis: Vec<StageBucket>,
    pub conversion_rates: ConversionRates,
}
