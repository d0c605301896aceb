pub mod forecasting;

pub use forecasting::{ForecastRequest, ForecastService};
