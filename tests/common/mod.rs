//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use pipeline_forecast::{
    config::{AppConfig, ForecastSettings},
    forecasting::{FixedClock, Opportunity, Stage},
    repositories::InMemoryOpportunityStore,
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

/// Every integration test runs "on" this day unless it says otherwise.
pub fn today() -> NaiveDate {
    date(2025, 5, 20)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_opt(9, 0, 0).unwrap().and_utc()
}

pub fn open(title: &str, amount: Decimal, probability: u8, stage: Stage, closes: NaiveDate) -> Opportunity {
    Opportunity::new(title, amount, probability, stage, at(date(2025, 4, 1))).closing_on(closes)
}

pub fn won(title: &str, amount: Decimal, closed: NaiveDate) -> Opportunity {
    Opportunity::new(title, amount, 100, Stage::Converted, at(closed)).closed_on(closed)
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::new(
        "sqlite::memory:".into(),
        "127.0.0.1".into(),
        0,
        "development".into(),
    );
    cfg.forecast = ForecastSettings {
        random_seed: Some(7),
        ..ForecastSettings::default()
    };
    cfg
}

/// App state over an in-memory book, a disconnected database and a clock
/// pinned to [`today`].
pub fn app_state(opportunities: Vec<Opportunity>) -> AppState {
    AppState::with_store(
        Arc::new(DatabaseConnection::Disconnected),
        test_config(),
        Arc::new(InMemoryOpportunityStore::with_opportunities(opportunities)),
        Arc::new(FixedClock::on(today())),
    )
}
