use chrono::{DateTime, Months, Utc};
use metrics::{counter, histogram};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::ForecastSettings;
use crate::errors::ServiceError;
use crate::forecasting::{
    aggregate_history, analyze_pipeline, calculate_forecast, calendar, estimate_conversion_rates,
    Clock, ConversionRates, Forecast, ForecastReport, HistoricalSeries, Horizon, Scenario,
    StageBucket, Stage,
};
use crate::repositories::OpportunityStore;

/// Parameters shared by every forecast query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub horizon: Horizon,
    pub scenario: Scenario,
    /// Restrict every section to one sales rep's opportunities
    pub owner_id: Option<Uuid>,
}

impl ForecastRequest {
    /// Builds a request from raw query values. Missing or unrecognized
    /// `period`/`scenario` strings fall back to the configured defaults.
    pub fn resolve(
        period: Option<&str>,
        scenario: Option<&str>,
        owner_id: Option<Uuid>,
        settings: &ForecastSettings,
    ) -> Self {
        Self {
            horizon: Horizon::from_param(period).unwrap_or(settings.default_period),
            scenario: Scenario::from_param(scenario).unwrap_or(settings.default_scenario),
            owner_id,
        }
    }
}

/// Runs the analytics over an [`OpportunityStore`]
pub struct ForecastService {
    store: Arc<dyn OpportunityStore>,
    clock: Arc<dyn Clock>,
    settings: ForecastSettings,
}

impl ForecastService {
    pub fn new(
        store: Arc<dyn OpportunityStore>,
        clock: Arc<dyn Clock>,
        settings: ForecastSettings,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    fn rng(&self) -> StdRng {
        match self.settings.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// All four analytics sections for one request.
    #[instrument(skip(self))]
    pub async fn report(&self, request: ForecastRequest) -> Result<ForecastReport, ServiceError> {
        let started = Instant::now();
        let now = self.clock.now();
        let mut rng = self.rng();

        let forecasts = self.forecast_with(request, now, &mut rng).await?;
        let historical_data = self.historical_with(request.owner_id, now, &mut rng).await?;
        let pipeline_analysis = self.pipeline_at(request.owner_id, now).await?;
        let conversion_rates = self.conversion_rates_at(request.owner_id, now).await?;

        let elapsed = started.elapsed();
        counter!("forecast.reports.generated", 1);
        histogram!("forecast.report.duration", elapsed);
        info!(
            period = %request.horizon,
            scenario = %request.scenario,
            months = forecasts.months.len(),
            synthetic_history = historical_data.is_synthetic(),
            "Forecast report generated in {:?}",
            elapsed
        );

        Ok(ForecastReport {
            forecasts,
            historical_data,
            pipeline_analysis,
            conversion_rates,
        })
    }

    #[instrument(skip(self))]
    pub async fn forecast(&self, request: ForecastRequest) -> Result<Forecast, ServiceError> {
        let mut rng = self.rng();
        self.forecast_with(request, self.clock.now(), &mut rng).await
    }

    #[instrument(skip(self))]
    pub async fn historical(&self, owner_id: Option<Uuid>) -> Result<HistoricalSeries, ServiceError> {
        let mut rng = self.rng();
        self.historical_with(owner_id, self.clock.now(), &mut rng).await
    }

    #[instrument(skip(self))]
    pub async fn pipeline(&self, owner_id: Option<Uuid>) -> Result<Vec<StageBucket>, ServiceError> {
        self.pipeline_at(owner_id, self.clock.now()).await
    }

    #[instrument(skip(self))]
    pub async fn conversion_rates(
        &self,
        owner_id: Option<Uuid>,
    ) -> Result<ConversionRates, ServiceError> {
        self.conversion_rates_at(owner_id, self.clock.now()).await
    }

    async fn forecast_with(
        &self,
        request: ForecastRequest,
        now: DateTime<Utc>,
        rng: &mut StdRng,
    ) -> Result<Forecast, ServiceError> {
        let today = now.date_naive();
        let start = calendar::first_of_month(today);
        let end = calendar::last_of_month(request.horizon.end_date(today));

        let candidates = self
            .store
            .open_closing_between(request.owner_id, start, end)
            .await?;
        debug!(candidates = candidates.len(), %start, %end, "Loaded forecast candidates");

        Ok(calculate_forecast(
            &candidates,
            request.horizon,
            request.scenario,
            today,
            rng,
        ))
    }

    async fn historical_with(
        &self,
        owner_id: Option<Uuid>,
        now: DateTime<Utc>,
        rng: &mut StdRng,
    ) -> Result<HistoricalSeries, ServiceError> {
        let today = now.date_naive();
        let window = self.settings.history_window();

        let won = self
            .store
            .converted_closed_between(owner_id, window.since(today), today)
            .await?;
        let baseline = if won.is_empty() {
            self.store.average_amount(owner_id).await?
        } else {
            None
        };

        let series = aggregate_history(&won, baseline, window, today, rng);
        if series.is_synthetic() {
            counter!("forecast.historical.synthetic", 1);
            debug!("No won deals in window; serving synthetic history");
        }
        Ok(series)
    }

    async fn pipeline_at(
        &self,
        owner_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Vec<StageBucket>, ServiceError> {
        let open = self.store.in_stages(owner_id, &Stage::OPEN).await?;
        Ok(analyze_pipeline(&open, now))
    }

    async fn conversion_rates_at(
        &self,
        owner_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<ConversionRates, ServiceError> {
        let window_start = now
            .checked_sub_months(Months::new(self.settings.conversion_window_months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let recent = self.store.created_since(owner_id, window_start).await?;
        Ok(estimate_conversion_rates(&recent, window_start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecasting::{FixedClock, Opportunity};
    use crate::repositories::{InMemoryOpportunityStore, MockOpportunityStore};
    use assert_matches::assert_matches;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()
    }

    fn seeded_settings() -> ForecastSettings {
        ForecastSettings {
            random_seed: Some(42),
            ..ForecastSettings::default()
        }
    }

    fn service(store: impl OpportunityStore + 'static) -> ForecastService {
        ForecastService::new(
            Arc::new(store),
            Arc::new(FixedClock::on(today())),
            seeded_settings(),
        )
    }

    #[test]
    fn resolve_falls_back_to_configured_defaults() {
        let settings = ForecastSettings {
            default_period: Horizon::Year,
            ..ForecastSettings::default()
        };
        let request = ForecastRequest::resolve(Some("decade"), Some("OPTIMISTIC"), None, &settings);
        assert_eq!(request.horizon, Horizon::Year);
        assert_eq!(request.scenario, Scenario::Optimistic);

        let request = ForecastRequest::resolve(None, None, None, &ForecastSettings::default());
        assert_eq!(request, ForecastRequest::default());
    }

    #[tokio::test]
    async fn empty_store_yields_placeholders() {
        let report = service(InMemoryOpportunityStore::new())
            .report(ForecastRequest::default())
            .await
            .unwrap();

        assert_eq!(report.forecasts.months.len(), 2);
        assert!(report.historical_data.is_synthetic());
        assert_eq!(report.historical_data.months().len(), 6);
        assert_eq!(report.pipeline_analysis.len(), 4);
        assert!(report.conversion_rates.overall.estimated);
        assert!(report.conversion_rates.stages.iter().all(|edge| edge.estimated));
    }

    #[tokio::test]
    async fn seeded_reports_are_reproducible() {
        let created = today().and_hms_opt(9, 0, 0).unwrap().and_utc();
        let opportunities = vec![
            Opportunity::new("Renewal", dec!(12000), 60, Stage::Negotiation, created)
                .closing_on(NaiveDate::from_ymd_opt(2025, 6, 10).unwrap()),
            Opportunity::new("Pilot", dec!(4000), 30, Stage::Qualification, created)
                .closing_on(NaiveDate::from_ymd_opt(2025, 5, 28).unwrap()),
        ];
        let first = service(InMemoryOpportunityStore::with_opportunities(opportunities.clone()))
            .report(ForecastRequest::default())
            .await
            .unwrap();
        let second = service(InMemoryOpportunityStore::with_opportunities(opportunities))
            .report(ForecastRequest::default())
            .await
            .unwrap();

        assert_eq!(first.forecasts, second.forecasts);
        assert_eq!(first.historical_data, second.historical_data);
    }

    #[tokio::test]
    async fn owner_filter_scopes_pipeline() {
        let rep = Uuid::new_v4();
        let created = today().and_hms_opt(9, 0, 0).unwrap().and_utc();
        let store = InMemoryOpportunityStore::with_opportunities(vec![
            Opportunity::new("Mine", dec!(500), 10, Stage::New, created).owned_by(rep),
            Opportunity::new("Theirs", dec!(900), 10, Stage::New, created),
        ]);

        let buckets = service(store).pipeline(Some(rep)).await.unwrap();
        assert_eq!(buckets[0].stage, Stage::New);
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[0].total_value, dec!(500));
    }

    #[tokio::test]
    async fn store_failures_propagate() {
        let mut store = MockOpportunityStore::new();
        store
            .expect_in_stages()
            .returning(|_, _| Err(ServiceError::database_error_message("connection refused")));

        let result = service(store).pipeline(None).await;
        assert_matches!(result, Err(ServiceError::DatabaseError(_)));
    }

    #[tokio::test]
    async fn recorded_history_skips_baseline_lookup() {
        let closed = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();
        let created = closed.and_hms_opt(9, 0, 0).unwrap().and_utc();
        let mut store = MockOpportunityStore::new();
        store
            .expect_converted_closed_between()
            .withf(|owner, since, until| {
                owner.is_none()
                    && *since == NaiveDate::from_ymd_opt(2024, 11, 20).unwrap()
                    && *until == today()
            })
            .returning(move |_, _, _| {
                Ok(vec![
                    Opportunity::new("Won", dec!(8000), 100, Stage::Converted, created)
                        .closed_on(closed),
                ])
            });
        store.expect_average_amount().never();

        let series = service(store).historical(None).await.unwrap();
        assert!(!series.is_synthetic());
        assert_eq!(series.months().len(), 1);
        assert_eq!(series.months()[0].total, dec!(8000));
    }
}
