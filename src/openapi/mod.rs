use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pipeline Forecast API",
        version = "0.1.0",
        description = r#"
# Pipeline Forecast API

Read-only sales analytics over CRM opportunities.

- **Forecasts**: monthly committed / best case / pipeline / weighted revenue for a quarter, semester or year, under a pessimistic, realistic or optimistic scenario
- **Historical data**: won deals per month over the trailing window, or a clearly tagged synthetic series when nothing has closed
- **Pipeline analysis**: count, value, weighted value and age of open opportunities per stage
- **Conversion rates**: stage-to-stage progression and overall win rate for recently created opportunities

All endpoints accept an optional `owner_id` to scope results to one sales rep.
        "#,
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Forecasting", description = "Sales forecasting and pipeline analytics"),
    ),
    paths(
        crate::handlers::forecast::get_forecast_report,
        crate::handlers::forecast::get_monthly_forecast,
        crate::handlers::forecast::get_historical_data,
        crate::handlers::forecast::get_pipeline_analysis,
        crate::handlers::forecast::get_conversion_rates,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::forecasting::ForecastReport,
            crate::forecasting::Forecast,
            crate::forecasting::ForecastPeriod,
            crate::forecasting::ForecastTotals,
            crate::forecasting::HistoricalSeries,
            crate::forecasting::HistoricalMonth,
            crate::forecasting::StageBucket,
            crate::forecasting::ConversionRates,
            crate::forecasting::ConversionEdge,
            crate::forecasting::OverallConversion,
            crate::forecasting::Stage,
            crate::forecasting::Horizon,
            crate::forecasting::Scenario,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
