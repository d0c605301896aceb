use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query, State},
    http::request::Parts,
    response::Json,
    routing::get,
    Router,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    forecasting::{ConversionRates, Forecast, ForecastReport, HistoricalSeries, StageBucket},
    services::forecasting::ForecastRequest,
    ApiResponse, AppState,
};

/// Build the forecast Router scoped under `/api/v1/forecast`.
pub fn forecast_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_forecast_report))
        .route("/monthly", get(get_monthly_forecast))
        .route("/historical", get(get_historical_data))
        .route("/pipeline", get(get_pipeline_analysis))
        .route("/conversion-rates", get(get_conversion_rates))
}

/// Query-string extractor that rejects with a JSON `400` instead of axum's
/// plain-text rejection.
#[derive(Debug, Clone, Default)]
pub struct Params<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Query parameters accepted by every forecast endpoint
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ForecastQuery {
    /// Forecast horizon: `quarter` (default), `semester` or `year`.
    /// Unrecognized values fall back to the default.
    pub period: Option<String>,
    /// Probability adjustment: `pessimistic`, `realistic` (default) or `optimistic`
    pub scenario: Option<String>,
    /// Restrict results to a single opportunity owner
    pub owner_id: Option<Uuid>,
}

impl ForecastQuery {
    fn into_request(self, state: &AppState) -> ForecastRequest {
        ForecastRequest::resolve(
            self.period.as_deref(),
            self.scenario.as_deref(),
            self.owner_id,
            state.forecasting.settings(),
        )
    }
}

/// Query parameters for endpoints that only filter by owner
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct OwnerQuery {
    /// Restrict results to a single opportunity owner
    pub owner_id: Option<Uuid>,
}

/// Full analytics report: forecasts, history, pipeline and conversion rates
#[utoipa::path(
    get,
    path = "/api/v1/forecast",
    params(ForecastQuery),
    responses(
        (status = 200, description = "Forecast report generated", body = ApiResponse<ForecastReport>),
        (status = 400, description = "Malformed owner_id", body = crate::errors::ErrorResponse),
        (status = 500, description = "Opportunity store unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecasting"
)]
pub async fn get_forecast_report(
    State(state): State<AppState>,
    Params(query): Params<ForecastQuery>,
) -> Result<Json<ApiResponse<ForecastReport>>, ServiceError> {
    let request = query.into_request(&state);
    let report = state.forecasting.report(request).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Monthly forecast for the requested horizon and scenario
#[utoipa::path(
    get,
    path = "/api/v1/forecast/monthly",
    params(ForecastQuery),
    responses(
        (status = 200, description = "Monthly forecast generated", body = ApiResponse<Forecast>),
        (status = 400, description = "Malformed owner_id", body = crate::errors::ErrorResponse),
        (status = 500, description = "Opportunity store unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecasting"
)]
pub async fn get_monthly_forecast(
    State(state): State<AppState>,
    Params(query): Params<ForecastQuery>,
) -> Result<Json<ApiResponse<Forecast>>, ServiceError> {
    let request = query.into_request(&state);
    let forecast = state.forecasting.forecast(request).await?;
    Ok(Json(ApiResponse::success(forecast)))
}

/// Won-deal history for the trailing window
#[utoipa::path(
    get,
    path = "/api/v1/forecast/historical",
    params(OwnerQuery),
    responses(
        (status = 200, description = "Historical series, recorded or synthetic", body = ApiResponse<HistoricalSeries>),
        (status = 400, description = "Malformed owner_id", body = crate::errors::ErrorResponse),
        (status = 500, description = "Opportunity store unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecasting"
)]
pub async fn get_historical_data(
    State(state): State<AppState>,
    Params(query): Params<OwnerQuery>,
) -> Result<Json<ApiResponse<HistoricalSeries>>, ServiceError> {
    let series = state.forecasting.historical(query.owner_id).await?;
    Ok(Json(ApiResponse::success(series)))
}

#[utoipa::path(
    get,
    path = "/api/v1/forecast/pipeline",
    params(OwnerQuery),
    responses(
        (status = 200, description = "Open pipeline grouped by stage", body = ApiResponse<Vec<StageBucket>>),
        (status = 400, description = "Malformed owner_id", body = crate::errors::ErrorResponse),
        (status = 500, description = "Opportunity store unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecasting"
)]
pub async fn get_pipeline_analysis(
    State(state): State<AppState>,
    Params(query): Params<OwnerQuery>,
) -> Result<Json<ApiResponse<Vec<StageBucket>>>, ServiceError> {
    let buckets = state.forecasting.pipeline(query.owner_id).await?;
    Ok(Json(ApiResponse::success(buckets)))
}

#[utoipa::path(
    get,
    path = "/api/v1/forecast/conversion-rates",
    params(OwnerQuery),
    responses(
        (status = 200, description = "Stage-to-stage and overall conversion rates", body = ApiResponse<ConversionRates>),
        (status = 400, description = "Malformed owner_id", body = crate::errors::ErrorResponse),
        (status = 500, description = "Opportunity store unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Forecasting"
)]
pub async fn get_conversion_rates(
    State(state): State<AppState>,
    Params(query): Params<OwnerQuery>,
) -> Result<Json<ApiResponse<ConversionRates>>, ServiceError> {
    let rates = state.forecasting.conversion_rates(query.owner_id).await?;
    Ok(Json(ApiResponse::success(rates)))
}
