// HTTP handlers for the conversion and analytics endpoints
//
// Thin layer over the engine: query parsing, role/scope validation,
// and the optional snapshot cache live here, never inside the engine.

use axum::extract::{Query, State};
use axum::response::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::analytics::models::{AnalyticsSnapshot, RollupTotals};
use crate::analytics::scope::ScopeSpec;
use crate::analytics::window::ReportingWindow;
use crate::conversion::{self, CementType};
use crate::error::ApiError;
use crate::AppState;

/// Query parameters for points-to-bags conversion
#[derive(Debug, Deserialize)]
pub struct PointsToBagsQuery {
    /// Transaction description carrying the cement-type tag
    pub description: Option<String>,
    /// Point amount; anything that is not an integer counts as 0
    pub amount: Option<String>,
}

/// Query parameters for bags-to-points conversion
#[derive(Debug, Deserialize)]
pub struct BagsToPointsQuery {
    /// Bag count; anything that is not a positive integer counts as 0
    pub bags: Option<String>,
    /// "OPC" or "PPC"
    pub cement_type: String,
}

/// Result of a points-to-bags conversion
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BagsResponse {
    #[schema(example = 20)]
    pub bags: i64,
}

/// Result of a bags-to-points conversion
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PointsResponse {
    #[schema(example = 100)]
    pub points: i64,
}

/// Handler for GET /api/convert/points-to-bags
/// Derives the bag equivalent of a point amount from its description
#[utoipa::path(
    get,
    path = "/api/convert/points-to-bags",
    params(
        ("description" = Option<String>, Query, description = "Transaction description with OPC/PPC tag"),
        ("amount" = Option<String>, Query, description = "Point amount")
    ),
    responses(
        (status = 200, description = "Derived bag count", body = BagsResponse)
    ),
    tag = "conversion"
)]
pub async fn points_to_bags(Query(params): Query<PointsToBagsQuery>) -> Json<BagsResponse> {
    let description = params.description.unwrap_or_default();
    // Malformed amounts are a defined state, not an error
    let amount = params
        .amount
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(0);

    Json(BagsResponse {
        bags: conversion::bags_from_transaction(&description, amount),
    })
}

/// Handler for GET /api/convert/bags-to-points
/// Converts a whole-bag count to points for a known cement type
#[utoipa::path(
    get,
    path = "/api/convert/bags-to-points",
    params(
        ("bags" = Option<String>, Query, description = "Bag count"),
        ("cement_type" = String, Query, description = "OPC or PPC")
    ),
    responses(
        (status = 200, description = "Point value", body = PointsResponse),
        (status = 400, description = "Unknown cement type")
    ),
    tag = "conversion"
)]
pub async fn bags_to_points(
    Query(params): Query<BagsToPointsQuery>,
) -> Result<Json<PointsResponse>, ApiError> {
    let cement_type = match params.cement_type.as_str() {
        "OPC" => CementType::Opc,
        "PPC" => CementType::Ppc,
        other => {
            return Err(ApiError::BadRequest {
                message: format!("cement_type must be OPC or PPC, got '{}'", other),
            })
        }
    };

    let points =
        conversion::points_from_bag_input(params.bags.as_deref().unwrap_or(""), cement_type);
    Ok(Json(PointsResponse { points }))
}

/// Request body for an arbitrary id-set roll-up
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RollupRequest {
    /// Transaction-contributing user ids
    #[schema(example = json!([4, 7, 9]))]
    pub user_ids: Vec<i32>,
    /// Window name: current_month, quarterly, half_yearly, yearly,
    /// lifetime or custom
    #[schema(example = "quarterly")]
    pub window: String,
    /// Custom window start (required when window = custom)
    pub start: Option<NaiveDate>,
    /// Custom window end (required when window = custom)
    pub end: Option<NaiveDate>,
}

/// Handler for POST /api/analytics/rollup
/// Settled bag/point totals for an arbitrary id set and window
#[utoipa::path(
    post,
    path = "/api/analytics/rollup",
    request_body = RollupRequest,
    responses(
        (status = 200, description = "Settled totals", body = RollupTotals),
        (status = 400, description = "Unknown window or invalid custom range"),
        (status = 500, description = "A required sub-query failed"),
        (status = 504, description = "A sub-query exceeded its time budget")
    ),
    tag = "analytics"
)]
pub async fn compute_rollup(
    State(state): State<AppState>,
    Json(payload): Json<RollupRequest>,
) -> Result<Json<RollupTotals>, ApiError> {
    payload.validate()?;

    let window = ReportingWindow::parse(&payload.window, payload.start, payload.end)
        .map_err(|message| ApiError::BadRequest { message })?;

    tracing::debug!(
        "Computing {} rollup over {} user ids",
        window.label(),
        payload.user_ids.len()
    );

    let totals = state
        .engine
        .compute_rollup(&payload.user_ids, window, Utc::now())
        .await?;
    Ok(Json(totals))
}

/// Query parameters for the analytics snapshot endpoint
#[derive(Debug, Deserialize, Validate)]
pub struct AnalyticsQuery {
    /// Actor role: "admin" or "dealer"
    pub role: String,
    /// "global" for admin; "my_sales" or "network" for dealers
    pub scope: Option<String>,
    /// Window name, defaults to current_month
    pub window: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Required for dealer-scoped queries
    #[validate(range(min = 1))]
    pub dealer_id: Option<i32>,
}

impl AnalyticsQuery {
    /// Map the (role, scope, dealer_id) triple to the single tagged
    /// scope the engine operates on, rejecting inconsistent
    /// combinations
    fn scope_spec(&self) -> Result<ScopeSpec, ApiError> {
        match self.role.as_str() {
            "admin" => match self.scope.as_deref() {
                None | Some("global") => Ok(ScopeSpec::Global),
                Some(other) => Err(ApiError::BadRequest {
                    message: format!("admin scope must be global, got '{}'", other),
                }),
            },
            "dealer" => {
                let dealer_id = self.dealer_id.ok_or_else(|| ApiError::BadRequest {
                    message: "dealer queries require dealer_id".to_string(),
                })?;
                match self.scope.as_deref() {
                    None | Some("my_sales") => Ok(ScopeSpec::DealerOwn { dealer_id }),
                    Some("network") => Ok(ScopeSpec::DealerNetwork { dealer_id }),
                    Some(other) => Err(ApiError::BadRequest {
                        message: format!(
                            "dealer scope must be my_sales or network, got '{}'",
                            other
                        ),
                    }),
                }
            }
            other => Err(ApiError::BadRequest {
                message: format!("role must be admin or dealer, got '{}'", other),
            }),
        }
    }
}

/// Handler for GET /api/analytics
/// Cross-sectional analytics snapshot for a role scope and window
#[utoipa::path(
    get,
    path = "/api/analytics",
    params(
        ("role" = String, Query, description = "admin or dealer"),
        ("scope" = Option<String>, Query, description = "global, my_sales or network"),
        ("window" = Option<String>, Query, description = "Reporting window name"),
        ("start" = Option<String>, Query, description = "Custom window start (YYYY-MM-DD)"),
        ("end" = Option<String>, Query, description = "Custom window end (YYYY-MM-DD)"),
        ("dealer_id" = Option<i32>, Query, description = "Dealer id for dealer-scoped queries")
    ),
    responses(
        (status = 200, description = "Analytics snapshot", body = AnalyticsSnapshot),
        (status = 400, description = "Invalid role/scope/window combination"),
        (status = 500, description = "A required sub-query failed"),
        (status = 504, description = "A sub-query exceeded its time budget")
    ),
    tag = "analytics"
)]
pub async fn compute_analytics(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsQuery>,
) -> Result<Json<AnalyticsSnapshot>, ApiError> {
    params.validate()?;

    let scope = params.scope_spec()?;
    let window =
        ReportingWindow::parse(params.window.as_deref().unwrap_or("current_month"), params.start, params.end)
            .map_err(|message| ApiError::BadRequest { message })?;

    // Snapshots are cacheable by the caller side of the engine only;
    // a failed computation is never cached
    let cache_key = format!("{:?}|{:?}", scope, window);
    if let Some(snapshot) = state.snapshot_cache.get(&cache_key).await {
        tracing::debug!("Serving cached snapshot for {}", cache_key);
        return Ok(Json(snapshot));
    }

    let snapshot = state.engine.compute_analytics(scope, window, Utc::now()).await?;
    state.snapshot_cache.insert(cache_key, snapshot.clone()).await;

    Ok(Json(snapshot))
}
