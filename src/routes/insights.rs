use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::db::current_month;
use crate::insights::{is_valid_month_key, InsightsAggregator};

use super::{auth::AuthService, utils::validate_auth_token};

type InsightsState = (Arc<AuthService>, Arc<InsightsAggregator>);

async fn month_insights(
    headers: HeaderMap,
    State((service, aggregator)): State<InsightsState>,
    Path(month): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    let user_id = match validate_auth_token(headers, &service) {
        Ok(val) => val,
        Err(err) => {
            return Err((err, "Invalid token"));
        }
    };

    if !is_valid_month_key(&month) {
        return Err((StatusCode::BAD_REQUEST, "Invalid month key, expected YYYY-MM"));
    }

    match aggregator.monthly_insights(user_id, &month).await {
        Ok(insights) => Ok((StatusCode::OK, Json(insights))),
        Err(err) => {
            tracing::error!("failed to compute insights: {err}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to compute insights"))
        }
    }
}

// No month in the path means the current month.
async fn current_month_insights(
    headers: HeaderMap,
    State(state): State<InsightsState>,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    month_insights(headers, State(state), Path(current_month())).await
}

pub fn insights_routes(service: Arc<AuthService>, aggregator: Arc<InsightsAggregator>) -> Router {
    Router::new()
        .route("/insights", get(current_month_insights))
        .route("/insights/:month", get(month_insights))
        .with_state((service, aggregator))
}
