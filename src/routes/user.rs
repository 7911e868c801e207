use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::ledger::LedgerStore;
use crate::db::models::SavingsGoal;

use super::{auth::AuthService, utils::validate_auth_token};

type UserState = (Arc<AuthService>, LedgerStore);

async fn get_profile(
    headers: HeaderMap,
    State((service, store)): State<UserState>,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    let user_id = match validate_auth_token(headers, &service) {
        Ok(val) => val,
        Err(err) => {
            tracing::error!("token validation failed: {:?}", err);
            return Err((err, "Invalid token"));
        }
    };

    match store.find_account_by_id(user_id).await {
        Ok(Some(account)) => Ok((StatusCode::OK, Json(account))),
        Ok(None) => {
            tracing::error!("account not found: {user_id}");
            Err((StatusCode::NOT_FOUND, "Account not found"))
        }
        Err(err) => {
            tracing::error!("failed to load account {user_id}: {err}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to load account"))
        }
    }
}

#[derive(Debug, Serialize)]
struct GoalResponse {
    #[serde(flatten)]
    goal: SavingsGoal,
    progress_percent: u8,
}

impl From<SavingsGoal> for GoalResponse {
    fn from(goal: SavingsGoal) -> Self {
        let progress_percent = goal.progress_percent();
        Self {
            goal,
            progress_percent,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    pub goal_name: String,
    pub target_amount: Decimal,
}

async fn create_goal(
    headers: HeaderMap,
    State((service, store)): State<UserState>,
    Json(req): Json<CreateGoalRequest>,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    let user_id = match validate_auth_token(headers, &service) {
        Ok(val) => val,
        Err(err) => {
            return Err((err, "Invalid token"));
        }
    };

    if req.goal_name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Goal name cannot be empty"));
    }
    if req.target_amount <= Decimal::ZERO {
        return Err((StatusCode::BAD_REQUEST, "Target amount must be greater than 0"));
    }

    match store.insert_goal(user_id, req.goal_name.trim(), req.target_amount).await {
        Ok(goal) => Ok((StatusCode::CREATED, Json(GoalResponse::from(goal)))),
        Err(err) => {
            tracing::error!("failed to create goal: {err}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to create goal"))
        }
    }
}

async fn list_goals(
    headers: HeaderMap,
    State((service, store)): State<UserState>,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    let user_id = match validate_auth_token(headers, &service) {
        Ok(val) => val,
        Err(err) => {
            return Err((err, "Invalid token"));
        }
    };

    match store.goals_for_user(user_id).await {
        Ok(goals) => {
            let goals: Vec<GoalResponse> = goals.into_iter().map(GoalResponse::from).collect();
            Ok((StatusCode::OK, Json(goals)))
        }
        Err(err) => {
            tracing::error!("failed to list goals: {err}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to list goals"))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateGoalRequest {
    pub current_amount: Decimal,
}

async fn update_goal(
    headers: HeaderMap,
    State((service, store)): State<UserState>,
    Path(goal_id): Path<i64>,
    Json(req): Json<UpdateGoalRequest>,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    let user_id = match validate_auth_token(headers, &service) {
        Ok(val) => val,
        Err(err) => {
            return Err((err, "Invalid token"));
        }
    };

    if req.current_amount < Decimal::ZERO {
        return Err((StatusCode::BAD_REQUEST, "Saved amount cannot be negative"));
    }

    match store.update_goal_amount(user_id, goal_id, req.current_amount).await {
        Ok(true) => Ok((StatusCode::OK, "Goal updated successfully")),
        Ok(false) => {
            tracing::warn!("goal {goal_id} not found for user {user_id}");
            Err((StatusCode::NOT_FOUND, "Goal not found"))
        }
        Err(err) => {
            tracing::error!("failed to update goal: {err}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to update goal"))
        }
    }
}

pub fn user_routes(service: Arc<AuthService>, store: LedgerStore) -> Router {
    Router::new()
        .route("/users/me", get(get_profile))
        .route("/goals", post(create_goal).get(list_goals))
        .route("/goals/:goal_id", put(update_goal))
        .with_state((service, store))
}
