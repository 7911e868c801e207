use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{sse::Event, IntoResponse, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::ledger::{HistoryFilter, LedgerStore};
use crate::db::models::TransactionKind;
use crate::engine::TransactionEngine;

use super::{auth::AuthService, utils::validate_auth_token};

type TxState = (Arc<AuthService>, Arc<TransactionEngine>, LedgerStore);

#[derive(Debug, Deserialize)]
pub struct SendMoneyRequest {
    pub recipient_phone: String,
    pub amount: Decimal,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

#[derive(Debug, Deserialize)]
pub struct PayBillRequest {
    pub bill_type: String,
    pub amount: Decimal,
}

async fn send_money(
    headers: HeaderMap,
    State((service, engine, _store)): State<TxState>,
    Json(req): Json<SendMoneyRequest>,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    let user_id = match validate_auth_token(headers, &service) {
        Ok(val) => val,
        Err(err) => {
            tracing::error!("invalid token on send: {err}");
            return Err((err, "Invalid token"));
        }
    };

    match engine
        .send_money(user_id, &req.recipient_phone, req.amount, req.latitude, req.longitude)
        .await
    {
        Ok(result) => Ok((StatusCode::OK, Json(result))),
        Err(err) => {
            tracing::error!("failed to transfer amount: {err}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to transfer amount"))
        }
    }
}

async fn pay_bill(
    headers: HeaderMap,
    State((service, engine, _store)): State<TxState>,
    Json(req): Json<PayBillRequest>,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    let user_id = match validate_auth_token(headers, &service) {
        Ok(val) => val,
        Err(err) => {
            return Err((err, "Invalid token"));
        }
    };

    match engine.pay_bill(user_id, &req.bill_type, req.amount).await {
        Ok(result) => Ok((StatusCode::OK, Json(result))),
        Err(err) => {
            tracing::error!("failed to pay bill: {err}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to pay bill"))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub from: Option<String>,
    pub to: Option<String>,
    pub kind: Option<String>,
    pub limit: Option<i64>,
}

impl HistoryParams {
    fn into_filter(self) -> Result<HistoryFilter, (StatusCode, &'static str)> {
        let kind = match self.kind.as_deref() {
            Some(raw) => Some(
                raw.parse::<TransactionKind>()
                    .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid transaction kind"))?,
            ),
            None => None,
        };
        Ok(HistoryFilter {
            from: self.from,
            to: self.to,
            kind,
            limit: self.limit,
        })
    }
}

// Stream the caller's transaction history newest-first, honouring the ledger
// store's filter contract (date range, kind, limit).
async fn history(
    headers: HeaderMap,
    State((service, _engine, store)): State<TxState>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    let user_id = match validate_auth_token(headers, &service) {
        Ok(val) => val,
        Err(err) => {
            return Err((err, "Invalid token"));
        }
    };

    let filter = params.into_filter()?;
    let records = match store.transactions_for_user(user_id, &filter).await {
        Ok(records) => records,
        Err(err) => {
            tracing::error!("failed to retrieve transactions: {err}");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to retrieve transactions"));
        }
    };

    let stream = futures::stream::iter(records).map(|record| Event::default().json_data(record));

    let sse = Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(std::time::Duration::from_secs(2))
            .text("keep-alive-text"),
    );

    Ok(sse)
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub limit: Option<i64>,
}

// Plain JSON list of the newest transactions, for dashboard views.
async fn recent(
    headers: HeaderMap,
    State((service, _engine, store)): State<TxState>,
    Query(params): Query<RecentParams>,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    let user_id = match validate_auth_token(headers, &service) {
        Ok(val) => val,
        Err(err) => {
            return Err((err, "Invalid token"));
        }
    };

    let filter = HistoryFilter::recent(params.limit.unwrap_or(10));
    match store.transactions_for_user(user_id, &filter).await {
        Ok(records) => Ok((StatusCode::OK, Json(records))),
        Err(err) => {
            tracing::error!("failed to retrieve transactions: {err}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to retrieve transactions"))
        }
    }
}

async fn bills(
    headers: HeaderMap,
    State((service, _engine, store)): State<TxState>,
) -> Result<impl IntoResponse, (StatusCode, &'static str)> {
    let user_id = match validate_auth_token(headers, &service) {
        Ok(val) => val,
        Err(err) => {
            return Err((err, "Invalid token"));
        }
    };

    match store.bills_for_user(user_id).await {
        Ok(bills) => Ok((StatusCode::OK, Json(bills))),
        Err(err) => {
            tracing::error!("failed to retrieve bills: {err}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to retrieve bills"))
        }
    }
}

pub fn tx_routes(
    service: Arc<AuthService>,
    engine: Arc<TransactionEngine>,
    store: LedgerStore,
) -> Router {
    Router::new()
        .route("/tx/send", post(send_money))
        .route("/tx/paybill", post(pay_bill))
        .route("/tx/history", get(history))
        .route("/tx/recent", get(recent))
        .route("/tx/bills", get(bills))
        .with_state((service, engine, store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_params_map_onto_ledger_filter() {
        let filter = HistoryParams {
            from: Some("2026-02-01".to_string()),
            to: Some("2026-02-28".to_string()),
            kind: Some("SENT".to_string()),
            limit: Some(20),
        }
        .into_filter()
        .unwrap();
        assert_eq!(filter.from.as_deref(), Some("2026-02-01"));
        assert_eq!(filter.kind, Some(TransactionKind::Sent));
        assert_eq!(filter.limit, Some(20));

        let bad = HistoryParams {
            kind: Some("REFUND".to_string()),
            ..HistoryParams::default()
        }
        .into_filter();
        assert!(bad.is_err());
    }
}
