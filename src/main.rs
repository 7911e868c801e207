use std::process;
use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, validate_request::ValidateRequestHeaderLayer};
use tracing_subscriber::{fmt::{writer::BoxMakeWriter, Layer}, layer::SubscriberExt, EnvFilter, Registry};

use db::auth::AuthRepository;
use db::ledger::LedgerStore;
use engine::TransactionEngine;
use insights::InsightsAggregator;
use location::LastFixCache;
use notify::LogNotifier;
use routes::auth::AuthService;

mod db;
mod engine;
mod fraud;
mod insights;
mod location;
mod notify;
mod routes;

#[tokio::main]
async fn main() {

    // mandatory fields
    let db_url = dotenv::var("DATABASE_URL").unwrap_or("sqlite:banking_app.db".to_string());
    let jwt_secret = dotenv::var("JWT_SECRET").unwrap_or("your-jwt-secret".to_string());
    // optional fields
    let max_connection_pooling = dotenv::var("MAX_CONNECTION_POOLING").unwrap_or("5".to_string()).parse::<u32>().unwrap();
    let port = dotenv::var("PORT").unwrap_or("3000".to_string()).parse::<u16>().unwrap();
    let log_file = dotenv::var("LOG_FILE").unwrap_or("app.log".to_string());

    // add tracing layer
    let file_appender = tracing_appender::rolling::never(".", &log_file);
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, _guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = Layer::new().json().with_writer(BoxMakeWriter::new(move || file_writer.clone()));
    let stdout_layer = Layer::new().with_writer(BoxMakeWriter::new(move || stdout_writer.clone()));

    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(file_layer)
        .with(stdout_layer);

    tracing::subscriber::set_global_default(subscriber).expect("Unable to set global subscriber");

    let database_pool = match db::connect(&db_url, max_connection_pooling).await {
        Ok(pool) => {
            tracing::info!("Connected to database");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to database: {}", err);
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind(("0.0.0.0", port)).await {
        Ok(port) => {
            tracing::info!("Listening on port: {}", port.local_addr().unwrap().port());
            port
        }
        Err(err) => {
            tracing::error!("Failed to bind to port: {}", err);
            process::exit(1);
        }
    };

    let router = match process_begin(database_pool, jwt_secret).await {
        Ok(router) => {
            tracing::info!("Routes constructed successfully");
            router
        }
        Err(err) => {
            tracing::error!("Failed to construct routes: {}", err);
            process::exit(1);
        }
    };

    //start the http service
    let http_service = axum::serve(listener, router);
    if let Err(err) = http_service.await {
        tracing::error!("Failed to start server: {}", err);
        process::exit(1);
    }
}

async fn process_begin(db_pool: SqlitePool, jwt_secret: String) -> Result<Router, String> {
    let head_route = Router::new();

    let repo = AuthRepository::new(db_pool.clone());
    let service = Arc::new(AuthService::new(repo, jwt_secret));

    // usable out of the box on a fresh database
    service
        .seed_demo_account()
        .await
        .map_err(|err| format!("Failed to seed demo account: {err}"))?;

    let store = LedgerStore::new(db_pool.clone());
    let notifier = Arc::new(LogNotifier);
    let last_fix = Arc::new(LastFixCache::default());
    let engine = Arc::new(TransactionEngine::new(store.clone(), notifier, last_fix));
    let aggregator = Arc::new(InsightsAggregator::new(store.clone()));

    let auth_routes = routes::auth::auth_routes(service.clone());
    let user_routes = routes::user::user_routes(service.clone(), store.clone())
        .route_layer(ValidateRequestHeaderLayer::accept("application/json"));
    let transfer_routes = routes::tx::tx_routes(service.clone(), engine, store)
        .route_layer(ValidateRequestHeaderLayer::accept("application/json"))
        .route_layer(CompressionLayer::new().gzip(true));
    let insights_routes = routes::insights::insights_routes(service, aggregator)
        .route_layer(ValidateRequestHeaderLayer::accept("application/json"));

    let router = head_route
        .nest("/v1", auth_routes)
        .nest("/v1", user_routes)
        .nest("/v1", transfer_routes)
        .nest("/v1", insights_routes)
        .route_layer(RequestBodyLimitLayer::new(1024 * 1024 * 10));

    Ok(router)
}
