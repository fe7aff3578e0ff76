use axum::extract::State;
use axum::{http::Method, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

mod config;
mod database;
mod errors;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;

use config::{AppConfig, EmailConfig, MpesaConfig};
use database::connection::get_db_client;
use database::seed::seed_admin;
use services::email_service::EmailService;
use services::mpesa_service::MpesaService;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let db = get_db_client().await;

    if let Err(e) = seed_admin(&db).await {
        tracing::warn!("Admin seed failed: {}", e);
    }

    let config = AppConfig::from_env();
    let app_state = initialize_app_state(db, config.clone()).await;

    let addr = server_addr(&config);
    let app = build_router(app_state);
    start_server(app, addr).await;
}

async fn initialize_app_state(db: mongodb::Database, config: AppConfig) -> AppState {
    let mut app_state = AppState::new(db, config);

    match MpesaConfig::from_env() {
        Ok(mpesa_config) => match MpesaService::new(mpesa_config) {
            Ok(service) => {
                tracing::info!("M-Pesa service initialized");
                app_state = app_state.with_mpesa(Arc::new(service));
            }
            Err(e) => {
                tracing::error!("Failed to initialize M-Pesa service: {}", e);
                tracing::warn!("M-Pesa service will be disabled");
            }
        },
        Err(e) => {
            tracing::warn!("M-Pesa config not loaded ({}); STK push disabled", e);
        }
    }

    match EmailConfig::from_env() {
        Ok(email_config) => {
            tracing::info!("Email service initialized");
            app_state = app_state.with_email(Arc::new(EmailService::new(email_config)));
        }
        Err(e) => {
            tracing::warn!("Email config not loaded ({}); notifications disabled", e);
        }
    }

    app_state
}

fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .nest("/api", routes::public::routes())
        .nest("/api/mpesa", routes::mpesa::routes())
        .nest("/api/admin", routes::admin::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

fn server_addr(config: &AppConfig) -> SocketAddr {
    let host = config
        .host
        .parse()
        .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0]));
    SocketAddr::new(host, config.port)
}

async fn start_server(app: Router, addr: SocketAddr) {
    tracing::info!("Server starting on {}", addr);

    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Server error: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    }
}

async fn root_handler() -> Json<Value> {
    Json(json!({ "ok": true, "service": "FixIt Online Backend" }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    use mongodb::bson::doc;

    let db_status = match state.db.run_command(doc! { "ping": 1 }).await {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    Json(json!({
        "status": "healthy",
        "database": db_status,
        "mpesa": state.mpesa_service.is_some(),
        "email": state.email_service.is_some(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
