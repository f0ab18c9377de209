//! API Service - Serves dashboard documents and the built web UI
//!
//! Endpoints:
//! - GET /api/dashboard-data - Main dashboard document
//! - GET /api/phone-case-data - Phone-case dashboard document
//! - GET /api/health - Health check
//! - GET /* - Static UI files (index.html fallback)

use aggregator::{fetch_document, logging, DashboardDocument, DocumentStore, FetchError, StoreConfig};
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

// ============================================================================
// State
// ============================================================================

#[derive(Clone)]
struct AppState {
    store: Arc<dyn DocumentStore>,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

async fn dashboard_data_handler(State(state): State<Arc<AppState>>) -> Response {
    document_response(&state, DashboardDocument::Main).await
}

async fn phone_case_data_handler(State(state): State<Arc<AppState>>) -> Response {
    document_response(&state, DashboardDocument::PhoneCases).await
}

async fn document_response(state: &AppState, doc: DashboardDocument) -> Response {
    match fetch_document(state.store.as_ref(), doc).await {
        Ok(data) => Json(data).into_response(),
        Err(FetchError::NotFound(path)) => {
            debug!(%path, "dashboard document missing");
            error_response(StatusCode::NOT_FOUND, "Data not found")
        }
        Err(FetchError::Store(e)) => {
            error!(document = %doc, backend = state.store.backend_tag(), error = %e, "error fetching dashboard document");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

// ============================================================================
// Router
// ============================================================================

fn app(state: Arc<AppState>, static_dir: PathBuf) -> Router {
    // CORS for web frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let spa = ServeDir::new(&static_dir).not_found_service(ServeFile::new(static_dir.join("index.html")));

    Router::new()
        .route("/api/dashboard-data", get(dashboard_data_handler))
        .route("/api/phone-case-data", get(phone_case_data_handler))
        .route("/api/health", get(health_handler))
        .fallback_service(spa)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init(false);

    let bind = std::env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let static_dir = PathBuf::from(std::env::var("STATIC_DIR").unwrap_or_else(|_| "dist".to_string()));

    println!("=== Sales Dashboard API ===");
    println!("Opening document store...");

    let config = StoreConfig::from_env().context("Invalid document store configuration")?;
    let store = config.open().await.context("Failed to open document store")?;

    println!("Document store ready ({})", store.backend_tag());

    let state = Arc::new(AppState { store });
    let app = app(state, static_dir.clone());

    println!("API listening on http://{}", bind);
    println!("\nEndpoints:");
    println!("  GET /api/dashboard-data");
    println!("  GET /api/phone-case-data");
    println!("  GET /api/health");
    println!("  GET /*  (static files from {})", static_dir.display());

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    axum::serve(listener, app).await?;

    Ok(())
}
