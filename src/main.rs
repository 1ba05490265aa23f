// ABOUTME: Main entry point for the Fix It Wand backend
// ABOUTME: Wires config, storage, and service clients into the axum router

use std::sync::Arc;

use axum::{
    Json, Router, middleware,
    routing::{get, post, put},
};
use chrono::Utc;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

mod auth;
mod config;
mod email;
mod entities;
mod error;
mod generate;
mod identity;
mod locations;
mod migration;
mod pairing;
mod passphrase;
mod session;
mod storage;
mod types;
mod wands;
mod workorders;

#[cfg(test)]
mod storage_tests;

use config::AppConfig;
use email::Mailer;
use generate::OpenAiClient;
use locations::LocationDirectory;
use storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Arc<Storage>,
    pub mailer: Arc<Mailer>,
    pub openai: Arc<OpenAiClient>,
    pub locations: Arc<LocationDirectory>,
}

impl AppState {
    pub fn new(config: AppConfig, storage: Storage) -> Self {
        Self {
            mailer: Arc::new(Mailer::new(config.email_api_url.clone())),
            openai: Arc::new(OpenAiClient::new(config.openai_api_key.clone())),
            locations: Arc::new(LocationDirectory::new(config.locations_api_root.clone())),
            config: Arc::new(config),
            storage: Arc::new(storage),
        }
    }
}

/// Full API router. Split out from main so tests can mount it directly.
pub fn api_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(status))
        .route("/auth/magicSignIn", post(auth::magic_sign_in))
        .route("/auth/login", get(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/locations/sites", get(locations::get_sites))
        .route("/locations/sites/:site_id", get(locations::site_locations))
        .route("/locations/nearest", get(locations::nearest))
        .route("/locations/search", get(locations::search));

    let protected = Router::new()
        .route("/auth/me", get(auth::me).put(auth::update_me))
        .route(
            "/wands/associate",
            get(wands::begin_association).post(wands::confirm_association),
        )
        .route("/wands/:wand_id", get(wands::get_wand))
        .route("/workorders/generate", post(workorders::generate))
        .route(
            "/workorders",
            get(workorders::list).post(workorders::create),
        )
        .route("/workorders/:workorder_id/send", post(workorders::send))
        .route(
            "/workorders/:workorder_id/status",
            post(workorders::set_status),
        )
        .route(
            "/workorders/:workorder_id/complete",
            post(workorders::complete),
        )
        .route(
            "/workorders/:workorder_id",
            put(workorders::update).delete(workorders::delete),
        )
        .route("/transcribe", post(generate::transcribe))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity::authenticate,
        ));

    Router::new()
        .nest("/api", public.merge(protected))
        // axum's `nest` matches the inner "/" route at "/api" but not "/api/"
        .route("/api/", get(status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn status() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "time": Utc::now().to_rfc3339(),
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fixit_wand=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let storage = Storage::connect(&config.database_url).await?;
    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config, storage);

    let app = api_router(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
