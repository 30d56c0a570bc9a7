use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use crate::api::handlers;
use crate::api::session::Session;
use crate::config::{ConfigSources, Settings};
use crate::providers::{OpenAIProviderFactory, ProviderFactory};

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<RwLock<Session>>,
    pub providers: Arc<dyn ProviderFactory>,
    pub process_env: Arc<Settings>,
}

impl AppState {
    pub fn new(
        session: Session,
        providers: Arc<dyn ProviderFactory>,
        process_env: Settings,
    ) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            providers,
            process_env: Arc::new(process_env),
        }
    }

    /// OpenAI-backed state seeded from the process environment.
    pub fn from_env(session: Session) -> Self {
        Self::new(session, Arc::new(OpenAIProviderFactory), Settings::from_env())
    }

    /// Current configuration layers, with an optional per-request key.
    pub async fn sources(&self, direct_api_key: Option<String>) -> ConfigSources {
        self.session
            .read()
            .await
            .sources(direct_api_key, &self.process_env)
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health_check))
        .route(
            "/config",
            get(handlers::get_config)
                .post(handlers::save_settings)
                .delete(handlers::clear_config),
        )
        .route("/config/env", post(handlers::load_env))
        .route("/config/api-key", delete(handlers::clear_api_key))
        .route("/analyze", post(handlers::analyze))
        .route("/batch", post(handlers::run_batch))
        .route("/batch/results", get(handlers::batch_results))
        .route("/batch/export", get(handlers::export_batch))
        .route("/validate", post(handlers::validate))
        .route("/validate/export", get(handlers::export_validation))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    log::info!("Company analysis server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}
