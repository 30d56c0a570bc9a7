use axum::{
    extract::State,
    http::header,
    response::{Html, IntoResponse},
    Json,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::analysis::{AnalysisClient, AnalysisResult};
use crate::api::error::ApiError;
use crate::api::page;
use crate::api::server::AppState;
use crate::batch::{parse_batch_input, BatchReport, BatchRunner};
use crate::config::{self, mask_secret, EffectiveConfig, Settings};
use crate::error::{json_type_name, MalformedInputError};
use crate::export::{results_file_name, results_to_json, timestamped_file_name, VALIDATION_PREFIX};
use crate::prompt::PromptTemplate;
use crate::validation::{
    run_validation, ValidationInputs, ValidationReport, DEFAULT_VALIDATION_TEMPLATE,
};

/// Resolves configuration and builds a client. Fails before any network
/// call when no key is available.
async fn client_for(
    state: &AppState,
    direct_api_key: Option<String>,
) -> Result<AnalysisClient, ApiError> {
    let config = state.sources(direct_api_key).await.resolve()?;
    let provider = state.providers.create(&config)?;
    Ok(AnalysisClient::new(provider, config))
}

fn bad_request(message: &str) -> ApiError {
    ApiError::BadRequest(message.to_string())
}

fn not_found(message: &str) -> ApiError {
    ApiError::NotFound(message.to_string())
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    let model = state
        .sources(None)
        .await
        .resolve()
        .map(|c| c.model)
        .unwrap_or_else(|_| config::DEFAULT_MODEL.to_string());
    Html(page::render_index(&model))
}

pub async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Serialize)]
pub struct ConfigStatus {
    pub api_key_configured: bool,
    pub api_key_preview: Option<String>,
    pub effective: Option<EffectiveConfig>,
    pub error: Option<String>,
    pub settings: BTreeMap<String, String>,
    pub env_block: BTreeMap<String, String>,
    pub total_variables: usize,
}

async fn config_status(state: &AppState) -> ConfigStatus {
    let session = state.session.read().await;
    let sources = session.sources(None, &state.process_env);
    let api_key_preview = sources.resolve_api_key().map(mask_secret);
    let (effective, error) = match sources.resolve() {
        Ok(config) => (Some(config), None),
        Err(e) => (None, Some(e.to_string())),
    };

    ConfigStatus {
        api_key_configured: api_key_preview.is_some(),
        api_key_preview,
        effective,
        error,
        settings: session.settings.masked(),
        env_block: session.env_block.masked(),
        total_variables: session.settings.len() + session.env_block.len(),
    }
}

pub async fn get_config(State(state): State<AppState>) -> Json<ConfigStatus> {
    Json(config_status(&state).await)
}

#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

/// Saves the settings form. A blank key keeps whatever key is stored.
///
/// Only the submitted fields are checked, so a bad value in another layer
/// never blocks a save.
pub async fn save_settings(
    State(state): State<AppState>,
    Json(form): Json<SettingsForm>,
) -> Result<Json<ConfigStatus>, ApiError> {
    let max_tokens = form.max_tokens.map(|n| n.to_string());
    let temperature = form.temperature.map(|t| t.to_string());
    if let Some(raw) = &max_tokens {
        config::parse_max_tokens(raw)?;
    }
    if let Some(raw) = &temperature {
        config::parse_temperature(raw)?;
    }
    let api_key = form
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());

    {
        let mut session = state.session.write().await;
        if let Some(key) = api_key {
            session.settings.set(config::API_KEY, key);
            log::info!("Settings saved with new API key");
        }
        if let Some(model) = form.model {
            session.settings.set(config::MODEL, model);
        }
        if let Some(raw) = max_tokens {
            session.settings.set(config::MAX_TOKENS, raw);
        }
        if let Some(raw) = temperature {
            session.settings.set(config::TEMPERATURE, raw);
        }
    }

    Ok(Json(config_status(&state).await))
}

#[derive(Debug, Deserialize)]
pub struct EnvUpload {
    pub content: String,
}

#[derive(Serialize)]
pub struct EnvLoaded {
    pub loaded: usize,
    pub variables: BTreeMap<String, String>,
}

/// Replaces the session's `.env` layer. The block is rejected whole when
/// any known setting in it is invalid.
pub async fn load_env(
    State(state): State<AppState>,
    Json(upload): Json<EnvUpload>,
) -> Result<Json<EnvLoaded>, ApiError> {
    if upload.content.trim().is_empty() {
        return Err(bad_request("Please enter .env file content"));
    }

    let block = Settings::parse_env_content(&upload.content);
    if block.is_empty() {
        return Err(bad_request(
            "No valid environment variables found in the content",
        ));
    }
    block.validate()?;

    let mut session = state.session.write().await;
    let loaded = session.load_env_content(&upload.content);
    log::info!("Loaded {} variables from .env content", loaded);

    Ok(Json(EnvLoaded {
        loaded,
        variables: session.env_block.masked(),
    }))
}

pub async fn clear_config(State(state): State<AppState>) -> Json<ConfigStatus> {
    state.session.write().await.clear_config();
    Json(config_status(&state).await)
}

pub async fn clear_api_key(State(state): State<AppState>) -> Json<ConfigStatus> {
    state.session.write().await.clear_api_key();
    Json(config_status(&state).await)
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub company: String,
    pub prompt: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Serialize)]
pub struct AnalysisResponse {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub analysis: Option<Value>,
}

impl From<AnalysisResult> for AnalysisResponse {
    fn from(result: AnalysisResult) -> Self {
        Self {
            analysis: result.analysis(),
            result,
        }
    }
}

fn template_from(prompt: Option<String>) -> PromptTemplate {
    prompt
        .filter(|p| !p.trim().is_empty())
        .map(PromptTemplate::new)
        .unwrap_or_default()
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let company = request.company.trim().to_string();
    if company.is_empty() {
        return Err(bad_request("Please enter a company name"));
    }

    let client = client_for(&state, request.api_key).await?;
    let template = template_from(request.prompt);
    let result = client.analyze_company(&template, &company).await?;

    state.session.write().await.last_output = Some(result.clone());
    Ok(Json(result.into()))
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub companies: Value,
    pub prompt: Option<String>,
    pub api_key: Option<String>,
}

pub async fn run_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchReport>, ApiError> {
    let entries = match request.companies {
        Value::Array(items) => items,
        Value::String(raw) => parse_batch_input(&raw)?,
        other => {
            let err = MalformedInputError::NotAnArray(json_type_name(&other));
            return Err(err.into());
        }
    };

    let client = client_for(&state, request.api_key).await?;
    let template = template_from(request.prompt);
    let report = BatchRunner::new(&client, &template)
        .run_with_progress(&entries, |progress| {
            log::debug!("Batch progress {}/{}", progress.completed, progress.total);
        })
        .await;

    state.session.write().await.batch = Some(report.clone());
    Ok(Json(report))
}

pub async fn batch_results(State(state): State<AppState>) -> Result<Json<BatchReport>, ApiError> {
    state
        .session
        .read()
        .await
        .batch
        .clone()
        .map(Json)
        .ok_or_else(|| not_found("No batch results yet"))
}

fn attachment(file_name: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
}

pub async fn export_batch(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let session = state.session.read().await;
    let report = session
        .batch
        .as_ref()
        .ok_or_else(|| not_found("No batch results to download"))?;
    let body = results_to_json(&report.results)?;
    Ok(attachment(&results_file_name(), body))
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub input: Option<Value>,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
    pub prompt: Option<String>,
    pub api_key: Option<String>,
}

pub async fn validate(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> Result<Json<ValidationReport>, ApiError> {
    let client = client_for(&state, request.api_key).await?;

    let actual = match request.actual {
        Some(actual) => Some(actual),
        None => match &state.session.read().await.batch {
            Some(report) => Some(serde_json::to_value(report)?),
            None => None,
        },
    };
    let inputs = ValidationInputs {
        input: request.input,
        expected: request.expected,
        actual,
    };
    let template = request
        .prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_VALIDATION_TEMPLATE.to_string());

    let report = run_validation(&client, &template, &inputs).await?;
    state.session.write().await.validation = Some(report.clone());
    Ok(Json(report))
}

pub async fn export_validation(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.session.read().await;
    let report = session
        .validation
        .as_ref()
        .ok_or_else(|| not_found("No validation report to download"))?;
    let body = serde_json::to_string_pretty(report)?;
    let file_name = timestamped_file_name(VALIDATION_PREFIX, Local::now());
    Ok(attachment(&file_name, body))
}
