//! Route handlers for the model catalog, client configs and sessions

use super::state::AppState;
use crate::auth::{hostname_from_headers, token_from_headers, AuthSession};
use crate::catalog;
use crate::llm::{ClientOverrides, CreateInstance};
use crate::types::{PreferenceOverrides, Provider};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    pub provider: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRequest {
    pub provider: String,
    /// Catalog key of the model
    pub model: String,
    #[serde(default)]
    pub preferences: Option<PreferenceOverrides>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub props: Option<ClientOverrides>,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Session for this request, hydrated from the `token` cookie
async fn session(state: &AppState, headers: &HeaderMap) -> AuthSession {
    let token = token_from_headers(headers).map(str::to_string);
    match &state.auth {
        Some(api) => AuthSession::hydrate(api.as_ref(), token.as_deref()).await,
        None => AuthSession::new(),
    }
}

pub async fn list_models(Query(query): Query<ModelsQuery>) -> Response {
    let models = match query.provider {
        Some(tag) => match tag.parse::<Provider>() {
            Ok(provider) => catalog::for_provider(provider),
            Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
        },
        None => catalog::all(),
    };
    (StatusCode::OK, Json(json!({ "models": models }))).into_response()
}

pub async fn create_instance(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<InstanceRequest>,
) -> Response {
    let provider: Provider = match payload.provider.parse() {
        Ok(provider) => provider,
        Err(e) => return error(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let Some(model) = catalog::find(&payload.model).filter(|m| m.provider == provider) else {
        return error(
            StatusCode::NOT_FOUND,
            format!("Model {} is not offered by {}", payload.model, provider),
        );
    };

    let logged_in = session(&state, &headers).await.is_logged_in();

    let request = CreateInstance {
        provider,
        model,
        preferences: payload.preferences,
        api_key: payload.api_key,
        logged_in,
        overrides: payload.props,
    };

    match state.models.create_instance(request) {
        Ok(model) => (StatusCode::OK, Json(json!(model.config()))).into_response(),
        Err(e) => error(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

pub async fn me(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = session(&state, &headers).await;
    (StatusCode::OK, Json(json!({ "user": session.user() }))).into_response()
}

pub async fn sign_in() -> Response {
    let mut session = AuthSession::new();
    (StatusCode::OK, Json(json!(session.open()))).into_response()
}

pub async fn logout(headers: HeaderMap) -> Response {
    let hostname = hostname_from_headers(&headers).unwrap_or("localhost");
    let cookie = AuthSession::new().logout(hostname);
    log::debug!("Clearing token cookie for {}", hostname);

    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "status": "logged out" })),
    )
        .into_response()
}
