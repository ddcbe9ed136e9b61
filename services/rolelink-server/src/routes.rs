//! HTTP routes.

use crate::commands::CommandHandler;
use crate::interactions::{Interaction, InteractionResponse, InteractionRouter};
use crate::pages;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use rolelink_oauth2::{CallbackParams, LinkFlow};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<LinkFlow>,
    pub scopes: Arc<Vec<String>>,
    pub interactions: Arc<dyn InteractionRouter>,
    pub commands: Arc<CommandHandler>,
}

impl AppState {
    pub fn new(
        flow: Arc<LinkFlow>,
        scopes: Vec<String>,
        interactions: Arc<dyn InteractionRouter>,
    ) -> Self {
        let commands = Arc::new(CommandHandler::new(flow.clone(), scopes.clone()));
        Self {
            flow,
            scopes: Arc::new(scopes),
            interactions,
            commands,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let oauth_url = get(oauth_url_handler)
        .fallback(method_not_allowed)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers(Any),
        );

    Router::new()
        .route("/", get(index_handler))
        .route("/api/get-oauth-url", oauth_url)
        .route("/discord-oauth-callback", get(callback_handler))
        .route("/interactions", post(interactions_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_handler(State(state): State<AppState>) -> Response {
    match state.flow.authorization_url(state.scopes.as_slice()).await {
        Ok(request) => Html(pages::landing_page(&request.url)).into_response(),
        Err(e) => {
            error!(kind = %e.kind(), "Failed to render landing page: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

async fn oauth_url_handler(State(state): State<AppState>) -> Response {
    match state.flow.authorization_url(state.scopes.as_slice()).await {
        Ok(request) => Json(request).into_response(),
        Err(e) => {
            error!(kind = %e.kind(), "Failed to generate OAuth URL: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to generate OAuth URL" })),
            )
                .into_response()
        }
    }
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
        .into_response()
}

/// Failures are logged by the flow itself.
async fn callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    match state.flow.complete(params).await {
        Ok(outcome) => Html(pages::success_page(&outcome.identity)).into_response(),
        Err(e) => {
            let (status, page) = pages::error_page(&e);
            (status, Html(page)).into_response()
        }
    }
}

async fn interactions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let interaction = match state.interactions.verify_and_route(&headers, &body) {
        Ok(interaction) => interaction,
        Err(e) => {
            warn!("Rejected interaction: {}", e);
            return (e.status(), e.to_string()).into_response();
        }
    };

    let command = match interaction {
        Interaction::Ping => return Json(InteractionResponse::pong()).into_response(),
        Interaction::Command(command) => command,
    };

    let message = match state.commands.dispatch(&command).await {
        Ok(message) => message,
        Err(e) => {
            warn!(command = %command.name, "Command failed: {}", e);
            e.to_user_message()
        }
    };

    Json(InteractionResponse::message(message.content, message.ephemeral)).into_response()
}
