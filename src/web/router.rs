//! Web surface router
//!
//! Exposes the login flow, session status and console-open operations on
//! the local HTTP interface. The callback handler strips the query
//! parameters by redirecting to `/` as soon as they are dispatched, so a
//! page refresh never replays an authorization code.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use http::StatusCode;

use crate::auth::FlowOrchestrator;
use crate::auth::retry::{self, BackoffPolicy};
use crate::auth::types::CallbackParams;
use crate::aws::history::RoleHistoryItem;
use crate::aws::{FederationError, FederationService};
use crate::error::AuthError;

use super::templates;
use super::types::*;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<FlowOrchestrator>,
    pub federation: Arc<FederationService>,
    pub refresh_policy: BackoffPolicy,
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_index))
        .route("/auth/login", get(handle_login))
        .route("/auth/callback", get(handle_callback))
        .route("/auth/status", get(handle_status))
        .route("/auth/logout", post(handle_logout))
        .route("/auth/refresh", post(handle_refresh))
        .route("/console/open", post(handle_open_console))
        .route(
            "/console/history",
            get(handle_history).delete(handle_remove_history),
        )
        .route("/console/history/import", post(handle_import_history))
        .layer(cors_layer())
        .with_state(state)
}

/// Permissive CORS so a local SPA on another port can drive the flow
fn cors_layer() -> tower_http::cors::CorsLayer {
    use tower_http::cors::{Any, CorsLayer};

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

fn auth_error_status(error: &AuthError) -> StatusCode {
    match error {
        AuthError::Csrf
        | AuthError::VerifierNotFound
        | AuthError::Provider { .. }
        | AuthError::TokenExchange(_) => StatusCode::BAD_REQUEST,
        AuthError::InvalidState(_) => StatusCode::CONFLICT,
        AuthError::Discovery(_) | AuthError::Userinfo(_) => StatusCode::BAD_GATEWAY,
        AuthError::Configuration(_)
        | AuthError::Storage(_)
        | AuthError::Random(_)
        | AuthError::Navigation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn federation_error_status(error: &FederationError) -> StatusCode {
    match error {
        FederationError::InvalidDuration(_) | FederationError::InvalidRoleArn(_) => {
            StatusCode::BAD_REQUEST
        }
        FederationError::Sts { .. } => StatusCode::FORBIDDEN,
        FederationError::IncompleteCredentials
        | FederationError::MissingSigninToken
        | FederationError::Http(_) => StatusCode::BAD_GATEWAY,
        FederationError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn auth_error_response(error: AuthError) -> Response {
    let status = auth_error_status(&error);
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn federation_error_response(error: FederationError) -> Response {
    let status = federation_error_status(&error);
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// Handle landing page (GET /)
async fn handle_index() -> impl IntoResponse {
    Html(templates::INDEX_PAGE_HTML)
}

/// Handle login start (GET /auth/login): redirect to the provider
async fn handle_login(State(state): State<AppState>) -> Response {
    match state.orchestrator.authorization_url() {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => auth_error_response(e),
    }
}

/// Handle the authorization callback (GET /auth/callback)
async fn handle_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    match state.orchestrator.handle_page_load(&params).await {
        // Strip the query parameters right away: refresh must not replay
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Html(templates::render_error_page(&e.to_string())),
        )
            .into_response(),
    }
}

/// Handle session status (GET /auth/status)
async fn handle_status(State(state): State<AppState>) -> Response {
    let session = match state.orchestrator.session() {
        Ok(session) => session,
        Err(e) => return auth_error_response(e),
    };

    let response = StatusResponse {
        authenticated: session.is_some(),
        flow_state: state.orchestrator.flow_state().name().to_string(),
        user: session.as_ref().map(|s| s.user.clone()),
        expires_at: session.as_ref().map(|s| s.expires_at),
    };
    Json(response).into_response()
}

/// Handle logout (POST /auth/logout)
async fn handle_logout(
    State(state): State<AppState>,
    Json(request): Json<LogoutRequest>,
) -> Response {
    match state.orchestrator.logout(request.redirect_to_provider) {
        Ok(redirect_url) => Json(LogoutResponse {
            success: true,
            redirect_url,
        })
        .into_response(),
        Err(e) => auth_error_response(e),
    }
}

/// Handle identity refresh (POST /auth/refresh)
///
/// The only retried operation in the service, and only because the caller
/// opted in here; the policy is bounded by configuration.
async fn handle_refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    let result = retry::with_backoff(state.refresh_policy, || {
        state.orchestrator.refresh_user_info()
    })
    .await;

    match result {
        Ok(user) => Json(RefreshResponse {
            success: true,
            user: Some(user),
            error: None,
        }),
        Err(e) => Json(RefreshResponse {
            success: false,
            user: None,
            error: Some(e.to_string()),
        }),
    }
}

/// Handle console open (POST /console/open)
async fn handle_open_console(
    State(state): State<AppState>,
    Json(request): Json<OpenConsoleRequest>,
) -> Response {
    let session = match state.orchestrator.session() {
        Ok(Some(session)) => session,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "not authenticated".to_string(),
                }),
            )
                .into_response();
        }
        Err(e) => return auth_error_response(e),
    };

    let Some(id_token) = session.id_token else {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "session carries no identity token; sign in with an openid scope"
                    .to_string(),
            }),
        )
            .into_response();
    };

    match state
        .federation
        .assume_role_and_open_console(
            &request.role_arn,
            &session.user,
            &id_token,
            request.destination.as_deref(),
        )
        .await
    {
        Ok((console_session, console_url)) => Json(OpenConsoleResponse {
            console_url,
            session: console_session,
        })
        .into_response(),
        Err(e) => federation_error_response(e),
    }
}

/// Handle history listing (GET /console/history)
async fn handle_history(State(state): State<AppState>) -> Response {
    match state.federation.history().list() {
        Ok(items) => Json(items).into_response(),
        Err(e) => federation_error_response(e),
    }
}

/// Handle history removal (DELETE /console/history?arn=...)
async fn handle_remove_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    match state.federation.history().remove(&query.arn) {
        Ok(removed) => Json(RemoveHistoryResponse { removed }).into_response(),
        Err(e) => federation_error_response(e),
    }
}

/// Handle history import (POST /console/history/import)
async fn handle_import_history(
    State(state): State<AppState>,
    Json(items): Json<Vec<RoleHistoryItem>>,
) -> Response {
    match state.federation.history().import(items) {
        Ok(merged) => Json(ImportHistoryResponse { merged }).into_response(),
        Err(e) => federation_error_response(e),
    }
}
