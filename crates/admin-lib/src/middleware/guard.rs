//! Owner guard for protected routes.
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use tracing::{debug, warn};

use crate::auth::{route_decision, AuthSnapshot, RouteDecision};
use crate::AppState;

fn still_loading() -> Response {
    let body = serde_json::json!({
        "error": {
            "code": "GATE_001",
            "message": "Session check still in progress, retry shortly",
        }
    });
    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
}

/// Wait for the gate to settle, then render for owners and send everyone
/// else to the login path. A non-owner session is signed out on the way.
pub async fn require_owner(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let wait = Duration::from_secs(state.settings.server.gate_wait_secs);
    let snapshot: AuthSnapshot = match tokio::time::timeout(wait, state.gate.ready()).await {
        Ok(snapshot) => snapshot,
        Err(_) => {
            warn!(path = %request.uri().path(), "session gate did not settle in time");
            return still_loading();
        }
    };

    match route_decision(&snapshot, &state.settings.routes.login_path) {
        RouteDecision::Loading => still_loading(),
        RouteDecision::Redirect { location, revoke } => {
            if revoke {
                state.gate.revoke_if_not_owner().await;
            }
            debug!(path = %request.uri().path(), %location, revoke, "redirecting to login");
            Redirect::to(&location).into_response()
        }
        RouteDecision::Render(account) => {
            request.extensions_mut().insert(account);
            next.run(request).await
        }
    }
}
