// ============================
// crates/admin-lib/src/routes.rs
// ============================
//! HTTP API of the console.
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::{AccountCard, AuthSnapshot, GatePhase};
use crate::catalog::{ImageUpload, ProductDraft};
use crate::dashboard::{navigation, DashboardOverview};
use crate::error::AppError;
use crate::middleware::require_owner;
use crate::validation::ValidationError;
use crate::AppState;
use santorini_common::{Identity, ProductId, Role};

/// Build the router. Auth endpoints are public; everything else sits
/// behind the owner guard.
pub fn create_router(state: AppState) -> Router {
    // base64 inflates uploads by a third
    let body_limit = state.settings.catalog.max_image_bytes / 3 * 4 + 64 * 1024;

    let protected = Router::new()
        .route("/", get(overview))
        .route("/navigation", get(nav))
        .route("/products", get(list_products).post(create_product))
        .route("/products/{id}", get(edit_product).put(update_product))
        .route("/categories", get(list_categories))
        .route("/catalog/refresh", post(refresh_catalog))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_owner));

    Router::new()
        .route("/auth/login", get(login_page).post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/session", get(session))
        .merge(protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The gate as seen by a client
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub phase: GatePhase,
    pub loading: bool,
    pub user: Option<Identity>,
    pub role: Option<Role>,
    pub account: Option<AccountCard>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&AuthSnapshot> for SessionView {
    fn from(snapshot: &AuthSnapshot) -> Self {
        let phase = snapshot.phase();
        Self {
            phase,
            loading: snapshot.loading,
            user: snapshot.identity().cloned(),
            role: snapshot.profile.as_ref().map(|p| p.role),
            account: (phase == GatePhase::Granted).then(|| AccountCard::from_snapshot(snapshot)),
            expires_at: snapshot.session.as_ref().map(|s| s.expires_at),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Image attached to a product save, base64 encoded
#[derive(Debug, Deserialize)]
pub struct ImagePayload {
    pub file_name: String,
    pub content_type: String,
    pub data: String,
}

impl ImagePayload {
    fn decode(self) -> Result<ImageUpload, AppError> {
        let bytes = STANDARD
            .decode(self.data.trim())
            .map_err(|_| ValidationError::InvalidImage("image data is not valid base64".into()))?;
        Ok(ImageUpload { file_name: self.file_name, content_type: self.content_type, bytes })
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductPayload {
    #[serde(flatten)]
    pub draft: ProductDraft,
    #[serde(default)]
    pub image: Option<ImagePayload>,
}

#[derive(Debug, Serialize)]
struct ProductEditView {
    id: ProductId,
    form: ProductDraft,
}

#[derive(Debug, Serialize)]
struct OverviewView {
    account: AccountCard,
    overview: DashboardOverview,
}

/// Wait, bounded, for the gate to reach a state matching `settled`
async fn settle(state: &AppState, settled: impl Fn(&AuthSnapshot) -> bool) -> AuthSnapshot {
    let wait = Duration::from_secs(state.settings.server.gate_wait_secs);
    let mut rx = state.gate.subscribe();
    let snapshot = match tokio::time::timeout(wait, rx.wait_for(|s| settled(s))).await {
        Ok(Ok(snapshot)) => snapshot.clone(),
        _ => state.gate.snapshot(),
    };
    snapshot
}

async fn login_page(State(state): State<AppState>) -> Json<serde_json::Value> {
    let view = SessionView::from(&state.gate.snapshot());
    Json(serde_json::json!({
        "message": "POST {\"email\", \"password\"} to this path to sign in",
        "session": view,
    }))
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.login.login(&body.email, &body.password).await?;
    let user = session.user_id();
    let snapshot = settle(&state, |s| {
        !s.loading && s.identity().map(|i| i.id) == Some(user)
    })
    .await;
    Ok(Json(SessionView::from(&snapshot)))
}

async fn logout(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    state.gate.sign_out().await?;
    let snapshot = settle(&state, |s| s.session.is_none()).await;
    Ok(Json(SessionView::from(&snapshot)))
}

async fn session(State(state): State<AppState>) -> Json<SessionView> {
    Json(SessionView::from(&state.gate.snapshot()))
}

async fn overview(
    State(state): State<AppState>,
    Extension(account): Extension<AccountCard>,
) -> Result<Json<OverviewView>, AppError> {
    let products = state.catalog.products().await?;
    let categories = state.catalog.categories().await?;
    let overview = DashboardOverview::build(&products, &categories);
    Ok(Json(OverviewView { account, overview }))
}

async fn nav() -> impl IntoResponse {
    Json(navigation())
}

async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.catalog.products().await?))
}

async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.catalog.categories().await?))
}

async fn edit_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse, AppError> {
    let form = state.catalog.edit_form(id).await?;
    Ok(Json(ProductEditView { id, form }))
}

async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<ProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    let image = payload.image.map(ImagePayload::decode).transpose()?;
    let saved = state.catalog.save_product(None, &payload.draft, image).await?;
    info!(id = %saved.id, "product created via API");
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(payload): Json<ProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    let image = payload.image.map(ImagePayload::decode).transpose()?;
    let saved = state.catalog.save_product(Some(id), &payload.draft, image).await?;
    Ok(Json(saved))
}

async fn refresh_catalog(State(state): State<AppState>) -> StatusCode {
    state.catalog.refresh();
    StatusCode::NO_CONTENT
}
