/**
 * API REST VELUM - Surface HTTP du kernel pour la couche web
 *
 * RÔLE :
 * Ce module expose l'état de la flotte et la sélection de serveur aux
 * consommateurs externes (frontend marketing, backend checkout, admin).
 *
 * FONCTIONNEMENT :
 * - Serveur Axum, routes : /health, /system/health, /servers, /servers/{id},
 *   /servers/refresh (POST), /servers/select
 * - Lecture publique : liste et détail des serveurs (données déjà publiées
 *   côté marketing, rien de sensible)
 * - Administration : refresh forcé et sélection exigent le header x-api-key
 *
 * SÉCURITÉ :
 * - Clé API via VELUM_API_KEY, validée en middleware avant tout traitement
 * - Les tokens agents ne transitent jamais par cette API
 */

use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::aggregator::Aggregator;
use crate::config::ConfigStore;
use crate::health::{HealthTracker, KernelHealth};
use crate::models::MergedServerView;
use crate::poller::AgentPoller;
use crate::selector::{choose_server, SelectionError};

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator<AgentPoller>>,
    pub store: Arc<ConfigStore>,
    pub health_tracker: HealthTracker,
}

async fn require_api_key(req: Request, next: Next) -> Result<Response, StatusCode> {
    let path = req.uri().path();

    // seules les opérations d'administration exigent la clé
    let admin = path.starts_with("/servers/refresh") || path.starts_with("/servers/select");
    if !admin {
        return Ok(next.run(req).await);
    }

    let expected = std::env::var("VELUM_API_KEY").unwrap_or_default();
    if expected.is_empty() {
        tracing::error!("SECURITY: VELUM_API_KEY not set - admin access denied");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

#[derive(Debug, Deserialize)]
struct SelectParams {
    region: Option<String>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/servers", get(get_servers))
        .route("/servers/{id}", get(get_server))
        .route("/servers/refresh", post(refresh_servers))
        .route("/servers/select", get(select_server))
        .with_state(app_state)
        .layer(middleware::from_fn(require_api_key))
}

// GET /servers (vue fusionnée, servie depuis le cache tant qu'il est vivant)
async fn get_servers(State(app): State<AppState>) -> Json<Vec<MergedServerView>> {
    Json(app.aggregator.servers_with_metrics(false).await)
}

// GET /servers/{id} (détail)
async fn get_server(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MergedServerView>, StatusCode> {
    let views = app.aggregator.servers_with_metrics(false).await;
    match views.into_iter().find(|v| v.id == id) {
        Some(view) => Ok(Json(view)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

// POST /servers/refresh (cycle de polling forcé, admin)
async fn refresh_servers(State(app): State<AppState>) -> Json<serde_json::Value> {
    let views = app.aggregator.servers_with_metrics(true).await;
    Json(serde_json::json!({ "ok": true, "servers": views, "msg": "metrics refreshed" }))
}

// GET /servers/select?region=jp (recommandation de serveur, admin)
async fn select_server(
    State(app): State<AppState>,
    Query(params): Query<SelectParams>,
) -> (StatusCode, Json<serde_json::Value>) {
    let views = app.aggregator.servers_with_metrics(false).await;

    match choose_server(&views, params.region.as_deref()) {
        Ok(server) => {
            // identifiant de corrélation : la réservation de capacité reste
            // la responsabilité de la couche persistance appelante
            let recommendation_id = Uuid::new_v4().to_string();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "ok": true,
                    "recommendationId": recommendation_id,
                    "server": server,
                })),
            )
        }
        Err(SelectionError::NoneAvailable) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "ok": false,
                "msg": "no servers available in this region",
            })),
        ),
    }
}

// GET /system/health (état du kernel)
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health_tracker.get_health(&app.store))
}
