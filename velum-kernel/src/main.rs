/**
 * VELUM KERNEL - Point d'entrée du plan de contrôle de la flotte VPN
 *
 * RÔLE : Orchestration des modules : config, polling agents, agrégation,
 * sélection, API REST. Bootstrap complet avec gestion d'erreurs et logging.
 *
 * ARCHITECTURE : Polling HTTP concurrent des agents edge + cache TTL +
 * API REST pour la couche web. Catalogue invalide = arrêt immédiat.
 */

use velum_kernel::aggregator::Aggregator;
use velum_kernel::health::HealthTracker;
use velum_kernel::http::AppState;
use velum_kernel::models::ServerStatus;
use velum_kernel::poller::AgentPoller;
use velum_kernel::{config, http};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt().init();

    let service_cfg = config::load_service_config().await;

    // catalogue + registre : tout ou rien, jamais d'état partiel
    let store = match config::ConfigStore::load(&service_cfg).await {
        Ok(store) => {
            info!(
                "chargé {} serveurs catalogue / {} agents registre",
                store.catalog.servers.len(),
                store.registry.agents.len()
            );
            Arc::new(store)
        }
        Err(e) => {
            error!("configuration invalide: {e}");
            std::process::exit(1);
        }
    };

    let health_tracker = HealthTracker::new();

    let poller = match AgentPoller::new(Duration::from_millis(service_cfg.poll_timeout_ms)) {
        Ok(poller) => poller,
        Err(e) => {
            error!("client HTTP impossible à construire: {e}");
            std::process::exit(1);
        }
    };

    let aggregator = Arc::new(Aggregator::new(
        store.clone(),
        poller,
        Duration::from_secs(service_cfg.cache_ttl_secs),
        health_tracker.clone(),
    ));

    // cycle initial : log de l'état de la flotte et cache chaud au démarrage
    let views = aggregator.servers_with_metrics(true).await;
    let up = views
        .iter()
        .filter(|v| v.public_load.status == ServerStatus::Up)
        .count();
    info!("flotte initiale: {} up sur {} serveurs", up, views.len());

    let app_state = AppState {
        aggregator,
        store,
        health_tracker,
    };

    let app = http::build_router(app_state);

    let addr: SocketAddr = service_cfg.listen.parse().unwrap_or_else(|_| {
        error!("adresse d'écoute invalide: {}", service_cfg.listen);
        SocketAddr::from(([0, 0, 0, 0], 8080))
    });
    info!("listening on http://{addr}");
    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
