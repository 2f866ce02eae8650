/*!
Stub d'agent edge pour tests sans flotte réelle

Monte un vrai serveur HTTP local exposant /metrics avec un comportement
scripté (lecture saine, lenteur, erreur HTTP, payload corrompu), un
compteur de hits et la capture du dernier header Authorization reçu.
*/

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Comportement scripté de l'endpoint /metrics.
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Répond 200 avec le document fourni.
    Reading(serde_json::Value),
    /// Attend avant de répondre (déclenche le timeout du poller si le
    /// délai dépasse sa deadline).
    Slow {
        delay: Duration,
        reading: serde_json::Value,
    },
    /// Répond avec le code HTTP donné, corps vide.
    Status(u16),
    /// Répond 200 avec un corps qui n'est pas du JSON.
    Garbage,
}

struct StubState {
    behavior: StubBehavior,
    hits: AtomicUsize,
    last_authorization: Mutex<Option<String>>,
}

/// Un agent stub en écoute sur un port éphémère de loopback.
/// Le serveur est tué quand le stub est droppé.
pub struct StubAgent {
    addr: SocketAddr,
    state: Arc<StubState>,
    handle: JoinHandle<()>,
}

impl StubAgent {
    pub async fn spawn(behavior: StubBehavior) -> anyhow::Result<Self> {
        env_logger::try_init().ok(); // logging pour tests, sans double init

        let state = Arc::new(StubState {
            behavior,
            hits: AtomicUsize::new(0),
            last_authorization: Mutex::new(None),
        });

        let app = Router::new()
            .route("/metrics", get(serve_metrics))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("stub agent server error: {e}");
            }
        });

        log::info!("stub agent listening on {addr}");
        Ok(Self { addr, state, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Nombre de requêtes /metrics reçues depuis le spawn.
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Dernier header Authorization reçu, pour vérifier le bearer token.
    pub fn last_authorization(&self) -> Option<String> {
        self.state.last_authorization.lock().unwrap().clone()
    }
}

impl Drop for StubAgent {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_metrics(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_authorization.lock().unwrap() = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    match &state.behavior {
        StubBehavior::Reading(doc) => Json(doc.clone()).into_response(),
        StubBehavior::Slow { delay, reading } => {
            tokio::time::sleep(*delay).await;
            Json(reading.clone()).into_response()
        }
        StubBehavior::Status(code) => StatusCode::from_u16(*code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        StubBehavior::Garbage => "definitely not json".into_response(),
    }
}
