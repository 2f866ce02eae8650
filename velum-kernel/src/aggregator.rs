/**
 * AGGREGATOR - Fusion catalogue public + métriques temps réel des agents
 *
 * RÔLE : Fan-out concurrent d'un poll par agent configuré, fusion des
 * lectures avec le catalogue public, cache TTL du résultat complet.
 *
 * FONCTIONNEMENT :
 * - Appel non forcé + cache vivant = liste en cache, zéro poll réseau
 * - Cache expiré ou refresh forcé = un poll par agent, tous en parallèle
 * - Un agent lent ou injoignable ne retarde jamais le cycle au-delà de
 *   son propre timeout et ne fait jamais échouer l'ensemble
 * - Chaque serveur du catalogue produit exactement une vue par cycle :
 *   agent muet = vue "down" synthétique, jamais d'omission
 *
 * UTILITÉ : C'est l'unique source de vérité de la couche web pour l'état
 * de la flotte. Les pannes réseau sont absorbées ici et ne remontent
 * jamais comme erreurs aux appelants.
 */

use crate::cache::{Clock, SystemClock, TtlCache};
use crate::config::ConfigStore;
use crate::health::HealthTracker;
use crate::models::{AgentReading, MergedServerView, PublicLoad, ServerDescriptor, ServerStatus};
use crate::poller::MetricsProbe;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Clé unique sous laquelle la vue complète de la flotte est cachée.
pub const METRICS_CACHE_KEY: &str = "metrics:v1";

pub struct Aggregator<P: MetricsProbe> {
    store: Arc<ConfigStore>,
    probe: P,
    cache: TtlCache<Vec<MergedServerView>>,
    ttl: Duration,
    health: HealthTracker,
}

impl<P: MetricsProbe> Aggregator<P> {
    pub fn new(store: Arc<ConfigStore>, probe: P, ttl: Duration, health: HealthTracker) -> Self {
        Self::with_clock(store, probe, ttl, health, Arc::new(SystemClock))
    }

    /// Variante avec horloge injectée, pour tester la péremption du cache.
    pub fn with_clock(
        store: Arc<ConfigStore>,
        probe: P,
        ttl: Duration,
        health: HealthTracker,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            probe,
            cache: TtlCache::new(clock),
            ttl,
            health,
        }
    }

    /// Vue complète de la flotte, cachée pendant `ttl`. N'échoue jamais
    /// sur conditions réseau : au pire tous les serveurs sont "down".
    pub async fn servers_with_metrics(&self, force_refresh: bool) -> Vec<MergedServerView> {
        if !force_refresh {
            if let Some(cached) = self.cache.get(METRICS_CACHE_KEY) {
                debug!("cache hit, {} serveurs", cached.len());
                return cached;
            }
        }

        let readings = self.poll_all().await;

        let merged: Vec<MergedServerView> = self
            .store
            .catalog
            .servers
            .iter()
            .map(|server| merge_view(server, readings.get(&server.id)))
            .collect();

        let up = merged
            .iter()
            .filter(|v| v.public_load.status == ServerStatus::Up)
            .count() as u32;
        let down = merged.len() as u32 - up;
        self.health.record_cycle(up, down);
        info!("cycle terminé: {} up / {} down sur {} serveurs", up, down, merged.len());

        // Écriture inconditionnelle, même sur refresh forcé, pour que les
        // appels non forcés suivants en profitent. Dernier écrivain gagne.
        self.cache.set(METRICS_CACHE_KEY, merged.clone(), self.ttl);

        merged
    }

    /// Un poll par agent, tous lancés en parallèle et joints. Les échecs
    /// sont loggés puis absorbés : l'agent sera simplement absent des
    /// lectures et son serveur marqué down à la fusion.
    async fn poll_all(&self) -> HashMap<String, AgentReading> {
        let polls = self.store.registry.agents.iter().map(|agent| async move {
            match self.probe.poll(agent).await {
                Ok(reading) => Some((agent.id.clone(), reading)),
                Err(e) => {
                    warn!("poll agent {} échoué: {}", agent.id, e);
                    None
                }
            }
        });

        join_all(polls).await.into_iter().flatten().collect()
    }
}

/// Règle de fusion : lecture fraîche si l'agent a répondu, sinon la
/// baseline du catalogue avec statut forcé down et ping inconnu.
fn merge_view(server: &ServerDescriptor, reading: Option<&AgentReading>) -> MergedServerView {
    let public_load = match reading {
        Some(r) => PublicLoad {
            users: r.users,
            bandwidth_mbps: r.bandwidth.down_mbps + r.bandwidth.up_mbps,
            ping_ms: Some(r.ping_ms),
            status: r.status,
        },
        None => PublicLoad {
            status: ServerStatus::Down,
            ping_ms: None,
            ..server.public_load.clone()
        },
    };

    MergedServerView {
        id: server.id.clone(),
        label: server.label.clone(),
        country: server.country.clone(),
        region: server.region.clone(),
        capacity: server.capacity,
        features: server.features.clone(),
        public_load,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgentDescriptor, AgentRegistry, Bandwidth, PublicCatalog, WgStats};
    use crate::poller::PollError;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn descriptor(id: &str, region: &str, capacity: u32) -> ServerDescriptor {
        ServerDescriptor {
            id: id.into(),
            label: format!("Server {id}"),
            country: region.to_uppercase(),
            region: region.into(),
            capacity,
            features: vec!["wireguard".into()],
            public_load: PublicLoad {
                users: 7,
                bandwidth_mbps: 120.0,
                ping_ms: Some(40.0),
                status: ServerStatus::Up,
            },
        }
    }

    fn agent(id: &str) -> AgentDescriptor {
        AgentDescriptor {
            id: id.into(),
            ip: "127.0.0.1".into(),
            metrics_port: 9100,
            token: "test-token".into(),
            capacity: 100,
            wg_interface: "wg0".into(),
        }
    }

    fn reading(id: &str, users: u32) -> AgentReading {
        AgentReading {
            id: id.into(),
            ts: "2026-01-10T08:00:00Z".into(),
            status: ServerStatus::Up,
            ping_ms: 12.0,
            users,
            bandwidth: Bandwidth { down_mbps: 300.0, up_mbps: 100.0 },
            wg: WgStats { peers: users, rx_bytes: 1, tx_bytes: 1 },
        }
    }

    fn store(servers: Vec<ServerDescriptor>, agents: Vec<AgentDescriptor>) -> Arc<ConfigStore> {
        Arc::new(ConfigStore {
            catalog: PublicCatalog {
                version: 1,
                updated_at: "2026-01-10T00:00:00Z".into(),
                servers,
            },
            registry: AgentRegistry {
                version: 1,
                central_id: "central-test".into(),
                agents,
            },
        })
    }

    /// Sonde scriptée : une issue par agent, plus un compteur global
    /// d'appels pour vérifier la borne du cache.
    struct ScriptedProbe {
        outcomes: HashMap<String, Result<AgentReading, ()>>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(outcomes: Vec<(&str, Result<AgentReading, ()>)>) -> Self {
            Self {
                outcomes: outcomes
                    .into_iter()
                    .map(|(id, o)| (id.to_string(), o))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl MetricsProbe for ScriptedProbe {
        async fn poll(&self, agent: &AgentDescriptor) -> Result<AgentReading, PollError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcomes.get(&agent.id) {
                Some(Ok(r)) => Ok(r.clone()),
                _ => Err(PollError::Timeout(Duration::from_millis(1500))),
            }
        }
    }

    fn aggregator(
        store: Arc<ConfigStore>,
        probe: ScriptedProbe,
    ) -> Aggregator<ScriptedProbe> {
        Aggregator::new(store, probe, Duration::from_secs(30), HealthTracker::new())
    }

    #[tokio::test]
    async fn every_catalog_server_appears_despite_failures() {
        let store = store(
            vec![descriptor("jp-1", "jp", 100), descriptor("us-1", "us", 100)],
            vec![agent("jp-1"), agent("us-1")],
        );
        let probe = ScriptedProbe::new(vec![("jp-1", Ok(reading("jp-1", 10))), ("us-1", Err(()))]);
        let agg = aggregator(store, probe);

        let views = agg.servers_with_metrics(false).await;
        assert_eq!(views.len(), 2);

        let jp = &views[0];
        assert_eq!(jp.id, "jp-1");
        assert_eq!(jp.public_load.status, ServerStatus::Up);
        assert_eq!(jp.public_load.users, 10);
        assert_eq!(jp.public_load.ping_ms, Some(12.0));

        let us = &views[1];
        assert_eq!(us.id, "us-1");
        assert_eq!(us.public_load.status, ServerStatus::Down);
        assert_eq!(us.public_load.ping_ms, None);
        // les derniers chiffres connus du catalogue sont conservés
        assert_eq!(us.public_load.users, 7);
    }

    #[tokio::test]
    async fn server_without_configured_agent_is_down() {
        let store = store(vec![descriptor("eu-1", "eu", 50)], vec![]);
        let agg = aggregator(store, ScriptedProbe::new(vec![]));

        let views = agg.servers_with_metrics(false).await;
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].public_load.status, ServerStatus::Down);
        assert_eq!(views[0].public_load.ping_ms, None);
    }

    #[tokio::test]
    async fn agent_without_catalog_entry_is_ignored() {
        let store = store(vec![descriptor("jp-1", "jp", 100)], vec![agent("jp-1"), agent("ghost")]);
        let probe = ScriptedProbe::new(vec![
            ("jp-1", Ok(reading("jp-1", 3))),
            ("ghost", Ok(reading("ghost", 99))),
        ]);
        let agg = aggregator(store, probe);

        let views = agg.servers_with_metrics(false).await;
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].id, "jp-1");
    }

    #[tokio::test]
    async fn second_call_within_ttl_polls_nothing() {
        let store = store(
            vec![descriptor("jp-1", "jp", 100)],
            vec![agent("jp-1")],
        );
        let probe = ScriptedProbe::new(vec![("jp-1", Ok(reading("jp-1", 1)))]);
        let agg = aggregator(store, probe);

        agg.servers_with_metrics(false).await;
        agg.servers_with_metrics(false).await;
        assert_eq!(agg.probe.calls(), 1);
    }

    #[tokio::test]
    async fn forced_refresh_bypasses_live_cache() {
        let store = store(vec![descriptor("jp-1", "jp", 100)], vec![agent("jp-1")]);
        let probe = ScriptedProbe::new(vec![("jp-1", Ok(reading("jp-1", 1)))]);
        let agg = aggregator(store, probe);

        agg.servers_with_metrics(false).await;
        agg.servers_with_metrics(true).await;
        assert_eq!(agg.probe.calls(), 2);

        // le refresh forcé a réécrit le cache, le prochain appel est un hit
        agg.servers_with_metrics(false).await;
        assert_eq!(agg.probe.calls(), 2);
    }

    struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock()
        }
    }

    #[tokio::test]
    async fn expired_cache_triggers_a_new_cycle() {
        let clock = Arc::new(ManualClock {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        });
        let store = store(vec![descriptor("jp-1", "jp", 100)], vec![agent("jp-1")]);
        let probe = ScriptedProbe::new(vec![("jp-1", Ok(reading("jp-1", 1)))]);
        let agg = Aggregator::with_clock(
            store,
            probe,
            Duration::from_secs(30),
            HealthTracker::new(),
            clock.clone(),
        );

        agg.servers_with_metrics(false).await;
        *clock.offset.lock() += Duration::from_secs(31);
        agg.servers_with_metrics(false).await;
        assert_eq!(agg.probe.calls(), 2);
    }

    #[tokio::test]
    async fn self_reported_down_keeps_its_ping() {
        let mut r = reading("jp-1", 5);
        r.status = ServerStatus::Down;
        let store = store(vec![descriptor("jp-1", "jp", 100)], vec![agent("jp-1")]);
        let agg = aggregator(store, ScriptedProbe::new(vec![("jp-1", Ok(r))]));

        let views = agg.servers_with_metrics(false).await;
        // l'agent a répondu : son statut down est le sien, le ping est connu
        assert_eq!(views[0].public_load.status, ServerStatus::Down);
        assert_eq!(views[0].public_load.ping_ms, Some(12.0));
    }
}
