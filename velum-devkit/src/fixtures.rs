/*!
Builders de documents pour les tests Velum

Produit des documents JSON conformes aux formats consommés par le kernel:
lectures d'agents, catalogue public, registre privé.
*/

use chrono::Utc;
use serde_json::{json, Value};

/// Constructeurs de documents prêts à sérialiser dans les tests.
pub struct AgentDocBuilder;

impl AgentDocBuilder {
    /// Lecture d'agent saine (statut up).
    pub fn reading_up(id: &str, users: u32, ping_ms: f64) -> Value {
        json!({
            "id": id,
            "ts": Utc::now().to_rfc3339(),
            "status": "up",
            "pingMs": ping_ms,
            "users": users,
            "bandwidth": { "downMbps": 300.0, "upMbps": 120.0 },
            "wg": { "peers": users, "rxBytes": 10_000_000u64, "txBytes": 4_000_000u64 }
        })
    }

    /// Lecture d'agent qui se déclare lui-même down (il répond quand même).
    pub fn reading_down(id: &str) -> Value {
        json!({
            "id": id,
            "ts": Utc::now().to_rfc3339(),
            "status": "down",
            "pingMs": 0.0,
            "users": 0,
            "bandwidth": { "downMbps": 0.0, "upMbps": 0.0 },
            "wg": { "peers": 0, "rxBytes": 0, "txBytes": 0 }
        })
    }

    /// Catalogue public complet. Entrées: (id, region, capacity).
    /// La baseline publicLoad démarre vide et down, comme un catalogue
    /// fraîchement déployé.
    pub fn catalog_doc(servers: &[(&str, &str, u32)]) -> Value {
        let servers: Vec<Value> = servers
            .iter()
            .map(|(id, region, capacity)| {
                json!({
                    "id": id,
                    "label": format!("Server {id}"),
                    "country": region.to_uppercase(),
                    "region": region,
                    "capacity": capacity,
                    "features": ["wireguard"],
                    "publicLoad": {
                        "users": 0,
                        "bandwidthMbps": 0.0,
                        "pingMs": null,
                        "status": "down"
                    }
                })
            })
            .collect();

        json!({
            "version": 1,
            "updatedAt": Utc::now().to_rfc3339(),
            "servers": servers
        })
    }

    /// Registre privé complet. Entrées: (id, metrics_port, token).
    /// Les agents stub écoutent toujours sur 127.0.0.1.
    pub fn registry_doc(agents: &[(&str, u16, &str)]) -> Value {
        let agents: Vec<Value> = agents
            .iter()
            .map(|(id, port, token)| {
                json!({
                    "id": id,
                    "ip": "127.0.0.1",
                    "metricsPort": port,
                    "token": token,
                    "capacity": 100,
                    "wgInterface": "wg0"
                })
            })
            .collect();

        json!({
            "version": 1,
            "centralId": "central-test",
            "agents": agents
        })
    }
}
