use serde::{Deserialize, Serialize};

/// Statut d'un serveur tel que publié vers la couche web.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Up,
    Down,
}

/// Document catalogue public (servers.public.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCatalog {
    pub version: u32,
    pub updated_at: String,
    pub servers: Vec<ServerDescriptor>,
}

/// Un serveur du catalogue public. Immuable après chargement.
/// Le bloc public_load sert de baseline "dernier état connu" quand
/// l'agent ne répond pas.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerDescriptor {
    pub id: String,
    pub label: String,
    pub country: String,
    pub region: String,
    pub capacity: u32,
    pub features: Vec<String>,
    pub public_load: PublicLoad,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicLoad {
    pub users: u32,
    pub bandwidth_mbps: f64,
    pub ping_ms: Option<f64>,
    pub status: ServerStatus,
}

/// Document registre privé (servers.private.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRegistry {
    pub version: u32,
    pub central_id: String,
    pub agents: Vec<AgentDescriptor>,
}

/// Un agent edge : adresse réseau + token d'accès à son endpoint /metrics.
/// Le token peut être une indirection "env:NOM" résolue au chargement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    pub id: String,
    pub ip: String,
    pub metrics_port: u16,
    pub token: String,
    pub capacity: u32,
    pub wg_interface: String,
}

/// Lecture temps réel renvoyée par l'endpoint /metrics d'un agent.
/// Durée de vie : un cycle de polling, jamais persistée.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReading {
    pub id: String,
    pub ts: String,
    pub status: ServerStatus,
    pub ping_ms: f64,
    pub users: u32,
    pub bandwidth: Bandwidth,
    pub wg: WgStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bandwidth {
    pub down_mbps: f64,
    pub up_mbps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WgStats {
    pub peers: u32,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

impl AgentReading {
    /// Contrôle de cohérence au-delà du typage serde : une lecture
    /// hors bornes est traitée comme payload invalide par le poller.
    pub fn check(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("empty id".into());
        }
        if !self.ping_ms.is_finite() || self.ping_ms < 0.0 {
            return Err(format!("ping out of range: {}", self.ping_ms));
        }
        if !self.bandwidth.down_mbps.is_finite()
            || !self.bandwidth.up_mbps.is_finite()
            || self.bandwidth.down_mbps < 0.0
            || self.bandwidth.up_mbps < 0.0
        {
            return Err("bandwidth out of range".into());
        }
        Ok(())
    }
}

/// Descripteur statique + dernière lecture (ou lecture "down" synthétique)
/// pour un serveur. Un cycle d'agrégation en produit exactement un par
/// entrée du catalogue, même si l'agent est injoignable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedServerView {
    pub id: String,
    pub label: String,
    pub country: String,
    pub region: String,
    pub capacity: u32,
    pub features: Vec<String>,
    pub public_load: PublicLoad,
}
