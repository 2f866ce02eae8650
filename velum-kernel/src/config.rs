/**
 * CONFIG STORE - Chargement et validation de la configuration Velum
 *
 * RÔLE : Trois documents distincts :
 * - velum.yaml : réglages du service (listen, timeout polling, TTL cache, chemins)
 * - servers.public.json : catalogue public des serveurs (id, région, capacité, features)
 * - servers.private.json : registre privé des agents (ip, port metrics, token, interface wg)
 *
 * FONCTIONNEMENT : Validation de forme au chargement via serde + contrôles métier
 * (id vide, capacité nulle). Les tokens "env:NOM" sont résolus depuis l'environnement.
 * Catalogue ou registre invalide = erreur fatale au démarrage, jamais d'état partiel.
 */

use crate::models::{AgentDescriptor, AgentRegistry, PublicCatalog};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    Missing(String),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("schema violation in {path}: {detail}")]
    Schema { path: String, detail: String },
    #[error("unresolved secret: environment variable {0} not set")]
    UnresolvedSecret(String),
}

/// Réglages du service, chargés depuis velum.yaml (chemin surchargeable
/// via VELUM_KERNEL_CONFIG). Fichier absent = valeurs par défaut.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServiceConfig {
    pub listen: String,
    pub poll_timeout_ms: u64,
    pub cache_ttl_secs: u64,
    pub public_catalog: String,
    pub agent_registry: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".into(),
            poll_timeout_ms: 1500,
            cache_ttl_secs: 30,
            public_catalog: "configs/servers.public.json".into(),
            agent_registry: "configs/servers.private.json".into(),
        }
    }
}

pub async fn load_service_config() -> ServiceConfig {
    let path = std::env::var("VELUM_KERNEL_CONFIG").unwrap_or_else(|_| "velum.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return ServiceConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            warn!("config invalide dans {path}: {e}, usage config par défaut");
            ServiceConfig::default()
        })
    } else {
        warn!("pas de {path}, usage config par défaut");
        ServiceConfig::default()
    }
}

/// Catalogue + registre typés et immuables, chargés une fois au démarrage
/// et partagés via Arc pour toute la vie du process.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pub catalog: PublicCatalog,
    pub registry: AgentRegistry,
}

impl ConfigStore {
    pub async fn load(cfg: &ServiceConfig) -> Result<Self, ConfigError> {
        let catalog = load_public_catalog(&cfg.public_catalog).await?;
        let registry = load_agent_registry(&cfg.agent_registry).await?;
        Ok(Self { catalog, registry })
    }

    pub fn agent_for(&self, id: &str) -> Option<&AgentDescriptor> {
        self.registry.agents.iter().find(|a| a.id == id)
    }
}

pub async fn load_public_catalog(path: &str) -> Result<PublicCatalog, ConfigError> {
    let catalog: PublicCatalog = read_json(path).await?;
    for server in &catalog.servers {
        if server.id.trim().is_empty() {
            return Err(ConfigError::Schema {
                path: path.into(),
                detail: "server with empty id".into(),
            });
        }
        if server.capacity == 0 {
            return Err(ConfigError::Schema {
                path: path.into(),
                detail: format!("server {} has zero capacity", server.id),
            });
        }
    }
    Ok(catalog)
}

pub async fn load_agent_registry(path: &str) -> Result<AgentRegistry, ConfigError> {
    let mut registry: AgentRegistry = read_json(path).await?;
    for agent in &mut registry.agents {
        if agent.id.trim().is_empty() {
            return Err(ConfigError::Schema {
                path: path.into(),
                detail: "agent with empty id".into(),
            });
        }
        agent.token = resolve_secret(&agent.token)?;
    }
    Ok(registry)
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T, ConfigError> {
    if !Path::new(path).exists() {
        return Err(ConfigError::Missing(path.into()));
    }
    let content = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

/// Résout l'indirection "env:NOM" vers la valeur de l'environnement.
/// Toute autre forme est renvoyée telle quelle.
fn resolve_secret(value: &str) -> Result<String, ConfigError> {
    match value.strip_prefix("env:") {
        Some(name) => match std::env::var(name) {
            Ok(v) if !v.is_empty() => Ok(v),
            _ => Err(ConfigError::UnresolvedSecret(name.to_string())),
        },
        None => Ok(value.to_string()),
    }
}
