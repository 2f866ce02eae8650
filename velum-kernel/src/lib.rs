//! Velum kernel - plan de contrôle de la flotte VPN WireGuard
//!
//! Le kernel agrège les métriques temps réel des agents edge (polling
//! HTTP concurrent), les fusionne avec le catalogue public sous un cache
//! TTL, et recommande un serveur par région pour chaque nouvel abonné.
//!
//! ## Modules
//!
//! - **config** : catalogue public, registre privé des agents, velum.yaml
//! - **poller** : un GET /metrics borné dans le temps par agent
//! - **aggregator** : fan-out concurrent + fusion + cache TTL
//! - **selector** : scoring et choix déterministe d'un serveur
//! - **http** : surface REST consommée par la couche web
//! - **health** : uptime et compteurs de cycles pour le monitoring

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod health;
pub mod http;
pub mod models;
pub mod poller;
pub mod selector;
