use crate::config::ConfigStore;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Serialize)]
pub struct KernelHealth {
    pub uptime_seconds: u64,
    pub servers_tracked: u32,
    pub agents_configured: u32,
    pub poll_cycles: u64,
    pub last_cycle_up: u32,
    pub last_cycle_down: u32,
    pub last_cycle_at: Option<String>,
    pub memory_usage_mb: f32,
}

#[derive(Debug, Default, Clone)]
pub struct CycleStats {
    pub cycles: u64,
    pub last_up: u32,
    pub last_down: u32,
    pub last_at: Option<String>,
}

/// Suivi de santé du kernel : uptime, compteurs de cycles de polling,
/// estimation mémoire. Cloné librement, tout l'état est partagé.
#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    cycles: Arc<Mutex<CycleStats>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: Arc::new(Mutex::new(CycleStats::default())),
        }
    }

    /// Appelé par l'agrégateur après chaque vrai cycle de polling
    /// (jamais sur un hit cache).
    pub fn record_cycle(&self, up: u32, down: u32) {
        let now = OffsetDateTime::now_utc().format(&Rfc3339).ok();
        let mut stats = self.cycles.lock();
        stats.cycles += 1;
        stats.last_up = up;
        stats.last_down = down;
        stats.last_at = now;
    }

    pub fn get_health(&self, store: &ConfigStore) -> KernelHealth {
        let stats = self.cycles.lock().clone();
        KernelHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            servers_tracked: store.catalog.servers.len() as u32,
            agents_configured: store.registry.agents.len() as u32,
            poll_cycles: stats.cycles,
            last_cycle_up: stats.last_up,
            last_cycle_down: stats.last_down,
            last_cycle_at: stats.last_at,
            memory_usage_mb: get_memory_usage_mb(),
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn get_memory_usage_mb() -> f32 {
    // Approximation simple via /proc, suffisant pour le dashboard
    #[cfg(target_os = "linux")]
    {
        let pid = std::process::id();
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) {
            for line in status.lines() {
                if let Some(rest) = line.strip_prefix("VmRSS:") {
                    if let Some(kb) = rest
                        .split_whitespace()
                        .next()
                        .and_then(|s| s.parse::<u64>().ok())
                    {
                        return (kb as f32) / 1024.0;
                    }
                }
            }
        }
    }

    0.0
}
