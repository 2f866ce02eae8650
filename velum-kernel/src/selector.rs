//! Capacity-aware server selection.
//!
//! Pure function over a list of merged views: filter by region and
//! liveness, score, pick one winner. Holds no state and never suspends,
//! safe to call concurrently. The result is a recommendation only; the
//! actual capacity reservation is the persistence layer's job.

use crate::models::{MergedServerView, ServerStatus};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("no servers available in this region")]
    NoneAvailable,
}

/// Deux scores à moins d'epsilon l'un de l'autre sont considérés
/// indistinguables et départagés par le nombre brut d'utilisateurs.
const SCORE_EPSILON: f64 = 0.01;

/// Bande passante de référence pour normaliser la pression réseau.
const BANDWIDTH_REF_MBPS: f64 = 1000.0;

/// Score dans [0,1], dominé par la marge de capacité restante.
/// Le ping connu compte comme un signal de bonne santé, pas sa valeur.
pub fn score(view: &MergedServerView) -> f64 {
    let capacity = view.capacity.max(1) as f64;
    let users_ratio = (view.public_load.users as f64 / capacity).clamp(0.0, 1.0);
    let bandwidth_pressure = (view.public_load.bandwidth_mbps / BANDWIDTH_REF_MBPS).clamp(0.0, 1.0);
    let ping_factor = if view.public_load.ping_ms.is_some() { 0.9 } else { 0.5 };

    0.5 * (1.0 - users_ratio) + 0.3 * (1.0 - bandwidth_pressure) + 0.2 * ping_factor
}

/// Choisit le meilleur serveur `up` de la région demandée (None = toutes
/// régions). Classement par score décroissant ; à epsilon près, le moins
/// chargé en utilisateurs gagne, et à égalité l'ordre catalogue décide.
pub fn choose_server<'a>(
    candidates: &'a [MergedServerView],
    region: Option<&str>,
) -> Result<&'a MergedServerView, SelectionError> {
    let mut winner: Option<(&MergedServerView, f64)> = None;

    for view in candidates {
        if view.public_load.status != ServerStatus::Up {
            continue;
        }
        if let Some(wanted) = region {
            if view.region != wanted {
                continue;
            }
        }

        let s = score(view);
        winner = Some(match winner {
            None => (view, s),
            Some((best, best_score)) => {
                if s > best_score + SCORE_EPSILON {
                    (view, s)
                } else if best_score > s + SCORE_EPSILON {
                    (best, best_score)
                } else if view.public_load.users < best.public_load.users {
                    // scores indistinguables : le moins chargé gagne
                    (view, s)
                } else {
                    (best, best_score)
                }
            }
        });
    }

    winner.map(|(view, _)| view).ok_or(SelectionError::NoneAvailable)
}
