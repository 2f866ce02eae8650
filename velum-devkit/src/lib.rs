/*!
# Velum DevKit - Stubs et Utilitaires pour Développement

Bibliothèque facilitant les tests du kernel Velum avec:
- Stubs d'agents edge HTTP (endpoint /metrics scriptable, compteur de hits)
- Builders de documents (catalogue public, registre privé, lectures agents)
- Comportements de panne simulés : lenteur, erreur HTTP, payload corrompu
*/

pub mod agent_stub;
pub mod fixtures;

pub use agent_stub::{StubAgent, StubBehavior};
pub use fixtures::AgentDocBuilder;
