//! One-shot metrics poll against a single edge agent.
//!
//! A poll is a single GET on `http://{ip}:{port}/metrics` with the agent's
//! bearer token, under a hard deadline. No retries here: retry policy
//! belongs to the caller, and the aggregator deliberately performs none
//! within a cycle (any failure marks the server down for that cycle).

use crate::models::{AgentDescriptor, AgentReading};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("agent did not answer within {0:?}")]
    Timeout(Duration),
    #[error("agent answered HTTP {0}")]
    BadStatus(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

/// Seam entre l'agrégateur et le réseau. Les tests fournissent des sondes
/// scriptées avec compteur d'appels, le runtime fournit AgentPoller.
pub trait MetricsProbe: Send + Sync {
    fn poll(
        &self,
        agent: &AgentDescriptor,
    ) -> impl Future<Output = Result<AgentReading, PollError>> + Send;
}

pub struct AgentPoller {
    client: reqwest::Client,
    timeout: Duration,
}

impl AgentPoller {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }

    async fn poll_inner(&self, agent: &AgentDescriptor) -> Result<AgentReading, PollError> {
        let url = format!("http://{}:{}/metrics", agent.ip, agent.metrics_port);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&agent.token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PollError::Timeout(self.timeout)
                } else {
                    PollError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PollError::BadStatus(status.as_u16()));
        }

        let reading: AgentReading = response.json().await.map_err(|e| {
            if e.is_timeout() {
                PollError::Timeout(self.timeout)
            } else {
                PollError::InvalidPayload(e.to_string())
            }
        })?;

        reading.check().map_err(PollError::InvalidPayload)?;
        if reading.id != agent.id {
            return Err(PollError::InvalidPayload(format!(
                "reading reports id {} for agent {}",
                reading.id, agent.id
            )));
        }

        Ok(reading)
    }
}

impl MetricsProbe for AgentPoller {
    /// Deadline dure : timeout reqwest sur la requête, garde tokio autour
    /// de l'ensemble. L'appelant n'attend jamais au-delà de la borne.
    async fn poll(&self, agent: &AgentDescriptor) -> Result<AgentReading, PollError> {
        match tokio::time::timeout(self.timeout, self.poll_inner(agent)).await {
            Ok(result) => result,
            Err(_) => Err(PollError::Timeout(self.timeout)),
        }
    }
}
