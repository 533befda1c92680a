// [apps/master/src/core/registry.rs]
/*!
 * APARATO: AGENT REGISTRY
 * CLASIFICACIÓN: ORCHESTRATION CORE
 * RESPONSABILIDAD: CICLO DE VIDA DE IDENTIDAD DE LOS AGENTES REMOTOS
 *
 * Registro, latido y expiración. Un re-registro con el mismo
 * `(agent_id, token)` reemite credenciales sin duplicar la fila;
 * `(hostname, port)` ocupado por otra identidad es `RegistrationConflict`,
 * nunca un upsert silencioso.
 */

use crate::errors::MasterError;
use chrono::{Duration, Utc};
use neoscan_domain::{
    Agent, AgentRegistrationRequest, AgentRegistrationResponse, AgentStatus, HeartbeatRequest,
};
use neoscan_persistence::AgentRepository;
use std::time::Duration as StdDuration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const TOKEN_TTL_DAYS: i64 = 30;

pub struct AgentRegistry {
    agent_repository: AgentRepository,
}

impl AgentRegistry {
    #[must_use]
    pub fn new(agent_repository: AgentRepository) -> Self {
        Self { agent_repository }
    }

    /// Registra un Agente nuevo o reemite credenciales sobre uno ya conocido.
    #[instrument(skip(self, request))]
    pub async fn register(
        &self,
        request: AgentRegistrationRequest,
    ) -> Result<AgentRegistrationResponse, MasterError> {
        let now = Utc::now();
        let agent_id = request.agent_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let token = request.token.unwrap_or_else(|| Uuid::new_v4().to_string());
        let token_expiry = now + Duration::days(TOKEN_TTL_DAYS);

        let agent = Agent {
            agent_id: agent_id.clone(),
            hostname: request.hostname,
            port: request.port,
            ip_address: request.ip_address,
            os: request.os,
            arch: request.arch,
            version: request.version,
            status: AgentStatus::Online,
            token: token.clone(),
            token_expiry,
            last_heartbeat: now,
            capabilities: request.capabilities,
            tags: request.tags,
            task_support: request.task_support,
            created_at: now,
        };

        self.agent_repository.register(&agent).await?;
        info!(agent_id = %agent_id, "agent registered");

        Ok(AgentRegistrationResponse { agent_id, token, token_expiry })
    }

    #[instrument(skip(self, request))]
    pub async fn heartbeat(&self, request: HeartbeatRequest) -> Result<(), MasterError> {
        self.agent_repository
            .record_heartbeat(&request.agent_id, &request.metrics)
            .await?;
        Ok(())
    }

    /// Verifica el par credencial de un Agente contra el catálogo.
    #[instrument(skip(self, token))]
    pub async fn authenticate(&self, agent_id: &str, token: &str) -> Result<Agent, MasterError> {
        self.agent_repository
            .verify_token(agent_id, token)
            .await
            .map_err(|_| MasterError::Unauthorized)
    }

    /// Arranca el reaper de latido: cada tick, pasa a `offline` todo Agente
    /// sin latido dentro de la ventana configurada.
    pub fn spawn_reaper(agent_repository: AgentRepository, tick_interval: StdDuration, stale_after_seconds: i64) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(err) = agent_repository.mark_stale_agents_offline(stale_after_seconds).await {
                    warn!(error = %err, "agent reaper tick failed");
                }
            }
        });
    }
}
