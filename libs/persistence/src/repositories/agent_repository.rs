// [libs/persistence/src/repositories/agent_repository.rs]
/*!
 * =================================================================
 * APARATO: AGENT REGISTRY REPOSITORY (V1.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO, LATIDO Y EXPIRACIÓN DE AGENTES
 *
 * `(hostname, port)` es la clave de unicidad física de un Agente;
 * `(agent_id, token)` es la credencial de re-registro. Un intento de
 * registrar un `(hostname, port)` ya ocupado por credenciales distintas
 * es un `RegistrationConflict`, no un upsert silencioso.
 * =================================================================
 */

use super::parse_timestamp;
use crate::errors::DbError;
use crate::TursoClient;
use chrono::Utc;
use libsql::{params, Row};
use neoscan_domain::{Agent, AgentMetricsSample, AgentStatus};
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct AgentRepository {
    database_client: TursoClient,
}

impl AgentRepository {
    #[must_use]
    pub fn new(database_client: TursoClient) -> Self {
        Self { database_client }
    }

    /// Registra un Agente nuevo o reemite credenciales sobre uno existente.
    ///
    /// # Errors
    /// - `DbError::RegistrationConflict`: `(hostname, port)` ya ocupado por otro `agent_id`.
    #[instrument(skip(self, agent))]
    pub async fn register(&self, agent: &Agent) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        let mut existing = connection
            .query(
                "SELECT agent_id FROM agents WHERE hostname = ?1 AND port = ?2",
                params![agent.hostname.clone(), agent.port],
            )
            .await?;

        if let Some(row) = existing.next().await? {
            let existing_agent_id: String = row.get(0)?;
            if existing_agent_id != agent.agent_id {
                warn!(
                    hostname = %agent.hostname,
                    port = agent.port,
                    "registration conflict: slot already owned by another agent_id"
                );
                return Err(DbError::RegistrationConflict(format!(
                    "{}:{} already registered as {}",
                    agent.hostname, agent.port, existing_agent_id
                )));
            }
        }

        connection
            .execute(
                "INSERT INTO agents (
                    agent_id, hostname, port, ip_address, os, arch, version, status,
                    token, token_expiry, last_heartbeat, capabilities, tags, task_support, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                ON CONFLICT(hostname, port) DO UPDATE SET
                    agent_id = excluded.agent_id,
                    ip_address = excluded.ip_address,
                    os = excluded.os,
                    arch = excluded.arch,
                    version = excluded.version,
                    status = excluded.status,
                    token = excluded.token,
                    token_expiry = excluded.token_expiry,
                    last_heartbeat = excluded.last_heartbeat,
                    capabilities = excluded.capabilities,
                    tags = excluded.tags,
                    task_support = excluded.task_support",
                params![
                    agent.agent_id.clone(),
                    agent.hostname.clone(),
                    agent.port,
                    agent.ip_address.clone(),
                    agent.os.clone(),
                    agent.arch.clone(),
                    agent.version.clone(),
                    agent.status.as_str(),
                    agent.token.clone(),
                    agent.token_expiry.to_rfc3339(),
                    agent.last_heartbeat.to_rfc3339(),
                    serde_json::to_string(&agent.capabilities)
                        .map_err(|e| DbError::MappingError(e.to_string()))?,
                    serde_json::to_string(&agent.tags)
                        .map_err(|e| DbError::MappingError(e.to_string()))?,
                    serde_json::to_string(&agent.task_support)
                        .map_err(|e| DbError::MappingError(e.to_string()))?,
                    agent.created_at.to_rfc3339(),
                ],
            )
            .await?;

        info!(agent_id = %agent.agent_id, hostname = %agent.hostname, "agent registered");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_agent(&self, agent_id: &str) -> Result<Agent, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(&format!("{SELECT_AGENT_COLUMNS} WHERE agent_id = ?1"), params![agent_id])
            .await?;

        let row = rows.next().await?.ok_or(DbError::AgentNotFound)?;
        self.map_row_to_agent(&row)
    }

    /// Verifica el par credencial `(agent_id, token)` contra el catálogo (auth del uplink).
    #[instrument(skip(self, token))]
    pub async fn verify_token(&self, agent_id: &str, token: &str) -> Result<Agent, DbError> {
        let agent = self.get_agent(agent_id).await?;
        if agent.token != token || agent.token_expiry < Utc::now() {
            return Err(DbError::RegistrationConflict(
                "token mismatch or expired".into(),
            ));
        }
        Ok(agent)
    }

    #[instrument(skip(self, sample))]
    pub async fn record_heartbeat(
        &self,
        agent_id: &str,
        sample: &AgentMetricsSample,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection.transaction().await.map_err(DbError::QueryError)?;

        let affected = transaction
            .execute(
                "UPDATE agents SET last_heartbeat = ?2, status = 'online' WHERE agent_id = ?1",
                params![agent_id, sample.sampled_at.to_rfc3339()],
            )
            .await?;

        if affected == 0 {
            return Err(DbError::AgentNotFound);
        }

        transaction
            .execute(
                "INSERT INTO agent_metrics_samples (
                    agent_id, sampled_at, cpu_percent, mem_percent, disk_percent,
                    net_rx_bytes, net_tx_bytes, running_tasks
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    agent_id,
                    sample.sampled_at.to_rfc3339(),
                    sample.cpu_percent as f64,
                    sample.mem_percent as f64,
                    sample.disk_percent as f64,
                    sample.net_rx_bytes as i64,
                    sample.net_tx_bytes as i64,
                    sample.running_tasks as i64,
                ],
            )
            .await?;

        transaction.commit().await.map_err(DbError::QueryError)?;
        Ok(())
    }

    /// Agentes elegibles para despacho: sólo `online`; el filtro de `required_tags`
    /// se resuelve en memoria vía `Agent::satisfies` sobre este conjunto.
    #[instrument(skip(self))]
    pub async fn list_online_agents(&self) -> Result<Vec<Agent>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(&format!("{SELECT_AGENT_COLUMNS} WHERE status = 'online'"), ())
            .await?;

        let mut agents = Vec::new();
        while let Some(row) = rows.next().await? {
            agents.push(self.map_row_to_agent(&row)?);
        }
        Ok(agents)
    }

    /// Reaper de latido: pasa a `offline` todo Agente sin latido reciente.
    #[instrument(skip(self))]
    pub async fn mark_stale_agents_offline(&self, stale_after_seconds: i64) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                "UPDATE agents SET status = 'offline'
                 WHERE status = 'online'
                 AND (julianday('now') - julianday(last_heartbeat)) * 86400.0 > ?1",
                params![stale_after_seconds],
            )
            .await?;

        if affected > 0 {
            warn!(count = affected, "agents marked offline after missed heartbeats");
        }
        Ok(affected)
    }

    fn map_row_to_agent(&self, row: &Row) -> Result<Agent, DbError> {
        let capabilities_raw: String = row.get(11)?;
        let tags_raw: String = row.get(12)?;
        let task_support_raw: String = row.get(13)?;
        Ok(Agent {
            agent_id: row.get(0)?,
            hostname: row.get(1)?,
            port: row.get::<i64>(2)? as u16,
            ip_address: row.get(3)?,
            os: row.get(4)?,
            arch: row.get(5)?,
            version: row.get(6)?,
            status: AgentStatus::from_str(&row.get::<String>(7)?),
            token: row.get(8)?,
            token_expiry: parse_timestamp(row, 9)?,
            last_heartbeat: parse_timestamp(row, 10)?,
            capabilities: serde_json::from_str(&capabilities_raw)
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            tags: serde_json::from_str(&tags_raw)
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            task_support: serde_json::from_str(&task_support_raw)
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            created_at: parse_timestamp(row, 14)?,
        })
    }
}

const SELECT_AGENT_COLUMNS: &str = "SELECT agent_id, hostname, port, ip_address, os, arch, \
    version, status, token, token_expiry, last_heartbeat, capabilities, tags, task_support, \
    created_at FROM agents";
