// [libs/domain/src/agent.rs]
/*!
 * =================================================================
 * APARATO: AGENT DOMAIN MODEL (V1.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: IDENTIDAD Y CAPACIDADES DE UN TRABAJADOR REMOTO
 *
 * El Agente es el nodo remoto que ejecuta Tasks. El Registry
 * gobierna su ciclo de vida: registro, heartbeat, y expiración por
 * ausencia de latido. `(hostname, port)` es la clave de unicidad;
 * `(agent_id, token)` habilita la actualización in-place.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Estado operativo de un Agente, vigilado por el reaper de latido.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Online,
    Offline,
    Quarantined,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Online => "online",
            AgentStatus::Offline => "offline",
            AgentStatus::Quarantined => "quarantined",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "offline" => AgentStatus::Offline,
            "quarantined" => AgentStatus::Quarantined,
            _ => AgentStatus::Online,
        }
    }
}

/// Un trabajador remoto registrado ante el Master.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub hostname: String,
    pub port: u16,
    pub ip_address: String,
    pub os: String,
    pub arch: String,
    pub version: String,
    pub status: AgentStatus,
    pub token: String,
    pub token_expiry: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    /// Protocolos/escaneos que este Agente puede ejecutar (capacidades anunciadas).
    pub capabilities: Vec<String>,
    /// Etiquetas libres usadas para restringir despacho (`required_tags` de un Task).
    pub tags: Vec<String>,
    /// IDs de tipo de escaneo soportados (p.ej. `fast_port_scan`, `brute`, `os_scan`).
    pub task_support: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Un Agente satisface `required_tags` cuando cubre tags, capabilities y task_support a la vez.
    pub fn satisfies(&self, required_tags: &[String]) -> bool {
        required_tags.iter().all(|tag| {
            self.tags.contains(tag)
                || self.capabilities.contains(tag)
                || self.task_support.contains(tag)
        })
    }

    pub fn is_capable_of(&self, scan_type: &str) -> bool {
        self.task_support.iter().any(|t| t == scan_type)
    }
}

/// Muestra de métricas recibida junto con un heartbeat; retenida para agregación rodante.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMetricsSample {
    pub agent_id: String,
    pub sampled_at: DateTime<Utc>,
    pub cpu_percent: f32,
    pub mem_percent: f32,
    pub disk_percent: f32,
    pub net_rx_bytes: u64,
    pub net_tx_bytes: u64,
    pub running_tasks: u32,
}

/// Cuerpo de la petición de registro (`POST /api/v1/agent`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistrationRequest {
    pub hostname: String,
    pub port: u16,
    pub ip_address: String,
    pub os: String,
    pub arch: String,
    pub version: String,
    pub task_support: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Presente en un re-registro; ausente en un primer contacto.
    pub agent_id: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRegistrationResponse {
    pub agent_id: String,
    pub token: String,
    pub token_expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub agent_id: String,
    pub metrics: AgentMetricsSample,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_agent() -> Agent {
        let now = Utc::now();
        Agent {
            agent_id: "agent-1".into(),
            hostname: "scout-01".into(),
            port: 7331,
            ip_address: "10.0.0.5".into(),
            os: "linux".into(),
            arch: "x86_64".into(),
            version: "0.2.0".into(),
            status: AgentStatus::Online,
            token: "tok".into(),
            token_expiry: now,
            last_heartbeat: now,
            capabilities: vec!["ssh".into()],
            tags: vec!["dmz".into()],
            task_support: vec!["brute".into(), "fast_port_scan".into()],
            created_at: now,
        }
    }

    #[test]
    fn satisfies_checks_tags_capabilities_and_task_support_together() {
        let agent = sample_agent();
        assert!(agent.satisfies(&["dmz".into()]));
        assert!(agent.satisfies(&["ssh".into()]));
        assert!(agent.satisfies(&["brute".into()]));
        assert!(!agent.satisfies(&["rdp".into()]));
    }

    #[test]
    fn is_capable_of_checks_task_support_only() {
        let agent = sample_agent();
        assert!(agent.is_capable_of("brute"));
        assert!(!agent.is_capable_of("os_scan"));
    }
}
