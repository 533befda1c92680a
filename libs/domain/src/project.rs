// [libs/domain/src/project.rs]
/*!
 * =================================================================
 * APARATO: PROJECT / WORKFLOW / STAGE DOMAIN MODELS (V1.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: DEFINICIÓN SOBERANA DEL ÁRBOL DE ORQUESTACIÓN
 *
 * Un Proyecto referencia un Workflow; un Workflow es una plantilla
 * versionada de Stages; un Stage es el nodo del DAG que porta la
 * herramienta de escaneo, su política de objetivo, su política de
 * ejecución y sus ajustes de rendimiento. Las claves foráneas entre
 * estas tres entidades son la columna vertebral del Scheduler.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Estado del ciclo de vida de un Proyecto, gobernado en exclusiva por el Scheduler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Draft,
    Running,
    Paused,
    Error,
    Finished,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Running => "running",
            ProjectStatus::Paused => "paused",
            ProjectStatus::Error => "error",
            ProjectStatus::Finished => "finished",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "running" => ProjectStatus::Running,
            "paused" => ProjectStatus::Paused,
            "error" => ProjectStatus::Error,
            "finished" => ProjectStatus::Finished,
            _ => ProjectStatus::Draft,
        }
    }
}

/// Un escaneo con alcance propio: a quién tocamos, con qué Workflow, y cuándo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,
    pub owner_identifier: String,
    pub display_name: String,
    /// Lista libre de IPs/CIDRs/dominios; parseada por el Target Provider.
    pub target_scope: Vec<String>,
    pub workflow_id: String,
    /// Expresión cron de 5 campos; `None` significa disparo manual únicamente.
    pub cron_expr: Option<String>,
    pub status: ProjectStatus,
    pub last_exec_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plantilla nombrada y versionada que agrupa un conjunto de Stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub workflow_id: String,
    pub name: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// Reglas de expansión/restricción de objetivo consumidas por el Target Provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TargetPolicy {
    /// Si `true`, el Target Provider expande CIDRs del seed scope host a host.
    #[serde(default)]
    pub expand_cidrs: bool,
    /// Restringe a hosts que ya portan alguna de estas etiquetas.
    #[serde(default)]
    pub required_tags: Vec<String>,
    /// Restringe a hosts previamente marcados como vivos (resultado de una Stage anterior).
    #[serde(default)]
    pub live_hosts_only: bool,
}

/// Prioridad y proxy del Stage; consumido directamente por el Task Generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPolicy {
    #[serde(default)]
    pub priority: i32,
    pub proxy: Option<String>,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self { priority: 0, proxy: None }
    }
}

/// Ajustes de rendimiento de un Stage: tamaño de lote, timeout, concurrencia, tasa, reintentos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSettings {
    #[serde(default = "PerformanceSettings::default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "PerformanceSettings::default_timeout_seconds")]
    pub timeout_seconds: i64,
    #[serde(default)]
    pub concurrency: Option<u32>,
    #[serde(default)]
    pub rate_per_second: Option<u32>,
    #[serde(default)]
    pub retries: u32,
}

impl PerformanceSettings {
    fn default_chunk_size() -> usize {
        50
    }
    fn default_timeout_seconds() -> i64 {
        300
    }
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            chunk_size: Self::default_chunk_size(),
            timeout_seconds: Self::default_timeout_seconds(),
            concurrency: None,
            rate_per_second: None,
            retries: 0,
        }
    }
}

/// Un nodo del DAG de escaneo: una herramienta, su configuración y sus predecesores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub stage_id: String,
    pub workflow_id: String,
    pub stage_name: String,
    pub tool_name: String,
    /// Cadena opaca que sólo la herramienta destino sabe interpretar.
    pub tool_params: String,
    /// Forma el DAG junto con los demás Stages del mismo Workflow.
    pub predecessors: Vec<String>,
    pub target_policy: TargetPolicy,
    pub execution_policy: ExecutionPolicy,
    pub performance_settings: PerformanceSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_status_round_trips_through_its_string_form() {
        for status in [
            ProjectStatus::Draft,
            ProjectStatus::Running,
            ProjectStatus::Paused,
            ProjectStatus::Error,
            ProjectStatus::Finished,
        ] {
            assert_eq!(ProjectStatus::from_str(status.as_str()), status);
        }
    }

    #[test]
    fn performance_settings_default_matches_spec_chunk_size() {
        let settings = PerformanceSettings::default();
        assert_eq!(settings.chunk_size, 50);
    }
}
