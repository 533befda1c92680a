// [libs/domain/src/task.rs]
/*!
 * =================================================================
 * APARATO: TASK DOMAIN MODEL (V1.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: LA UNIDAD ATÓMICA DE TRABAJO DESPACHADA A UN AGENTE
 *
 * Un Task es un trozo (chunk) de una Stage: una lista de objetivos,
 * un nombre de herramienta, sus parámetros opaques y un estado de
 * ciclo de vida vigilado por el Scheduler y el Dispatcher.
 * Invariante dura: los estados terminales nunca transicionan.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Estado del ciclo de vida de un Task. Terminal ⇒ `completed | failed | blocked`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Claimed,
    Running,
    Completed,
    Failed,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Claimed => "claimed",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Blocked => "blocked",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "claimed" => TaskStatus::Claimed,
            "running" => TaskStatus::Running,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            "blocked" => TaskStatus::Blocked,
            _ => TaskStatus::Pending,
        }
    }

    /// Los estados terminales nunca transicionan de vuelta.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Blocked)
    }
}

/// Discrimina Tasks generadas por el usuario de Tasks internas de propagación.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    User,
    System,
}

impl TaskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskCategory::User => "user",
            TaskCategory::System => "system",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "system" => TaskCategory::System,
            _ => TaskCategory::User,
        }
    }
}

/// Un lote concreto de trabajo de escaneo, generado por el Task Generator
/// y consumido por un Agente vía el Dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub project_id: String,
    pub workflow_id: String,
    pub stage_id: String,
    pub status: TaskStatus,
    pub priority: i32,
    pub tool_name: String,
    pub tool_params: String,
    /// Lista de objetivos asignados a este lote, serializada como JSON.
    pub input_target: Vec<String>,
    /// Restricciones de capacidad que un Agente candidato debe satisfacer.
    pub required_tags: Vec<String>,
    pub task_category: TaskCategory,
    pub assigned_agent_id: Option<String>,
    pub output_result: Option<Value>,
    pub error_msg: Option<String>,
    pub timeout_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Invariante: un Task `pending` jamás porta un Agente asignado.
    pub fn invariants_hold(&self) -> bool {
        match self.status {
            TaskStatus::Pending => self.assigned_agent_id.is_none(),
            TaskStatus::Claimed | TaskStatus::Running => self.assigned_agent_id.is_some(),
            _ => true,
        }
    }
}

/// Estado reportado por un Agente durante la ejecución de un Task, previo a la persistencia.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportedTaskStatus {
    Running,
    Completed,
    Failed,
}

/// Un StageResult individual producido por una herramienta, previo a la normalización ETL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResultEnvelope {
    pub result_type: String,
    pub target_type: String,
    pub target_value: String,
    pub attributes: Value,
}

/// Sobre completo enviado por un Agente al reportar el estado de un Task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusReport {
    pub task_id: String,
    pub agent_id: String,
    pub status: ReportedTaskStatus,
    pub progress: u8,
    pub produced_at: DateTime<Utc>,
    pub stage_results: Vec<StageResultEnvelope>,
    pub error_msg: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_task_never_carries_an_assigned_agent() {
        let task = sample_task(TaskStatus::Pending, None);
        assert!(task.invariants_hold());

        let broken = sample_task(TaskStatus::Pending, Some("agent-1".into()));
        assert!(!broken.invariants_hold());
    }

    #[test]
    fn claimed_task_requires_exactly_one_agent() {
        let task = sample_task(TaskStatus::Claimed, Some("agent-1".into()));
        assert!(task.invariants_hold());

        let broken = sample_task(TaskStatus::Claimed, None);
        assert!(!broken.invariants_hold());
    }

    #[test]
    fn terminal_statuses_are_flagged_correctly() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Blocked.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
    }

    fn sample_task(status: TaskStatus, assigned_agent_id: Option<String>) -> Task {
        let now = Utc::now();
        Task {
            task_id: "task-1".into(),
            project_id: "proj-1".into(),
            workflow_id: "wf-1".into(),
            stage_id: "stage-1".into(),
            status,
            priority: 0,
            tool_name: "fast_port_scan".into(),
            tool_params: String::new(),
            input_target: vec!["127.0.0.1".into()],
            required_tags: vec![],
            task_category: TaskCategory::User,
            assigned_agent_id,
            output_result: None,
            error_msg: None,
            timeout_seconds: 300,
            created_at: now,
            updated_at: now,
        }
    }
}
