// [apps/master/src/core/task_generator.rs]
/*!
 * APARATO: TASK GENERATOR
 * CLASIFICACIÓN: ORCHESTRATION CORE
 * RESPONSABILIDAD: PARTICIONAR LOS TARGETS RESUELTOS DE UN STAGE EN TASKS
 *
 * Puramente funcional: sin repositorios, sin efectos. El Scheduler
 * decide cuándo invocarlo; este módulo sólo decide cómo trocear.
 */

use chrono::Utc;
use neoscan_domain::{Stage, Task, TaskCategory, TaskStatus};
use uuid::Uuid;

/// Nombre de herramienta reservado para las Tasks internas de propagación de etiquetas.
pub const AUTOTAG_TOOL_NAME: &str = "autotag_propagation";

pub struct TaskGenerator;

impl TaskGenerator {
    /// Parte `targets` en lotes de `performance_settings.chunk_size` y produce un
    /// Task `pending` por lote. El orden de `targets` se preserva dentro
    /// de cada lote.
    #[must_use]
    pub fn generate(stage: &Stage, project_id: &str, targets: &[String]) -> Vec<Task> {
        let chunk_size = stage.performance_settings.chunk_size.max(1);
        let now = Utc::now();
        let task_category = if stage.tool_name == AUTOTAG_TOOL_NAME {
            TaskCategory::System
        } else {
            TaskCategory::User
        };

        targets
            .chunks(chunk_size)
            .map(|chunk| Task {
                task_id: Uuid::new_v4().to_string(),
                project_id: project_id.to_string(),
                workflow_id: stage.workflow_id.clone(),
                stage_id: stage.stage_id.clone(),
                status: TaskStatus::Pending,
                priority: stage.execution_policy.priority,
                tool_name: stage.tool_name.clone(),
                tool_params: stage.tool_params.clone(),
                input_target: chunk.to_vec(),
                required_tags: stage.target_policy.required_tags.clone(),
                task_category,
                assigned_agent_id: None,
                output_result: None,
                error_msg: None,
                timeout_seconds: stage.performance_settings.timeout_seconds,
                created_at: now,
                updated_at: now,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neoscan_domain::{ExecutionPolicy, PerformanceSettings, TargetPolicy};

    fn sample_stage(chunk_size: usize) -> Stage {
        Stage {
            stage_id: "stage-1".into(),
            workflow_id: "wf-1".into(),
            stage_name: "scan".into(),
            tool_name: "fast_port_scan".into(),
            tool_params: "{}".into(),
            predecessors: vec![],
            target_policy: TargetPolicy::default(),
            execution_policy: ExecutionPolicy { priority: 5, proxy: None },
            performance_settings: PerformanceSettings { chunk_size, ..PerformanceSettings::default() },
        }
    }

    #[test]
    fn chunks_targets_by_configured_chunk_size() {
        let stage = sample_stage(2);
        let targets: Vec<String> = (0..5).map(|i| format!("10.0.0.{i}")).collect();
        let tasks = TaskGenerator::generate(&stage, "proj-1", &targets);
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].input_target.len(), 2);
        assert_eq!(tasks[2].input_target.len(), 1);
    }

    #[test]
    fn carries_priority_and_timeout_from_stage_policies() {
        let stage = sample_stage(10);
        let tasks = TaskGenerator::generate(&stage, "proj-1", &["10.0.0.1".into()]);
        assert_eq!(tasks[0].priority, 5);
        assert_eq!(tasks[0].timeout_seconds, 300);
        assert_eq!(tasks[0].task_category, TaskCategory::User);
    }

    #[test]
    fn autotag_tool_name_produces_system_category() {
        let mut stage = sample_stage(10);
        stage.tool_name = AUTOTAG_TOOL_NAME.to_string();
        let tasks = TaskGenerator::generate(&stage, "proj-1", &["10.0.0.1".into()]);
        assert_eq!(tasks[0].task_category, TaskCategory::System);
    }
}
