// [libs/persistence/src/repositories/task_repository.rs]
/*!
 * =================================================================
 * APARATO: TASK REPOSITORY (V1.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA ATÓMICO DE UN TASK
 *
 * El claim de un Task es una transición de estado disputada entre
 * Agentes concurrentes: `claim_task` sólo tiene éxito si la fila
 * seguía `pending` en el instante del UPDATE. Cero carreras, cero
 * locks explícitos — el motor transaccional de libSQL resuelve la
 * condición de carrera al nivel de la fila.
 * =================================================================
 */

use super::parse_timestamp;
use crate::errors::DbError;
use crate::TursoClient;
use libsql::{params, Row};
use neoscan_domain::{ReportedTaskStatus, Task, TaskCategory, TaskStatus, TaskStatusReport};
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct TaskRepository {
    database_client: TursoClient,
}

impl TaskRepository {
    #[must_use]
    pub fn new(database_client: TursoClient) -> Self {
        Self { database_client }
    }

    #[instrument(skip(self, task))]
    pub async fn create_task(&self, task: &Task) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO agent_tasks (
                    task_id, project_id, workflow_id, stage_id, status, priority,
                    tool_name, tool_params, input_target, required_tags, task_category,
                    assigned_agent_id, output_result, error_msg, timeout_seconds,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
                params![
                    task.task_id.clone(),
                    task.project_id.clone(),
                    task.workflow_id.clone(),
                    task.stage_id.clone(),
                    task.status.as_str(),
                    task.priority,
                    task.tool_name.clone(),
                    task.tool_params.clone(),
                    serde_json::to_string(&task.input_target)
                        .map_err(|e| DbError::MappingError(e.to_string()))?,
                    serde_json::to_string(&task.required_tags)
                        .map_err(|e| DbError::MappingError(e.to_string()))?,
                    task.task_category.as_str(),
                    task.assigned_agent_id.clone(),
                    task.output_result
                        .as_ref()
                        .map(|v| v.to_string()),
                    task.error_msg.clone(),
                    task.timeout_seconds,
                    task.created_at.to_rfc3339(),
                    task.updated_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_task(&self, task_id: &str) -> Result<Task, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(&format!("{SELECT_TASK_COLUMNS} WHERE task_id = ?1"), params![task_id])
            .await?;

        let row = rows.next().await?.ok_or(DbError::TaskNotFound)?;
        self.map_row_to_task(&row)
    }

    /// Lote candidato a despacho, en orden de prioridad y antigüedad.
    #[instrument(skip(self))]
    pub async fn list_pending_candidates(&self, limit: i64) -> Result<Vec<Task>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "{SELECT_TASK_COLUMNS} WHERE status = 'pending' \
                     ORDER BY priority DESC, created_at ASC LIMIT ?1"
                ),
                params![limit],
            )
            .await?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(self.map_row_to_task(&row)?);
        }
        Ok(tasks)
    }

    /// Reclamo atómico compare-and-swap: falla con `ClaimConflict` si otro
    /// Agente ganó la carrera entre el `SELECT` candidato y este `UPDATE`.
    #[instrument(skip(self))]
    pub async fn claim_task(&self, task_id: &str, agent_id: &str) -> Result<Task, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                "UPDATE agent_tasks
                 SET status = 'claimed', assigned_agent_id = ?2, updated_at = CURRENT_TIMESTAMP
                 WHERE task_id = ?1 AND status = 'pending'",
                params![task_id, agent_id],
            )
            .await?;

        if affected == 0 {
            warn!(task_id, agent_id, "claim race lost, task already taken");
            return Err(DbError::ClaimConflict);
        }

        info!(task_id, agent_id, "task claimed");
        self.get_task(task_id).await
    }

    /// Aplica el reporte de estado enviado por un Agente (`TaskStatusReport`).
    /// Los estados terminales son finales: un reporte tardío sobre un Task ya
    /// `failed`/`completed`/`blocked` no transiciona nada.
    #[instrument(skip(self, report))]
    pub async fn apply_status_report(&self, report: &TaskStatusReport) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        let new_status = match report.status {
            ReportedTaskStatus::Running => TaskStatus::Running,
            ReportedTaskStatus::Completed => TaskStatus::Completed,
            ReportedTaskStatus::Failed => TaskStatus::Failed,
        };

        let output_result = if report.stage_results.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&report.stage_results)
                    .map_err(|e| DbError::MappingError(e.to_string()))?,
            )
        };

        let affected = connection
            .execute(
                "UPDATE agent_tasks
                 SET status = ?2, output_result = COALESCE(?3, output_result),
                     error_msg = ?4, updated_at = CURRENT_TIMESTAMP
                 WHERE task_id = ?1 AND status NOT IN ('completed', 'failed', 'blocked')",
                params![
                    report.task_id.clone(),
                    new_status.as_str(),
                    output_result,
                    report.error_msg.clone(),
                ],
            )
            .await?;

        if affected == 0 {
            warn!(task_id = %report.task_id, "status report against terminal or missing task, ignored");
        }
        Ok(())
    }

    /// Transiciona un Task directamente a `blocked`: un predecesor falló.
    #[instrument(skip(self))]
    pub async fn mark_blocked(&self, task_id: &str, reason: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE agent_tasks
                 SET status = 'blocked', error_msg = ?2, updated_at = CURRENT_TIMESTAMP
                 WHERE task_id = ?1 AND status NOT IN ('completed', 'failed', 'blocked')",
                params![task_id, reason],
            )
            .await?;
        Ok(())
    }

    /// Tasks de una Stage aún no en estado terminal — usado por el Scheduler
    /// para decidir si una Stage ya terminó y sus sucesores pueden desbloquearse.
    #[instrument(skip(self))]
    pub async fn count_non_terminal_for_stage(&self, stage_id: &str) -> Result<i64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT COUNT(*) FROM agent_tasks
                 WHERE stage_id = ?1 AND status NOT IN ('completed', 'failed', 'blocked')",
                params![stage_id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DbError::TaskNotFound)?;
        Ok(row.get(0)?)
    }

    /// `true` si alguna Task de la Stage terminó en `failed`/`blocked` (propagación de fallo).
    #[instrument(skip(self))]
    pub async fn stage_has_failure(&self, stage_id: &str) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT COUNT(*) FROM agent_tasks
                 WHERE stage_id = ?1 AND status IN ('failed', 'blocked')",
                params![stage_id],
            )
            .await?;
        let row = rows.next().await?.ok_or(DbError::TaskNotFound)?;
        let failures: i64 = row.get(0)?;
        Ok(failures > 0)
    }

    /// Tasks `claimed`/`running` cuyo timeout expiró — consumido por el reaper del Dispatcher.
    #[instrument(skip(self))]
    pub async fn list_overdue_running_tasks(&self) -> Result<Vec<Task>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "{SELECT_TASK_COLUMNS} WHERE status IN ('claimed', 'running') \
                     AND (julianday('now') - julianday(updated_at)) * 86400.0 > timeout_seconds"
                ),
                (),
            )
            .await?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(self.map_row_to_task(&row)?);
        }
        Ok(tasks)
    }

    #[instrument(skip(self))]
    pub async fn mark_timed_out(&self, task_id: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE agent_tasks
                 SET status = 'failed', error_msg = 'timeout_exceeded', updated_at = CURRENT_TIMESTAMP
                 WHERE task_id = ?1 AND status IN ('claimed', 'running')",
                params![task_id],
            )
            .await?;
        warn!(task_id, "task timed out");
        Ok(())
    }

    fn map_row_to_task(&self, row: &Row) -> Result<Task, DbError> {
        let input_target_raw: String = row.get(8)?;
        let required_tags_raw: String = row.get(9)?;
        let output_result_raw: Option<String> = row.get(12)?;
        Ok(Task {
            task_id: row.get(0)?,
            project_id: row.get(1)?,
            workflow_id: row.get(2)?,
            stage_id: row.get(3)?,
            status: TaskStatus::from_str(&row.get::<String>(4)?),
            priority: row.get(5)?,
            tool_name: row.get(6)?,
            tool_params: row.get(7)?,
            input_target: serde_json::from_str(&input_target_raw)
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            required_tags: serde_json::from_str(&required_tags_raw)
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            task_category: TaskCategory::from_str(&row.get::<String>(10)?),
            assigned_agent_id: row.get(11)?,
            output_result: output_result_raw
                .map(|raw| serde_json::from_str(&raw))
                .transpose()
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            error_msg: row.get(13)?,
            timeout_seconds: row.get(14)?,
            created_at: parse_timestamp(row, 15)?,
            updated_at: parse_timestamp(row, 16)?,
        })
    }
}

const SELECT_TASK_COLUMNS: &str = "SELECT task_id, project_id, workflow_id, stage_id, status, \
    priority, tool_name, tool_params, input_target, required_tags, task_category, \
    assigned_agent_id, output_result, error_msg, timeout_seconds, created_at, updated_at \
    FROM agent_tasks";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_columns_align_with_map_row_to_task_indices() {
        let column_count = SELECT_TASK_COLUMNS
            .split("FROM")
            .next()
            .unwrap()
            .matches(',')
            .count()
            + 1;
        assert_eq!(column_count, 17);
    }
}
