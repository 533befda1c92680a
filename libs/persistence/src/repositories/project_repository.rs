// [libs/persistence/src/repositories/project_repository.rs]
/*!
 * =================================================================
 * APARATO: PROJECT / WORKFLOW / STAGE REPOSITORY (V1.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA DEL ÁRBOL DE ORQUESTACIÓN
 * =================================================================
 */

use super::parse_timestamp;
use crate::errors::DbError;
use crate::TursoClient;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use neoscan_domain::{
    ExecutionPolicy, PerformanceSettings, Project, ProjectStatus, Stage, TargetPolicy, Workflow,
};
use tracing::{debug, instrument};

/// Repositorio de autoridad única para Proyectos, Workflows y Stages.
#[derive(Clone)]
pub struct ProjectRepository {
    database_client: TursoClient,
}

impl ProjectRepository {
    #[must_use]
    pub fn new(database_client: TursoClient) -> Self {
        Self { database_client }
    }

    #[instrument(skip(self, project))]
    pub async fn create_project(&self, project: &Project) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO projects (
                    project_id, owner_identifier, display_name, target_scope,
                    workflow_id, cron_expr, status, last_exec_time, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    project.project_id.clone(),
                    project.owner_identifier.clone(),
                    project.display_name.clone(),
                    serde_json::to_string(&project.target_scope)
                        .map_err(|e| DbError::MappingError(e.to_string()))?,
                    project.workflow_id.clone(),
                    project.cron_expr.clone(),
                    project.status.as_str(),
                    project.last_exec_time.map(|t| t.to_rfc3339()),
                    project.created_at.to_rfc3339(),
                    project.updated_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_project(&self, project_id: &str) -> Result<Project, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT project_id, owner_identifier, display_name, target_scope, workflow_id,
                        cron_expr, status, last_exec_time, created_at, updated_at
                 FROM projects WHERE project_id = ?1",
                params![project_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => self.map_row_to_project(&row),
            None => Err(DbError::ProjectNotFound),
        }
    }

    /// Proyectos candidatos a evaluación del Scheduler: en ejecución o con cron configurado.
    #[instrument(skip(self))]
    pub async fn list_schedulable_projects(&self) -> Result<Vec<Project>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT project_id, owner_identifier, display_name, target_scope, workflow_id,
                        cron_expr, status, last_exec_time, created_at, updated_at
                 FROM projects WHERE status != 'finished'",
                (),
            )
            .await?;

        let mut projects = Vec::new();
        while let Some(row) = rows.next().await? {
            projects.push(self.map_row_to_project(&row)?);
        }
        Ok(projects)
    }

    #[instrument(skip(self))]
    pub async fn update_project_status(
        &self,
        project_id: &str,
        status: ProjectStatus,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                "UPDATE projects SET status = ?2, updated_at = CURRENT_TIMESTAMP WHERE project_id = ?1",
                params![project_id, status.as_str()],
            )
            .await?;
        if affected == 0 {
            return Err(DbError::ProjectNotFound);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_last_exec_time(
        &self,
        project_id: &str,
        last_exec_time: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE projects SET last_exec_time = ?2, updated_at = CURRENT_TIMESTAMP WHERE project_id = ?1",
                params![project_id, last_exec_time.to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn create_workflow(&self, workflow: &Workflow) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO workflows (workflow_id, name, version, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    workflow.workflow_id.clone(),
                    workflow.name.clone(),
                    workflow.version,
                    workflow.created_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT workflow_id, name, version, created_at FROM workflows WHERE workflow_id = ?1",
                params![workflow_id],
            )
            .await?;

        let row = rows.next().await?.ok_or(DbError::WorkflowNotFound)?;
        Ok(Workflow {
            workflow_id: row.get(0)?,
            name: row.get(1)?,
            version: row.get(2)?,
            created_at: parse_timestamp(&row, 3)?,
        })
    }

    #[instrument(skip(self, stage))]
    pub async fn create_stage(&self, stage: &Stage) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO scan_stages (
                    stage_id, workflow_id, stage_name, tool_name, tool_params,
                    predecessors, target_policy, execution_policy, performance_settings
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    stage.stage_id.clone(),
                    stage.workflow_id.clone(),
                    stage.stage_name.clone(),
                    stage.tool_name.clone(),
                    stage.tool_params.clone(),
                    serde_json::to_string(&stage.predecessors)
                        .map_err(|e| DbError::MappingError(e.to_string()))?,
                    serde_json::to_string(&stage.target_policy)
                        .map_err(|e| DbError::MappingError(e.to_string()))?,
                    serde_json::to_string(&stage.execution_policy)
                        .map_err(|e| DbError::MappingError(e.to_string()))?,
                    serde_json::to_string(&stage.performance_settings)
                        .map_err(|e| DbError::MappingError(e.to_string()))?,
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_stage(&self, stage_id: &str) -> Result<Stage, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT stage_id, workflow_id, stage_name, tool_name, tool_params,
                        predecessors, target_policy, execution_policy, performance_settings
                 FROM scan_stages WHERE stage_id = ?1",
                params![stage_id],
            )
            .await?;

        let row = rows.next().await?.ok_or(DbError::StageNotFound)?;
        self.map_row_to_stage(&row)
    }

    #[instrument(skip(self))]
    pub async fn list_stages_for_workflow(&self, workflow_id: &str) -> Result<Vec<Stage>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT stage_id, workflow_id, stage_name, tool_name, tool_params,
                        predecessors, target_policy, execution_policy, performance_settings
                 FROM scan_stages WHERE workflow_id = ?1",
                params![workflow_id],
            )
            .await?;

        let mut stages = Vec::new();
        while let Some(row) = rows.next().await? {
            stages.push(self.map_row_to_stage(&row)?);
        }
        Ok(stages)
    }

    /// Stages de un Proyecto que ya produjeron al menos un Task (paso de avance del DAG).
    ///
    /// Derivada vía `DISTINCT` sobre `agent_tasks` en lugar de una tabla de estado dedicada;
    /// suficiente a la escala de un Workflow (decenas de Stages), ver DESIGN.md.
    #[instrument(skip(self))]
    pub async fn executed_stage_ids(&self, project_id: &str) -> Result<Vec<String>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT DISTINCT stage_id FROM agent_tasks WHERE project_id = ?1",
                params![project_id],
            )
            .await?;

        let mut stage_ids = Vec::new();
        while let Some(row) = rows.next().await? {
            stage_ids.push(row.get(0)?);
        }
        debug!(count = stage_ids.len(), "stages already executed for project");
        Ok(stage_ids)
    }

    fn map_row_to_project(&self, row: &Row) -> Result<Project, DbError> {
        let target_scope_raw: String = row.get(3)?;
        let last_exec_raw: Option<String> = row.get(7)?;
        Ok(Project {
            project_id: row.get(0)?,
            owner_identifier: row.get(1)?,
            display_name: row.get(2)?,
            target_scope: serde_json::from_str(&target_scope_raw)
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            workflow_id: row.get(4)?,
            cron_expr: row.get(5)?,
            status: ProjectStatus::from_str(&row.get::<String>(6)?),
            last_exec_time: last_exec_raw
                .map(|raw| DateTime::parse_from_rfc3339(&raw).map(|dt| dt.with_timezone(&Utc)))
                .transpose()
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            created_at: parse_timestamp(row, 8)?,
            updated_at: parse_timestamp(row, 9)?,
        })
    }

    fn map_row_to_stage(&self, row: &Row) -> Result<Stage, DbError> {
        let predecessors_raw: String = row.get(5)?;
        let target_policy_raw: String = row.get(6)?;
        let execution_policy_raw: String = row.get(7)?;
        let performance_settings_raw: String = row.get(8)?;
        Ok(Stage {
            stage_id: row.get(0)?,
            workflow_id: row.get(1)?,
            stage_name: row.get(2)?,
            tool_name: row.get(3)?,
            tool_params: row.get(4)?,
            predecessors: serde_json::from_str(&predecessors_raw)
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            target_policy: serde_json::from_str::<TargetPolicy>(&target_policy_raw)
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            execution_policy: serde_json::from_str::<ExecutionPolicy>(&execution_policy_raw)
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            performance_settings: serde_json::from_str::<PerformanceSettings>(
                &performance_settings_raw,
            )
            .map_err(|e| DbError::MappingError(e.to_string()))?,
        })
    }
}
