// [apps/master/src/handlers/tasks.rs]
/*!
 * APARATO: TASK POLL/REPORT HANDLERS
 * CLASIFICACIÓN: API ADAPTER LAYER
 * RESPONSABILIDAD: DESPACHO PULL Y RECEPCIÓN DE REPORTES DE ESTADO
 */

use crate::errors::MasterError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use neoscan_domain::{StageResultEnvelope, Task, TaskStatusReport};
use serde::Deserialize;
use tracing::instrument;

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    /// Tasks que el Agente ya tiene en vuelo; el Dispatcher nunca lo adivina.
    #[serde(default)]
    pub current_load: u32,
}

/// `GET /api/v1/orchestrator/agent/{agent_id}/tasks` — despacho pull de Tasks pendientes.
#[instrument(skip(state), fields(agent_id = %agent_id, current_load = query.current_load))]
pub async fn poll_tasks(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(query): Query<PollQuery>,
) -> Result<Json<Vec<Task>>, MasterError> {
    let tasks = state.task_dispatcher.dispatch(&agent_id, query.current_load).await?;
    Ok(Json(tasks))
}

/// `POST /api/v1/orchestrator/agent/{agent_id}/tasks/{task_id}/status` — reporte de estado.
/// Cada `stage_result` del sobre se encola al ETL; la persistencia del propio reporte
/// (estado del Task, progreso) ocurre de forma síncrona vía `TaskRepository`.
#[instrument(skip(state, report), fields(agent_id = %agent_id, task_id = %task_id, status = ?report.status))]
pub async fn report_status(
    State(state): State<AppState>,
    Path((agent_id, task_id)): Path<(String, String)>,
    Json(report): Json<TaskStatusReport>,
) -> Result<(), MasterError> {
    if report.agent_id != agent_id || report.task_id != task_id {
        return Err(MasterError::InvalidRequest(
            "agent_id/task_id in path must match the report body".into(),
        ));
    }

    for envelope in &report.stage_results {
        enqueue_stage_result(&state, &task_id, envelope.clone()).await;
    }

    state.task_repository.apply_status_report(&report).await?;
    Ok(())
}

async fn enqueue_stage_result(state: &AppState, task_id: &str, envelope: StageResultEnvelope) {
    state
        .etl_pipeline
        .enqueue(crate::core::etl::EtlItem {
            task_id: task_id.to_string(),
            envelope,
            received_at: chrono::Utc::now(),
        })
        .await;
}
