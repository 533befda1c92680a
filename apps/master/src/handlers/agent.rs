// [apps/master/src/handlers/agent.rs]
/*!
 * APARATO: AGENT CONTROL PLANE HANDLERS
 * CLASIFICACIÓN: API ADAPTER LAYER
 * RESPONSABILIDAD: REGISTRO Y LATIDO DE AGENTES
 */

use crate::errors::MasterError;
use crate::state::AppState;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use neoscan_domain::{AgentRegistrationRequest, AgentRegistrationResponse, HeartbeatRequest};
use tracing::instrument;

/// `POST /api/v1/agent` — registro inicial o re-registro de un Agente.
#[instrument(skip(state, request), fields(hostname = %request.hostname, port = request.port))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<AgentRegistrationRequest>,
) -> Result<Json<AgentRegistrationResponse>, MasterError> {
    let response = state.agent_registry.register(request).await?;
    Ok(Json(response))
}

/// `POST /api/v1/agent/heartbeat` — muestra de métricas periódica.
/// `agent_id` viaja en el cuerpo, no en el path, así que este endpoint queda
/// fuera del `auth_guard` de path y valida su propia credencial aquí.
#[instrument(skip(state, headers, request), fields(agent_id = %request.agent_id))]
pub async fn heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<HeartbeatRequest>,
) -> Result<(), MasterError> {
    let token = bearer_token(&headers).ok_or(MasterError::Unauthorized)?;
    state.agent_registry.authenticate(&request.agent_id, token).await?;
    state.agent_registry.heartbeat(request).await
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}
