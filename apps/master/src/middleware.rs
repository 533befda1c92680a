// [apps/master/src/middleware.rs]
/*!
 * APARATO: PERIMETER GUARDS
 * CLASIFICACIÓN: SECURITY STRATUM
 * RESPONSABILIDAD: SALUD DEL SISTEMA Y AUTENTICACIÓN BEARER DE AGENTES
 *
 * `auth_guard` sólo protege rutas de la forma `/agent/{agent_id}/...`: el
 * `agent_id` viaja en el path, y el Bearer token se valida contra la
 * credencial emitida en el registro de ese Agente. El registro y el
 * heartbeat (que llevan `agent_id` en el cuerpo, no en el path) quedan
 * fuera de este guard y validan su propia credencial dentro del handler.
 */

use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;

/// Bloquea el acceso si el sistema está en mantenimiento.
pub async fn health_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Err(reason) = state.is_operational() {
        warn!(reason = %reason, "request rejected, system under maintenance");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "system under maintenance", "reason": reason })),
        )
            .into_response();
    }
    next.run(req).await
}

/// Extrae `{agent_id}` del path `/agent/{agent_id}/...` y valida el Bearer token
/// emitido en el registro de ese Agente: 401 si falta o no coincide.
pub async fn auth_guard(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    let agent_id = extract_agent_id(req.uri().path()).ok_or(StatusCode::UNAUTHORIZED)?;

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    state
        .agent_registry
        .authenticate(&agent_id, token)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(next.run(req).await)
}

fn extract_agent_id(path: &str) -> Option<String> {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    while let Some(segment) = segments.next() {
        if segment == "agent" {
            return segments.next().map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_agent_id_from_tasks_path() {
        assert_eq!(
            extract_agent_id("/api/v1/orchestrator/agent/agent-42/tasks"),
            Some("agent-42".to_string())
        );
    }

    #[test]
    fn returns_none_without_an_agent_segment() {
        assert_eq!(extract_agent_id("/api/v1/health"), None);
    }
}
