// [apps/master/src/routes.rs]
/*!
 * APARATO: ROUTING TABLE
 * CLASIFICACIÓN: API ADAPTER LAYER
 * RESPONSABILIDAD: TOPOLOGÍA HTTP DEL PLANO DE CONTROL MASTER↔AGENTE
 */

use crate::handlers::{agent, tasks};
use crate::middleware::{auth_guard, health_guard};
use crate::state::AppState;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

pub fn create_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    // Rutas que se autentican con la credencial transportada en el `agent_id` del
    // path; el `auth_guard` vive aquí, no en el nivel del registro/heartbeat.
    let orchestrator_stratum = Router::new()
        .route("/agent/:agent_id/tasks", get(tasks::poll_tasks))
        .route("/agent/:agent_id/tasks/:task_id/status", post(tasks::report_status))
        .layer(middleware::from_fn_with_state(app_state.clone(), auth_guard));

    let api_v1 = Router::new()
        .route("/agent", post(agent::register))
        .route("/agent/heartbeat", post(agent::heartbeat))
        .nest("/orchestrator", orchestrator_stratum)
        .layer(middleware::from_fn_with_state(app_state.clone(), health_guard));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest("/api/v1", api_v1)
        .layer(cors)
        .with_state(app_state)
}
