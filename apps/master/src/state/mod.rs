// [apps/master/src/state/mod.rs]
/*!
 * APARATO: APPLICATION STATE
 * CLASIFICACIÓN: COMPOSITION ROOT
 * RESPONSABILIDAD: ÚNICO PUNTO DE CONSTRUCCIÓN DE REPOSITORIOS Y SERVICIOS DEL CORE
 *
 * `AppState` es barato de clonar (todo interior es `Arc` o un repositorio
 * que ya envuelve un `TursoClient` clonable) y viaja como extractor de axum
 * a cada handler.
 */

use crate::core::autotag::AutoTagEngine;
use crate::core::dispatcher::TaskDispatcher;
use crate::core::etl::EtlPipeline;
use crate::core::policy::PolicyEnforcer;
use crate::core::registry::AgentRegistry;
use crate::core::scheduler::SchedulerEngine;
use crate::core::target_provider::TargetProvider;
use neoscan_persistence::{
    AgentRepository, AssetRepository, ProjectRepository, TagRepository, TaskRepository, TursoClient,
};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::instrument;

/// Modo operativo global, consultado por el guard de salud antes de cada request.
#[derive(Debug, Clone)]
pub enum SystemMode {
    Operational,
    Maintenance(String),
}

#[derive(Clone)]
pub struct AppState {
    pub database_client: TursoClient,
    pub project_repository: ProjectRepository,
    pub task_repository: TaskRepository,
    pub agent_repository: AgentRepository,
    pub asset_repository: AssetRepository,
    pub tag_repository: TagRepository,
    pub agent_registry: Arc<AgentRegistry>,
    pub task_dispatcher: Arc<TaskDispatcher>,
    pub etl_pipeline: Arc<EtlPipeline>,
    pub auto_tag_engine: Arc<AutoTagEngine>,
    pub worker_auth_token: Arc<str>,
    current_system_mode: Arc<RwLock<SystemMode>>,
}

/// Configuración leída una vez al arranque y congelada en el `AppState`.
pub struct AppConfig {
    pub max_tasks_per_agent: u32,
    pub scheduler_tick_interval: Duration,
    pub agent_stale_after_seconds: i64,
    pub agent_reaper_interval: Duration,
    pub etl_worker_count: usize,
    pub etl_queue_capacity: usize,
    pub forbidden_hosts: Vec<ipnetwork::IpNetwork>,
    pub worker_auth_token: String,
    pub dispatch_min_poll_interval: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(database_client: TursoClient, config: AppConfig) -> Self {
        let project_repository = ProjectRepository::new(database_client.clone());
        let task_repository = TaskRepository::new(database_client.clone());
        let agent_repository = AgentRepository::new(database_client.clone());
        let asset_repository = AssetRepository::new(database_client.clone());
        let tag_repository = TagRepository::new(database_client.clone());

        let policy_enforcer = PolicyEnforcer::new(config.forbidden_hosts.clone());
        let dispatch_policy_enforcer = PolicyEnforcer::new(config.forbidden_hosts.clone());
        let target_provider = TargetProvider::new(asset_repository.clone(), tag_repository.clone());
        let agent_registry = Arc::new(AgentRegistry::new(agent_repository.clone()));
        let auto_tag_engine = Arc::new(AutoTagEngine::new(tag_repository.clone()));
        let etl_pipeline = Arc::new(EtlPipeline::new(
            asset_repository.clone(),
            auto_tag_engine.clone(),
            config.etl_worker_count,
            config.etl_queue_capacity,
        ));
        let task_dispatcher = Arc::new(TaskDispatcher::new(
            task_repository.clone(),
            agent_repository.clone(),
            project_repository.clone(),
            dispatch_policy_enforcer,
            config.max_tasks_per_agent,
            config.dispatch_min_poll_interval,
        ));

        let scheduler = Arc::new(SchedulerEngine::new(
            project_repository.clone(),
            task_repository.clone(),
            agent_repository.clone(),
            target_provider,
            policy_enforcer,
            config.scheduler_tick_interval,
        ));
        scheduler.spawn();

        AgentRegistry::spawn_reaper(
            agent_repository.clone(),
            config.agent_reaper_interval,
            config.agent_stale_after_seconds,
        );

        Self {
            database_client,
            project_repository,
            task_repository,
            agent_repository,
            asset_repository,
            tag_repository,
            agent_registry,
            task_dispatcher,
            etl_pipeline,
            auto_tag_engine,
            worker_auth_token: Arc::from(config.worker_auth_token.as_str()),
            current_system_mode: Arc::new(RwLock::new(SystemMode::Operational)),
        }
    }

    #[instrument(skip(self), level = "debug")]
    pub fn is_operational(&self) -> Result<(), String> {
        match &*self.current_system_mode.read().expect("system mode lock poisoned") {
            SystemMode::Operational => Ok(()),
            SystemMode::Maintenance(reason) => Err(reason.clone()),
        }
    }

    pub fn set_mode(&self, mode: SystemMode) {
        *self.current_system_mode.write().expect("system mode lock poisoned") = mode;
    }
}
