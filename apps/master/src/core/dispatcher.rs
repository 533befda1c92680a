// [apps/master/src/core/dispatcher.rs]
/*!
 * APARATO: TASK DISPATCHER
 * CLASIFICACIÓN: ORCHESTRATION CORE
 * RESPONSABILIDAD: ASIGNACIÓN PULL DE TASKS PENDIENTES A UN AGENTE QUE PIDE TRABAJO
 *
 * El Agente reporta su carga actual en cada poll; el Dispatcher nunca
 * adivina cuántas Tasks tiene en vuelo. La concesión real de cada Task
 * pasa por el CAS de `claim_task` — una derrota de carrera aquí no es
 * un error, sencillamente se intenta con el siguiente candidato.
 */

use crate::core::policy::PolicyEnforcer;
use crate::errors::MasterError;
use neoscan_domain::{Agent, Task};
use neoscan_persistence::{AgentRepository, DbError, ProjectRepository, TaskRepository};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{instrument, warn};

pub struct TaskDispatcher {
    task_repository: TaskRepository,
    agent_repository: AgentRepository,
    project_repository: ProjectRepository,
    policy_enforcer: PolicyEnforcer,
    max_tasks_per_agent: u32,
    min_poll_interval: Duration,
    last_dispatch: Mutex<HashMap<String, Instant>>,
}

impl TaskDispatcher {
    #[must_use]
    pub fn new(
        task_repository: TaskRepository,
        agent_repository: AgentRepository,
        project_repository: ProjectRepository,
        policy_enforcer: PolicyEnforcer,
        max_tasks_per_agent: u32,
        min_poll_interval: Duration,
    ) -> Self {
        Self {
            task_repository,
            agent_repository,
            project_repository,
            policy_enforcer,
            max_tasks_per_agent,
            min_poll_interval,
            last_dispatch: Mutex::new(HashMap::new()),
        }
    }

    /// Límite de tasa local al Dispatcher: un Agente que pide trabajo más seguido
    /// que `min_poll_interval` es denegado sin tocar el repositorio de Tasks.
    fn rate_limit_allows(&self, agent_id: &str) -> bool {
        let now = Instant::now();
        let mut last_dispatch = self.last_dispatch.lock();
        match last_dispatch.get(agent_id) {
            Some(last) if now.duration_since(*last) < self.min_poll_interval => false,
            _ => {
                last_dispatch.insert(agent_id.to_string(), now);
                true
            }
        }
    }

    /// Despacha hasta `max_tasks_per_agent - current_load` Tasks al Agente que pide
    /// trabajo. `current_load` viaja en la petición de poll: el Dispatcher
    /// no mantiene su propio conteo de Tasks en vuelo por Agente.
    #[instrument(skip(self))]
    pub async fn dispatch(&self, agent_id: &str, current_load: u32) -> Result<Vec<Task>, MasterError> {
        if !self.rate_limit_allows(agent_id) {
            warn!(agent_id, "dispatch denied by dispatcher-local rate limit");
            return Ok(Vec::new());
        }

        let agent = self
            .agent_repository
            .get_agent(agent_id)
            .await
            .map_err(|_| MasterError::AgentNotFound)?;

        let needed = self.max_tasks_per_agent.saturating_sub(current_load);
        if needed == 0 {
            return Ok(Vec::new());
        }

        let online_agents = self.agent_repository.list_online_agents().await?;
        let mut claimed = Vec::new();
        let mut exhausted = false;

        while claimed.len() < needed as usize && !exhausted {
            let remaining = needed as usize - claimed.len();
            let candidates = self
                .task_repository
                .list_pending_candidates((remaining as i64) * 3)
                .await?;

            if candidates.is_empty() {
                break;
            }

            let mut made_progress = false;
            for task in candidates {
                if claimed.len() >= needed as usize {
                    break;
                }
                if !agent.satisfies(&task.required_tags) {
                    continue;
                }
                if !self.task_is_policy_compliant(&agent, &task, &online_agents).await {
                    continue;
                }
                match self.task_repository.claim_task(&task.task_id, agent_id).await {
                    Ok(claimed_task) => {
                        claimed.push(claimed_task);
                        made_progress = true;
                    }
                    Err(DbError::ClaimConflict) => continue,
                    Err(other) => return Err(other.into()),
                }
            }

            if !made_progress {
                exhausted = true;
            }
        }

        Ok(claimed)
    }

    async fn task_is_policy_compliant(&self, _agent: &Agent, task: &Task, online_agents: &[Agent]) -> bool {
        let Ok(project) = self.project_repository.get_project(&task.project_id).await else {
            warn!(task_id = %task.task_id, "dispatcher could not load owning project, skipping candidate");
            return false;
        };
        self.policy_enforcer.enforce(&project, task, online_agents).is_ok()
    }
}
