// [apps/master/src/core/scheduler.rs]
/*!
 * APARATO: SCHEDULER ENGINE
 * CLASIFICACIÓN: ORCHESTRATION CORE
 * RESPONSABILIDAD: AVANCE DEL DAG DE STAGES DE CADA PROYECTO EN EJECUCIÓN
 *
 * Un tick por Proyecto schedulable: decide si es hora de disparar (cron),
 * calcula qué Stages ya ejecutaron, cuáles están listas (predecesores
 * satisfechos) y genera/enforce/persiste sus Tasks. Nunca bloquea sobre
 * un Proyecto mientras evalúa los demás — cada uno es independiente.
 */

use crate::core::policy::PolicyEnforcer;
use crate::core::target_provider::TargetProvider;
use crate::core::task_generator::TaskGenerator;
use chrono::Utc;
use neoscan_domain::{Project, ProjectStatus, Stage};
use neoscan_persistence::{AgentRepository, ProjectRepository, TaskRepository};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

pub struct SchedulerEngine {
    project_repository: ProjectRepository,
    task_repository: TaskRepository,
    agent_repository: AgentRepository,
    target_provider: TargetProvider,
    policy_enforcer: PolicyEnforcer,
    tick_interval: Duration,
}

impl SchedulerEngine {
    #[must_use]
    pub fn new(
        project_repository: ProjectRepository,
        task_repository: TaskRepository,
        agent_repository: AgentRepository,
        target_provider: TargetProvider,
        policy_enforcer: PolicyEnforcer,
        tick_interval: Duration,
    ) -> Self {
        Self {
            project_repository,
            task_repository,
            agent_repository,
            target_provider,
            policy_enforcer,
            tick_interval,
        }
    }

    /// Lanza el daemon de ticks periódicos del Scheduler.
    pub fn spawn(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.tick_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        });
    }

    #[instrument(skip(self))]
    async fn tick(&self) {
        let projects = match self.project_repository.list_schedulable_projects().await {
            Ok(projects) => projects,
            Err(err) => {
                error!(error = %err, "failed to list schedulable projects");
                return;
            }
        };

        for project in projects {
            if let Err(err) = self.process_project(&project).await {
                error!(project_id = %project.project_id, error = %err, "project tick failed");
            }
        }
    }

    /// Ejecuta el algoritmo de avance del DAG para un único Proyecto.
    async fn process_project(&self, project: &Project) -> Result<(), String> {
        if project.status == ProjectStatus::Running && !self.is_due(project) {
            return Ok(());
        }
        if project.status != ProjectStatus::Running {
            return Ok(());
        }

        let workflow_id = project.workflow_id.clone();
        let stages = self
            .project_repository
            .list_stages_for_workflow(&workflow_id)
            .await
            .map_err(|e| e.to_string())?;

        let executed_stage_ids = self
            .project_repository
            .executed_stage_ids(&project.project_id)
            .await
            .map_err(|e| e.to_string())?;

        let mut non_terminal_total = 0i64;
        let mut any_failure = false;
        for stage in &stages {
            if executed_stage_ids.contains(&stage.stage_id) {
                non_terminal_total += self
                    .task_repository
                    .count_non_terminal_for_stage(&stage.stage_id)
                    .await
                    .map_err(|e| e.to_string())?;
                if self
                    .task_repository
                    .stage_has_failure(&stage.stage_id)
                    .await
                    .map_err(|e| e.to_string())?
                {
                    any_failure = true;
                }
            }
        }

        if any_failure {
            self.project_repository
                .update_project_status(&project.project_id, ProjectStatus::Error)
                .await
                .map_err(|e| e.to_string())?;
            warn!(project_id = %project.project_id, "project moved to error: a stage reported failure");
            return Ok(());
        }

        if non_terminal_total > 0 {
            return Ok(());
        }

        let ready_stages: Vec<&Stage> = stages
            .iter()
            .filter(|stage| {
                !executed_stage_ids.contains(&stage.stage_id)
                    && stage.predecessors.iter().all(|p| executed_stage_ids.contains(p))
            })
            .collect();

        if ready_stages.is_empty() && non_terminal_total == 0 {
            self.project_repository
                .update_project_status(&project.project_id, ProjectStatus::Finished)
                .await
                .map_err(|e| e.to_string())?;
            info!(project_id = %project.project_id, "project finished: no ready stages, no pending work");
            self.project_repository
                .set_last_exec_time(&project.project_id, Utc::now())
                .await
                .map_err(|e| e.to_string())?;
            return Ok(());
        }

        let online_agents = self
            .agent_repository
            .list_online_agents()
            .await
            .map_err(|e| e.to_string())?;

        for stage in ready_stages {
            let targets = self.target_provider.resolve(project, stage).await;
            let tasks = TaskGenerator::generate(stage, &project.project_id, &targets);

            for task in tasks {
                if let Err(reason) = self.policy_enforcer.enforce(project, &task, &online_agents) {
                    warn!(project_id = %project.project_id, stage_id = %stage.stage_id, reason = %reason, "task rejected by policy at generation time");
                    continue;
                }
                self.task_repository.create_task(&task).await.map_err(|e| e.to_string())?;
            }
        }

        self.project_repository
            .set_last_exec_time(&project.project_id, Utc::now())
            .await
            .map_err(|e| e.to_string())?;

        Ok(())
    }

    /// `true` si el disparo programado ya venció respecto a `max(last_exec_time, created_at)`.
    /// Un proyecto sin `cron_expr` siempre está "due": su único disparo es manual,
    /// y una vez `Running` el Scheduler lo hace avanzar en cada tick.
    fn is_due(&self, project: &Project) -> bool {
        let Some(cron_expr) = &project.cron_expr else {
            return true;
        };
        let Ok(schedule) = cron::Schedule::from_str(cron_expr) else {
            warn!(project_id = %project.project_id, cron_expr = %cron_expr, "invalid cron expression, treating as always due");
            return true;
        };
        let baseline = project.last_exec_time.unwrap_or(project.created_at);
        schedule
            .after(&baseline)
            .next()
            .map(|next_fire| next_fire <= Utc::now())
            .unwrap_or(false)
    }
}
