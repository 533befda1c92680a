// [apps/master/src/core/policy.rs]
/*!
 * APARATO: POLICY ENFORCER
 * CLASIFICACIÓN: ORCHESTRATION CORE
 * RESPONSABILIDAD: COMPUERTA DE ALLOW/DENY SOBRE TASKS INDIVIDUALES
 *
 * Consultado dos veces por el mismo Task: antes de persistir (por el
 * Scheduler) y antes de reclamar (por el Dispatcher). El rechazo nunca es
 * silencioso — el llamador persiste el Task como `failed` con el motivo.
 */

use ipnetwork::IpNetwork;
use neoscan_domain::{Agent, Project, Task};
use tracing::debug;

pub struct PolicyEnforcer {
    forbidden_hosts: Vec<IpNetwork>,
}

impl PolicyEnforcer {
    #[must_use]
    pub fn new(forbidden_hosts: Vec<IpNetwork>) -> Self {
        Self { forbidden_hosts }
    }

    /// Verifica un Task contra el alcance del proyecto, la lista de hosts
    /// prohibidos y la satisfacibilidad de `required_tags` por algún Agente.
    ///
    /// # Errors
    /// Devuelve el motivo de rechazo como `String` ya formateado con el
    /// prefijo `"Policy violation: "`.
    pub fn enforce(&self, project: &Project, task: &Task, online_agents: &[Agent]) -> Result<(), String> {
        for target in &task.input_target {
            if !Self::within_scope(target, &project.target_scope) {
                return Err(format!("Policy violation: target {target} is outside the declared scope"));
            }
            if self.is_forbidden(target) {
                return Err(format!("Policy violation: target {target} matches a forbidden host/CIDR"));
            }
        }

        if !task.required_tags.is_empty()
            && !online_agents.iter().any(|agent| agent.satisfies(&task.required_tags))
        {
            return Err(format!(
                "Policy violation: required tags {:?} are not satisfiable by any online agent",
                task.required_tags
            ));
        }

        debug!(task_id = %task.task_id, "task accepted by policy enforcer");
        Ok(())
    }

    fn is_forbidden(&self, target: &str) -> bool {
        let Ok(target_ip) = target.parse::<std::net::IpAddr>() else {
            return false;
        };
        self.forbidden_hosts.iter().any(|network| network.contains(target_ip))
    }

    /// Un target está en alcance si coincide literalmente con una entrada de
    /// `target_scope`, o si cae dentro de una entrada que parsea como CIDR.
    fn within_scope(target: &str, target_scope: &[String]) -> bool {
        if target_scope.iter().any(|seed| seed == target) {
            return true;
        }
        let Ok(target_ip) = target.parse::<std::net::IpAddr>() else {
            return false;
        };
        target_scope
            .iter()
            .filter_map(|seed| seed.parse::<IpNetwork>().ok())
            .any(|network| network.contains(target_ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neoscan_domain::{ProjectStatus, TaskCategory, TaskStatus};
    use chrono::Utc;

    fn sample_project(target_scope: Vec<String>) -> Project {
        Project {
            project_id: "proj-1".into(),
            owner_identifier: "owner".into(),
            display_name: "Sample".into(),
            target_scope,
            workflow_id: "wf-1".into(),
            cron_expr: None,
            status: ProjectStatus::Running,
            last_exec_time: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_task(input_target: Vec<String>, required_tags: Vec<String>) -> Task {
        Task {
            task_id: "task-1".into(),
            project_id: "proj-1".into(),
            workflow_id: "wf-1".into(),
            stage_id: "stage-1".into(),
            status: TaskStatus::Pending,
            priority: 0,
            tool_name: "port_scan".into(),
            tool_params: String::new(),
            input_target,
            required_tags,
            task_category: TaskCategory::User,
            assigned_agent_id: None,
            output_result: None,
            error_msg: None,
            timeout_seconds: 300,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_target_outside_scope() {
        let enforcer = PolicyEnforcer::new(vec![]);
        let project = sample_project(vec!["10.0.0.0/24".into()]);
        let task = sample_task(vec!["192.168.1.1".into()], vec![]);
        let err = enforcer.enforce(&project, &task, &[]).unwrap_err();
        assert!(err.starts_with("Policy violation:"));
    }

    #[test]
    fn accepts_target_within_cidr_scope() {
        let enforcer = PolicyEnforcer::new(vec![]);
        let project = sample_project(vec!["10.0.0.0/24".into()]);
        let task = sample_task(vec!["10.0.0.5".into()], vec![]);
        assert!(enforcer.enforce(&project, &task, &[]).is_ok());
    }
}
