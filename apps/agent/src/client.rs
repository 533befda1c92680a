// [apps/agent/src/client.rs]
/*!
 * APARATO: MASTER UPLINK CLIENT
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER
 * RESPONSABILIDAD: TÚNEL HTTP ENTRE EL AGENTE Y EL PLANO DE CONTROL DEL MASTER
 */

use crate::errors::AgentError;
use neoscan_domain::{
    AgentMetricsSample, AgentRegistrationRequest, AgentRegistrationResponse, HeartbeatRequest, Task,
    TaskStatusReport,
};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::instrument;

pub struct MasterClient {
    http: Client,
    base_url: String,
    /// `None` hasta el primer registro exitoso; luego se usa en cada llamada autenticada.
    token: Option<String>,
}

impl MasterClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: Client::builder()
                .user_agent(concat!("neoscan-agent/", env!("CARGO_PKG_VERSION")))
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[instrument(skip(self, request))]
    pub async fn register(&mut self, request: &AgentRegistrationRequest) -> Result<String, AgentError> {
        let url = format!("{}/api/v1/agent", self.base_url);
        let response = self.http.post(&url).json(request).send().await?;

        if response.status() != StatusCode::OK {
            return Err(AgentError::MasterRejection(format!("registration rejected: HTTP {}", response.status())));
        }

        let body: AgentRegistrationResponse = response.json().await?;
        self.token = Some(body.token.clone());
        Ok(body.agent_id)
    }

    #[instrument(skip(self, metrics))]
    pub async fn heartbeat(&self, agent_id: &str, metrics: AgentMetricsSample) -> Result<(), AgentError> {
        let url = format!("{}/api/v1/agent/heartbeat", self.base_url);
        let body = HeartbeatRequest { agent_id: agent_id.to_string(), metrics };
        let response = self.http.post(&url).json(&body).send().await?;

        if response.status() != StatusCode::OK {
            return Err(AgentError::MasterRejection(format!("heartbeat rejected: HTTP {}", response.status())));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn poll_tasks(&self, agent_id: &str, current_load: u32) -> Result<Vec<Task>, AgentError> {
        let url = format!("{}/api/v1/orchestrator/agent/{}/tasks?current_load={}", self.base_url, agent_id, current_load);
        let response = self.authenticated(self.http.get(&url)).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AgentError::Unauthorized);
        }
        if response.status() != StatusCode::OK {
            return Err(AgentError::MasterRejection(format!("poll rejected: HTTP {}", response.status())));
        }
        Ok(response.json().await?)
    }

    #[instrument(skip(self, report))]
    pub async fn report_status(&self, agent_id: &str, task_id: &str, report: &TaskStatusReport) -> Result<(), AgentError> {
        let url = format!("{}/api/v1/orchestrator/agent/{}/tasks/{}/status", self.base_url, agent_id, task_id);
        let response = self.authenticated(self.http.post(&url)).json(report).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AgentError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(AgentError::MasterRejection(format!("status report rejected: HTTP {}", response.status())));
        }
        Ok(())
    }

    fn authenticated(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn register_stores_the_issued_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/agent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "agent_id": "agent-1",
                "token": "secret-token",
                "token_expiry": chrono::Utc::now(),
            })))
            .mount(&server)
            .await;

        let mut client = MasterClient::new(server.uri());
        let request = AgentRegistrationRequest {
            hostname: "scout".into(),
            port: 7331,
            ip_address: "10.0.0.1".into(),
            os: "linux".into(),
            arch: "x86_64".into(),
            version: "0.1.0".into(),
            task_support: vec!["brute".into()],
            capabilities: vec![],
            tags: vec![],
            agent_id: None,
            token: None,
        };

        let agent_id = client.register(&request).await.unwrap();
        assert_eq!(agent_id, "agent-1");
        assert_eq!(client.token(), Some("secret-token"));
    }

    #[tokio::test]
    async fn poll_tasks_surfaces_unauthorized_as_agent_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/orchestrator/agent/agent-1/tasks"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = MasterClient::new(server.uri());
        let result = client.poll_tasks("agent-1", 0).await;
        assert!(matches!(result, Err(AgentError::Unauthorized)));
    }
}
