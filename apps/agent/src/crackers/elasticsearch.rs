// [apps/agent/src/crackers/elasticsearch.rs]
//! Elasticsearch: HTTP Basic sobre la API REST. `200` autentica, `401` rechaza.

use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::{Duration, Instant};

pub struct ElasticsearchCracker;

#[async_trait]
impl Cracker for ElasticsearchCracker {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::UserPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, auth: &Auth) -> CheckOutcome {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return CheckOutcome::ConnectionFailed;
        }

        let client = match reqwest::Client::builder().timeout(remaining.min(Duration::from_secs(5))).build() {
            Ok(client) => client,
            Err(_) => return CheckOutcome::ConnectionFailed,
        };

        let url = format!("http://{host}:{port}/_cluster/health");
        let response = client
            .get(&url)
            .basic_auth(&auth.username, Some(&auth.password))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().as_u16() == 200 => CheckOutcome::Success,
            Ok(resp) if resp.status().as_u16() == 401 || resp.status().as_u16() == 403 => CheckOutcome::AuthFailed,
            Ok(_) => CheckOutcome::ProtocolError,
            Err(_) => CheckOutcome::ConnectionFailed,
        }
    }
}
