// [apps/agent/src/crackers/telnet.rs]
//! Telnet: sin negociación IAC (la mayoría de demonios la toleran omitida).
//! Se busca el prompt `login:`/`Password:` y se evalúa el eco posterior.

use super::support::{read_line, write_all};
use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::Instant;

pub struct TelnetCracker;

#[async_trait]
impl Cracker for TelnetCracker {
    fn name(&self) -> &'static str {
        "telnet"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::UserPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, auth: &Auth) -> CheckOutcome {
        let mut stream = match super::support::connect(host, port, deadline).await {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };

        let prompt = match read_line(&mut stream, deadline).await {
            Ok(line) => line,
            Err(outcome) => return outcome,
        };
        if !prompt.to_lowercase().contains("login") && !prompt.to_lowercase().contains("username") {
            return CheckOutcome::ProtocolError;
        }

        if write_all(&mut stream, format!("{}\r\n", auth.username).as_bytes(), deadline)
            .await
            .is_err()
        {
            return CheckOutcome::ConnectionFailed;
        }

        let password_prompt = match read_line(&mut stream, deadline).await {
            Ok(line) => line,
            Err(outcome) => return outcome,
        };
        if !password_prompt.to_lowercase().contains("password") {
            return CheckOutcome::ProtocolError;
        }

        if write_all(&mut stream, format!("{}\r\n", auth.password).as_bytes(), deadline)
            .await
            .is_err()
        {
            return CheckOutcome::ConnectionFailed;
        }

        let post_auth = match read_line(&mut stream, deadline).await {
            Ok(line) => line,
            Err(outcome) => return outcome,
        };
        let lowered = post_auth.to_lowercase();

        if lowered.contains("incorrect") || lowered.contains("denied") || lowered.contains("failed") {
            CheckOutcome::AuthFailed
        } else if lowered.is_empty() {
            CheckOutcome::ProtocolError
        } else {
            CheckOutcome::Success
        }
    }
}
