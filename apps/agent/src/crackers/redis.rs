// [apps/agent/src/crackers/redis.rs]
//! Redis RESP: `AUTH <password>\r\n` → `+OK\r\n` o `-ERR ...\r\n`. `OnlyPass`:
//! el usuario del Dictionary Manager es irrelevante para este protocolo.

use super::support::{read_line, write_all};
use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::Instant;

pub struct RedisCracker;

#[async_trait]
impl Cracker for RedisCracker {
    fn name(&self) -> &'static str {
        "redis"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::OnlyPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, auth: &Auth) -> CheckOutcome {
        let mut stream = match super::support::connect(host, port, deadline).await {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };

        let command = format!("AUTH {}\r\n", auth.password);
        if write_all(&mut stream, command.as_bytes(), deadline).await.is_err() {
            return CheckOutcome::ConnectionFailed;
        }

        let reply = match read_line(&mut stream, deadline).await {
            Ok(line) => line,
            Err(outcome) => return outcome,
        };

        if reply.starts_with("+OK") {
            CheckOutcome::Success
        } else if reply.starts_with("-ERR") || reply.starts_with("-WRONGPASS") || reply.starts_with("-NOAUTH") {
            CheckOutcome::AuthFailed
        } else {
            CheckOutcome::ProtocolError
        }
    }
}
