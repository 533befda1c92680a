// [apps/agent/src/crackers/ftp.rs]
//! FTP (RFC 959): `USER`/`PASS` en claro. `230` autentica, `530` rechaza.

use super::support::{read_line, write_all};
use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::Instant;

pub struct FtpCracker;

#[async_trait]
impl Cracker for FtpCracker {
    fn name(&self) -> &'static str {
        "ftp"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::UserPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, auth: &Auth) -> CheckOutcome {
        let mut stream = match super::support::connect(host, port, deadline).await {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };

        let banner = match read_line(&mut stream, deadline).await {
            Ok(line) => line,
            Err(outcome) => return outcome,
        };
        if !banner.starts_with("220") {
            return CheckOutcome::ProtocolError;
        }

        if write_all(&mut stream, format!("USER {}\r\n", auth.username).as_bytes(), deadline)
            .await
            .is_err()
        {
            return CheckOutcome::ConnectionFailed;
        }
        let user_reply = match read_line(&mut stream, deadline).await {
            Ok(line) => line,
            Err(outcome) => return outcome,
        };
        if !(user_reply.starts_with("331") || user_reply.starts_with("230")) {
            return CheckOutcome::ProtocolError;
        }
        if user_reply.starts_with("230") {
            return CheckOutcome::Success;
        }

        if write_all(&mut stream, format!("PASS {}\r\n", auth.password).as_bytes(), deadline)
            .await
            .is_err()
        {
            return CheckOutcome::ConnectionFailed;
        }
        let pass_reply = match read_line(&mut stream, deadline).await {
            Ok(line) => line,
            Err(outcome) => return outcome,
        };

        if pass_reply.starts_with("230") {
            CheckOutcome::Success
        } else if pass_reply.starts_with("530") {
            CheckOutcome::AuthFailed
        } else {
            CheckOutcome::ProtocolError
        }
    }
}
