// [apps/agent/src/crackers/postgres.rs]
//! PostgreSQL wire protocol v3: `StartupMessage` → `AuthenticationRequest`.
//! Sólo el modo `cleartext` (code 3) se completa; `md5`/`scram` (no hay
//! `md5`/`sha2` en el árbol de dependencias) se reportan como protocolo
//! reconocido pero no verificable y abortan el intento sin penalizar el límite.

use super::support::{connect, read_some, write_all};
use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::Instant;

pub struct PostgresCracker;

fn startup_message(user: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&196608i32.to_be_bytes()); // protocol version 3.0
    body.extend_from_slice(b"user\0");
    body.extend_from_slice(user.as_bytes());
    body.push(0);
    body.extend_from_slice(b"database\0");
    body.extend_from_slice(user.as_bytes());
    body.push(0);
    body.push(0);

    let mut packet = Vec::with_capacity(body.len() + 4);
    packet.extend_from_slice(&((body.len() + 4) as i32).to_be_bytes());
    packet.extend_from_slice(&body);
    packet
}

fn password_message(password: &str) -> Vec<u8> {
    let mut packet = vec![b'p'];
    let len = (password.len() + 5) as i32;
    packet.extend_from_slice(&len.to_be_bytes());
    packet.extend_from_slice(password.as_bytes());
    packet.push(0);
    packet
}

#[async_trait]
impl Cracker for PostgresCracker {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::UserPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, auth: &Auth) -> CheckOutcome {
        let mut stream = match connect(host, port, deadline).await {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };

        if write_all(&mut stream, &startup_message(&auth.username), deadline).await.is_err() {
            return CheckOutcome::ConnectionFailed;
        }

        let reply = match read_some(&mut stream, 4096, deadline).await {
            Ok(bytes) => bytes,
            Err(outcome) => return outcome,
        };

        if reply.first() != Some(&b'R') || reply.len() < 9 {
            return CheckOutcome::ProtocolError;
        }
        let auth_code = i32::from_be_bytes([reply[5], reply[6], reply[7], reply[8]]);

        match auth_code {
            0 => CheckOutcome::Success, // AuthenticationOk — no password required
            3 => {
                if write_all(&mut stream, &password_message(&auth.password), deadline).await.is_err() {
                    return CheckOutcome::ConnectionFailed;
                }
                let final_reply = match read_some(&mut stream, 4096, deadline).await {
                    Ok(bytes) => bytes,
                    Err(outcome) => return outcome,
                };
                match final_reply.first() {
                    Some(b'R') => CheckOutcome::Success,
                    Some(b'E') => CheckOutcome::AuthFailed,
                    _ => CheckOutcome::ProtocolError,
                }
            }
            _ => CheckOutcome::ProtocolError,
        }
    }
}
