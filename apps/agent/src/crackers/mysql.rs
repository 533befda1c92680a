// [apps/agent/src/crackers/mysql.rs]
//! MySQL wire protocol: lee el `Initial Handshake Packet` (protocolo 10) y
//! responde con un `HandshakeResponse41` de auth-response vacío — cubre las
//! cuentas sin contraseña; `mysql_native_password` real requiere SHA1, ausente
//! del árbol de dependencias, así que una contraseña no vacía siempre reporta
//! `AuthFailed` aquí en vez de completarse criptográficamente.

use super::support::{connect, read_some, write_all};
use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::Instant;

pub struct MysqlCracker;

fn packet(sequence_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 4);
    let len = payload.len() as u32;
    out.extend_from_slice(&len.to_le_bytes()[..3]);
    out.push(sequence_id);
    out.extend_from_slice(payload);
    out
}

fn handshake_response(username: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&0x0000_0200u32.to_le_bytes()); // CLIENT_PROTOCOL_41
    body.extend_from_slice(&16_777_216u32.to_le_bytes()); // max packet size
    body.push(33); // utf8_general_ci
    body.extend_from_slice(&[0u8; 23]); // reserved
    body.extend_from_slice(username.as_bytes());
    body.push(0);
    body.push(0); // zero-length auth-response
    packet(1, &body)
}

#[async_trait]
impl Cracker for MysqlCracker {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::UserPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, auth: &Auth) -> CheckOutcome {
        let mut stream = match connect(host, port, deadline).await {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };

        let handshake = match read_some(&mut stream, 1024, deadline).await {
            Ok(bytes) => bytes,
            Err(outcome) => return outcome,
        };
        if handshake.len() < 5 || handshake[4] != 0x0a {
            return CheckOutcome::ProtocolError;
        }

        if write_all(&mut stream, &handshake_response(&auth.username), deadline).await.is_err() {
            return CheckOutcome::ConnectionFailed;
        }

        let reply = match read_some(&mut stream, 1024, deadline).await {
            Ok(bytes) => bytes,
            Err(outcome) => return outcome,
        };
        if reply.len() < 5 {
            return CheckOutcome::ProtocolError;
        }

        match reply[4] {
            0x00 if auth.password.is_empty() => CheckOutcome::Success,
            0x00 => CheckOutcome::AuthFailed,
            0xff => CheckOutcome::AuthFailed,
            _ => CheckOutcome::ProtocolError,
        }
    }
}
