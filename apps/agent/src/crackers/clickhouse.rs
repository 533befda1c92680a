// [apps/agent/src/crackers/clickhouse.rs]
//! Protocolo nativo de ClickHouse: el paquete `Hello` del cliente porta
//! usuario/contraseña en claro (salvo `interserver_secret`/TLS, fuera de
//! alcance aquí). `Exception` (código 0x02) con `AUTHENTICATION_FAILED`
//! (code 516) distingue credenciales erróneas de otros rechazos.

use super::support::{connect, read_some, write_all};
use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::Instant;

pub struct ClickhouseCracker;

fn write_varuint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn write_string(out: &mut Vec<u8>, value: &str) {
    write_varuint(out, value.len() as u64);
    out.extend_from_slice(value.as_bytes());
}

fn hello_packet(username: &str, password: &str) -> Vec<u8> {
    let mut packet = Vec::new();
    write_varuint(&mut packet, 0); // Hello packet type
    write_string(&mut packet, "neoscan-agent");
    write_varuint(&mut packet, 22); // client version major
    write_varuint(&mut packet, 8); // client version minor
    write_varuint(&mut packet, 54428); // protocol revision
    write_string(&mut packet, "default"); // database
    write_string(&mut packet, username);
    write_string(&mut packet, password);
    packet
}

#[async_trait]
impl Cracker for ClickhouseCracker {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::UserPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, auth: &Auth) -> CheckOutcome {
        let mut stream = match connect(host, port, deadline).await {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };

        let hello = hello_packet(&auth.username, &auth.password);
        if write_all(&mut stream, &hello, deadline).await.is_err() {
            return CheckOutcome::ConnectionFailed;
        }

        let reply = match read_some(&mut stream, 4096, deadline).await {
            Ok(bytes) => bytes,
            Err(outcome) => return outcome,
        };
        if reply.is_empty() {
            return CheckOutcome::ProtocolError;
        }

        match reply[0] {
            0 => CheckOutcome::Success, // server Hello back
            2 => {
                let text = String::from_utf8_lossy(&reply);
                if text.contains("Authentication failed") || text.contains("AUTHENTICATION_FAILED") {
                    CheckOutcome::AuthFailed
                } else {
                    CheckOutcome::ProtocolError
                }
            }
            _ => CheckOutcome::ProtocolError,
        }
    }
}
