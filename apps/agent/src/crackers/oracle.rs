// [apps/agent/src/crackers/oracle.rs]
//! Oracle Net (TNS): un paquete `CONNECT` con el descriptor de conexión
//! confirma el listener; `ACCEPT` (tipo 2) reconoce el protocolo. El
//! login real (O3LOGON/O5LOGON) exige 3DES/AES y no se completa aquí
//! por la misma razón documentada en `ssh.rs`.

use super::support::{connect, read_some, write_all};
use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::Instant;

pub struct OracleCracker;

fn connect_packet(host: &str, port: u16) -> Vec<u8> {
    let descriptor = format!(
        "(DESCRIPTION=(CONNECT_DATA=(SERVICE_NAME=ORCL))(ADDRESS=(PROTOCOL=TCP)(HOST={host})(PORT={port})))"
    );
    let mut packet = Vec::with_capacity(descriptor.len() + 8);
    packet.extend_from_slice(&((descriptor.len() + 8) as u16).to_be_bytes());
    packet.extend_from_slice(&[0u8, 0u8]); // packet checksum (unused)
    packet.push(0x01); // type: CONNECT
    packet.push(0); // reserved
    packet.extend_from_slice(&[0u8, 0u8]); // header checksum (unused)
    packet.extend_from_slice(descriptor.as_bytes());
    packet
}

#[async_trait]
impl Cracker for OracleCracker {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::UserPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, _auth: &Auth) -> CheckOutcome {
        let mut stream = match connect(host, port, deadline).await {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };

        if write_all(&mut stream, &connect_packet(host, port), deadline).await.is_err() {
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
            0x02 => CheckOutcome::ProtocolError, // ACCEPT — listener confirmed, login unverifiable
            0x04 => CheckOutcome::ProtocolError, // REFUSE
            _ => CheckOutcome::ProtocolError,
        }
    }
}
