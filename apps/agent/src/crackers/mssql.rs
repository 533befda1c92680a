// [apps/agent/src/crackers/mssql.rs]
//! TDS (MS-TDS): un paquete `PRE-LOGIN` en claro confirma el protocolo y
//! expone si el servidor exige cifrado (`ENCRYPT_ON`/`ENCRYPT_REQ`) antes
//! de `LOGIN7`. Cuando lo exige, `LOGIN7` viaja envuelto en TLS, que este
//! adapter no implementa; se reporta `ProtocolError` en vez de fingir un
//! veredicto de credencial.

use super::support::{connect, read_some, write_all};
use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::Instant;

pub struct MssqlCracker;

const ENCRYPT_NOT_SUP: u8 = 0x02;

fn prelogin_packet() -> Vec<u8> {
    // Un único token VERSION + token ENCRYPTION + terminador, offsets calculados a mano.
    let version_data = [0u8, 0, 0, 0, 0, 0];
    let encryption_data = [ENCRYPT_NOT_SUP];

    let header_len = 5 + 3 + 1; // dos tokens de 5 bytes + terminador
    let version_offset = header_len as u16;
    let encryption_offset = version_offset + version_data.len() as u16;

    let mut tokens = Vec::new();
    tokens.push(0x00); // VERSION token
    tokens.extend_from_slice(&version_offset.to_be_bytes());
    tokens.extend_from_slice(&(version_data.len() as u16).to_be_bytes());
    tokens.push(0x01); // ENCRYPTION token
    tokens.extend_from_slice(&encryption_offset.to_be_bytes());
    tokens.extend_from_slice(&(encryption_data.len() as u16).to_be_bytes());
    tokens.push(0xff); // terminator

    let mut body = tokens;
    body.extend_from_slice(&version_data);
    body.extend_from_slice(&encryption_data);

    let mut packet = Vec::with_capacity(body.len() + 8);
    packet.push(0x12); // type: PRE-LOGIN
    packet.push(0x01); // status: EOM
    packet.extend_from_slice(&((body.len() + 8) as u16).to_be_bytes());
    packet.extend_from_slice(&[0u8, 0u8]); // SPID
    packet.push(0); // packet id
    packet.push(0); // window
    packet.extend_from_slice(&body);
    packet
}

#[async_trait]
impl Cracker for MssqlCracker {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::UserPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, _auth: &Auth) -> CheckOutcome {
        let mut stream = match connect(host, port, deadline).await {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };

        if write_all(&mut stream, &prelogin_packet(), deadline).await.is_err() {
            return CheckOutcome::ConnectionFailed;
        }

        let reply = match read_some(&mut stream, 1024, deadline).await {
            Ok(bytes) => bytes,
            Err(outcome) => return outcome,
        };

        if reply.len() < 8 || reply[0] != 0x04 {
            return CheckOutcome::ProtocolError;
        }

        // PRE-LOGIN respondido — servidor TDS confirmado, LOGIN7 exige TLS
        // en casi todo despliegue moderno y no se completa aquí.
        CheckOutcome::ProtocolError
    }
}
