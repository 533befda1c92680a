// [apps/agent/src/crackers/rdp.rs]
//! RDP (MS-RDPBCP): la negociación X.224 `Connection Request`/`Connection
//! Confirm` es texto plano y confirma el protocolo y el modo de seguridad
//! que ofrece el servidor. La capa de credenciales real (NLA/CredSSP)
//! corre sobre SPNEGO+TLS y no se completa aquí por la misma razón
//! documentada en `ssh.rs`.

use super::support::{connect, read_some, write_all};
use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::Instant;

pub struct RdpCracker;

/// TPKT + X.224 Connection Request solicitando protocolos SSL y CredSSP (Hybrid).
fn connection_request() -> Vec<u8> {
    let rdp_neg_req = [0x01u8, 0x00, 0x08, 0x00, 0x03, 0x00, 0x00, 0x00]; // PROTOCOL_SSL | PROTOCOL_HYBRID
    let mut x224 = vec![0x0eu8, 0xe0, 0x00, 0x00, 0x00, 0x00, 0x00];
    x224.extend_from_slice(&rdp_neg_req);

    let mut packet = Vec::with_capacity(x224.len() + 5);
    packet.push(0x03); // TPKT version
    packet.push(0x00); // reserved
    packet.extend_from_slice(&((x224.len() + 4) as u16).to_be_bytes());
    packet.extend_from_slice(&x224);
    packet
}

#[async_trait]
impl Cracker for RdpCracker {
    fn name(&self) -> &'static str {
        "rdp"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::UserPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, _auth: &Auth) -> CheckOutcome {
        let mut stream = match connect(host, port, deadline).await {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };

        if write_all(&mut stream, &connection_request(), deadline).await.is_err() {
            return CheckOutcome::ConnectionFailed;
        }

        let reply = match read_some(&mut stream, 512, deadline).await {
            Ok(bytes) => bytes,
            Err(outcome) => return outcome,
        };

        if reply.len() >= 7 && reply[0] == 0x03 && reply[5] == 0xd0 {
            // Connection Confirm — protocolo y modo de seguridad acordados,
            // credenciales solo verificables vía NLA/CredSSP.
            CheckOutcome::ProtocolError
        } else {
            CheckOutcome::ProtocolError
        }
    }
}
