// [apps/agent/src/crackers/ssh.rs]
//! SSH (RFC 4253): el intercambio de versión es texto plano, pero la
//! autenticación real vive detrás del key-exchange y el cifrado de
//! transporte (Diffie-Hellman, AES/ChaCha20) que RFC 4252 exige antes
//! de aceptar ninguna credencial — no hay librería criptográfica en el
//! árbol de dependencias del Agente para completar ese handshake.
//! Un banner SSH confirmado es igual de real que un login prompt de
//! telnet: el target existe y habla el protocolo, así que el adapter
//! no lo aborta. Cada intento reporta `ConnectionFailed` en vez de
//! inventar un veredicto de credencial — alimenta el backoff del
//! limiter y deja que el Brute Scanner siga con el siguiente candidato
//! hasta agotar el diccionario o el deadline del target.

use super::support::{read_line, write_all};
use super::{CheckOutcome, Cracker};
use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode};
use std::time::Instant;

pub struct SshCracker;

#[async_trait]
impl Cracker for SshCracker {
    fn name(&self) -> &'static str {
        "ssh"
    }

    fn mode(&self) -> AuthMode {
        AuthMode::UserPass
    }

    async fn check(&self, deadline: Instant, host: &str, port: u16, _auth: &Auth) -> CheckOutcome {
        let mut stream = match super::support::connect(host, port, deadline).await {
            Ok(s) => s,
            Err(outcome) => return outcome,
        };

        let banner = match read_line(&mut stream, deadline).await {
            Ok(line) => line,
            Err(outcome) => return outcome,
        };
        if !banner.starts_with("SSH-") {
            return CheckOutcome::ProtocolError;
        }

        if write_all(&mut stream, b"SSH-2.0-neoscan-agent\r\n", deadline).await.is_err() {
            return CheckOutcome::ConnectionFailed;
        }

        CheckOutcome::ConnectionFailed
    }
}
