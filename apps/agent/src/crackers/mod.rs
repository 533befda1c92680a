// [apps/agent/src/crackers/mod.rs]
/*!
 * APARATO: CRACKER REGISTRY & TRAIT
 * CLASIFICACIÓN: WORKER PROTOCOL ADAPTERS
 * RESPONSABILIDAD: CONTRATO COMÚN DE VERIFICACIÓN DE CREDENCIALES POR PROTOCOLO
 *
 * Cada adapter posee un deadline corto (3-5s) y nunca bloquea indefinidamente:
 * toda E/S de red pasa por `support::connect_with_deadline`/`read_with_deadline`.
 */

pub mod clickhouse;
pub mod elasticsearch;
pub mod ftp;
pub mod mongodb;
pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod rdp;
pub mod redis;
pub mod registry;
pub mod smb;
pub mod snmp;
pub mod ssh;
pub mod support;
pub mod telnet;

use async_trait::async_trait;
use neoscan_domain::{Auth, AuthMode, ErrorKind};
use std::time::Instant;

/// Resultado de un único intento de credencial contra un protocolo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Success,
    /// Credencial incorrecta; el Brute Scanner continúa con la siguiente.
    AuthFailed,
    /// Falla de red; alimenta `OnFailure()` del Adaptive Limiter.
    ConnectionFailed,
    /// Protocolo no reconocido en la respuesta; el Brute Scanner aborta este target.
    ProtocolError,
}

impl CheckOutcome {
    pub fn as_error_kind(&self) -> Option<ErrorKind> {
        match self {
            CheckOutcome::Success => None,
            CheckOutcome::AuthFailed => Some(ErrorKind::AuthFailed),
            CheckOutcome::ConnectionFailed => Some(ErrorKind::ConnectionFailed),
            CheckOutcome::ProtocolError => Some(ErrorKind::ProtocolError),
        }
    }
}

#[async_trait]
pub trait Cracker: Send + Sync {
    fn name(&self) -> &'static str;
    fn mode(&self) -> AuthMode;
    async fn check(&self, deadline: Instant, host: &str, port: u16, auth: &Auth) -> CheckOutcome;
}
