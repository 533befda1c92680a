// [libs/domain/src/error.rs]
/*!
 * =================================================================
 * APARATO: ERROR KIND TAXONOMY (V1.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: VOCABULARIO DE FALLO COMPARTIDO MASTER↔AGENTE
 *
 * `ErrorKind` no es un `std::error::Error` en el sentido de Rust — es
 * un vocabulario cerrado que cruza el cable dentro de los sobres de
 * resultado, y que cada capa (Brute Scanner, ETL, Scheduler) interpreta
 * con su propia política de propagación.
 * =================================================================
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Categoría de fallo, no un tipo concreto: la política de propagación depende de quién la observa.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credencial incorrecta; try-next. Nunca emerge por encima del Brute Scanner.
    AuthFailed,
    /// Falla de red (timeout/refuse/reset); alimenta la decaída del AIMD.
    ConnectionFailed,
    /// Comportamiento del peer no reconocido; aborta el intento de protocolo, no el Task.
    ProtocolError,
    /// El Task no puede proceder bajo la Policy actual; el Task se persiste `failed`.
    PolicyViolation,
    /// Deadline o shutdown; jamás tratado como fallo de protocolo.
    Cancelled,
    /// Capacidad condicionada por plataforma ausente (p.ej. Raw Socket sin privilegios).
    Unsupported,
    /// `(hostname, port)` duplicado sin credenciales coincidentes; no recuperable para el llamante.
    RegistrationConflict,
    /// El Mapper del ETL no pudo normalizar un StageResult.
    IngestionError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AuthFailed => "auth_failed",
            ErrorKind::ConnectionFailed => "connection_failed",
            ErrorKind::ProtocolError => "protocol_error",
            ErrorKind::PolicyViolation => "policy_violation",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::RegistrationConflict => "registration_conflict",
            ErrorKind::IngestionError => "ingestion_error",
        }
    }

    /// Kinds que retroalimentan el Adaptive Limiter cuando observadas por el Brute Scanner.
    pub fn feeds_limiter_failure(&self) -> bool {
        matches!(self, ErrorKind::ConnectionFailed)
    }

    pub fn feeds_limiter_success(&self) -> bool {
        matches!(self, ErrorKind::AuthFailed)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connection_failed_feeds_limiter_decay() {
        assert!(ErrorKind::ConnectionFailed.feeds_limiter_failure());
        assert!(!ErrorKind::AuthFailed.feeds_limiter_failure());
        assert!(!ErrorKind::ProtocolError.feeds_limiter_failure());
    }

    #[test]
    fn only_auth_failed_feeds_limiter_growth() {
        assert!(ErrorKind::AuthFailed.feeds_limiter_success());
        assert!(!ErrorKind::ConnectionFailed.feeds_limiter_success());
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(ErrorKind::PolicyViolation.to_string(), "policy_violation");
    }
}
