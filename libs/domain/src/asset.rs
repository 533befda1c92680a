// [libs/domain/src/asset.rs]
/*!
 * =================================================================
 * APARATO: ASSET STORE DOMAIN MODEL (V1.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: EL ALMACÉN NORMALIZADO DE HALLAZGOS
 *
 * Un StageResult crudo llega desde un Agente; el ETL lo funde en
 * AssetHost/AssetService manteniendo semántica de upsert: el
 * `first_seen_at` más antiguo nunca se pierde, el `last_seen_at` más
 * reciente siempre gana. Los Mappers jamás borran.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hallazgo crudo, tal cual producido por una herramienta del Agente, antes de normalizar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub result_id: String,
    pub task_id: String,
    pub target_value: String,
    pub target_type: String,
    pub result_type: String,
    /// Forma libre según `result_type`; ver los tipos `*Attributes` de este módulo.
    pub attributes: Value,
    /// `Some` cuando el Mapper no logró normalizar este resultado (`IngestionError`).
    pub ingestion_error: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Host normalizado, clave única por IP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetHost {
    pub host_id: String,
    pub ip: String,
    pub hostname: Option<String>,
    pub os_name: Option<String>,
    pub os_family: Option<String>,
    pub os_accuracy: Option<u8>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl AssetHost {
    /// Fusiona observaciones nuevas preservando el `first_seen_at` más antiguo.
    pub fn merge_seen(&mut self, observed_at: DateTime<Utc>) {
        if observed_at < self.first_seen_at {
            self.first_seen_at = observed_at;
        }
        if observed_at > self.last_seen_at {
            self.last_seen_at = observed_at;
        }
    }
}

/// Servicio normalizado, clave única por `(host_id, port, proto)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetService {
    pub service_id: String,
    pub host_id: String,
    pub port: u16,
    pub proto: String,
    pub state: String,
    pub service_hint: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
    pub info: Option<String>,
    pub cpe: Option<String>,
    pub banner: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl AssetService {
    pub fn merge_seen(&mut self, observed_at: DateTime<Utc>) {
        if observed_at < self.first_seen_at {
            self.first_seen_at = observed_at;
        }
        if observed_at > self.last_seen_at {
            self.last_seen_at = observed_at;
        }
    }
}

/// Vulnerabilidad descubierta en un servicio o host (consumida por un futuro vuln scanner).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetVuln {
    pub vuln_id: String,
    pub host_id: String,
    pub service_id: Option<String>,
    pub title: String,
    pub severity: String,
    pub detail: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Forma de `attributes` cuando `result_type = "fast_port_scan"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastPortScanAttributes {
    pub ports: Vec<PortObservation>,
    pub summary: PortScanSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortObservation {
    pub ip: String,
    pub port: u16,
    pub proto: String,
    pub state: String,
    pub service_hint: Option<String>,
    pub banner: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortScanSummary {
    pub open_count: usize,
}

/// Forma de `attributes` cuando `result_type = "service_scan"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceScanAttributes {
    pub service: String,
    pub product: Option<String>,
    pub version: Option<String>,
    pub info: Option<String>,
    pub cpe: Option<String>,
    pub hostname: Option<String>,
}

/// Forma de `attributes` cuando `result_type = "os_scan"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsScanAttributes {
    pub name: String,
    pub family: String,
    pub version: Option<String>,
    pub accuracy: u8,
    pub source: String,
}

/// Forma de `attributes` cuando `result_type = "brute"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BruteAttributes {
    pub attempts: Vec<BruteAttemptAttributes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BruteAttemptAttributes {
    pub host: String,
    pub port: u16,
    pub service: String,
    pub username: String,
    pub password: String,
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn merge_seen_preserves_earliest_first_seen_and_latest_last_seen() {
        let now = Utc::now();
        let mut host = AssetHost {
            host_id: "h1".into(),
            ip: "10.0.0.1".into(),
            hostname: None,
            os_name: None,
            os_family: None,
            os_accuracy: None,
            first_seen_at: now,
            last_seen_at: now,
        };

        host.merge_seen(now - Duration::hours(1));
        assert_eq!(host.first_seen_at, now - Duration::hours(1));

        host.merge_seen(now + Duration::hours(1));
        assert_eq!(host.last_seen_at, now + Duration::hours(1));

        host.merge_seen(now);
        assert_eq!(host.first_seen_at, now - Duration::hours(1));
        assert_eq!(host.last_seen_at, now + Duration::hours(1));
    }
}
