// [libs/domain/src/runtime.rs]
/*!
 * =================================================================
 * APARATO: CRACKER-SIDE RUNTIME OBJECTS (V1.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2) — NO PERSISTENTES
 * RESPONSABILIDAD: TIPOS DE PASO QUE VIVEN SÓLO DENTRO DE UN AGENTE
 *
 * Estos tipos nunca tocan una tabla: viajan entre el Dictionary
 * Manager, el Cracker Registry, el Port/Service Scanner y el OS Scanner
 * durante la vida de un único Task, y sólo se aplanan a JSON al
 * empaquetarse en un `StageResultEnvelope`.
 * =================================================================
 */

use serde::{Deserialize, Serialize};

/// Modo de autenticación soportado por un adapter del Cracker Registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    UserPass,
    OnlyPass,
    None,
}

/// Una credencial candidata a probar contra un protocolo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Auth {
    pub username: String,
    pub password: String,
    /// Campo libre para protocolos que necesitan un tercer secreto (p.ej. dominio NTLM).
    pub other: Option<String>,
}

/// Resultado de un único intento de credencial contra un `(host, port)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BruteResult {
    pub host: String,
    pub port: u16,
    pub service: String,
    pub username: String,
    pub password: String,
    pub success: bool,
}

/// Veredicto de un motor de inferencia de sistema operativo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OsInfo {
    pub name: String,
    pub family: String,
    pub version: Option<String>,
    /// 0–100; el Resolver escoge el mayor, desempate stack > service > ttl.
    pub accuracy: u8,
    /// Mapa de líneas de fingerprint Nmap (`T1`, `SEQ`, …) cuando el origen es `NmapStack`.
    pub fingerprint: Option<std::collections::BTreeMap<String, String>>,
    pub source: OsInfoSource,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum OsInfoSource {
    Ttl,
    NmapStack,
    ServiceInference,
}

/// Identificación de servicio extraída por el Port/Service Scanner vía la Version-Info DSL.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FingerPrint {
    pub service: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
    pub info: Option<String>,
    pub hostname: Option<String>,
    pub os: Option<String>,
    pub device_type: Option<String>,
    pub cpe: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_info_source_enum_round_trips_through_serde() {
        let info = OsInfo {
            name: "Linux".into(),
            family: "Linux".into(),
            version: Some("3.X|4.X".into()),
            accuracy: 95,
            fingerprint: None,
            source: OsInfoSource::NmapStack,
        };
        let json = serde_json::to_string(&info).expect("serializes");
        let back: OsInfo = serde_json::from_str(&json).expect("deserializes");
        assert_eq!(back.source, OsInfoSource::NmapStack);
        assert_eq!(back.accuracy, 95);
    }

    #[test]
    fn fingerprint_default_is_entirely_absent() {
        let fp = FingerPrint::default();
        assert!(fp.service.is_none());
        assert!(fp.cpe.is_none());
    }
}
