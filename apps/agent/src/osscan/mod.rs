// [apps/agent/src/osscan/mod.rs]
/*!
 * APARATO: OS SCANNER
 * CLASIFICACIÓN: WORKER ENGINE
 * RESPONSABILIDAD: CARRERA MULTI-MOTOR {TTL, NMAPSTACK, SERVICEINFERENCE}
 *
 * Resolución: tras correr los motores habilitados por el modo, gana el de
 * mayor `accuracy`; empates se desempatan stack > service > ttl.
 */

pub mod service_inference;
pub mod ttl;

#[cfg(feature = "raw-socket-probes")]
pub mod stack;

use crate::fingerprint::os_matcher::{self, OsMatch};
use crate::rules::os_db;
use neoscan_domain::{OsInfo, OsInfoSource};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    Fast,
    Deep,
    Auto,
}

/// Target ya explorado por el Port Scanner: un puerto abierto, uno presumiblemente
/// cerrado, y los banners capturados (para el motor de inferencia por servicio).
pub struct OsScanInput<'a> {
    pub host: &'a str,
    pub open_port: Option<u16>,
    pub closed_port: Option<u16>,
    pub banners: Vec<String>,
}

pub async fn scan(input: OsScanInput<'_>, mode: ScanMode, ping_timeout: Duration) -> Option<OsInfo> {
    let mut candidates = Vec::new();

    // TTL corre siempre que el modo no sea exclusivamente `deep`-sin-fallback;
    // se considera "always on" en fast y auto, y como base en deep.
    if let Some(info) = ttl::probe(input.host, ping_timeout).await {
        candidates.push(info);
    }

    let attempt_stack = matches!(mode, ScanMode::Deep | ScanMode::Auto);
    if attempt_stack {
        if let (Some(open), Some(closed)) = (input.open_port, input.closed_port) {
            if let Some(info) = run_stack_engine(input.host, open, closed).await {
                candidates.push(score_stack_fingerprint(info));
            }
        }
    }

    if matches!(mode, ScanMode::Auto) && !input.banners.is_empty() {
        if let Some(info) = service_inference::infer(&input.banners) {
            candidates.push(info);
        }
    }

    resolve(candidates)
}

#[cfg(feature = "raw-socket-probes")]
async fn run_stack_engine(host: &str, open_port: u16, closed_port: u16) -> Option<OsInfo> {
    stack::probe(host, open_port, closed_port).await
}

#[cfg(not(feature = "raw-socket-probes"))]
async fn run_stack_engine(_host: &str, _open_port: u16, _closed_port: u16) -> Option<OsInfo> {
    None
}

/// Puntúa el fingerprint crudo del motor de pila contra la base de huellas
/// y rellena `name`/`family`/`accuracy` con el mejor match encontrado.
fn score_stack_fingerprint(mut info: OsInfo) -> OsInfo {
    let Some(fingerprint) = info.fingerprint.clone() else { return info };
    let rules = os_db::load();
    if let Some(OsMatch { name, class, accuracy }) = os_matcher::best_match(&rules, &fingerprint) {
        info.name = name;
        info.family = class.family;
        info.version = Some(class.generation);
        info.accuracy = accuracy;
    }
    info
}

fn resolve(candidates: Vec<OsInfo>) -> Option<OsInfo> {
    candidates.into_iter().max_by(|a, b| {
        a.accuracy
            .cmp(&b.accuracy)
            .then_with(|| source_priority(&a.source).cmp(&source_priority(&b.source)))
    })
}

fn source_priority(source: &OsInfoSource) -> u8 {
    match source {
        OsInfoSource::NmapStack => 2,
        OsInfoSource::ServiceInference => 1,
        OsInfoSource::Ttl => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(accuracy: u8, source: OsInfoSource) -> OsInfo {
        OsInfo { name: "x".into(), family: "x".into(), version: None, accuracy, fingerprint: None, source }
    }

    #[test]
    fn resolve_picks_highest_accuracy() {
        let candidates = vec![info(50, OsInfoSource::Ttl), info(90, OsInfoSource::ServiceInference)];
        let resolved = resolve(candidates).unwrap();
        assert_eq!(resolved.accuracy, 90);
    }

    #[test]
    fn resolve_tie_break_prefers_stack_then_service_then_ttl() {
        let candidates = vec![info(80, OsInfoSource::Ttl), info(80, OsInfoSource::NmapStack), info(80, OsInfoSource::ServiceInference)];
        let resolved = resolve(candidates).unwrap();
        assert_eq!(resolved.source, OsInfoSource::NmapStack);
    }

    #[test]
    fn resolve_with_no_candidates_is_none() {
        assert!(resolve(Vec::new()).is_none());
    }
}
