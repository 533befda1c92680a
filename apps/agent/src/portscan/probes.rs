// [apps/agent/src/portscan/probes.rs]
/*!
 * APARATO: PROBE DATABASE & MATCHER
 * RESPONSABILIDAD: CARGA DE REGLAS, ORDEN POR RAREZA Y MATCHING DE RESPUESTAS
 */

use super::version_dsl::{self, VersionInfoTemplate};
use neoscan_domain::FingerPrint;
use regex::Regex;
use std::collections::BTreeMap;

pub const READ_BUDGET: usize = 4096;

/// Una regla de match dentro de un probe; `soft` marca un softmatch (pista, no confirmación).
#[derive(Debug, Clone)]
pub struct MatchRule {
    pub service: String,
    pub regex: Regex,
    pub soft: bool,
    pub version_info: VersionInfoTemplate,
}

#[derive(Debug, Clone)]
pub struct Probe {
    pub name: String,
    /// Payload ya des-escapado, listo para enviarse tal cual.
    pub payload: Vec<u8>,
    pub ports: Vec<u16>,
    pub rarity: u8,
    pub matches: Vec<MatchRule>,
}

impl Probe {
    /// El probe NULL no envía bytes; sólo observa lo que el servicio ofrece espontáneamente.
    pub fn is_null(&self) -> bool {
        self.name == "NULL"
    }
}

/// Resultado de intentar matchear una respuesta contra la lista de probes de un puerto.
pub enum MatchOutcome {
    Hard { service: String, fingerprint: FingerPrint },
    Soft { hint_keywords: Vec<String> },
    NoMatch,
}

/// Ordena y matchea las respuestas de un conjunto de probes candidatos para `port`.
pub struct ProbeDatabase {
    probes: Vec<Probe>,
}

impl ProbeDatabase {
    pub fn new(probes: Vec<Probe>) -> Self {
        Self { probes }
    }

    /// Candidatos para `port`: NULL primero, luego "GetRequest" si existe, luego el resto
    /// ordenado ascendente por rareza.
    pub fn candidates_for_port(&self, port: u16) -> Vec<&Probe> {
        let mut null_probe = None;
        let mut generic_probe = None;
        let mut rest: Vec<&Probe> = Vec::new();

        for probe in &self.probes {
            if probe.is_null() {
                null_probe = Some(probe);
            } else if probe.name == "GetRequest" {
                generic_probe = Some(probe);
            } else if probe.ports.contains(&port) {
                rest.push(probe);
            }
        }

        rest.sort_by_key(|probe| probe.rarity);

        let mut ordered = Vec::with_capacity(rest.len() + 2);
        if let Some(probe) = null_probe {
            ordered.push(probe);
        }
        if let Some(probe) = generic_probe {
            if !ordered.iter().any(|p: &&Probe| p.name == probe.name) {
                ordered.push(probe);
            }
        }
        ordered.extend(rest);
        ordered
    }

    /// Reordena los candidatos restantes priorizando nombres que mencionen `keywords` (softmatch hint).
    pub fn reorder_by_hint<'a>(remaining: &mut Vec<&'a Probe>, hint_keywords: &[String]) {
        remaining.sort_by_key(|probe| {
            let name_lower = probe.name.to_lowercase();
            let matches_hint = hint_keywords.iter().any(|kw| name_lower.contains(&kw.to_lowercase()));
            if matches_hint {
                0
            } else {
                1
            }
        });
    }
}

/// Matchea la respuesta de un único probe; retorna el primer hard match, o un softmatch si
/// ninguno de los hard matches aplica, o `NoMatch`.
pub fn match_response(probe: &Probe, response: &[u8]) -> MatchOutcome {
    let mut soft_hint = None;

    for rule in &probe.matches {
        let text = String::from_utf8_lossy(response);
        if !rule.regex.is_match(&text) {
            continue;
        }

        if rule.soft {
            if soft_hint.is_none() {
                soft_hint = Some(rule.service.split_whitespace().map(str::to_string).collect());
            }
            continue;
        }

        let resolved = version_dsl::resolve(&rule.version_info, &rule.regex, response);
        return MatchOutcome::Hard {
            service: rule.service.clone(),
            fingerprint: FingerPrint {
                service: Some(rule.service.clone()),
                product: resolved.product,
                version: resolved.version,
                info: resolved.info,
                hostname: resolved.hostname,
                os: resolved.os,
                device_type: resolved.device_type,
                cpe: resolved.cpe,
            },
        };
    }

    match soft_hint {
        Some(keywords) => MatchOutcome::Soft { hint_keywords: keywords },
        None => MatchOutcome::NoMatch,
    }
}

/// Des-escapa un payload/patrón al estilo Nmap: `\r \n \t \0 \xHH`. Secuencias desconocidas
/// se dejan literales (la barra invertida y el carácter siguiente pasan intactos).
pub fn unescape(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b'r' => {
                    out.push(b'\r');
                    i += 2;
                }
                b'n' => {
                    out.push(b'\n');
                    i += 2;
                }
                b't' => {
                    out.push(b'\t');
                    i += 2;
                }
                b'0' => {
                    out.push(0);
                    i += 2;
                }
                b'x' if i + 3 < bytes.len() => {
                    let hex = std::str::from_utf8(&bytes[i + 2..i + 4]).ok();
                    if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                        out.push(byte);
                        i += 4;
                    } else {
                        out.push(bytes[i]);
                        i += 1;
                    }
                }
                other => {
                    out.push(b'\\');
                    out.push(other);
                    i += 2;
                }
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

/// Compila un regex de match con flags `i` (case-insensitive) y `s` (`.` matches newline).
pub fn compile_pattern(pattern: &str, flags: &str) -> Result<Regex, regex::Error> {
    let mut prefix = String::new();
    if flags.contains('i') {
        prefix.push('i');
    }
    if flags.contains('s') {
        prefix.push('s');
    }
    let full = if prefix.is_empty() { pattern.to_string() } else { format!("(?{prefix}){pattern}") };
    Regex::new(&full)
}

pub type ProbeMap = BTreeMap<u16, Vec<String>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_handles_standard_sequences() {
        assert_eq!(unescape(r"\r\n\t\0"), vec![b'\r', b'\n', b'\t', 0]);
    }

    #[test]
    fn unescape_handles_hex_escapes() {
        assert_eq!(unescape(r"\x41\x42"), vec![b'A', b'B']);
    }

    #[test]
    fn unescape_leaves_unknown_escapes_literal() {
        assert_eq!(unescape(r"\q"), vec![b'\\', b'q']);
    }

    #[test]
    fn candidates_for_port_puts_null_and_generic_first() {
        let null_probe = Probe { name: "NULL".into(), payload: vec![], ports: vec![], rarity: 1, matches: vec![] };
        let generic = Probe { name: "GetRequest".into(), payload: vec![], ports: vec![80], rarity: 1, matches: vec![] };
        let specific = Probe { name: "Special".into(), payload: vec![], ports: vec![80], rarity: 5, matches: vec![] };
        let db = ProbeDatabase::new(vec![specific, generic, null_probe]);
        let candidates = db.candidates_for_port(80);
        assert_eq!(candidates[0].name, "NULL");
        assert_eq!(candidates[1].name, "GetRequest");
        assert_eq!(candidates[2].name, "Special");
    }

    #[test]
    fn candidates_sorted_ascending_by_rarity() {
        let a = Probe { name: "A".into(), payload: vec![], ports: vec![22], rarity: 9, matches: vec![] };
        let b = Probe { name: "B".into(), payload: vec![], ports: vec![22], rarity: 2, matches: vec![] };
        let db = ProbeDatabase::new(vec![a, b]);
        let candidates = db.candidates_for_port(22);
        assert_eq!(candidates[0].name, "B");
        assert_eq!(candidates[1].name, "A");
    }

    #[test]
    fn hard_match_extracts_version_fields() {
        let regex = compile_pattern(r"^SSH-2\.0-OpenSSH_(\S+)", "").unwrap();
        let rule = MatchRule {
            service: "ssh".into(),
            regex,
            soft: false,
            version_info: version_dsl::parse("p/OpenSSH/ v/$1/"),
        };
        let probe =
            Probe { name: "NULL".into(), payload: vec![], ports: vec![], rarity: 1, matches: vec![rule] };
        let outcome = match_response(&probe, b"SSH-2.0-OpenSSH_9.6p1 Ubuntu\r\n");
        match outcome {
            MatchOutcome::Hard { service, fingerprint } => {
                assert_eq!(service, "ssh");
                assert_eq!(fingerprint.product.as_deref(), Some("OpenSSH"));
                assert_eq!(fingerprint.version.as_deref(), Some("9.6p1"));
            }
            _ => panic!("expected hard match"),
        }
    }

    #[test]
    fn soft_match_falls_back_to_hint_when_no_hard_match() {
        let regex = compile_pattern(r"^\+OK", "").unwrap();
        let rule = MatchRule {
            service: "pop3 generic".into(),
            regex,
            soft: true,
            version_info: version_dsl::parse(""),
        };
        let probe =
            Probe { name: "NULL".into(), payload: vec![], ports: vec![], rarity: 1, matches: vec![rule] };
        let outcome = match_response(&probe, b"+OK ready\r\n");
        match outcome {
            MatchOutcome::Soft { hint_keywords } => assert!(hint_keywords.contains(&"pop3".to_string())),
            _ => panic!("expected soft match"),
        }
    }
}
