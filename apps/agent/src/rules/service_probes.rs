// [apps/agent/src/rules/service_probes.rs]
/*!
 * APARATO: SERVICE PROBE RULE LOADER
 * RESPONSABILIDAD: PARSEO DEL FORMATO `probe`/`match`/`softmatch` EN `Probe`
 *
 * Embebido en el binario vía `include_str!` y reemplazable en tiempo de
 * arranque apuntando `RULES_PATH` a un archivo con el mismo formato.
 */

use crate::portscan::probes::{compile_pattern, unescape, MatchRule, Probe};
use crate::portscan::version_dsl;
use tracing::warn;

const EMBEDDED_RULES: &str = include_str!("../../data/service-probes.txt");

/// Carga las reglas embebidas, o las de `RULES_PATH` si la variable está presente.
pub fn load() -> Vec<Probe> {
    match std::env::var("RULES_PATH") {
        Ok(path) => match std::fs::read_to_string(&path) {
            Ok(contents) => parse(&contents),
            Err(error) => {
                warn!(%path, %error, "failed to read RULES_PATH, falling back to embedded rules");
                parse(EMBEDDED_RULES)
            }
        },
        Err(_) => parse(EMBEDDED_RULES),
    }
}

fn parse(source: &str) -> Vec<Probe> {
    let mut probes = Vec::new();
    let mut current: Option<Probe> = None;

    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix("probe ") {
            if let Some(probe) = current.take() {
                probes.push(probe);
            }
            current = parse_probe_header(rest);
            continue;
        }

        let Some(probe) = current.as_mut() else {
            warn!(%line, "match line before any probe header, skipping");
            continue;
        };

        if let Some(rest) = line.strip_prefix("softmatch ") {
            if let Some(rule) = parse_match_line(rest, true) {
                probe.matches.push(rule);
            }
        } else if let Some(rest) = line.strip_prefix("match ") {
            if let Some(rule) = parse_match_line(rest, false) {
                probe.matches.push(rule);
            }
        }
    }

    if let Some(probe) = current.take() {
        probes.push(probe);
    }

    probes
}

fn parse_probe_header(rest: &str) -> Option<Probe> {
    let mut tokens = tokenize(rest).into_iter();
    let name = tokens.next()?;

    let mut rarity = 1u8;
    let mut payload = Vec::new();
    let mut ports = Vec::new();

    for token in tokens {
        if let Some(value) = token.strip_prefix("rarity=") {
            rarity = value.parse().unwrap_or(1);
        } else if let Some(value) = token.strip_prefix("payload=") {
            payload = unescape(value.trim_matches('"'));
        } else if let Some(value) = token.strip_prefix("ports=") {
            ports = value.split(',').filter_map(|p| p.parse().ok()).collect();
        }
    }

    Some(Probe { name, payload, ports, rarity, matches: Vec::new() })
}

fn parse_match_line(rest: &str, soft: bool) -> Option<MatchRule> {
    let mut tokens = tokenize(rest).into_iter();
    let service = tokens.next()?;
    let pattern_token = tokens.next()?;

    let (pattern, flags) = parse_m_token(&pattern_token)?;
    let regex = compile_pattern(&pattern, &flags).ok()?;

    let version_rest: String = tokens.collect::<Vec<_>>().join(" ");
    let version_info = version_dsl::parse(&version_rest);

    Some(MatchRule { service, regex, soft, version_info })
}

/// Parsea `m<delim>regex<delim>flags` preservando cadenas entre comillas y
/// respetando que el delimitador puede ser cualquier carácter tras la `m`.
fn parse_m_token(token: &str) -> Option<(String, String)> {
    let rest = token.strip_prefix('m')?;
    let delimiter = rest.chars().next()?;
    let body = &rest[delimiter.len_utf8()..];
    let end = body.find(delimiter)?;
    let pattern = body[..end].to_string();
    let flags = body[end + delimiter.len_utf8()..].to_string();
    Some((pattern, flags))
}

/// Tokeniza respetando comillas dobles para `payload="..."`.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ' ' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_rules_parse_without_panicking() {
        let probes = load();
        assert!(!probes.is_empty());
        assert!(probes.iter().any(|p| p.name == "NULL"));
        assert!(probes.iter().any(|p| p.name == "GetRequest"));
    }

    #[test]
    fn null_probe_has_ssh_and_ftp_matches() {
        let probes = parse(EMBEDDED_RULES);
        let null_probe = probes.iter().find(|p| p.name == "NULL").unwrap();
        assert!(null_probe.matches.iter().any(|m| m.service == "ssh"));
        assert!(null_probe.matches.iter().any(|m| m.service == "ftp"));
    }

    #[test]
    fn get_request_probe_carries_unescaped_payload_and_ports() {
        let probes = parse(EMBEDDED_RULES);
        let probe = probes.iter().find(|p| p.name == "GetRequest").unwrap();
        assert_eq!(probe.payload, b"GET / HTTP/1.0\r\n\r\n");
        assert!(probe.ports.contains(&80));
    }

    #[test]
    fn softmatch_lines_are_marked_soft() {
        let probes = parse(EMBEDDED_RULES);
        let probe = probes.iter().find(|p| p.name == "GetRequest").unwrap();
        assert!(probe.matches.iter().any(|m| m.soft && m.service == "http"));
    }
}
