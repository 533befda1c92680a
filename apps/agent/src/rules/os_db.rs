// [apps/agent/src/rules/os_db.rs]
/*!
 * APARATO: OS FINGERPRINT RULE LOADER
 * RESPONSABILIDAD: PARSEO DEL FORMATO `fingerprint`/`Class`/`TEST(...)` EN `OsRule`
 */

use crate::fingerprint::os_matcher::{OsClass, OsRule};
use std::collections::BTreeMap;
use tracing::warn;

const EMBEDDED_RULES: &str = include_str!("../../data/os-fingerprints.txt");

pub fn load() -> Vec<OsRule> {
    match std::env::var("OS_RULES_PATH") {
        Ok(path) => match std::fs::read_to_string(&path) {
            Ok(contents) => parse(&contents),
            Err(error) => {
                warn!(%path, %error, "failed to read OS_RULES_PATH, falling back to embedded rules");
                parse(EMBEDDED_RULES)
            }
        },
        Err(_) => parse(EMBEDDED_RULES),
    }
}

fn parse(source: &str) -> Vec<OsRule> {
    let mut rules = Vec::new();
    let mut current: Option<OsRule> = None;

    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(name) = line.strip_prefix("fingerprint ") {
            if let Some(rule) = current.take() {
                rules.push(rule);
            }
            current = Some(OsRule {
                name: name.trim().to_string(),
                class: OsClass::default(),
                tests: BTreeMap::new(),
            });
            continue;
        }

        let Some(rule) = current.as_mut() else {
            warn!(%line, "os fingerprint body line before any header, skipping");
            continue;
        };

        if let Some(rest) = line.strip_prefix("Class ") {
            rule.class = parse_class(rest);
            continue;
        }

        if let Some((test_name, body)) = parse_test_line(line) {
            rule.tests.insert(test_name, body);
        }
    }

    if let Some(rule) = current.take() {
        rules.push(rule);
    }

    rules
}

fn parse_class(rest: &str) -> OsClass {
    let parts: Vec<&str> = rest.split('|').map(str::trim).collect();
    OsClass {
        vendor: parts.first().unwrap_or(&"").to_string(),
        family: parts.get(1).unwrap_or(&"").to_string(),
        generation: parts.get(2).unwrap_or(&"").to_string(),
        device_type: parts.get(3).unwrap_or(&"").to_string(),
    }
}

fn parse_test_line(line: &str) -> Option<(String, BTreeMap<String, String>)> {
    let open = line.find('(')?;
    let close = line.rfind(')')?;
    if close <= open {
        return None;
    }
    let name = line[..open].trim().to_string();
    let body = &line[open + 1..close];
    Some((name, parse_kv_body(body)))
}

pub fn parse_kv_body(body: &str) -> BTreeMap<String, String> {
    body.split('%')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_rules_parse_without_panicking() {
        let rules = load();
        assert!(rules.len() >= 3);
        assert!(rules.iter().any(|r| r.name.contains("Linux")));
    }

    #[test]
    fn class_line_splits_into_four_fields() {
        let rules = parse(EMBEDDED_RULES);
        let linux = rules.iter().find(|r| r.name.contains("Linux")).unwrap();
        assert_eq!(linux.class.vendor, "Linux");
        assert_eq!(linux.class.device_type, "general purpose");
    }

    #[test]
    fn test_lines_parse_into_key_value_bodies() {
        let rules = parse(EMBEDDED_RULES);
        let linux = rules.iter().find(|r| r.name.contains("Linux")).unwrap();
        let t1 = linux.tests.get("T1").unwrap();
        assert_eq!(t1.get("R"), Some(&"Y".to_string()));
        assert_eq!(t1.get("T"), Some(&"3B-45".to_string()));
    }
}
