// [apps/agent/src/fingerprint/os_matcher.rs]
/*!
 * APARATO: FINGERPRINT MATCHER — OS
 * CLASIFICACIÓN: WORKER ENGINE
 * RESPONSABILIDAD: PUNTUAR UN MAPA DE FINGERPRINT CONTRA LA BASE DE REGLAS
 *
 * Score = tests acertados / tests relevantes de la regla, 0–100. La regla
 * de mayor puntaje gana; su metadata `Class` se expone en el resultado.
 */

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct OsClass {
    pub vendor: String,
    pub family: String,
    pub generation: String,
    pub device_type: String,
}

/// Una regla de la base: un conjunto de tests, cada uno un cuerpo `key=pattern%...`.
#[derive(Debug, Clone)]
pub struct OsRule {
    pub name: String,
    pub class: OsClass,
    pub tests: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone)]
pub struct OsMatch {
    pub name: String,
    pub class: OsClass,
    pub accuracy: u8,
}

/// Puntúa todas las reglas contra `observed` y retorna la de mayor puntaje, si alguna
/// tiene al menos un test relevante.
pub fn best_match(rules: &[OsRule], observed: &BTreeMap<String, BTreeMap<String, String>>) -> Option<OsMatch> {
    rules
        .iter()
        .filter_map(|rule| {
            let accuracy = score(rule, observed)?;
            Some(OsMatch { name: rule.name.clone(), class: rule.class.clone(), accuracy })
        })
        .max_by_key(|m| m.accuracy)
}

/// `None` si la regla no tiene ningún test relevante (nada que puntuar).
fn score(rule: &OsRule, observed: &BTreeMap<String, BTreeMap<String, String>>) -> Option<u8> {
    if rule.tests.is_empty() {
        return None;
    }

    let relevant = rule.tests.len();
    let matched = rule
        .tests
        .iter()
        .filter(|(test_name, rule_body)| {
            observed.get(*test_name).is_some_and(|observed_body| test_matches(rule_body, observed_body))
        })
        .count();

    Some(((matched as f64 / relevant as f64) * 100.0).round() as u8)
}

/// Un test acierta cuando cada `key=pattern` de la regla lo satisface el valor
/// observado para esa clave. Claves que la regla no menciona no afectan el puntaje;
/// claves que la regla exige y el target no tiene hacen fallar el test (asimetría).
fn test_matches(rule_body: &BTreeMap<String, String>, observed_body: &BTreeMap<String, String>) -> bool {
    rule_body.iter().all(|(key, pattern)| match observed_body.get(key) {
        Some(value) => pattern_matches(pattern, value),
        None => false,
    })
}

fn pattern_matches(pattern: &str, value: &str) -> bool {
    pattern.split('|').any(|clause| clause_matches(clause, value))
}

fn clause_matches(clause: &str, value: &str) -> bool {
    if let Some(rest) = clause.strip_prefix('>') {
        return hex_compare(rest, value).is_some_and(|(n, v)| v > n);
    }
    if let Some(rest) = clause.strip_prefix('<') {
        return hex_compare(rest, value).is_some_and(|(n, v)| v < n);
    }
    if let Some((lo, hi)) = clause.split_once('-') {
        if let (Ok(lo_n), Ok(hi_n), Ok(v)) =
            (u64::from_str_radix(lo, 16), u64::from_str_radix(hi, 16), u64::from_str_radix(value, 16))
        {
            return v >= lo_n && v <= hi_n;
        }
        return false;
    }
    clause == value
}

fn hex_compare(bound: &str, value: &str) -> Option<(u64, u64)> {
    let n = u64::from_str_radix(bound, 16).ok()?;
    let v = u64::from_str_radix(value, 16).ok()?;
    Some((n, v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_with(tests: &[(&str, &[(&str, &str)])]) -> OsRule {
        OsRule {
            name: "test-rule".into(),
            class: OsClass::default(),
            tests: tests
                .iter()
                .map(|(name, kvs)| {
                    (name.to_string(), kvs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
                })
                .collect(),
        }
    }

    #[test]
    fn perfect_match_scores_one_hundred() {
        let rule = rule_with(&[("T1", &[("R", "Y"), ("DF", "Y")])]);
        let observed: BTreeMap<_, _> =
            [("T1".to_string(), [("R".to_string(), "Y".to_string()), ("DF".to_string(), "Y".to_string())].into())]
                .into();
        assert_eq!(score(&rule, &observed), Some(100));
    }

    #[test]
    fn missing_key_in_target_fails_the_test() {
        let rule = rule_with(&[("T1", &[("R", "Y"), ("DF", "Y")])]);
        let observed: BTreeMap<_, _> =
            [("T1".to_string(), [("R".to_string(), "Y".to_string())].into())].into();
        assert_eq!(score(&rule, &observed), Some(0));
    }

    #[test]
    fn extra_keys_in_target_do_not_affect_score() {
        let rule = rule_with(&[("T1", &[("R", "Y")])]);
        let observed: BTreeMap<_, _> = [(
            "T1".to_string(),
            [("R".to_string(), "Y".to_string()), ("EXTRA".to_string(), "whatever".to_string())].into(),
        )]
        .into();
        assert_eq!(score(&rule, &observed), Some(100));
    }

    #[test]
    fn hex_range_pattern_matches_inclusive_bounds() {
        assert!(pattern_matches("3B-45", "40"));
        assert!(pattern_matches("3B-45", "3B"));
        assert!(pattern_matches("3B-45", "45"));
        assert!(!pattern_matches("3B-45", "46"));
    }

    #[test]
    fn comparison_patterns_match_greater_and_less_than() {
        assert!(pattern_matches(">10", "20"));
        assert!(!pattern_matches(">10", "05"));
        assert!(pattern_matches("<10", "05"));
    }

    #[test]
    fn or_pattern_matches_any_clause() {
        assert!(pattern_matches("AS|RD|Z", "RD"));
        assert!(!pattern_matches("AS|RD|Z", "XX"));
    }

    #[test]
    fn best_match_picks_highest_scoring_rule() {
        let weak = rule_with(&[("T1", &[("R", "Y")]), ("T2", &[("R", "N")])]);
        let strong = rule_with(&[("T1", &[("R", "Y")])]);
        let observed: BTreeMap<_, _> =
            [("T1".to_string(), [("R".to_string(), "Y".to_string())].into())].into();
        let mut weak = weak;
        weak.name = "weak".into();
        let mut strong = strong;
        strong.name = "strong".into();
        let best = best_match(&[weak, strong], &observed).unwrap();
        assert_eq!(best.name, "strong");
    }
}
