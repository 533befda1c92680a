// [apps/master/src/core/autotag.rs]
/*!
 * APARATO: AUTO-TAG ENGINE
 * CLASIFICACIÓN: ORCHESTRATION CORE
 * RESPONSABILIDAD: RECONCILIAR LOS BINDINGS `auto` DE UNA ENTIDAD CONTRA SUS REGLAS
 *
 * Evaluado tras cada ingestión del ETL: recalcula qué reglas casan con
 * los valores actuales de la entidad y reconcilia el conjunto de tags
 * `source=auto` hasta hacerlo coincidir exactamente, sin tocar jamás
 * un binding `manual` (la precedencia vive en `TagRepository::bind_entity_tag`).
 */

use neoscan_domain::{MatchOperator, MatchPredicate, SysMatchRule, TagSource};
use neoscan_persistence::{DbError, TagRepository};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, instrument};

pub struct AutoTagEngine {
    tag_repository: TagRepository,
}

impl AutoTagEngine {
    #[must_use]
    pub fn new(tag_repository: TagRepository) -> Self {
        Self { tag_repository }
    }

    /// Reevalúa todas las reglas habilitadas de `entity_type` contra `field_values`
    /// y reconcilia el conjunto de tags `auto` de la entidad.
    #[instrument(skip(self, field_values))]
    pub async fn evaluate_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
        field_values: &Value,
    ) -> Result<(), DbError> {
        let rules = self
            .tag_repository
            .list_enabled_rules_for_entity_type(entity_type)
            .await?;

        let mut matched_tag_ids: HashSet<String> = HashSet::new();
        let mut matched_rule_for_tag: Vec<(&SysMatchRule, bool)> = Vec::new();

        for rule in &rules {
            let is_match = Self::predicate_matches(&rule.predicate, field_values);
            if is_match {
                matched_tag_ids.insert(rule.tag_id.clone());
            }
            matched_rule_for_tag.push((rule, is_match));
        }

        let current = self
            .tag_repository
            .list_entity_tags(entity_type, entity_id)
            .await?;
        let current_auto_tag_ids: HashSet<String> = current
            .iter()
            .filter(|t| t.source == TagSource::Auto)
            .map(|t| t.tag_id.clone())
            .collect();

        for (rule, is_match) in &matched_rule_for_tag {
            if *is_match {
                self.tag_repository
                    .bind_entity_tag(entity_type, entity_id, &rule.tag_id, TagSource::Auto, Some(&rule.rule_id))
                    .await?;
            }
        }

        for stale_tag_id in current_auto_tag_ids.difference(&matched_tag_ids) {
            self.tag_repository
                .unbind_auto_entity_tag(entity_type, entity_id, stale_tag_id)
                .await?;
        }

        debug!(entity_type, entity_id, matched = matched_tag_ids.len(), "auto-tag reconciliation complete");
        Ok(())
    }

    fn predicate_matches(predicate: &MatchPredicate, field_values: &Value) -> bool {
        let Some(actual) = field_values.get(&predicate.field) else {
            return false;
        };

        match predicate.operator {
            MatchOperator::Equals => actual == &predicate.value,
            MatchOperator::Contains => match (actual.as_str(), predicate.value.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
            MatchOperator::ListContains => match actual.as_array() {
                Some(items) => items.iter().any(|item| item == &predicate.value),
                None => false,
            },
            MatchOperator::Cidr => match (actual.as_str(), predicate.value.as_str()) {
                (Some(ip_str), Some(cidr_str)) => {
                    match (ip_str.parse::<std::net::IpAddr>(), cidr_str.parse::<ipnetwork::IpNetwork>()) {
                        (Ok(ip), Ok(network)) => network.contains(ip),
                        _ => false,
                    }
                }
                _ => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equals_predicate_matches_exact_value() {
        let predicate = MatchPredicate {
            field: "os_family".into(),
            operator: MatchOperator::Equals,
            value: json!("windows"),
        };
        assert!(AutoTagEngine::predicate_matches(&predicate, &json!({"os_family": "windows"})));
        assert!(!AutoTagEngine::predicate_matches(&predicate, &json!({"os_family": "linux"})));
    }

    #[test]
    fn cidr_predicate_matches_ip_inside_network() {
        let predicate = MatchPredicate {
            field: "ip".into(),
            operator: MatchOperator::Cidr,
            value: json!("10.0.0.0/24"),
        };
        assert!(AutoTagEngine::predicate_matches(&predicate, &json!({"ip": "10.0.0.5"})));
        assert!(!AutoTagEngine::predicate_matches(&predicate, &json!({"ip": "192.168.1.5"})));
    }

    #[test]
    fn list_contains_predicate_checks_membership() {
        let predicate = MatchPredicate {
            field: "tags_seen".into(),
            operator: MatchOperator::ListContains,
            value: json!("admin"),
        };
        assert!(AutoTagEngine::predicate_matches(&predicate, &json!({"tags_seen": ["admin", "svc"]})));
        assert!(!AutoTagEngine::predicate_matches(&predicate, &json!({"tags_seen": ["svc"]})));
    }
}
