// [apps/master/src/core/target_provider.rs]
/*!
 * APARATO: TARGET PROVIDER
 * CLASIFICACIÓN: ORCHESTRATION CORE
 * RESPONSABILIDAD: EXPANSIÓN DE SEMILLAS DE ALCANCE BAJO UNA POLÍTICA DE TARGET
 *
 * Nunca devuelve un conjunto vacío: la ausencia de objetivos tras filtrar
 * degrada a un único target de seguridad (`127.0.0.1`) con advertencia,
 * para que el pipeline del Scheduler no se atasque en silencio.
 */

use ipnetwork::IpNetwork;
use neoscan_domain::{Project, Stage};
use neoscan_persistence::{AssetRepository, TagRepository};
use std::collections::HashSet;
use tracing::{instrument, warn};

/// Tope duro de expansión de CIDR — más allá de esto se trunca y se
/// registra una advertencia en lugar de materializar un `Vec` sin límite.
pub const MAX_EXPANDED_TARGETS: usize = 65_536;

const FALLBACK_TARGET: &str = "127.0.0.1";

pub struct TargetProvider {
    asset_repository: AssetRepository,
    tag_repository: TagRepository,
}

impl TargetProvider {
    #[must_use]
    pub fn new(asset_repository: AssetRepository, tag_repository: TagRepository) -> Self {
        Self { asset_repository, tag_repository }
    }

    /// Resuelve los targets escaneables de un Stage a partir de `Project.target_scope`.
    /// Preserva unicidad y nunca excede el alcance declarado.
    #[instrument(skip(self, project, stage), fields(stage_id = %stage.stage_id))]
    pub async fn resolve(&self, project: &Project, stage: &Stage) -> Vec<String> {
        let seeds = Self::parse_seeds(&project.target_scope);
        let policy = &stage.target_policy;

        let mut expanded: Vec<String> = if policy.expand_cidrs {
            self.expand_cidrs(&seeds)
        } else {
            seeds
        };

        if !policy.required_tags.is_empty() {
            expanded = self.filter_by_tags(expanded, &policy.required_tags).await;
        }

        if policy.live_hosts_only {
            expanded = self.filter_live_hosts(expanded).await;
        }

        let unique = Self::dedupe_preserving_order(expanded);

        if unique.is_empty() {
            warn!(
                project_id = %project.project_id,
                stage_id = %stage.stage_id,
                "target resolution produced an empty set, falling back to {}",
                FALLBACK_TARGET
            );
            return vec![FALLBACK_TARGET.to_string()];
        }

        unique
    }

    /// Parsea `target_scope` como arreglo JSON si es posible; si no, separa
    /// por espacios, comas o punto-y-coma.
    fn parse_seeds(target_scope: &[String]) -> Vec<String> {
        if target_scope.len() == 1 {
            if let Ok(parsed) = serde_json::from_str::<Vec<String>>(&target_scope[0]) {
                return parsed;
            }
            return target_scope[0]
                .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        target_scope.to_vec()
    }

    fn expand_cidrs(&self, seeds: &[String]) -> Vec<String> {
        let mut expanded = Vec::new();
        for seed in seeds {
            match seed.parse::<IpNetwork>() {
                Ok(network) if network.size() > 1 => {
                    for ip in network.iter() {
                        if expanded.len() >= MAX_EXPANDED_TARGETS {
                            warn!(
                                seed = %seed,
                                cap = MAX_EXPANDED_TARGETS,
                                "CIDR expansion truncated at the configured cap"
                            );
                            return expanded;
                        }
                        expanded.push(ip.to_string());
                    }
                }
                _ => expanded.push(seed.clone()),
            }
        }
        expanded
    }

    /// Restringe a hosts previamente etiquetados con cada uno de `required_tags`.
    async fn filter_by_tags(&self, seeds: Vec<String>, required_tags: &[String]) -> Vec<String> {
        let mut allowed: HashSet<String> = HashSet::new();
        for ip in &seeds {
            if let Ok(host) = self.asset_repository.get_host_by_ip(ip).await {
                if let Ok(entity_tags) = self
                    .tag_repository
                    .list_entity_tags("asset_host", &host.host_id)
                    .await
                {
                    let tags = self
                        .tag_repository
                        .list_tags()
                        .await
                        .unwrap_or_default();
                    let tag_names: HashSet<String> = entity_tags
                        .iter()
                        .filter_map(|et| tags.iter().find(|t| t.tag_id == et.tag_id))
                        .map(|t| t.name.clone())
                        .collect();
                    if required_tags.iter().all(|required| tag_names.contains(required)) {
                        allowed.insert(ip.clone());
                    }
                }
            }
        }
        seeds.into_iter().filter(|ip| allowed.contains(ip)).collect()
    }

    /// Restringe a hosts ya conocidos por el asset store (`live_hosts_only`).
    async fn filter_live_hosts(&self, seeds: Vec<String>) -> Vec<String> {
        let mut live = Vec::with_capacity(seeds.len());
        for ip in seeds {
            if self.asset_repository.get_host_by_ip(&ip).await.is_ok() {
                live.push(ip);
            }
        }
        live
    }

    fn dedupe_preserving_order(items: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        items.into_iter().filter(|item| seen.insert(item.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_seeds_accepts_json_array() {
        let scope = vec!["[\"10.0.0.1\",\"10.0.0.2\"]".to_string()];
        let seeds = TargetProvider::parse_seeds(&scope);
        assert_eq!(seeds, vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()]);
    }

    #[test]
    fn parse_seeds_splits_on_whitespace_and_punctuation() {
        let scope = vec!["10.0.0.1, 10.0.0.2; 10.0.0.3".to_string()];
        let seeds = TargetProvider::parse_seeds(&scope);
        assert_eq!(
            seeds,
            vec!["10.0.0.1".to_string(), "10.0.0.2".to_string(), "10.0.0.3".to_string()]
        );
    }

    #[test]
    fn dedupe_preserves_first_occurrence_order() {
        let items = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(
            TargetProvider::dedupe_preserving_order(items),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
