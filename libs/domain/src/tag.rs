// [libs/domain/src/tag.rs]
/*!
 * =================================================================
 * APARATO: TAG / RULE DOMAIN MODEL (V1.0)
 * CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
 * RESPONSABILIDAD: ETIQUETADO Y RECONCILIACIÓN DE ESTADO
 *
 * `SysTag` es el vocabulario; `SysMatchRule` las reglas declarativas
 * que lo producen automáticamente; `SysEntityTag` el binding real
 * entidad↔tag, con una `source` que gobierna precedencia —
 * `manual` jamás es sobrescrita por `auto` durante la reconciliación.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Procedencia de un binding de tag; gobierna precedencia en la reconciliación de estado.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TagSource {
    Manual,
    Auto,
    Scope,
    AgentReport,
}

impl TagSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagSource::Manual => "manual",
            TagSource::Auto => "auto",
            TagSource::Scope => "scope",
            TagSource::AgentReport => "agent_report",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "auto" => TagSource::Auto,
            "scope" => TagSource::Scope,
            "agent_report" => TagSource::AgentReport,
            _ => TagSource::Manual,
        }
    }

    /// `manual` nunca es sobrescrita por una reconciliación `auto`.
    pub fn outranks_auto_reconciliation(&self) -> bool {
        matches!(self, TagSource::Manual)
    }
}

/// Una etiqueta nombrada del vocabulario del sistema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysTag {
    pub tag_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Operadores soportados por el predicado de una regla de auto-etiquetado.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchOperator {
    Equals,
    Contains,
    ListContains,
    Cidr,
}

/// Un predicado `field OP value` evaluado contra los campos de una entidad.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchPredicate {
    pub field: String,
    pub operator: MatchOperator,
    pub value: Value,
}

/// Regla declarativa: si el predicado casa, la entidad recibe `tag_id` con `source='auto'`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysMatchRule {
    pub rule_id: String,
    pub entity_type: String,
    pub tag_id: String,
    pub predicate: MatchPredicate,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// El binding real entidad↔tag, con procedencia y, si aplica, la regla que lo produjo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SysEntityTag {
    pub entity_type: String,
    pub entity_id: String,
    pub tag_id: String,
    pub source: TagSource,
    pub rule_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_source_outranks_auto_reconciliation() {
        assert!(TagSource::Manual.outranks_auto_reconciliation());
        assert!(!TagSource::Auto.outranks_auto_reconciliation());
        assert!(!TagSource::Scope.outranks_auto_reconciliation());
        assert!(!TagSource::AgentReport.outranks_auto_reconciliation());
    }

    #[test]
    fn tag_source_round_trips_through_its_string_form() {
        for source in [TagSource::Manual, TagSource::Auto, TagSource::Scope, TagSource::AgentReport] {
            assert_eq!(TagSource::from_str(source.as_str()), source);
        }
    }
}
