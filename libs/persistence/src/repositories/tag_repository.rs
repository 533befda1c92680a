// [libs/persistence/src/repositories/tag_repository.rs]
/*!
 * =================================================================
 * APARATO: TAG / MATCH RULE REPOSITORY (V1.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ETIQUETADO Y RECONCILIACIÓN DE ESTADO
 *
 * `manual` jamás es sobrescrita por una reconciliación `auto`: toda
 * escritura que compite por la misma `(entity_type, entity_id, tag_id)`
 * respeta `TagSource::outranks_auto_reconciliation` antes de tocar la fila.
 * =================================================================
 */

use super::parse_timestamp;
use crate::errors::DbError;
use crate::TursoClient;
use libsql::{params, Row};
use neoscan_domain::{MatchPredicate, SysEntityTag, SysMatchRule, SysTag, TagSource};
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct TagRepository {
    database_client: TursoClient,
}

impl TagRepository {
    #[must_use]
    pub fn new(database_client: TursoClient) -> Self {
        Self { database_client }
    }

    #[instrument(skip(self, tag))]
    pub async fn create_tag(&self, tag: &SysTag) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO sys_tags (tag_id, name, description, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    tag.tag_id.clone(),
                    tag.name.clone(),
                    tag.description.clone(),
                    tag.created_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_tags(&self) -> Result<Vec<SysTag>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query("SELECT tag_id, name, description, created_at FROM sys_tags", ())
            .await?;

        let mut tags = Vec::new();
        while let Some(row) = rows.next().await? {
            tags.push(SysTag {
                tag_id: row.get(0)?,
                name: row.get(1)?,
                description: row.get(2)?,
                created_at: parse_timestamp(&row, 3)?,
            });
        }
        Ok(tags)
    }

    #[instrument(skip(self, rule))]
    pub async fn create_match_rule(&self, rule: &SysMatchRule) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO sys_match_rules (
                    rule_id, entity_type, tag_id, predicate, enabled, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    rule.rule_id.clone(),
                    rule.entity_type.clone(),
                    rule.tag_id.clone(),
                    serde_json::to_string(&rule.predicate)
                        .map_err(|e| DbError::MappingError(e.to_string()))?,
                    rule.enabled as i64,
                    rule.created_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    /// Reglas habilitadas para un tipo de entidad, evaluadas por el Auto-Tag Engine.
    #[instrument(skip(self))]
    pub async fn list_enabled_rules_for_entity_type(
        &self,
        entity_type: &str,
    ) -> Result<Vec<SysMatchRule>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT rule_id, entity_type, tag_id, predicate, enabled, created_at
                 FROM sys_match_rules WHERE entity_type = ?1 AND enabled = 1",
                params![entity_type],
            )
            .await?;

        let mut rules = Vec::new();
        while let Some(row) = rows.next().await? {
            rules.push(self.map_row_to_rule(&row)?);
        }
        Ok(rules)
    }

    #[instrument(skip(self))]
    pub async fn list_entity_tags(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<SysEntityTag>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT entity_type, entity_id, tag_id, source, rule_id, created_at
                 FROM sys_entity_tags WHERE entity_type = ?1 AND entity_id = ?2",
                params![entity_type, entity_id],
            )
            .await?;

        let mut tags = Vec::new();
        while let Some(row) = rows.next().await? {
            tags.push(self.map_row_to_entity_tag(&row)?);
        }
        Ok(tags)
    }

    /// Vincula un tag a una entidad respetando la precedencia de `source`.
    /// Una vinculación `manual` existente nunca es reemplazada por una de menor rango.
    #[instrument(skip(self))]
    pub async fn bind_entity_tag(
        &self,
        entity_type: &str,
        entity_id: &str,
        tag_id: &str,
        source: TagSource,
        rule_id: Option<&str>,
    ) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut existing = connection
            .query(
                "SELECT source FROM sys_entity_tags WHERE entity_type = ?1 AND entity_id = ?2 AND tag_id = ?3",
                params![entity_type, entity_id, tag_id],
            )
            .await?;

        if let Some(row) = existing.next().await? {
            let current_source = TagSource::from_str(&row.get::<String>(0)?);
            if current_source.outranks_auto_reconciliation() && !source.outranks_auto_reconciliation() {
                debug!(entity_type, entity_id, tag_id, "manual binding outranks auto reconciliation, skipped");
                return Ok(false);
            }
        }

        connection
            .execute(
                "INSERT INTO sys_entity_tags (entity_type, entity_id, tag_id, source, rule_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, CURRENT_TIMESTAMP)
                 ON CONFLICT(entity_type, entity_id, tag_id) DO UPDATE SET
                    source = excluded.source, rule_id = excluded.rule_id",
                params![entity_type, entity_id, tag_id, source.as_str(), rule_id],
            )
            .await?;
        Ok(true)
    }

    /// Retira una vinculación producida por reconciliación automática. Nunca toca `manual`.
    #[instrument(skip(self))]
    pub async fn unbind_auto_entity_tag(
        &self,
        entity_type: &str,
        entity_id: &str,
        tag_id: &str,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "DELETE FROM sys_entity_tags
                 WHERE entity_type = ?1 AND entity_id = ?2 AND tag_id = ?3 AND source != 'manual'",
                params![entity_type, entity_id, tag_id],
            )
            .await?;
        Ok(())
    }

    /// Entidades de un tipo dado que portan al menos un valor del campo indicado —
    /// usado por el Auto-Tag Engine para evaluar predicados `Equals`/`Contains` sin
    /// tener que cargar la tabla entera en memoria.
    #[instrument(skip(self))]
    pub async fn list_entity_ids_for_type(&self, entity_type: &str) -> Result<Vec<String>, DbError> {
        let connection = self.database_client.get_connection()?;
        let table = match entity_type {
            "asset_host" => "asset_hosts",
            "asset_service" => "asset_services",
            "agent" => "agents",
            other => return Err(DbError::MappingError(format!("unknown entity_type {other}"))),
        };
        let id_column = match entity_type {
            "asset_host" => "host_id",
            "asset_service" => "service_id",
            "agent" => "agent_id",
            _ => unreachable!(),
        };

        let connection_query = format!("SELECT {id_column} FROM {table}");
        let mut rows = connection.query(&connection_query, ()).await?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    fn map_row_to_rule(&self, row: &Row) -> Result<SysMatchRule, DbError> {
        let predicate_raw: String = row.get(3)?;
        Ok(SysMatchRule {
            rule_id: row.get(0)?,
            entity_type: row.get(1)?,
            tag_id: row.get(2)?,
            predicate: serde_json::from_str::<MatchPredicate>(&predicate_raw)
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            enabled: row.get::<i64>(4)? != 0,
            created_at: parse_timestamp(row, 5)?,
        })
    }

    fn map_row_to_entity_tag(&self, row: &Row) -> Result<SysEntityTag, DbError> {
        Ok(SysEntityTag {
            entity_type: row.get(0)?,
            entity_id: row.get(1)?,
            tag_id: row.get(2)?,
            source: TagSource::from_str(&row.get::<String>(3)?),
            rule_id: row.get(4)?,
            created_at: parse_timestamp(row, 5)?,
        })
    }
}
