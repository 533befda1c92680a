// [libs/persistence/src/repositories/asset_repository.rs]
/*!
 * =================================================================
 * APARATO: ASSET STORE REPOSITORY (V1.0)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: PERSISTENCIA NORMALIZADA DE HALLAZGOS
 *
 * Semántica de upsert sin excepción: el `first_seen_at` más antiguo
 * jamás se pierde, el `last_seen_at` más reciente siempre gana. Los
 * Mappers del ETL llaman a este repositorio una vez por hallazgo
 * normalizado; nunca borran una fila existente.
 * =================================================================
 */

use super::parse_timestamp;
use crate::errors::DbError;
use crate::TursoClient;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use neoscan_domain::{AssetHost, AssetService, AssetVuln, StageResult};
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct AssetRepository {
    database_client: TursoClient,
}

impl AssetRepository {
    #[must_use]
    pub fn new(database_client: TursoClient) -> Self {
        Self { database_client }
    }

    #[instrument(skip(self))]
    pub async fn insert_stage_result(&self, result: &StageResult) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO stage_results (
                    result_id, task_id, target_value, target_type, result_type,
                    attributes, ingestion_error, received_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    result.result_id.clone(),
                    result.task_id.clone(),
                    result.target_value.clone(),
                    result.target_type.clone(),
                    result.result_type.clone(),
                    result.attributes.to_string(),
                    result.ingestion_error.clone(),
                    result.received_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    /// Fusiona una observación de host (invariante de `merge_seen`), creando la fila si no existe.
    #[instrument(skip(self))]
    pub async fn upsert_host(
        &self,
        ip: &str,
        hostname: Option<&str>,
        observed_at: DateTime<Utc>,
    ) -> Result<AssetHost, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut existing = connection
            .query(&format!("{SELECT_HOST_COLUMNS} WHERE ip = ?1"), params![ip])
            .await?;

        let mut host = match existing.next().await? {
            Some(row) => self.map_row_to_host(&row)?,
            None => AssetHost {
                host_id: Uuid::new_v4().to_string(),
                ip: ip.to_string(),
                hostname: None,
                os_name: None,
                os_family: None,
                os_accuracy: None,
                first_seen_at: observed_at,
                last_seen_at: observed_at,
            },
        };

        host.merge_seen(observed_at);
        if let Some(hostname) = hostname {
            host.hostname = Some(hostname.to_string());
        }

        connection
            .execute(
                "INSERT INTO asset_hosts (
                    host_id, ip, hostname, os_name, os_family, os_accuracy, first_seen_at, last_seen_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(ip) DO UPDATE SET
                    hostname = excluded.hostname,
                    os_name = excluded.os_name,
                    os_family = excluded.os_family,
                    os_accuracy = excluded.os_accuracy,
                    first_seen_at = excluded.first_seen_at,
                    last_seen_at = excluded.last_seen_at",
                params![
                    host.host_id.clone(),
                    host.ip.clone(),
                    host.hostname.clone(),
                    host.os_name.clone(),
                    host.os_family.clone(),
                    host.os_accuracy.map(|a| a as i64),
                    host.first_seen_at.to_rfc3339(),
                    host.last_seen_at.to_rfc3339(),
                ],
            )
            .await?;

        Ok(host)
    }

    #[instrument(skip(self))]
    pub async fn update_host_os(
        &self,
        host_id: &str,
        os_name: &str,
        os_family: &str,
        os_accuracy: u8,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "UPDATE asset_hosts SET os_name = ?2, os_family = ?3, os_accuracy = ?4
                 WHERE host_id = ?1 AND (os_accuracy IS NULL OR os_accuracy < ?4)",
                params![host_id, os_name, os_family, os_accuracy as i64],
            )
            .await?;
        Ok(())
    }

    /// Fusiona una observación de servicio, clave única `(host_id, port, proto)`.
    #[instrument(skip(self))]
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_service(
        &self,
        host_id: &str,
        port: u16,
        proto: &str,
        state: &str,
        service_hint: Option<&str>,
        product: Option<&str>,
        version: Option<&str>,
        info: Option<&str>,
        cpe: Option<&str>,
        banner: Option<&str>,
        observed_at: DateTime<Utc>,
    ) -> Result<AssetService, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut existing = connection
            .query(
                &format!("{SELECT_SERVICE_COLUMNS} WHERE host_id = ?1 AND port = ?2 AND proto = ?3"),
                params![host_id, port, proto],
            )
            .await?;

        let mut service = match existing.next().await? {
            Some(row) => self.map_row_to_service(&row)?,
            None => AssetService {
                service_id: Uuid::new_v4().to_string(),
                host_id: host_id.to_string(),
                port,
                proto: proto.to_string(),
                state: state.to_string(),
                service_hint: None,
                product: None,
                version: None,
                info: None,
                cpe: None,
                banner: None,
                first_seen_at: observed_at,
                last_seen_at: observed_at,
            },
        };

        service.merge_seen(observed_at);
        service.state = state.to_string();
        service.service_hint = service_hint.map(str::to_string).or(service.service_hint);
        service.product = product.map(str::to_string).or(service.product);
        service.version = version.map(str::to_string).or(service.version);
        service.info = info.map(str::to_string).or(service.info);
        service.cpe = cpe.map(str::to_string).or(service.cpe);
        service.banner = banner.map(str::to_string).or(service.banner);

        connection
            .execute(
                "INSERT INTO asset_services (
                    service_id, host_id, port, proto, state, service_hint, product,
                    version, info, cpe, banner, first_seen_at, last_seen_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ON CONFLICT(host_id, port, proto) DO UPDATE SET
                    state = excluded.state,
                    service_hint = excluded.service_hint,
                    product = excluded.product,
                    version = excluded.version,
                    info = excluded.info,
                    cpe = excluded.cpe,
                    banner = excluded.banner,
                    first_seen_at = excluded.first_seen_at,
                    last_seen_at = excluded.last_seen_at",
                params![
                    service.service_id.clone(),
                    service.host_id.clone(),
                    service.port,
                    service.proto.clone(),
                    service.state.clone(),
                    service.service_hint.clone(),
                    service.product.clone(),
                    service.version.clone(),
                    service.info.clone(),
                    service.cpe.clone(),
                    service.banner.clone(),
                    service.first_seen_at.to_rfc3339(),
                    service.last_seen_at.to_rfc3339(),
                ],
            )
            .await?;

        Ok(service)
    }

    #[instrument(skip(self, vuln))]
    pub async fn insert_vuln(&self, vuln: &AssetVuln) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO asset_vulns (
                    vuln_id, host_id, service_id, title, severity, detail, first_seen_at, last_seen_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    vuln.vuln_id.clone(),
                    vuln.host_id.clone(),
                    vuln.service_id.clone(),
                    vuln.title.clone(),
                    vuln.severity.clone(),
                    vuln.detail.clone(),
                    vuln.first_seen_at.to_rfc3339(),
                    vuln.last_seen_at.to_rfc3339(),
                ],
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_host_by_ip(&self, ip: &str) -> Result<AssetHost, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(&format!("{SELECT_HOST_COLUMNS} WHERE ip = ?1"), params![ip])
            .await?;
        let row = rows.next().await?.ok_or(DbError::MappingError(format!("no host for ip {ip}")))?;
        self.map_row_to_host(&row)
    }

    fn map_row_to_host(&self, row: &Row) -> Result<AssetHost, DbError> {
        Ok(AssetHost {
            host_id: row.get(0)?,
            ip: row.get(1)?,
            hostname: row.get(2)?,
            os_name: row.get(3)?,
            os_family: row.get(4)?,
            os_accuracy: row.get::<Option<i64>>(5)?.map(|a| a as u8),
            first_seen_at: parse_timestamp(row, 6)?,
            last_seen_at: parse_timestamp(row, 7)?,
        })
    }

    fn map_row_to_service(&self, row: &Row) -> Result<AssetService, DbError> {
        Ok(AssetService {
            service_id: row.get(0)?,
            host_id: row.get(1)?,
            port: row.get::<i64>(2)? as u16,
            proto: row.get(3)?,
            state: row.get(4)?,
            service_hint: row.get(5)?,
            product: row.get(6)?,
            version: row.get(7)?,
            info: row.get(8)?,
            cpe: row.get(9)?,
            banner: row.get(10)?,
            first_seen_at: parse_timestamp(row, 11)?,
            last_seen_at: parse_timestamp(row, 12)?,
        })
    }
}

const SELECT_HOST_COLUMNS: &str = "SELECT host_id, ip, hostname, os_name, os_family, \
    os_accuracy, first_seen_at, last_seen_at FROM asset_hosts";

const SELECT_SERVICE_COLUMNS: &str = "SELECT service_id, host_id, port, proto, state, \
    service_hint, product, version, info, cpe, banner, first_seen_at, last_seen_at \
    FROM asset_services";
