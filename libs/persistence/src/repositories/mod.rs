// [libs/persistence/src/repositories/mod.rs]
//! Repositorios de autoridad única: un módulo por agregado de dominio.
//! Cada repositorio encapsula el SQL soberano de su tabla; ninguna otra
//! capa del Master toca `libsql::Connection` directamente.

pub mod agent_repository;
pub mod asset_repository;
pub mod project_repository;
pub mod tag_repository;
pub mod task_repository;

pub use agent_repository::AgentRepository;
pub use asset_repository::AssetRepository;
pub use project_repository::ProjectRepository;
pub use tag_repository::TagRepository;
pub use task_repository::TaskRepository;

use chrono::{DateTime, Utc};
use libsql::Row;

use crate::errors::DbError;

/// Parseo tolerante de columnas `DATETIME`: acepta RFC3339 (escrito por esta crate)
/// y el formato `YYYY-MM-DD HH:MM:SS` que libSQL produce para `CURRENT_TIMESTAMP`.
pub(crate) fn parse_timestamp(row: &Row, index: i32) -> Result<DateTime<Utc>, DbError> {
    let raw: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
                .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc))
        })
        .map_err(|e| DbError::MappingError(format!("timestamp column {index}: {e}")))
}
