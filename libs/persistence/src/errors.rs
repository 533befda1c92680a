// [libs/persistence/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG (V1.0)
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 *
 * VISION HIPER-HOLÍSTICA:
 * 1. CONFIGURATION AWARENESS: distingue fallos de red de variables de
 *    entorno vacías.
 * 2. ZERO ABBREVIATIONS: nomenclatura nominal absoluta.
 * =================================================================
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de red con el cluster libSQL/Turso.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (Variables vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el Dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    // --- ESTRATO DE PROYECTOS/WORKFLOWS/STAGES ---

    #[error("[L3_PROJECT_FAULT]: IDENTIFIER_NOT_FOUND")]
    ProjectNotFound,

    #[error("[L3_WORKFLOW_FAULT]: IDENTIFIER_NOT_FOUND")]
    WorkflowNotFound,

    #[error("[L3_STAGE_FAULT]: IDENTIFIER_NOT_FOUND")]
    StageNotFound,

    // --- ESTRATO DE TASKS ---

    #[error("[L3_TASK_FAULT]: IDENTIFIER_NOT_FOUND")]
    TaskNotFound,

    /// Race perdida en el claim atómico — el llamante debe pasar al siguiente Task.
    #[error("[L3_TASK_FAULT]: CLAIM_RACE_LOST")]
    ClaimConflict,

    /// El Task no se encuentra en un estado apto para la operación solicitada.
    #[error("[L3_TASK_FAULT]: INVALID_STATE_TRANSITION")]
    InvalidState,

    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE")]
    TransactionError,

    // --- ESTRATO DE AGENT REGISTRY ---

    #[error("[L3_AGENT_FAULT]: IDENTIFIER_NOT_FOUND")]
    AgentNotFound,

    /// `(hostname, port)` duplicado sin credenciales `(agent_id, token)` coincidentes.
    #[error("[L3_AGENT_FAULT]: REGISTRATION_CONFLICT -> {0}")]
    RegistrationConflict(String),
}
