// [libs/persistence/src/schema.rs]
/*!
 * =================================================================
 * APARATO: SOVEREIGN DATABASE SCHEMA (V1.0)
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GOBERNANZA ESTRUCTURAL E IDEMPOTENCIA TOTAL
 *
 * Tablas clave: projects, workflows, scan_stages, agent_tasks,
 * stage_results, asset_hosts, asset_services, asset_vulns, agents,
 * agent_metrics_samples, sys_tags, sys_entity_tags, sys_match_rules.
 * Índices: tasks(status, priority DESC, created_at ASC); agents(status);
 * asset_services(host_id, port, proto) unique.
 * =================================================================
 */

use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument, warn};

/**
 * ESTRATO 1: SOLIDIFICACIÓN (Génesis de Tablas)
 * Define las entidades base del ecosistema NeoScan.
 */
const TACTICAL_TABLES: &[(&str, &str)] = &[
    ("TABLE_PROJECTS", r#"
        CREATE TABLE IF NOT EXISTS projects (
            project_id TEXT PRIMARY KEY,
            owner_identifier TEXT NOT NULL,
            display_name TEXT NOT NULL,
            target_scope TEXT NOT NULL DEFAULT '[]',
            workflow_id TEXT NOT NULL,
            cron_expr TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            last_exec_time DATETIME,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_WORKFLOWS", r#"
        CREATE TABLE IF NOT EXISTS workflows (
            workflow_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_SCAN_STAGES", r#"
        CREATE TABLE IF NOT EXISTS scan_stages (
            stage_id TEXT PRIMARY KEY,
            workflow_id TEXT NOT NULL,
            stage_name TEXT NOT NULL,
            tool_name TEXT NOT NULL,
            tool_params TEXT NOT NULL DEFAULT '',
            predecessors TEXT NOT NULL DEFAULT '[]',
            target_policy TEXT NOT NULL DEFAULT '{}',
            execution_policy TEXT NOT NULL DEFAULT '{}',
            performance_settings TEXT NOT NULL DEFAULT '{}'
        );
    "#),
    ("TABLE_AGENT_TASKS", r#"
        CREATE TABLE IF NOT EXISTS agent_tasks (
            task_id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            workflow_id TEXT NOT NULL,
            stage_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            priority INTEGER NOT NULL DEFAULT 0,
            tool_name TEXT NOT NULL,
            tool_params TEXT NOT NULL DEFAULT '',
            input_target TEXT NOT NULL DEFAULT '[]',
            required_tags TEXT NOT NULL DEFAULT '[]',
            task_category TEXT NOT NULL DEFAULT 'user',
            assigned_agent_id TEXT,
            output_result TEXT,
            error_msg TEXT,
            timeout_seconds INTEGER NOT NULL DEFAULT 300,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_STAGE_RESULTS", r#"
        CREATE TABLE IF NOT EXISTS stage_results (
            result_id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL,
            target_value TEXT NOT NULL,
            target_type TEXT NOT NULL,
            result_type TEXT NOT NULL,
            attributes TEXT NOT NULL DEFAULT '{}',
            ingestion_error TEXT,
            received_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_ASSET_HOSTS", r#"
        CREATE TABLE IF NOT EXISTS asset_hosts (
            host_id TEXT PRIMARY KEY,
            ip TEXT NOT NULL UNIQUE,
            hostname TEXT,
            os_name TEXT,
            os_family TEXT,
            os_accuracy INTEGER,
            first_seen_at DATETIME NOT NULL,
            last_seen_at DATETIME NOT NULL
        );
    "#),
    ("TABLE_ASSET_SERVICES", r#"
        CREATE TABLE IF NOT EXISTS asset_services (
            service_id TEXT PRIMARY KEY,
            host_id TEXT NOT NULL,
            port INTEGER NOT NULL,
            proto TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'open',
            service_hint TEXT,
            product TEXT,
            version TEXT,
            info TEXT,
            cpe TEXT,
            banner TEXT,
            first_seen_at DATETIME NOT NULL,
            last_seen_at DATETIME NOT NULL
        );
    "#),
    ("TABLE_ASSET_VULNS", r#"
        CREATE TABLE IF NOT EXISTS asset_vulns (
            vuln_id TEXT PRIMARY KEY,
            host_id TEXT NOT NULL,
            service_id TEXT,
            title TEXT NOT NULL,
            severity TEXT NOT NULL DEFAULT 'info',
            detail TEXT,
            first_seen_at DATETIME NOT NULL,
            last_seen_at DATETIME NOT NULL
        );
    "#),
    ("TABLE_AGENTS", r#"
        CREATE TABLE IF NOT EXISTS agents (
            agent_id TEXT PRIMARY KEY,
            hostname TEXT NOT NULL,
            port INTEGER NOT NULL,
            ip_address TEXT NOT NULL,
            os TEXT NOT NULL,
            arch TEXT NOT NULL,
            version TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'online',
            token TEXT NOT NULL,
            token_expiry DATETIME NOT NULL,
            last_heartbeat DATETIME DEFAULT CURRENT_TIMESTAMP,
            capabilities TEXT NOT NULL DEFAULT '[]',
            tags TEXT NOT NULL DEFAULT '[]',
            task_support TEXT NOT NULL DEFAULT '[]',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(hostname, port)
        );
    "#),
    ("TABLE_AGENT_METRICS_SAMPLES", r#"
        CREATE TABLE IF NOT EXISTS agent_metrics_samples (
            agent_id TEXT NOT NULL,
            sampled_at DATETIME NOT NULL,
            cpu_percent REAL NOT NULL DEFAULT 0.0,
            mem_percent REAL NOT NULL DEFAULT 0.0,
            disk_percent REAL NOT NULL DEFAULT 0.0,
            net_rx_bytes INTEGER NOT NULL DEFAULT 0,
            net_tx_bytes INTEGER NOT NULL DEFAULT 0,
            running_tasks INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("TABLE_SYS_TAGS", r#"
        CREATE TABLE IF NOT EXISTS sys_tags (
            tag_id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_SYS_MATCH_RULES", r#"
        CREATE TABLE IF NOT EXISTS sys_match_rules (
            rule_id TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL,
            tag_id TEXT NOT NULL,
            predicate TEXT NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
    "#),
    ("TABLE_SYS_ENTITY_TAGS", r#"
        CREATE TABLE IF NOT EXISTS sys_entity_tags (
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            tag_id TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT 'manual',
            rule_id TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY(entity_type, entity_id, tag_id)
        );
    "#),
];

/**
 * ESTRATO 2: EVOLUCIÓN (Mutaciones de Columna)
 * Asegura que las tablas existentes se adapten a nuevas capacidades.
 */
const EVOLUTIONARY_STRATA: &[(&str, &str)] = &[
    ("PROJECT_LAST_EXEC", "ALTER TABLE projects ADD COLUMN last_exec_time DATETIME"),
];

/**
 * ESTRATO 3: ENDURECIMIENTO (Índices de Aceleración)
 */
const ACCELERATION_INDEXES: &[(&str, &str)] = &[
    ("IDX_TASKS_DISPATCH", "CREATE INDEX IF NOT EXISTS idx_agent_tasks_dispatch ON agent_tasks(status, priority DESC, created_at ASC);"),
    ("IDX_TASKS_PROJECT", "CREATE INDEX IF NOT EXISTS idx_agent_tasks_project ON agent_tasks(project_id, stage_id);"),
    ("IDX_AGENTS_STATUS", "CREATE INDEX IF NOT EXISTS idx_agents_status ON agents(status);"),
    ("IDX_ASSET_SERVICES_UNIQUE", "CREATE UNIQUE INDEX IF NOT EXISTS idx_asset_services_unique ON asset_services(host_id, port, proto);"),
    ("IDX_ENTITY_TAGS_SOURCE", "CREATE INDEX IF NOT EXISTS idx_entity_tags_source ON sys_entity_tags(entity_type, entity_id, source);"),
];

/**
 * Ejecuta la secuencia maestra de sincronización del esquema estructural.
 */
#[instrument(skip(database_connection))]
pub async fn apply_full_sovereign_schema(database_connection: &Connection) -> Result<()> {
    info!("🏗️ [SCHEMA_ENGINE]: Initiating structural synchronization...");

    solidify_base_strata(database_connection).await?;
    execute_evolutionary_repair(database_connection).await?;
    harden_access_layer(database_connection).await?;

    info!("✅ [SCHEMA_ENGINE]: Tactical Ledger level and certified.");
    Ok(())
}

async fn solidify_base_strata(db: &Connection) -> Result<()> {
    for (identifier, sql) in TACTICAL_TABLES {
        debug!("  ↳ Solidifying: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_SOLIDIFICATION_FAULT: {}", identifier))?;
    }
    Ok(())
}

async fn execute_evolutionary_repair(db: &Connection) -> Result<()> {
    for (identifier, sql) in EVOLUTIONARY_STRATA {
        match db.execute(*sql, ()).await {
            Ok(_) => info!("  🟢 [REPAIR_OK]: Applied evolutionary stratum {}", identifier),
            Err(e) => {
                let message = e.to_string();
                if message.contains("duplicate column name") {
                    debug!("  ⚪ [REPAIR_SKIP]: {} already level.", identifier);
                } else {
                    warn!("  ⚠️ [REPAIR_BYPASS]: {} check incomplete: {}", identifier, message);
                }
            }
        }
    }
    Ok(())
}

async fn harden_access_layer(db: &Connection) -> Result<()> {
    for (identifier, sql) in ACCELERATION_INDEXES {
        debug!("  ↳ Hardening: {}", identifier);
        db.execute(*sql, ()).await
            .with_context(|| format!("CRITICAL_HARDENING_FAULT: {}", identifier))?;
    }
    Ok(())
}
