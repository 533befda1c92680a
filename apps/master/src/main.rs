// [apps/master/src/main.rs]
/*!
 * APARATO: MASTER ENTRY POINT
 * CLASIFICACIÓN: APPLICATION SHELL
 * RESPONSABILIDAD: CARGA DE ENTORNO E IGNICIÓN DEL KERNEL
 */

use neoscan_master::prelude::*;
use neoscan_telemetry::init_tracing;

use dotenvy::dotenv;
use ipnetwork::IpNetwork;
use std::time::Duration;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    init_tracing("neoscan_master");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let database_connection_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let database_access_token = std::env::var("TURSO_AUTH_TOKEN").ok();
        let listening_port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let config = AppConfig {
            max_tasks_per_agent: env_parse("MAX_TASKS_PER_AGENT", 5),
            scheduler_tick_interval: Duration::from_secs(env_parse("SCHEDULER_TICK_SECONDS", 5)),
            agent_stale_after_seconds: env_parse("AGENT_STALE_AFTER_SECONDS", 90),
            agent_reaper_interval: Duration::from_secs(env_parse("AGENT_REAPER_INTERVAL_SECONDS", 30)),
            etl_worker_count: env_parse("ETL_WORKER_COUNT", 4),
            etl_queue_capacity: env_parse("ETL_QUEUE_CAPACITY", 1024),
            forbidden_hosts: parse_forbidden_hosts(),
            worker_auth_token: std::env::var("WORKER_AUTH_TOKEN").unwrap_or_default(),
            dispatch_min_poll_interval: Duration::from_millis(env_parse("DISPATCH_MIN_POLL_INTERVAL_MS", 500)),
        };

        info!(port = listening_port, "master igniting");

        let kernel = MasterKernel::ignite(
            &database_connection_url,
            database_access_token,
            listening_port,
            config,
        )
        .await;

        kernel.launch().await;

        Ok(())
    })
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_forbidden_hosts() -> Vec<IpNetwork> {
    std::env::var("FORBIDDEN_HOSTS")
        .unwrap_or_default()
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}
