// [apps/agent/src/main.rs]
/*!
 * APARATO: AGENT SHELL
 * CLASIFICACIÓN: APPLICATION LAYER (ENTRY POINT)
 * RESPONSABILIDAD: BOOTSTRAP DE ENTORNO E IGNICIÓN DEL MOTOR DE ESCANEO
 *
 * El binario es un switchboard puro: parsea directivas de arranque,
 * instala el manejador de cierre ordenado y delega la totalidad de la
 * operación al `AgentEngine`.
 */

use anyhow::Result;
use clap::Parser;
use neoscan_agent::client::MasterClient;
use neoscan_agent::config::Config;
use neoscan_agent::engine::AgentEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Directivas de arranque, aceptadas por CLI o variable de entorno; sólo
/// sobrescriben el entorno cuando se proveen explícitamente, dejando a
/// `Config::from_env` como única fuente de verdad para el resto de campos.
#[derive(Parser, Debug)]
#[command(name = "neoscan-agent", version, about = "NeoScan remote scanning agent")]
struct AgentDirectives {
    #[arg(long, env = "MASTER_URL")]
    master_url: Option<String>,

    #[arg(long, env = "WORKER_AUTH_TOKEN")]
    worker_auth_token: Option<String>,

    #[arg(long, env = "AGENT_HOSTNAME")]
    hostname: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Ok(environment) = std::env::var("NEOSCAN_ENV") {
        let _ = dotenvy::from_filename(format!(".env.{environment}"));
    } else {
        let _ = dotenvy::dotenv();
    }

    tracing_subscriber::fmt::init();
    info!("neoscan-agent starting");

    let directives = AgentDirectives::parse();
    if let Some(master_url) = &directives.master_url {
        std::env::set_var("MASTER_URL", master_url);
    }
    if let Some(token) = &directives.worker_auth_token {
        std::env::set_var("WORKER_AUTH_TOKEN", token);
    }
    if let Some(hostname) = &directives.hostname {
        std::env::set_var("AGENT_HOSTNAME", hostname);
    }

    let config = Config::from_env();

    let shutdown_signal = Arc::new(AtomicBool::new(false));
    let signal_flag = Arc::clone(&shutdown_signal);
    ctrlc::set_handler(move || {
        warn!("shutdown requested, finishing in-flight tasks");
        signal_flag.store(true, Ordering::SeqCst);
    })?;

    let client = MasterClient::new(config.master_url.clone());
    let engine = AgentEngine::new(client, shutdown_signal, config);

    engine.ignite().await;

    info!("neoscan-agent shut down cleanly");
    Ok(())
}
