// [apps/agent/src/engine.rs]
/*!
 * APARATO: AGENT EXECUTION ENGINE
 * CLASIFICACIÓN: WORKER EXECUTION LAYER
 * RESPONSABILIDAD: REGISTRO, CICLO DE HEARTBEAT/POLL Y DESPACHO DE TASKS
 * A LOS MOTORES DE ESCANEO
 *
 * El ciclo principal es deliberadamente simple: registrarse, lanzar un
 * daemon de heartbeat en segundo plano, y turnarse entre sondear al
 * Master por Tasks y ejecutarlos. Cada Task se despacha a su motor por
 * `tool_name`; el Adaptive Limiter y el RTT Estimator son compartidos
 * por todos los Tasks en vuelo, tal como exige el modelo de concurrencia.
 */

use crate::brute::{self, BruteOptions, BruteTarget};
use crate::client::MasterClient;
use crate::config::Config;
use crate::crackers::registry;
use crate::dictionary::DictionaryOverrides;
use crate::errors::AgentError;
use crate::limiter::AdaptiveLimiter;
use crate::metrics;
use crate::osscan::{self, OsScanInput, ScanMode};
use crate::portscan::{self, probes::ProbeDatabase};
use crate::rtt::RttEstimator;
use crate::rules::service_probes;
use neoscan_domain::{
    AgentRegistrationRequest, BruteAttemptAttributes, BruteAttributes, FastPortScanAttributes,
    OsScanAttributes, PortScanSummary, ReportedTaskStatus, ServiceScanAttributes,
    StageResultEnvelope, Task, TaskStatusReport,
};
use serde_json::Value;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Puertos sondeados por `fast_port_scan` cuando la Stage no especifica una lista propia.
const DEFAULT_PORTS: &[u16] = &[
    21, 22, 23, 25, 80, 110, 135, 139, 143, 443, 445, 993, 995, 1433, 1521, 3306, 3389, 5432,
    5900, 6379, 8080, 8443, 9000, 27017,
];

pub struct AgentEngine {
    client: Arc<Mutex<MasterClient>>,
    shutdown_signal: Arc<AtomicBool>,
    config: Config,
    limiter: Arc<AdaptiveLimiter>,
    rtt: Arc<RttEstimator>,
    probe_database: Arc<ProbeDatabase>,
    running_tasks: Arc<AtomicU32>,
}

impl AgentEngine {
    pub fn new(client: MasterClient, shutdown_signal: Arc<AtomicBool>, config: Config) -> Self {
        let limiter = AdaptiveLimiter::new(crate::limiter::LimiterConfig {
            initial: config.limiter_initial,
            min: config.limiter_min,
            max: config.limiter_max,
        });
        let probe_database = Arc::new(ProbeDatabase::new(service_probes::load()));

        Self {
            client: Arc::new(Mutex::new(client)),
            shutdown_signal,
            config,
            limiter,
            rtt: Arc::new(RttEstimator::default()),
            probe_database,
            running_tasks: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Secuencia de ignición: registro, daemon de heartbeat, bucle poll/ejecuta/reporta.
    #[instrument(skip(self))]
    pub async fn ignite(&self) {
        info!("agent engine starting");

        let agent_id = loop {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                return;
            }
            match self.register().await {
                Ok(id) => break id,
                Err(registration_fault) => {
                    warn!(%registration_fault, "registration failed, retrying in 10s");
                    sleep(Duration::from_secs(10)).await;
                }
            }
        };

        info!(%agent_id, "registered with master");

        let heartbeat_handle = {
            let agent_id = agent_id.clone();
            let shutdown = Arc::clone(&self.shutdown_signal);
            let interval = self.config.heartbeat_interval;
            let running_tasks = Arc::clone(&self.running_tasks);
            let client = Arc::clone(&self.client);
            tokio::spawn(Self::heartbeat_daemon(agent_id, shutdown, interval, running_tasks, client))
        };

        while !self.shutdown_signal.load(Ordering::SeqCst) {
            let current_load = self.running_tasks.load(Ordering::Relaxed);
            match self.poll_tasks(&agent_id, current_load).await {
                Ok(tasks) if tasks.is_empty() => {}
                Ok(tasks) => {
                    for task in tasks {
                        self.spawn_task(agent_id.clone(), task);
                    }
                }
                Err(poll_fault) => debug!(%poll_fault, "task poll failed"),
            }

            sleep(self.config.poll_interval).await;
        }

        heartbeat_handle.abort();
        info!("agent engine shut down");
    }

    async fn register(&self) -> Result<String, AgentError> {
        let request = AgentRegistrationRequest {
            hostname: self.config.hostname.clone(),
            port: self.config.listening_port,
            ip_address: local_ip_address(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            task_support: self.config.task_support.clone(),
            capabilities: registry::all().iter().map(|cracker| cracker.name().to_string()).collect(),
            tags: self.config.tags.clone(),
            agent_id: None,
            token: None,
        };

        let mut client = self.client.lock().await;
        client.register(&request).await
    }

    async fn poll_tasks(&self, agent_id: &str, current_load: u32) -> Result<Vec<Task>, AgentError> {
        let client = self.client.lock().await;
        client.poll_tasks(agent_id, current_load).await
    }

    fn spawn_task(&self, agent_id: String, task: Task) {
        self.running_tasks.fetch_add(1, Ordering::Relaxed);
        metrics::set_running_tasks(self.running_tasks.load(Ordering::Relaxed));

        let limiter = Arc::clone(&self.limiter);
        let rtt = Arc::clone(&self.rtt);
        let probe_database = Arc::clone(&self.probe_database);
        let running_tasks = Arc::clone(&self.running_tasks);
        let client = Arc::clone(&self.client);

        tokio::spawn(async move {
            let task_id = task.task_id.clone();
            let report = Self::execute_task(agent_id.clone(), task, limiter, rtt, probe_database).await;

            let guard = client.lock().await;
            if let Err(report_fault) = guard.report_status(&agent_id, &task_id, &report).await {
                error!(%report_fault, %task_id, "failed to report task status");
            }
            drop(guard);

            running_tasks.fetch_sub(1, Ordering::Relaxed);
            metrics::set_running_tasks(running_tasks.load(Ordering::Relaxed));
        });
    }

    async fn heartbeat_daemon(
        agent_id: String,
        shutdown: Arc<AtomicBool>,
        interval: Duration,
        running_tasks: Arc<AtomicU32>,
        client: Arc<Mutex<MasterClient>>,
    ) {
        while !shutdown.load(Ordering::SeqCst) {
            sleep(interval).await;
            metrics::set_running_tasks(running_tasks.load(Ordering::Relaxed));

            let sample = metrics::sample(&agent_id).await;
            let guard = client.lock().await;
            if let Err(heartbeat_fault) = guard.heartbeat(&agent_id, sample).await {
                debug!(%heartbeat_fault, "heartbeat failed");
            }
        }
    }

    #[instrument(skip(limiter, rtt, probe_database), fields(task_id = %task.task_id, tool = %task.tool_name))]
    async fn execute_task(
        agent_id: String,
        task: Task,
        limiter: Arc<AdaptiveLimiter>,
        rtt: Arc<RttEstimator>,
        probe_database: Arc<ProbeDatabase>,
    ) -> TaskStatusReport {
        let deadline = Instant::now() + Duration::from_secs(task.timeout_seconds.max(1) as u64);
        let params: Value = serde_json::from_str(&task.tool_params).unwrap_or(Value::Null);

        let outcome = match task.tool_name.as_str() {
            "fast_port_scan" => {
                Self::run_fast_port_scan(&task.input_target, &params, &probe_database, &rtt).await
            }
            "service_scan" => {
                Self::run_service_scan(&task.input_target, &probe_database, &rtt).await
            }
            "os_scan" => Self::run_os_scan(&task.input_target, &params).await,
            "brute" => {
                Self::run_brute(&task.input_target, &params, Arc::clone(&limiter), deadline).await
            }
            other => Err(format!("unsupported tool_name: {other}")),
        };

        match outcome {
            Ok(stage_results) => TaskStatusReport {
                task_id: task.task_id,
                agent_id,
                status: ReportedTaskStatus::Completed,
                progress: 100,
                produced_at: chrono::Utc::now(),
                stage_results,
                error_msg: None,
            },
            Err(detail) => TaskStatusReport {
                task_id: task.task_id,
                agent_id,
                status: ReportedTaskStatus::Failed,
                progress: 0,
                produced_at: chrono::Utc::now(),
                stage_results: Vec::new(),
                error_msg: Some(detail),
            },
        }
    }

    async fn run_fast_port_scan(
        targets: &[String],
        params: &Value,
        database: &ProbeDatabase,
        rtt: &RttEstimator,
    ) -> Result<Vec<StageResultEnvelope>, String> {
        let ports = parse_ports_spec(params.get("ports").and_then(Value::as_str));
        let identify = params.get("identify").and_then(Value::as_bool).unwrap_or(false);

        let mut envelopes = Vec::with_capacity(targets.len());
        for host in targets {
            let mut observations = Vec::with_capacity(ports.len());
            for &port in &ports {
                observations.push(portscan::scan_port(host, port, identify, database, rtt).await);
            }

            let open_count = observations.iter().filter(|o| o.state == "open").count();
            envelopes.push(StageResultEnvelope {
                result_type: "fast_port_scan".to_string(),
                target_type: "host".to_string(),
                target_value: host.clone(),
                attributes: serde_json::to_value(FastPortScanAttributes {
                    ports: observations,
                    summary: PortScanSummary { open_count },
                })
                .map_err(|e| e.to_string())?,
            });
        }
        Ok(envelopes)
    }

    async fn run_service_scan(
        targets: &[String],
        database: &ProbeDatabase,
        rtt: &RttEstimator,
    ) -> Result<Vec<StageResultEnvelope>, String> {
        let mut envelopes = Vec::with_capacity(targets.len());
        for target in targets {
            let (host, port) = parse_host_port(target);
            let (service, fingerprint) = portscan::identify_service(&host, port, database, rtt).await;
            let Some(fingerprint) = fingerprint else { continue };

            envelopes.push(StageResultEnvelope {
                result_type: "service_scan".to_string(),
                target_type: "service".to_string(),
                target_value: target.clone(),
                attributes: serde_json::to_value(ServiceScanAttributes {
                    service: service.unwrap_or_else(|| "unknown".to_string()),
                    product: fingerprint.product,
                    version: fingerprint.version,
                    info: fingerprint.info,
                    cpe: fingerprint.cpe,
                    hostname: fingerprint.hostname,
                })
                .map_err(|e| e.to_string())?,
            });
        }
        Ok(envelopes)
    }

    async fn run_os_scan(targets: &[String], params: &Value) -> Result<Vec<StageResultEnvelope>, String> {
        let mode = match params.get("mode").and_then(Value::as_str) {
            Some("deep") => ScanMode::Deep,
            Some("fast") => ScanMode::Fast,
            _ => ScanMode::Auto,
        };
        let banners: Vec<String> = params
            .get("banners")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let mut envelopes = Vec::with_capacity(targets.len());
        for target in targets {
            let (host, open_port, closed_port) = parse_os_target(target);
            let input = OsScanInput { host: &host, open_port, closed_port, banners: banners.clone() };

            let Some(info) = osscan::scan(input, mode, Duration::from_secs(2)).await else { continue };

            envelopes.push(StageResultEnvelope {
                result_type: "os_scan".to_string(),
                target_type: "host".to_string(),
                target_value: host,
                attributes: serde_json::to_value(OsScanAttributes {
                    name: info.name,
                    family: info.family,
                    version: info.version,
                    accuracy: info.accuracy,
                    source: format!("{:?}", info.source),
                })
                .map_err(|e| e.to_string())?,
            });
        }
        Ok(envelopes)
    }

    async fn run_brute(
        targets: &[String],
        params: &Value,
        limiter: Arc<AdaptiveLimiter>,
        deadline: Instant,
    ) -> Result<Vec<StageResultEnvelope>, String> {
        let protocol = params
            .get("protocol")
            .and_then(Value::as_str)
            .ok_or_else(|| "brute task missing \"protocol\" in tool_params".to_string())?
            .to_string();

        let brute_targets: Vec<BruteTarget> = targets
            .iter()
            .map(|target| {
                let (host, port) = parse_host_port(target);
                BruteTarget { protocol: protocol.clone(), host, port }
            })
            .collect();

        let overrides = DictionaryOverrides::from_csv(
            params.get("users").and_then(Value::as_str),
            params.get("passwords").and_then(Value::as_str),
        );
        let options = BruteOptions {
            stop_on_success: params.get("stop_on_success").and_then(Value::as_bool).unwrap_or(true),
        };

        let results = brute::run_task(brute_targets, overrides, options, limiter, deadline).await;

        Ok(vec![StageResultEnvelope {
            result_type: "brute".to_string(),
            target_type: "batch".to_string(),
            target_value: protocol,
            attributes: serde_json::to_value(BruteAttributes {
                attempts: results
                    .into_iter()
                    .map(|r| BruteAttemptAttributes {
                        host: r.host,
                        port: r.port,
                        service: r.service,
                        username: r.username,
                        password: r.password,
                        success: r.success,
                    })
                    .collect(),
            })
            .map_err(|e| e.to_string())?,
        }])
    }
}

/// Divide `host:port`; sin `:`, asume puerto `0` (el caller decide si eso es válido).
fn parse_host_port(target: &str) -> (String, u16) {
    match target.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(0)),
        None => (target.to_string(), 0),
    }
}

/// `host`, `host:open_port` o `host:open_port:closed_port` — los dos últimos campos son
/// opcionales y habilitan el motor de pila del OS Scanner cuando están presentes.
fn parse_os_target(target: &str) -> (String, Option<u16>, Option<u16>) {
    let parts: Vec<&str> = target.split(':').collect();
    match parts.as_slice() {
        [host] => (host.to_string(), None, None),
        [host, open] => (host.to_string(), open.parse().ok(), None),
        [host, open, closed, ..] => (host.to_string(), open.parse().ok(), closed.parse().ok()),
        [] => (target.to_string(), None, None),
    }
}

/// `"22,80,8000-8010"` → lista expandida; cadena ausente o no parseable cae al top-N embebido.
fn parse_ports_spec(spec: Option<&str>) -> Vec<u16> {
    let Some(spec) = spec else { return DEFAULT_PORTS.to_vec() };

    let mut ports = Vec::new();
    for token in spec.split(',') {
        let token = token.trim();
        if let Some((lo, hi)) = token.split_once('-') {
            if let (Ok(lo), Ok(hi)) = (lo.parse::<u16>(), hi.parse::<u16>()) {
                ports.extend(lo..=hi);
                continue;
            }
        }
        if let Ok(port) = token.parse::<u16>() {
            ports.push(port);
        }
    }

    if ports.is_empty() {
        DEFAULT_PORTS.to_vec()
    } else {
        ports
    }
}

/// Truco clásico: un socket UDP "conectado" a una IP pública no envía tráfico, pero
/// obliga al kernel a resolver qué interfaz local usaría — suficiente para anunciar
/// una IP propia razonable en el registro sin depender de una librería de red extra.
fn local_ip_address() -> String {
    UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_port_splits_on_last_colon() {
        assert_eq!(parse_host_port("10.0.0.1:22"), ("10.0.0.1".to_string(), 22));
        assert_eq!(parse_host_port("10.0.0.1"), ("10.0.0.1".to_string(), 0));
    }

    #[test]
    fn parse_os_target_reads_up_to_three_fields() {
        assert_eq!(parse_os_target("10.0.0.1"), ("10.0.0.1".to_string(), None, None));
        assert_eq!(parse_os_target("10.0.0.1:22:23"), ("10.0.0.1".to_string(), Some(22), Some(23)));
    }

    #[test]
    fn parse_ports_spec_expands_ranges_and_singles() {
        let ports = parse_ports_spec(Some("22,8000-8002"));
        assert_eq!(ports, vec![22, 8000, 8001, 8002]);
    }

    #[test]
    fn parse_ports_spec_falls_back_to_default_when_absent() {
        assert_eq!(parse_ports_spec(None), DEFAULT_PORTS.to_vec());
    }
}
