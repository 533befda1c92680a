// [apps/agent/src/metrics.rs]
/*!
 * APARATO: HARDWARE TELEMETRY SAMPLER
 * CLASIFICACIÓN: WORKER INFRASTRUCTURE
 * RESPONSABILIDAD: MUESTRA DE MÉTRICAS ENVIADA EN CADA HEARTBEAT
 *
 * Lee directamente de `/proc`, igual que el monitor heurístico que le
 * sirve de modelo; el único recurso que `/proc` no expone de forma
 * portable (uso de disco) se obtiene invocando `df`, en vez de sumar
 * una dependencia nueva sólo para un valor.
 */

use neoscan_domain::AgentMetricsSample;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::process::Command;

static RUNNING_TASKS: AtomicU32 = AtomicU32::new(0);

pub fn set_running_tasks(count: u32) {
    RUNNING_TASKS.store(count, Ordering::Relaxed);
}

pub async fn sample(agent_id: &str) -> AgentMetricsSample {
    let (net_rx_bytes, net_tx_bytes) = read_net_counters().await;

    AgentMetricsSample {
        agent_id: agent_id.to_string(),
        sampled_at: chrono::Utc::now(),
        cpu_percent: read_cpu_percent().await,
        mem_percent: read_mem_percent().await,
        disk_percent: read_disk_percent().await,
        net_rx_bytes,
        net_tx_bytes,
        running_tasks: RUNNING_TASKS.load(Ordering::Relaxed),
    }
}

async fn read_cpu_percent() -> f32 {
    let load_average = tokio::fs::read_to_string("/proc/loadavg")
        .await
        .ok()
        .and_then(|content| content.split_whitespace().next().and_then(|v| v.parse::<f32>().ok()))
        .unwrap_or(0.0);

    let cpu_count = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1) as f32;
    ((load_average / cpu_count) * 100.0).clamp(0.0, 100.0)
}

async fn read_mem_percent() -> f32 {
    let Ok(content) = tokio::fs::read_to_string("/proc/meminfo").await else { return 0.0 };

    let mut total_kb = 0u64;
    let mut available_kb = 0u64;
    for line in content.lines() {
        if line.starts_with("MemTotal:") {
            total_kb = parse_kilobyte_value(line);
        }
        if line.starts_with("MemAvailable:") {
            available_kb = parse_kilobyte_value(line);
        }
    }

    if total_kb == 0 {
        return 0.0;
    }
    let used_kb = total_kb.saturating_sub(available_kb);
    ((used_kb as f32 / total_kb as f32) * 100.0).clamp(0.0, 100.0)
}

fn parse_kilobyte_value(line: &str) -> u64 {
    line.split_whitespace().nth(1).and_then(|value| value.parse::<u64>().ok()).unwrap_or(0)
}

async fn read_disk_percent() -> f32 {
    let Ok(output) = Command::new("df").args(["-k", "/"]).output().await else { return 0.0 };
    let stdout = String::from_utf8_lossy(&output.stdout);

    stdout
        .lines()
        .nth(1)
        .and_then(|line| line.split_whitespace().nth(4))
        .and_then(|percent| percent.trim_end_matches('%').parse::<f32>().ok())
        .unwrap_or(0.0)
}

async fn read_net_counters() -> (u64, u64) {
    let Ok(content) = tokio::fs::read_to_string("/proc/net/dev").await else { return (0, 0) };

    content
        .lines()
        .skip(2)
        .filter(|line| !line.trim_start().starts_with("lo:"))
        .fold((0u64, 0u64), |(rx_acc, tx_acc), line| {
            let Some((_, rest)) = line.split_once(':') else { return (rx_acc, tx_acc) };
            let fields: Vec<&str> = rest.split_whitespace().collect();
            let rx = fields.first().and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
            let tx = fields.get(8).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
            (rx_acc + rx, tx_acc + tx)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kilobyte_value_extracts_the_numeric_field() {
        assert_eq!(parse_kilobyte_value("MemTotal:       16384000 kB"), 16384000);
    }

    #[test]
    fn running_tasks_gauge_round_trips() {
        set_running_tasks(3);
        assert_eq!(RUNNING_TASKS.load(Ordering::Relaxed), 3);
        set_running_tasks(0);
    }

    #[tokio::test]
    async fn sample_populates_agent_id_and_timestamp() {
        let sample = sample("agent-1").await;
        assert_eq!(sample.agent_id, "agent-1");
        assert!(sample.cpu_percent >= 0.0);
    }
}
