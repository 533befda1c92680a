// [apps/agent/src/config.rs]
/*!
 * APARATO: AGENT CONFIGURATION
 * CLASIFICACIÓN: WORKER INFRASTRUCTURE
 * RESPONSABILIDAD: CARGA DE VARIABLES DE ENTORNO CON DEFAULTS DOCUMENTADOS
 */

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub master_url: String,
    pub worker_auth_token: String,
    pub hostname: String,
    pub listening_port: u16,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub limiter_initial: u32,
    pub limiter_min: u32,
    pub limiter_max: u32,
    pub brute_stop_on_success: bool,
    pub task_support: Vec<String>,
    pub tags: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            master_url: std::env::var("MASTER_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
            worker_auth_token: std::env::var("WORKER_AUTH_TOKEN").unwrap_or_default(),
            hostname: std::env::var("AGENT_HOSTNAME")
                .ok()
                .or_else(|| hostname_from_system())
                .unwrap_or_else(|| "neoscan-agent".to_string()),
            listening_port: env_parse("AGENT_LISTENING_PORT", 7331),
            poll_interval: Duration::from_secs(env_parse("AGENT_POLL_INTERVAL_SECONDS", 5)),
            heartbeat_interval: Duration::from_secs(env_parse("AGENT_HEARTBEAT_INTERVAL_SECONDS", 30)),
            limiter_initial: env_parse("LIMITER_INITIAL", 50),
            limiter_min: env_parse("LIMITER_MIN", 10),
            limiter_max: env_parse("LIMITER_MAX", 2000),
            brute_stop_on_success: env_parse("BRUTE_STOP_ON_SUCCESS", true),
            task_support: env_list("AGENT_TASK_SUPPORT", &["fast_port_scan", "service_scan", "os_scan", "brute"]),
            tags: env_list("AGENT_TAGS", &[]),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|value| value.parse().ok()).unwrap_or(default)
}

fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

fn hostname_from_system() -> Option<String> {
    std::fs::read_to_string("/proc/sys/kernel/hostname").ok().map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_list_falls_back_to_default_when_unset() {
        std::env::remove_var("NEOSCAN_TEST_LIST_UNSET");
        assert_eq!(env_list("NEOSCAN_TEST_LIST_UNSET", &["a", "b"]), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn env_list_splits_and_trims_when_set() {
        std::env::set_var("NEOSCAN_TEST_LIST_SET", " x , y ,z");
        assert_eq!(env_list("NEOSCAN_TEST_LIST_SET", &[]), vec!["x".to_string(), "y".to_string(), "z".to_string()]);
        std::env::remove_var("NEOSCAN_TEST_LIST_SET");
    }
}
