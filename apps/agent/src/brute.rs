// [apps/agent/src/brute.rs]
/*!
 * APARATO: BRUTE SCANNER
 * CLASIFICACIÓN: WORKER ENGINE
 * RESPONSABILIDAD: UN WORKER SECUENCIAL POR (HOST, PUERTO), ACOTADO POR EL
 * ADAPTIVE LIMITER Y EL DEADLINE DEL TASK
 *
 * El límite adaptativo acota cuántos targets se atacan a la vez, nunca
 * cuántas conexiones hace un worker individual: un único worker agota
 * su lista de credenciales estrictamente en serie para no disparar
 * bloqueos de cuenta ni IDS por ráfagas paralelas contra el mismo target.
 */

use crate::crackers::{registry, CheckOutcome};
use crate::dictionary::{self, DictionaryOverrides};
use crate::limiter::AdaptiveLimiter;
use neoscan_domain::{Auth, BruteResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Un blanco a atacar: protocolo (nombre del Cracker) + host + puerto.
#[derive(Debug, Clone)]
pub struct BruteTarget {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct BruteOptions {
    /// Si es `true` (default), el worker se detiene tras la primera credencial exitosa.
    pub stop_on_success: bool,
}

impl Default for BruteOptions {
    fn default() -> Self {
        Self { stop_on_success: true }
    }
}

/// Corre el ataque contra todos los targets de un Task, un worker por `(host, puerto)`,
/// acotado en paralelismo por `limiter` y en tiempo por `task_deadline`.
pub async fn run_task(
    targets: Vec<BruteTarget>,
    overrides: DictionaryOverrides,
    options: BruteOptions,
    limiter: Arc<AdaptiveLimiter>,
    task_deadline: Instant,
) -> Vec<BruteResult> {
    let mut handles = Vec::with_capacity(targets.len());

    for target in targets {
        let limiter = Arc::clone(&limiter);
        let overrides = overrides.clone();
        handles.push(tokio::spawn(async move {
            run_target(target, overrides, options, limiter, task_deadline).await
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(target_results) => results.extend(target_results),
            Err(join_error) => warn!(%join_error, "brute target worker panicked"),
        }
    }
    results
}

async fn run_target(
    target: BruteTarget,
    overrides: DictionaryOverrides,
    options: BruteOptions,
    limiter: Arc<AdaptiveLimiter>,
    task_deadline: Instant,
) -> Vec<BruteResult> {
    let Some(cracker) = registry::lookup(&target.protocol) else {
        warn!(protocol = %target.protocol, "no cracker registered for protocol");
        return Vec::new();
    };

    let Some(_permit) = limiter.acquire(task_deadline).await else {
        debug!(host = %target.host, port = target.port, "brute target worker cancelled waiting for limiter slot");
        return Vec::new();
    };

    let candidates = dictionary::expand(cracker.mode(), &overrides);
    let mut results = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        if Instant::now() >= task_deadline {
            debug!(host = %target.host, port = target.port, "brute target worker cancelled by task deadline");
            break;
        }

        let per_attempt_deadline = crate::limiter::deadline_in(std::time::Duration::from_secs(5)).min(task_deadline);
        let auth = Auth { username: candidate.username.clone(), password: candidate.password.clone(), other: None };

        let outcome = cracker.check(per_attempt_deadline, &target.host, target.port, &auth).await;

        match outcome {
            CheckOutcome::Success => {
                limiter.on_success();
                results.push(BruteResult {
                    host: target.host.clone(),
                    port: target.port,
                    service: cracker.name().to_string(),
                    username: candidate.username,
                    password: candidate.password,
                    success: true,
                });
                if options.stop_on_success {
                    break;
                }
            }
            CheckOutcome::AuthFailed => {
                limiter.on_success();
            }
            CheckOutcome::ConnectionFailed => {
                limiter.on_failure();
            }
            CheckOutcome::ProtocolError => {
                debug!(protocol = %target.protocol, host = %target.host, port = target.port, "protocol unsupported, aborting target");
                break;
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn unknown_protocol_yields_no_results() {
        let limiter = AdaptiveLimiter::new(Default::default());
        let target = BruteTarget { protocol: "gopher".into(), host: "127.0.0.1".into(), port: 1 };
        let results = run_target(
            target,
            DictionaryOverrides::default(),
            BruteOptions::default(),
            limiter,
            Instant::now() + Duration::from_secs(1),
        )
        .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn elapsed_task_deadline_yields_no_results() {
        let limiter = AdaptiveLimiter::new(Default::default());
        let target = BruteTarget { protocol: "ftp".into(), host: "127.0.0.1".into(), port: 21 };
        let results = run_target(
            target,
            DictionaryOverrides::default(),
            BruteOptions::default(),
            limiter,
            Instant::now() - Duration::from_millis(1),
        )
        .await;
        assert!(results.is_empty());
    }

    #[test]
    fn instant_min_picks_the_earlier_deadline() {
        let now = Instant::now();
        let earlier = now;
        let later = now + Duration::from_secs(10);
        assert_eq!(later.min(earlier), earlier);
        assert_eq!(earlier.min(later), earlier);
    }
}
