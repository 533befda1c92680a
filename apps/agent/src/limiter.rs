// [apps/agent/src/limiter.rs]
/*!
 * APARATO: ADAPTIVE LIMITER
 * CLASIFICACIÓN: WORKER INFRASTRUCTURE
 * RESPONSABILIDAD: SEMÁFORO AIMD QUE ACOTA OPERACIONES CONCURRENTES DE RED
 *
 * Compartido por todo el proceso: el Brute Scanner y el Port Scanner
 * adquieren el mismo limitador, así que una ráfaga de fallos en un
 * subsistema baja el límite que ve el otro.
 */

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::debug;

const DECAY_FACTOR: f64 = 0.7;

#[derive(Debug, Clone, Copy)]
pub struct LimiterConfig {
    pub initial: u32,
    pub min: u32,
    pub max: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self { initial: 50, min: 10, max: 2000 }
    }
}

/// Permiso adquirido; libera el token del semáforo al soltarse (`Drop`), salvo
/// que haya deuda de encogimiento pendiente, en cuyo caso el token se olvida.
pub struct LimiterPermit {
    permit: Option<tokio::sync::OwnedSemaphorePermit>,
    limiter: Arc<AdaptiveLimiter>,
}

impl Drop for LimiterPermit {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else { return };
        let forgot = self
            .limiter
            .pending_shrink
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| if n > 0 { Some(n - 1) } else { None })
            .is_ok();
        if forgot {
            permit.forget();
        }
    }
}

pub struct AdaptiveLimiter {
    semaphore: Arc<Semaphore>,
    current_limit: AtomicU32,
    pending_shrink: AtomicU32,
    min: u32,
    max: u32,
}

impl AdaptiveLimiter {
    pub fn new(config: LimiterConfig) -> Arc<Self> {
        let initial = config.initial.clamp(config.min, config.max);
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(initial as usize)),
            current_limit: AtomicU32::new(initial),
            pending_shrink: AtomicU32::new(0),
            min: config.min,
            max: config.max,
        })
    }

    /// Bloquea hasta que haya un token libre o venza `deadline`; `None` si venció.
    pub async fn acquire(self: &Arc<Self>, deadline: Instant) -> Option<LimiterPermit> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }

        match tokio::time::timeout(remaining, Arc::clone(&self.semaphore).acquire_owned()).await {
            Ok(Ok(permit)) => Some(LimiterPermit { permit: Some(permit), limiter: Arc::clone(self) }),
            _ => None,
        }
    }

    /// Ensancha el límite en 1 hasta `max`, añadiendo un permiso fresco al semáforo.
    pub fn on_success(&self) {
        let previous = self.current_limit.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            if current < self.max {
                Some(current + 1)
            } else {
                None
            }
        });

        if previous.is_ok() {
            self.semaphore.add_permits(1);
        }
    }

    /// Decae el límite multiplicativamente, nunca bajo `min`, y encoge el
    /// semáforo en la misma cantidad: los permisos libres se olvidan de
    /// inmediato, los que están en uso se olvidan al soltarse (`LimiterPermit::drop`).
    pub fn on_failure(&self) {
        let previous = self.current_limit.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            let decayed = ((current as f64) * DECAY_FACTOR).floor() as u32;
            let floored = decayed.max(self.min);
            if floored < current {
                Some(floored)
            } else {
                None
            }
        });

        if let Ok(before) = previous {
            let delta = before - self.current_limit();
            let forgotten_now = self.semaphore.forget_permits(delta as usize) as u32;
            let owed = delta - forgotten_now;
            if owed > 0 {
                self.pending_shrink.fetch_add(owed, Ordering::SeqCst);
            }
            debug!(from = before, to = self.current_limit(), "limiter decayed");
        }
    }

    pub fn current_limit(&self) -> u32 {
        self.current_limit.load(Ordering::SeqCst)
    }
}

/// Deadline absoluto derivado de un presupuesto relativo; helper de llamada.
pub fn deadline_in(duration: Duration) -> Instant {
    Instant::now() + duration
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_returns_none_past_an_elapsed_deadline() {
        let limiter = AdaptiveLimiter::new(LimiterConfig { initial: 1, min: 1, max: 1 });
        let permit = limiter.acquire(Instant::now() - Duration::from_millis(1)).await;
        assert!(permit.is_none());
    }

    #[tokio::test]
    async fn on_success_raises_limit_up_to_max() {
        let limiter = AdaptiveLimiter::new(LimiterConfig { initial: 5, min: 1, max: 6 });
        limiter.on_success();
        assert_eq!(limiter.current_limit(), 6);
        limiter.on_success();
        assert_eq!(limiter.current_limit(), 6);
    }

    #[tokio::test]
    async fn on_failure_decays_but_never_below_min() {
        let limiter = AdaptiveLimiter::new(LimiterConfig { initial: 10, min: 8, max: 20 });
        limiter.on_failure();
        assert_eq!(limiter.current_limit(), 8);
        limiter.on_failure();
        assert_eq!(limiter.current_limit(), 8);
    }
}
