// [apps/agent/src/rtt.rs]
/*!
 * APARATO: RTT ESTIMATOR
 * CLASIFICACIÓN: WORKER INFRASTRUCTURE
 * RESPONSABILIDAD: ESTIMACIÓN EWMA DE LATENCIA PARA DEADLINES DE CONEXIÓN
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const SMOOTHING_FACTOR: f64 = 0.2;
const TIMEOUT_MULTIPLIER: f64 = 3.0;

pub struct RttEstimator {
    estimate_micros: AtomicU64,
    floor: Duration,
    ceiling: Duration,
}

impl RttEstimator {
    pub fn new(initial_estimate: Duration, floor: Duration, ceiling: Duration) -> Self {
        Self {
            estimate_micros: AtomicU64::new(initial_estimate.as_micros() as u64),
            floor,
            ceiling,
        }
    }

    /// Pliega una duración medida en la estimación vía una media móvil exponencial.
    pub fn update(&self, measured: Duration) {
        let measured_micros = measured.as_micros() as f64;
        loop {
            let current = self.estimate_micros.load(Ordering::Relaxed);
            let updated = ((current as f64) * (1.0 - SMOOTHING_FACTOR) + measured_micros * SMOOTHING_FACTOR) as u64;
            if self
                .estimate_micros
                .compare_exchange(current, updated, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    /// Deadline conservador: `estimate * k`, acotado a `[floor, ceiling]`.
    pub fn timeout(&self) -> Duration {
        let estimate = Duration::from_micros(self.estimate_micros.load(Ordering::Relaxed));
        let scaled = estimate.mul_f64(TIMEOUT_MULTIPLIER);
        scaled.clamp(self.floor, self.ceiling)
    }
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_millis(100), Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_tightens_as_measured_latency_improves() {
        let estimator = RttEstimator::new(Duration::from_secs(2), Duration::from_millis(50), Duration::from_secs(5));
        let before = estimator.timeout();
        for _ in 0..20 {
            estimator.update(Duration::from_millis(10));
        }
        let after = estimator.timeout();
        assert!(after < before);
    }

    #[test]
    fn timeout_never_escapes_floor_or_ceiling() {
        let estimator = RttEstimator::new(Duration::from_millis(1), Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(estimator.timeout(), Duration::from_millis(100));

        let estimator = RttEstimator::new(Duration::from_secs(100), Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(estimator.timeout(), Duration::from_secs(1));
    }
}
