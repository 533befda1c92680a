// [apps/agent/src/lib.rs]
/*!
 * APARATO: AGENT LIBRARY ROOT
 * CLASIFICACIÓN: ESTRATO L1-WORKER
 * RESPONSABILIDAD: EXPOSICIÓN NOMINAL DE LOS MOTORES Y EL PRELUDIO DE IGNICIÓN
 */

pub mod brute;
pub mod client;
pub mod config;
pub mod crackers;
pub mod dictionary;
pub mod engine;
pub mod errors;
pub mod fingerprint;
pub mod limiter;
pub mod metrics;
pub mod osscan;
pub mod portscan;
pub mod rtt;
pub mod rules;

pub mod prelude {
    pub use crate::client::MasterClient;
    pub use crate::config::Config;
    pub use crate::engine::AgentEngine;
    pub use crate::errors::AgentError;
}

pub use engine::AgentEngine;
