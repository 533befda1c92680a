// [apps/agent/src/rules/mod.rs]
//! Carga de reglas embebidas (service probes, fingerprints de SO), ambas
//! reemplazables en tiempo de arranque vía variables de entorno.

pub mod os_db;
pub mod service_probes;
