// [apps/master/src/lib.rs]
/*!
 * APARATO: MASTER LIBRARY ROOT
 * CLASIFICACIÓN: CRATE ROOT
 * RESPONSABILIDAD: DEFINICIÓN DEL ÁRBOL DE MÓDULOS DEL COORDINADOR
 */

/// Motores de dominio: scheduler, dispatcher, ETL, registro, políticas.
pub mod core;
/// Superficie de error del plano de control, convertida a respuestas HTTP.
pub mod errors;
/// Adaptadores HTTP del plano de control Master↔Agente.
pub mod handlers;
/// Núcleo de mando: ignición de infraestructura y arranque del servidor.
pub mod kernel;
/// Guardianes perimetrales de salud y autenticación.
pub mod middleware;
/// Topología de rutas HTTP.
pub mod routes;
/// Estado compartido: repositorios y servicios del núcleo.
pub mod state;

/// Re-exportación mínima para la ignición desde `main.rs`.
pub mod prelude {
    pub use crate::kernel::MasterKernel;
    pub use crate::state::{AppConfig, AppState, SystemMode};
}
