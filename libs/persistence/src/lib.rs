//! [libs/persistence/src/lib.rs]
//! Raíz de la crate de persistencia: expone el cliente de conexión libSQL,
//! el catálogo de errores y los repositorios de autoridad única para cada
//! agregado de dominio de NeoScan (Proyectos/Workflows/Stages, Tasks,
//! Agentes, Activos, Tags).

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::TursoClient;
pub use errors::DbError;

pub mod prelude {
    pub use crate::client::TursoClient;
    pub use crate::errors::DbError;
    pub use crate::repositories::{
        AgentRepository, AssetRepository, ProjectRepository, TagRepository, TaskRepository,
    };
}
