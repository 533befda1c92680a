// [apps/master/src/kernel.rs]
/*!
 * APARATO: MASTER KERNEL
 * CLASIFICACIÓN: COMPOSITION ROOT
 * RESPONSABILIDAD: IGNICIÓN DE INFRAESTRUCTURA Y ARRANQUE DEL SERVIDOR HTTP
 */

use crate::routes::create_router;
use crate::state::{AppConfig, AppState};
use neoscan_persistence::TursoClient;
use std::net::{IpAddr, SocketAddr};
use tracing::{error, info, instrument};

pub struct MasterKernel {
    listening_port: u16,
    application_state: AppState,
}

impl MasterKernel {
    /// Conecta el cliente de base de datos y construye el estado compartido.
    /// Los daemons de fondo (scheduler, reaper) arrancan dentro de `AppState::new`.
    #[instrument(skip(database_access_token, config))]
    pub async fn ignite(
        database_connection_url: &str,
        database_access_token: Option<String>,
        listening_port: u16,
        config: AppConfig,
    ) -> Self {
        let database_client = TursoClient::connect(database_connection_url, database_access_token)
            .await
            .expect("FATAL: could not establish database connection");

        Self {
            listening_port,
            application_state: AppState::new(database_client, config),
        }
    }

    /// Levanta el router HTTP y sirve hasta que el proceso termine.
    pub async fn launch(self) {
        let router = create_router(self.application_state);

        let bind_address = SocketAddr::new(
            "0.0.0.0".parse::<IpAddr>().expect("static address is valid"),
            self.listening_port,
        );

        info!(address = %bind_address, "master listening");

        let listener = tokio::net::TcpListener::bind(bind_address)
            .await
            .expect("failed to bind network port");

        if let Err(server_error) = axum::serve(listener, router).await {
            error!(error = %server_error, "server terminated");
            std::process::exit(1);
        }
    }
}
