// [libs/telemetry/src/lib.rs]
/*!
 * =================================================================
 * APARATO: STRUCTURED TRACING BOOTSTRAP (V1.0)
 * CLASIFICACIÓN: SHARED UTILITY (ESTRATO L4)
 * RESPONSABILIDAD: INICIALIZACIÓN DE TRAZADO Y CAPTURA DE PÁNICOS
 *
 * Compartido por `neoscan-master` y `neoscan-agent`: ambos arrancan
 * con una sola llamada a `init_tracing`, y ambos quieren el mismo
 * hook de pánico — el Agente corre desatendido en el host objetivo,
 * así que un pánico silencioso ahí es peor que uno en el Master.
 * =================================================================
 */

use std::panic;
use tracing::{error, info, instrument};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as formatting_layer, EnvFilter};

/// Inicializa tracing con filtro por entorno y blindaje de pánicos.
///
/// En desarrollo emite logs compactos y coloreados; en producción,
/// JSON aplanado apto para un colector de logs centralizado.
///
/// # Errors
/// Entra en pánico si otro subscriber global ya fue instalado.
#[instrument(skip_all)]
pub fn init_tracing(service_nominal_identifier: &str) {
    let environmental_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{}={level},tower_http=warn,hyper=warn,libsql=error",
            service_nominal_identifier,
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        )
        .into()
    });

    let is_production_strata = !cfg!(debug_assertions);

    if is_production_strata {
        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(formatting_layer::layer().json().flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(formatting_layer::layer().compact().with_target(false))
            .init();
    }

    let service_id_snapshot = service_nominal_identifier.to_string();

    panic::set_hook(Box::new(move |panic_metadata| {
        let panic_location = panic_metadata
            .location()
            .map(|location| format!("{}:{}:{}", location.file(), location.line(), location.column()))
            .unwrap_or_else(|| "UNKNOWN_LOCATION".to_string());

        let panic_payload_message = panic_metadata
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_metadata.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("UNDEFINED_PANIC_PAYLOAD");

        error!(
            target: "panic_monitor",
            service = %service_id_snapshot,
            location = %panic_location,
            "🔥 [PANIC]: thread terminated abruptly: {}",
            panic_payload_message
        );
    }));

    info!("👁️  [TELEMETRY]: tracing initialized for [{}]", service_nominal_identifier);
}
