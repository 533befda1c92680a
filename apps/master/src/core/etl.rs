// [apps/master/src/core/etl.rs]
/*!
 * APARATO: RESULT QUEUE & ETL
 * CLASIFICACIÓN: ORCHESTRATION CORE
 * RESPONSABILIDAD: NORMALIZAR STAGERESULTS CRUDOS EN EL ASSET STORE
 *
 * Cola acotada + pool de workers: un `StageResultEnvelope` que no
 * mapea a ningún `*Attributes` conocido nunca se descarta — se
 * persiste igual con `ingestion_error` poblado (`IngestionError`).
 * Encolar contra una cola llena bloquea al llamador en lugar de perder
 * el resultado (decisión de diseño registrada en DESIGN.md).
 */

use crate::core::autotag::AutoTagEngine;
use chrono::Utc;
use neoscan_domain::{
    BruteAttributes, FastPortScanAttributes, OsScanAttributes, ServiceScanAttributes, StageResult,
    StageResultEnvelope,
};
use neoscan_persistence::AssetRepository;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, instrument, warn};
use uuid::Uuid;

pub struct EtlItem {
    pub task_id: String,
    pub envelope: StageResultEnvelope,
    pub received_at: chrono::DateTime<Utc>,
}

pub struct EtlPipeline {
    sender: mpsc::Sender<EtlItem>,
}

impl EtlPipeline {
    /// Arranca `worker_count` consumidores compartiendo un único receptor tras un
    /// `Mutex` — cada worker compite por el siguiente ítem de la cola acotada.
    #[must_use]
    pub fn new(
        asset_repository: AssetRepository,
        autotag_engine: Arc<AutoTagEngine>,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let shared_receiver = Arc::new(Mutex::new(receiver));

        for worker_index in 0..worker_count.max(1) {
            let receiver = shared_receiver.clone();
            let asset_repository = asset_repository.clone();
            let autotag_engine = autotag_engine.clone();
            tokio::spawn(async move {
                loop {
                    let item = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    match item {
                        Some(item) => Self::process(&asset_repository, &autotag_engine, item).await,
                        None => {
                            warn!(worker_index, "ETL channel closed, worker exiting");
                            break;
                        }
                    }
                }
            });
        }

        Self { sender }
    }

    /// Encola un resultado crudo. Bloquea si la cola está llena (decisión de diseño registrada en DESIGN.md).
    pub async fn enqueue(&self, item: EtlItem) {
        if self.sender.send(item).await.is_err() {
            error!("ETL pipeline closed, dropping result");
        }
    }

    #[instrument(skip(asset_repository, autotag_engine, item), fields(task_id = %item.task_id, result_type = %item.envelope.result_type))]
    async fn process(asset_repository: &AssetRepository, autotag_engine: &AutoTagEngine, item: EtlItem) {
        let mapping_outcome = Self::map_and_merge(asset_repository, autotag_engine, &item).await;

        let ingestion_error = mapping_outcome.err().map(|e| e.to_string());
        if let Some(reason) = &ingestion_error {
            warn!(task_id = %item.task_id, reason = %reason, "stage result failed to normalize");
        }

        let stage_result = StageResult {
            result_id: Uuid::new_v4().to_string(),
            task_id: item.task_id,
            target_value: item.envelope.target_value,
            target_type: item.envelope.target_type,
            result_type: item.envelope.result_type,
            attributes: item.envelope.attributes,
            ingestion_error,
            received_at: item.received_at,
        };

        if let Err(err) = asset_repository.insert_stage_result(&stage_result).await {
            error!(error = %err, "failed to persist stage result, result is lost");
        }
    }

    async fn map_and_merge(
        asset_repository: &AssetRepository,
        autotag_engine: &AutoTagEngine,
        item: &EtlItem,
    ) -> Result<(), String> {
        let observed_at = item.received_at;
        match item.envelope.result_type.as_str() {
            "fast_port_scan" => {
                let attrs: FastPortScanAttributes = serde_json::from_value(item.envelope.attributes.clone())
                    .map_err(|e| e.to_string())?;
                for observation in &attrs.ports {
                    let host = asset_repository
                        .upsert_host(&observation.ip, None, observed_at)
                        .await
                        .map_err(|e| e.to_string())?;
                    asset_repository
                        .upsert_service(
                            &host.host_id,
                            observation.port,
                            &observation.proto,
                            &observation.state,
                            observation.service_hint.as_deref(),
                            None,
                            None,
                            None,
                            None,
                            observation.banner.as_deref(),
                            observed_at,
                        )
                        .await
                        .map_err(|e| e.to_string())?;
                    autotag_engine
                        .evaluate_entity("asset_host", &host.host_id, &json!({ "ip": host.ip }))
                        .await
                        .map_err(|e| e.to_string())?;
                }
                Ok(())
            }
            "service_scan" => {
                let attrs: ServiceScanAttributes = serde_json::from_value(item.envelope.attributes.clone())
                    .map_err(|e| e.to_string())?;
                let host = asset_repository
                    .upsert_host(&item.envelope.target_value, attrs.hostname.as_deref(), observed_at)
                    .await
                    .map_err(|e| e.to_string())?;
                autotag_engine
                    .evaluate_entity(
                        "asset_host",
                        &host.host_id,
                        &json!({ "ip": host.ip, "service": attrs.service, "product": attrs.product }),
                    )
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(())
            }
            "os_scan" => {
                let attrs: OsScanAttributes = serde_json::from_value(item.envelope.attributes.clone())
                    .map_err(|e| e.to_string())?;
                let host = asset_repository
                    .upsert_host(&item.envelope.target_value, None, observed_at)
                    .await
                    .map_err(|e| e.to_string())?;
                asset_repository
                    .update_host_os(&host.host_id, &attrs.name, &attrs.family, attrs.accuracy)
                    .await
                    .map_err(|e| e.to_string())?;
                autotag_engine
                    .evaluate_entity("asset_host", &host.host_id, &json!({ "os_family": attrs.family }))
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(())
            }
            "brute" => {
                let attrs: BruteAttributes = serde_json::from_value(item.envelope.attributes.clone())
                    .map_err(|e| e.to_string())?;
                for attempt in &attrs.attempts {
                    if !attempt.success {
                        continue;
                    }
                    let host = asset_repository
                        .upsert_host(&attempt.host, None, observed_at)
                        .await
                        .map_err(|e| e.to_string())?;
                    autotag_engine
                        .evaluate_entity(
                            "asset_host",
                            &host.host_id,
                            &json!({ "ip": host.ip, "compromised_service": attempt.service }),
                        )
                        .await
                        .map_err(|e| e.to_string())?;
                }
                Ok(())
            }
            other => Err(format!("unknown result_type: {other}")),
        }
    }
}
