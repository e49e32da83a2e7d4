use std::path::PathBuf;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::tables::Tables;
use super::{RecordStore, StoreResult};
use crate::shipment::{
    FileClass, FileRecord, Metrics, NewFile, NewShipment, Shipment, ShipmentStatus,
};

/// Process-local record store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
}

impl RecordStore for MemoryRecordStore {
    async fn create_shipment(&self, new: NewShipment) -> StoreResult<Shipment> {
        Ok(self.tables.write().await.create_shipment(new))
    }

    async fn shipment(&self, id: Uuid) -> StoreResult<Option<Shipment>> {
        Ok(self.tables.read().await.shipment(id))
    }

    async fn update_shipment_status(&self, id: Uuid, status: ShipmentStatus) -> StoreResult<()> {
        self.tables.write().await.update_shipment_status(id, status)
    }

    async fn create_file(&self, new: NewFile) -> StoreResult<FileRecord> {
        self.tables.write().await.create_file(new)
    }

    async fn update_file_path(&self, id: Uuid, path: PathBuf) -> StoreResult<()> {
        self.tables.write().await.update_file_path(id, path)
    }

    async fn delete_file(&self, id: Uuid) -> StoreResult<()> {
        self.tables.write().await.delete_file(id);
        Ok(())
    }

    async fn files_by_shipment(
        &self,
        shipment_id: Uuid,
        class: FileClass,
    ) -> StoreResult<Vec<FileRecord>> {
        Ok(self.tables.read().await.files_by_shipment(shipment_id, class))
    }

    async fn create_output_with_metrics(
        &self,
        new: NewFile,
        metrics: Metrics,
    ) -> StoreResult<FileRecord> {
        self.tables
            .write()
            .await
            .create_output_with_metrics(new, metrics)
    }

    async fn metrics_by_file(&self, file_id: Uuid) -> StoreResult<Metrics> {
        Ok(self.tables.read().await.metrics_by_file(file_id))
    }
}
