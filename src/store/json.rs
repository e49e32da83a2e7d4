use std::path::PathBuf;

use tokio::sync::Mutex;
use uuid::Uuid;

use super::tables::Tables;
use super::{RecordStore, StoreResult};
use crate::shipment::{
    FileClass, FileRecord, Metrics, NewFile, NewShipment, Shipment, ShipmentStatus,
};

/// Record store persisted as a single JSON document.
///
/// Every mutation is applied to a copy of the tables, written to a sibling
/// temp file and renamed over the document. The in-memory tables only change
/// after the rename succeeds, so a mutation is either fully durable or absent.
pub struct JsonRecordStore {
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonRecordStore {
    /// Opens the document at `path`, starting empty when it does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let tables = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tables::default(),
            Err(e) => return Err(e.into()),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tracing::debug!(path = %path.display(), "record store opened");
        Ok(Self {
            path,
            tables: Mutex::new(tables),
        })
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Applies `change` to a copy of the tables and commits it once written.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Tables) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut tables = self.tables.lock().await;
        let mut next = tables.clone();
        let value = change(&mut next)?;
        self.write(&next).await?;
        *tables = next;
        Ok(value)
    }

    async fn write(&self, tables: &Tables) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(tables)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl RecordStore for JsonRecordStore {
    async fn create_shipment(&self, new: NewShipment) -> StoreResult<Shipment> {
        self.mutate(|t| Ok(t.create_shipment(new))).await
    }

    async fn shipment(&self, id: Uuid) -> StoreResult<Option<Shipment>> {
        Ok(self.tables.lock().await.shipment(id))
    }

    async fn update_shipment_status(&self, id: Uuid, status: ShipmentStatus) -> StoreResult<()> {
        self.mutate(|t| t.update_shipment_status(id, status)).await
    }

    async fn create_file(&self, new: NewFile) -> StoreResult<FileRecord> {
        self.mutate(|t| t.create_file(new)).await
    }

    async fn update_file_path(&self, id: Uuid, path: PathBuf) -> StoreResult<()> {
        self.mutate(|t| t.update_file_path(id, path)).await
    }

    async fn delete_file(&self, id: Uuid) -> StoreResult<()> {
        self.mutate(|t| {
            t.delete_file(id);
            Ok(())
        })
        .await
    }

    async fn files_by_shipment(
        &self,
        shipment_id: Uuid,
        class: FileClass,
    ) -> StoreResult<Vec<FileRecord>> {
        Ok(self.tables.lock().await.files_by_shipment(shipment_id, class))
    }

    async fn create_output_with_metrics(
        &self,
        new: NewFile,
        metrics: Metrics,
    ) -> StoreResult<FileRecord> {
        self.mutate(|t| t.create_output_with_metrics(new, metrics))
            .await
    }

    async fn metrics_by_file(&self, file_id: Uuid) -> StoreResult<Metrics> {
        Ok(self.tables.lock().await.metrics_by_file(file_id))
    }
}
