use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;
use crate::shipment::{
    FileClass, FileRecord, Metrics, NewFile, NewShipment, Shipment, ShipmentStatus,
};

use super::StoreResult;

/// Relational state shared by the record store implementations.
///
/// Metrics are keyed by their owning file, so deleting a file drops them too.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default)]
    shipments: BTreeMap<Uuid, Shipment>,
    #[serde(default)]
    files: BTreeMap<Uuid, FileRecord>,
    #[serde(default)]
    metrics: BTreeMap<Uuid, Metrics>,
}

impl Tables {
    pub fn create_shipment(&mut self, new: NewShipment) -> Shipment {
        let shipment = Shipment::create(Uuid::new_v4(), new);
        self.shipments.insert(shipment.id, shipment.clone());
        shipment
    }

    pub fn shipment(&self, id: Uuid) -> Option<Shipment> {
        self.shipments.get(&id).cloned()
    }

    pub fn update_shipment_status(&mut self, id: Uuid, status: ShipmentStatus) -> StoreResult<()> {
        let shipment = self.shipments.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "shipment",
            id,
        })?;
        shipment.status = status;
        Ok(())
    }

    pub fn create_file(&mut self, new: NewFile) -> StoreResult<FileRecord> {
        if !self.shipments.contains_key(&new.shipment_id) {
            return Err(StoreError::NotFound {
                entity: "shipment",
                id: new.shipment_id,
            });
        }
        let record = FileRecord::create(Uuid::new_v4(), new);
        self.files.insert(record.id, record.clone());
        Ok(record)
    }

    pub fn update_file_path(&mut self, id: Uuid, path: PathBuf) -> StoreResult<()> {
        let record = self
            .files
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "file", id })?;
        record.path = path;
        Ok(())
    }

    pub fn delete_file(&mut self, id: Uuid) {
        self.files.remove(&id);
        self.metrics.remove(&id);
    }

    pub fn files_by_shipment(&self, shipment_id: Uuid, class: FileClass) -> Vec<FileRecord> {
        let mut files: Vec<FileRecord> = self
            .files
            .values()
            .filter(|f| f.shipment_id == shipment_id && f.class == class)
            .cloned()
            .collect();
        files.sort_by_key(|f| f.created_at);
        files
    }

    pub fn create_output_with_metrics(
        &mut self,
        new: NewFile,
        metrics: Metrics,
    ) -> StoreResult<FileRecord> {
        let record = self.create_file(new)?;
        self.metrics.insert(record.id, metrics);
        Ok(record)
    }

    pub fn metrics_by_file(&self, file_id: Uuid) -> Metrics {
        self.metrics.get(&file_id).cloned().unwrap_or_default()
    }
}
