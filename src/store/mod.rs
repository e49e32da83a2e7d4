//! Storage collaborators of the shipment pipeline.
//!
//! [`RecordStore`] holds shipments, file records and metrics; [`BlobStore`]
//! holds the physical files. Both are handed to the coordinator explicitly so
//! tests can substitute them.

mod blob;
mod json;
#[cfg(test)]
mod memory;
mod tables;

use std::future::Future;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

use crate::error::{BlobError, StoreError};
use crate::shipment::{
    FileClass, FileRecord, Metrics, NewFile, NewShipment, Shipment, ShipmentStatus,
};

pub use blob::FsBlobStore;
pub use json::JsonRecordStore;
#[cfg(test)]
pub use memory::MemoryRecordStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable storage for shipments, file records and metrics.
pub trait RecordStore: Send + Sync + 'static {
    /// Inserts a shipment in `accepted` status and returns it with its identifier.
    fn create_shipment(
        &self,
        new: NewShipment,
    ) -> impl Future<Output = StoreResult<Shipment>> + Send;

    fn shipment(&self, id: Uuid) -> impl Future<Output = StoreResult<Option<Shipment>>> + Send;

    fn update_shipment_status(
        &self,
        id: Uuid,
        status: ShipmentStatus,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn create_file(&self, new: NewFile) -> impl Future<Output = StoreResult<FileRecord>> + Send;

    fn update_file_path(
        &self,
        id: Uuid,
        path: PathBuf,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Removes a file record together with its metrics.
    fn delete_file(&self, id: Uuid) -> impl Future<Output = StoreResult<()>> + Send;

    fn files_by_shipment(
        &self,
        shipment_id: Uuid,
        class: FileClass,
    ) -> impl Future<Output = StoreResult<Vec<FileRecord>>> + Send;

    /// Inserts an output file record and all of its metrics as one unit.
    fn create_output_with_metrics(
        &self,
        new: NewFile,
        metrics: Metrics,
    ) -> impl Future<Output = StoreResult<FileRecord>> + Send;

    fn metrics_by_file(&self, file_id: Uuid) -> impl Future<Output = StoreResult<Metrics>> + Send;
}

/// Name-addressed file persistence, one namespace per [`FileClass`].
pub trait BlobStore: Send + Sync + 'static {
    /// Streams `reader` into the blob `name` and returns its resolved path.
    fn save<R>(
        &self,
        class: FileClass,
        name: &str,
        reader: R,
    ) -> impl Future<Output = Result<PathBuf, BlobError>> + Send
    where
        R: AsyncRead + Unpin + Send;

    /// Deletes the blob `name`. A missing blob is not an error.
    fn delete(
        &self,
        class: FileClass,
        name: &str,
    ) -> impl Future<Output = Result<(), BlobError>> + Send;

    fn path(&self, class: FileClass, name: &str) -> PathBuf;

    fn exists(&self, class: FileClass, name: &str) -> impl Future<Output = bool> + Send;

    /// Streams the blob `name` into `writer` and returns the number of bytes copied.
    fn load<W>(
        &self,
        class: FileClass,
        name: &str,
        writer: W,
    ) -> impl Future<Output = Result<u64, BlobError>> + Send
    where
        W: AsyncWrite + Unpin + Send;
}
