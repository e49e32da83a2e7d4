use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncRead;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Deadlines;
use crate::error::{FailureKind, LookupError, PipelineError, StoreError, SubmitError};
use crate::invoker::ModelInvoker;
use crate::shipment::{
    FileClass, Metrics, ModelSpec, NewFile, NewShipment, Shipment, ShipmentStatus, StatusEvent,
    StatusMachine, checked_extension, input_blob_name, output_blob_name,
};
use crate::store::{BlobStore, RecordStore, StoreResult};

/// One inbound request: who submits what, and the dataset bytes.
pub struct Submission<S> {
    pub owner_id: u64,
    pub project_name: String,
    /// Task kind label, e.g. `regression`.
    pub task_kind: String,
    /// Human-readable algorithm label, e.g. `Linear regression`.
    pub algorithm: String,
    pub target_column: String,
    pub input: S,
    /// Extension of the uploaded file name, without the dot. May be empty.
    pub extension: String,
}

/// Successful end of a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentOutcome {
    pub shipment_id: Uuid,
    pub metrics: Metrics,
}

/// Stored results of a finished shipment.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentResult {
    pub shipment: Shipment,
    pub output_path: PathBuf,
    pub metrics: Metrics,
}

/// Drives submissions from intake to a terminal status, undoing partial work on failure.
pub struct ShipmentCoordinator<R, B, M> {
    records: Arc<R>,
    blobs: Arc<B>,
    invoker: Arc<M>,
    deadlines: Deadlines,
}

impl<R, B, M> Clone for ShipmentCoordinator<R, B, M> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            blobs: Arc::clone(&self.blobs),
            invoker: Arc::clone(&self.invoker),
            deadlines: self.deadlines,
        }
    }
}

/// Bounds a pipeline step by `limit`; expiry is an infrastructure failure.
async fn within<T, E, F>(limit: Duration, operation: &'static str, step: F) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<PipelineError>,
{
    match tokio::time::timeout(limit, step).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(PipelineError::DeadlineExceeded { operation }),
    }
}

async fn lookup<T, F>(limit: Duration, operation: &'static str, step: F) -> Result<T, LookupError>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(limit, step)
        .await
        .map_err(|_| LookupError::DeadlineExceeded { operation })?
        .map_err(LookupError::from)
}

impl<R, B, M> ShipmentCoordinator<R, B, M>
where
    R: RecordStore,
    B: BlobStore,
    M: ModelInvoker,
{
    pub fn new(records: Arc<R>, blobs: Arc<B>, invoker: Arc<M>, deadlines: Deadlines) -> Self {
        Self {
            records,
            blobs,
            invoker,
            deadlines,
        }
    }

    /// Runs one submission through the pipeline and returns its metrics.
    ///
    /// The work happens in a detached task: if the caller stops waiting, the
    /// shipment still reaches a terminal status and failed work is still undone.
    pub async fn submit<S>(&self, submission: Submission<S>) -> Result<ShipmentOutcome, SubmitError>
    where
        S: AsyncRead + Unpin + Send + 'static,
    {
        let this = self.clone();
        match tokio::spawn(async move { this.process(submission).await }).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "shipment supervisor task failed");
                Err(SubmitError::Errored { shipment_id: None })
            }
        }
    }

    /// Loads the metrics and output location of a finished shipment.
    pub async fn result(&self, shipment_id: Uuid) -> Result<ShipmentResult, LookupError> {
        let limit = self.deadlines.metadata;
        let shipment = lookup(limit, "read shipment", self.records.shipment(shipment_id))
            .await?
            .ok_or(LookupError::NotFound(shipment_id))?;
        if shipment.status != ShipmentStatus::Finished {
            return Err(LookupError::NotFinished {
                id: shipment_id,
                status: shipment.status,
            });
        }

        let mut outputs = lookup(
            limit,
            "list output files",
            self.records.files_by_shipment(shipment_id, FileClass::Output),
        )
        .await?;
        if outputs.len() != 1 {
            return Err(LookupError::OutputCount {
                id: shipment_id,
                count: outputs.len(),
            });
        }
        let output = outputs.remove(0);

        let metrics = lookup(limit, "read metrics", self.records.metrics_by_file(output.id)).await?;
        info!(%shipment_id, path = %output.path.display(), "results requested");
        Ok(ShipmentResult {
            shipment,
            output_path: output.path,
            metrics,
        })
    }

    /// Copies the output blob of a finished shipment to `dest`.
    pub async fn export(&self, shipment_id: Uuid, dest: &Path) -> Result<u64, LookupError> {
        let result = self.result(shipment_id).await?;
        let name = match result.output_path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => return Err(LookupError::MissingBlob(result.output_path)),
        };
        if !self.blobs.exists(FileClass::Output, &name).await {
            warn!(%shipment_id, path = %result.output_path.display(), "results not found");
            return Err(LookupError::MissingBlob(result.output_path));
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let bytes = self.blobs.load(FileClass::Output, &name, &mut file).await?;
        info!(%shipment_id, dest = %dest.display(), bytes, "results exported");
        Ok(bytes)
    }

    pub async fn status(&self, shipment_id: Uuid) -> Result<Shipment, LookupError> {
        lookup(
            self.deadlines.metadata,
            "read shipment",
            self.records.shipment(shipment_id),
        )
        .await?
        .ok_or(LookupError::NotFound(shipment_id))
    }

    // Creates the shipment row, then runs the remaining steps in their own
    // task so that a panic there still ends in finalization.
    async fn process<S>(self, submission: Submission<S>) -> Result<ShipmentOutcome, SubmitError>
    where
        S: AsyncRead + Unpin + Send + 'static,
    {
        let Submission {
            owner_id,
            project_name,
            task_kind,
            algorithm,
            target_column,
            input,
            extension,
        } = submission;
        info!(
            owner_id,
            project = %project_name,
            task = %task_kind,
            algorithm = %algorithm,
            target = %target_column,
            "shipment requested"
        );

        let new = NewShipment {
            owner_id,
            project_name,
            task_kind,
            algorithm,
            target_column,
        };
        let shipment = match within(
            self.deadlines.metadata,
            "create shipment",
            self.records.create_shipment(new),
        )
        .await
        {
            Ok(shipment) => shipment,
            Err(e) => {
                error!(error = %e, "failed to create shipment");
                return Err(SubmitError::from_kind(e.kind(), None));
            }
        };
        let shipment_id = shipment.id;
        info!(%shipment_id, "shipment accepted");

        let pipeline = self.clone();
        let steps = tokio::spawn(async move { pipeline.execute(shipment, input, extension).await });
        let result = match steps.await {
            Ok(result) => result,
            Err(e) => Err(PipelineError::Aborted(e.to_string())),
        };
        self.finalize(shipment_id, result).await
    }

    async fn execute<S>(
        &self,
        shipment: Shipment,
        input: S,
        extension: String,
    ) -> Result<Metrics, PipelineError>
    where
        S: AsyncRead + Unpin + Send,
    {
        let shipment_id = shipment.id;
        let spec = ModelSpec::from_labels(
            &shipment.task_kind,
            &shipment.algorithm,
            &shipment.target_column,
        )?;
        let extension = checked_extension(&extension)?;

        let input_file = within(
            self.deadlines.metadata,
            "create input file",
            self.records.create_file(NewFile {
                shipment_id,
                class: FileClass::Input,
                path: PathBuf::new(),
            }),
        )
        .await?;

        let input_name = input_blob_name(input_file.id, &extension);
        info!(%shipment_id, file_id = %input_file.id, name = %input_name, "saving input");
        let input_path = self.blobs.save(FileClass::Input, &input_name, input).await?;

        if let Err(e) = within(
            self.deadlines.metadata,
            "update input file path",
            self.records.update_file_path(input_file.id, input_path.clone()),
        )
        .await
        {
            self.discard_blob(FileClass::Input, &input_name).await;
            return Err(e);
        }

        self.advance(shipment_id, ShipmentStatus::Accepted, StatusEvent::InputStored)
            .await?;

        let output_name = output_blob_name(input_file.id);
        let output_path = self.blobs.path(FileClass::Output, &output_name);
        let result = self
            .compute(shipment_id, &spec, &input_path, output_path)
            .await;
        if result.is_err() {
            self.discard_blob(FileClass::Output, &output_name).await;
        }
        result
    }

    async fn compute(
        &self,
        shipment_id: Uuid,
        spec: &ModelSpec,
        input_path: &Path,
        output_path: PathBuf,
    ) -> Result<Metrics, PipelineError> {
        info!(%shipment_id, algorithm = %spec.algorithm, "running model");
        let metrics = self
            .invoker
            .run(
                spec.task,
                spec.algorithm,
                &spec.target_column,
                input_path,
                &output_path,
            )
            .await?;

        let output = within(
            self.deadlines.persist,
            "persist results",
            self.records.create_output_with_metrics(
                NewFile {
                    shipment_id,
                    class: FileClass::Output,
                    path: output_path,
                },
                metrics.clone(),
            ),
        )
        .await?;
        info!(
            %shipment_id,
            file_id = %output.id,
            path = %output.path.display(),
            metrics = metrics.len(),
            "results persisted"
        );
        Ok(metrics)
    }

    async fn advance(
        &self,
        shipment_id: Uuid,
        from: ShipmentStatus,
        event: StatusEvent,
    ) -> Result<ShipmentStatus, PipelineError> {
        let to = StatusMachine::next(from, event)?;
        within(
            self.deadlines.metadata,
            "update shipment status",
            self.records.update_shipment_status(shipment_id, to),
        )
        .await?;
        info!(%shipment_id, %from, %to, "shipment status changed");
        Ok(to)
    }

    /// Sets the terminal status and, on failure, compensates. Never returns early.
    async fn finalize(
        &self,
        shipment_id: Uuid,
        result: Result<Metrics, PipelineError>,
    ) -> Result<ShipmentOutcome, SubmitError> {
        let failure = match result {
            Ok(metrics) => match self.conclude(shipment_id, StatusEvent::ResultsPersisted).await {
                Ok(_) => {
                    return Ok(ShipmentOutcome {
                        shipment_id,
                        metrics,
                    });
                }
                Err(e) => e,
            },
            Err(e) => e,
        };

        let kind = failure.kind();
        match kind {
            FailureKind::Caller => warn!(%shipment_id, error = %failure, "shipment rejected"),
            FailureKind::Infrastructure => error!(%shipment_id, error = %failure, "shipment failed"),
        }

        if let Err(e) = self.conclude(shipment_id, kind.event()).await {
            error!(%shipment_id, error = %e, "failed to record terminal status, forcing it");
            self.force_status(shipment_id, kind.status()).await;
        }
        self.compensate(shipment_id).await;

        Err(SubmitError::from_kind(kind, Some(shipment_id)))
    }

    // Moves the stored status along `event`, validated against what is stored.
    async fn conclude(
        &self,
        shipment_id: Uuid,
        event: StatusEvent,
    ) -> Result<ShipmentStatus, PipelineError> {
        let limit = self.deadlines.cleanup;
        let current = within(limit, "read shipment", self.records.shipment(shipment_id))
            .await?
            .ok_or(StoreError::NotFound {
                entity: "shipment",
                id: shipment_id,
            })?;
        let to = StatusMachine::next(current.status, event)?;
        within(
            limit,
            "update shipment status",
            self.records.update_shipment_status(shipment_id, to),
        )
        .await?;
        info!(%shipment_id, from = %current.status, %to, "shipment status changed");
        Ok(to)
    }

    async fn force_status(&self, shipment_id: Uuid, status: ShipmentStatus) {
        let written = within(
            self.deadlines.cleanup,
            "update shipment status",
            self.records.update_shipment_status(shipment_id, status),
        )
        .await;
        if let Err(e) = written {
            error!(%shipment_id, %status, error = %e, "shipment left without terminal status");
        }
    }

    /// Removes every blob and file record of the shipment. Best effort: each
    /// failure is logged and the remaining deletions still run.
    async fn compensate(&self, shipment_id: Uuid) {
        let limit = self.deadlines.cleanup;
        for class in [FileClass::Output, FileClass::Input] {
            let files = match within(
                limit,
                "list files",
                self.records.files_by_shipment(shipment_id, class),
            )
            .await
            {
                Ok(files) => files,
                Err(e) => {
                    error!(%shipment_id, %class, error = %e, "failed to list files for cleanup");
                    continue;
                }
            };

            for file in files {
                // The computation may have written its output without a record.
                if class == FileClass::Input {
                    self.discard_blob(FileClass::Output, &output_blob_name(file.id))
                        .await;
                }
                if let Some(name) = file.blob_name() {
                    self.discard_blob(file.class, name).await;
                }
                match within(limit, "delete file", self.records.delete_file(file.id)).await {
                    Ok(()) => info!(%shipment_id, file_id = %file.id, %class, "file forgotten"),
                    Err(e) => {
                        error!(%shipment_id, file_id = %file.id, error = %e, "failed to forget file")
                    }
                }
            }
        }
    }

    async fn discard_blob(&self, class: FileClass, name: &str) {
        if let Err(e) = self.blobs.delete(class, name).await {
            warn!(%class, name, error = %e, "failed to delete blob");
        }
    }
}
