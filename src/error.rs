use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::shipment::{FileClass, ShipmentStatus, StatusEvent, TaskKind};

/// Failures of the record store (shipments, files, metrics).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the blob store.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("failed to write {class} blob {name}: {source}")]
    Write {
        class: FileClass,
        name: String,
        source: std::io::Error,
    },

    #[error("failed to delete {class} blob {name}: {source}")]
    Delete {
        class: FileClass,
        name: String,
        source: std::io::Error,
    },

    #[error("failed to read {class} blob {name}: {source}")]
    Read {
        class: FileClass,
        name: String,
        source: std::io::Error,
    },

    #[error("{class} blob {name} does not exist")]
    Missing { class: FileClass, name: String },

    #[error("invalid blob name: {0:?}")]
    InvalidName(String),
}

/// A submission the caller can fix and resubmit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("unsupported task kind: {0}")]
    UnsupportedTask(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("algorithm {algorithm} cannot be used for {task} tasks")]
    IncompatibleAlgorithm {
        algorithm: &'static str,
        task: TaskKind,
    },

    #[error("target column must not be empty")]
    MissingTargetColumn,

    #[error("invalid file extension: {0:?}")]
    InvalidExtension(String),
}

/// The computation output violated the `name: value` line format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid output format on line {line_no}: {line:?}")]
    Malformed { line_no: usize, line: String },

    #[error("failed to parse value as float on line {line_no}: {value:?}")]
    InvalidValue { line_no: usize, value: String },
}

/// Failures of the external computation.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Rejected(#[from] SubmissionError),

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    #[error("computation exited with {}", exit_label(*.code))]
    Exit { code: Option<i32>, stderr: String },

    #[error("failed to parse metrics: {0}")]
    Parse(#[from] ParseError),
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

/// Classifies a pipeline failure into the terminal status it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Caller-fixable rejection (bad task kind, algorithm or column). Ends in `denied`.
    Caller,
    /// Storage, subprocess, persistence or deadline failure. Ends in `failed`.
    Infrastructure,
}

impl FailureKind {
    pub fn status(self) -> ShipmentStatus {
        match self {
            FailureKind::Caller => ShipmentStatus::Denied,
            FailureKind::Infrastructure => ShipmentStatus::Failed,
        }
    }

    pub fn event(self) -> StatusEvent {
        match self {
            FailureKind::Caller => StatusEvent::Rejected,
            FailureKind::Infrastructure => StatusEvent::Errored,
        }
    }
}

/// Any failure inside the per-shipment pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("record store: {0}")]
    Store(#[from] StoreError),

    #[error("blob store: {0}")]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("deadline exceeded during {operation}")]
    DeadlineExceeded { operation: &'static str },

    #[error("pipeline task aborted: {0}")]
    Aborted(String),

    #[error("illegal status transition from {from} on {event:?}")]
    IllegalTransition {
        from: ShipmentStatus,
        event: StatusEvent,
    },
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Submission(_) => FailureKind::Caller,
            PipelineError::Invoke(InvokeError::Rejected(_)) => FailureKind::Caller,
            _ => FailureKind::Infrastructure,
        }
    }
}

/// What the caller of `submit` gets back on failure. Diagnostics stay in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("submission rejected")]
    Rejected { shipment_id: Option<Uuid> },

    #[error("submission failed")]
    Errored { shipment_id: Option<Uuid> },
}

impl SubmitError {
    pub fn from_kind(kind: FailureKind, shipment_id: Option<Uuid>) -> Self {
        match kind {
            FailureKind::Caller => SubmitError::Rejected { shipment_id },
            FailureKind::Infrastructure => SubmitError::Errored { shipment_id },
        }
    }

    pub fn shipment_id(&self) -> Option<Uuid> {
        match self {
            SubmitError::Rejected { shipment_id } | SubmitError::Errored { shipment_id } => {
                *shipment_id
            }
        }
    }
}

/// Failures of result retrieval for a completed shipment.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("shipment not found: {0}")]
    NotFound(Uuid),

    #[error("shipment {id} is {status}, results exist only for finished shipments")]
    NotFinished { id: Uuid, status: ShipmentStatus },

    #[error("shipment {id} has {count} output files, expected exactly one")]
    OutputCount { id: Uuid, count: usize },

    #[error("output blob missing: {}", .0.display())]
    MissingBlob(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("blob store: {0}")]
    Blob(#[from] BlobError),

    #[error("record store: {0}")]
    Store(#[from] StoreError),

    #[error("deadline exceeded during {operation}")]
    DeadlineExceeded { operation: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_classify_as_denied() {
        let err = PipelineError::from(SubmissionError::UnsupportedTask("survey".into()));
        assert_eq!(err.kind(), FailureKind::Caller);
        assert_eq!(err.kind().status(), ShipmentStatus::Denied);

        let err = PipelineError::from(InvokeError::Rejected(
            SubmissionError::UnsupportedAlgorithm("k-means".into()),
        ));
        assert_eq!(err.kind(), FailureKind::Caller);

        let err = PipelineError::from(SubmissionError::InvalidExtension("csv/../x".into()));
        assert_eq!(err.kind().status(), ShipmentStatus::Denied);
    }

    #[test]
    fn parse_and_exit_errors_classify_as_failed() {
        let err = PipelineError::from(InvokeError::Parse(ParseError::Malformed {
            line_no: 1,
            line: "BadLine".into(),
        }));
        assert_eq!(err.kind(), FailureKind::Infrastructure);
        assert_eq!(err.kind().status(), ShipmentStatus::Failed);

        let err = PipelineError::from(InvokeError::Exit {
            code: Some(1),
            stderr: "Traceback".into(),
        });
        assert_eq!(err.kind(), FailureKind::Infrastructure);

        let err = PipelineError::DeadlineExceeded {
            operation: "create input file",
        };
        assert_eq!(err.kind(), FailureKind::Infrastructure);
    }

    #[test]
    fn exit_display_hides_stderr() {
        let err = InvokeError::Exit {
            code: Some(2),
            stderr: "secret traceback".into(),
        };
        assert_eq!(err.to_string(), "computation exited with status 2");

        let err = InvokeError::Exit {
            code: None,
            stderr: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "computation exited with no status (terminated by signal)"
        );
    }

    #[test]
    fn submit_error_is_generic() {
        let id = Uuid::new_v4();
        let err = SubmitError::from_kind(FailureKind::Caller, Some(id));
        assert_eq!(err.to_string(), "submission rejected");
        assert_eq!(err.shipment_id(), Some(id));

        let err = SubmitError::from_kind(FailureKind::Infrastructure, None);
        assert_eq!(err.to_string(), "submission failed");
        assert_eq!(err.shipment_id(), None);
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PipelineError>();
        assert_send_sync::<SubmitError>();
    }
}
