use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::ShipmentStatus;
use crate::error::SubmissionError;

/// Metric name to value, as produced by one computation run.
pub type Metrics = BTreeMap<String, f64>;

/// The two computation entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Regression,
    Classification,
}

impl TaskKind {
    /// Translates a submitted task label. Accepts the short legacy forms `reg` and `class`.
    pub fn from_label(label: &str) -> Result<Self, SubmissionError> {
        match label.trim().to_lowercase().as_str() {
            "regression" | "reg" => Ok(TaskKind::Regression),
            "classification" | "class" => Ok(TaskKind::Classification),
            _ => Err(SubmissionError::UnsupportedTask(label.to_string())),
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Regression => write!(f, "regression"),
            TaskKind::Classification => write!(f, "classification"),
        }
    }
}

/// Algorithms the computation knows how to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    LinearRegression,
    SupportVectorMachine,
    RandomForest,
    LogisticRegression,
}

// Human-readable labels accepted at the submission boundary.
const ALGORITHM_LABELS: &[(&str, Algorithm)] = &[
    ("linear regression", Algorithm::LinearRegression),
    ("линейная регрессия", Algorithm::LinearRegression),
    ("support vector machine", Algorithm::SupportVectorMachine),
    ("метод опорных векторов", Algorithm::SupportVectorMachine),
    ("random forest", Algorithm::RandomForest),
    ("случайный лес", Algorithm::RandomForest),
    ("logistic regression", Algorithm::LogisticRegression),
    ("логистическая регрессия", Algorithm::LogisticRegression),
];

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::LinearRegression,
        Algorithm::SupportVectorMachine,
        Algorithm::RandomForest,
        Algorithm::LogisticRegression,
    ];

    /// The identifier passed to the computation.
    pub fn canonical_name(self) -> &'static str {
        match self {
            Algorithm::LinearRegression => "linear_regression",
            Algorithm::SupportVectorMachine => "support_vector_machine",
            Algorithm::RandomForest => "random_forest",
            Algorithm::LogisticRegression => "logistic_regression",
        }
    }

    /// Translates a human-readable label (or a canonical name) into an algorithm.
    pub fn from_label(label: &str) -> Result<Self, SubmissionError> {
        let normalized = label.trim().to_lowercase();
        if let Some(algorithm) = Self::ALL
            .into_iter()
            .find(|a| a.canonical_name() == normalized)
        {
            return Ok(algorithm);
        }
        ALGORITHM_LABELS
            .iter()
            .find(|(known, _)| *known == normalized)
            .map(|&(_, algorithm)| algorithm)
            .ok_or_else(|| SubmissionError::UnsupportedAlgorithm(label.to_string()))
    }

    pub fn supports(self, task: TaskKind) -> bool {
        matches!(
            (task, self),
            (TaskKind::Regression, Algorithm::LinearRegression)
                | (TaskKind::Regression, Algorithm::SupportVectorMachine)
                | (TaskKind::Classification, Algorithm::RandomForest)
                | (TaskKind::Classification, Algorithm::LogisticRegression)
        )
    }

    /// Fails with a caller error when this algorithm is not offered for `task`.
    pub fn check(self, task: TaskKind) -> Result<(), SubmissionError> {
        if self.supports(task) {
            Ok(())
        } else {
            Err(SubmissionError::IncompatibleAlgorithm {
                algorithm: self.canonical_name(),
                task,
            })
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Validated, typed form of a submission's modeling parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub task: TaskKind,
    pub algorithm: Algorithm,
    pub target_column: String,
}

impl ModelSpec {
    pub fn from_labels(
        task: &str,
        algorithm: &str,
        target_column: &str,
    ) -> Result<Self, SubmissionError> {
        let task = TaskKind::from_label(task)?;
        let algorithm = Algorithm::from_label(algorithm)?;
        algorithm.check(task)?;
        let target_column = target_column.trim();
        if target_column.is_empty() {
            return Err(SubmissionError::MissingTargetColumn);
        }
        Ok(Self {
            task,
            algorithm,
            target_column: target_column.to_string(),
        })
    }
}

/// Fields of a shipment known before the store assigns its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShipment {
    pub owner_id: u64,
    pub project_name: String,
    /// Task kind label as submitted.
    pub task_kind: String,
    /// Algorithm label as submitted.
    pub algorithm: String,
    pub target_column: String,
}

/// One user submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: Uuid,
    pub owner_id: u64,
    pub project_name: String,
    pub task_kind: String,
    pub algorithm: String,
    pub target_column: String,
    pub status: ShipmentStatus,
    pub created_at: DateTime<Utc>,
}

impl Shipment {
    /// Materializes a new shipment in `accepted` status.
    pub fn create(id: Uuid, new: NewShipment) -> Self {
        Self {
            id,
            owner_id: new.owner_id,
            project_name: new.project_name,
            task_kind: new.task_kind,
            algorithm: new.algorithm,
            target_column: new.target_column,
            status: ShipmentStatus::Accepted,
            created_at: Utc::now(),
        }
    }
}

/// Whether a blob was uploaded by the user or produced by the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileClass {
    Input,
    Output,
}

impl fmt::Display for FileClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileClass::Input => write!(f, "input"),
            FileClass::Output => write!(f, "output"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFile {
    pub shipment_id: Uuid,
    pub class: FileClass,
    /// Empty until the blob is written.
    pub path: PathBuf,
}

/// Metadata for one physical blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub shipment_id: Uuid,
    pub path: PathBuf,
    pub class: FileClass,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn create(id: Uuid, new: NewFile) -> Self {
        Self {
            id,
            shipment_id: new.shipment_id,
            path: new.path,
            class: new.class,
            created_at: Utc::now(),
        }
    }

    /// Logical blob name, recovered from the stored path.
    pub fn blob_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Normalizes an extension hint (surrounding whitespace and leading dots
/// dropped). Only ASCII letters, digits, `.`, `_` and `-` may remain.
pub fn checked_extension(extension: &str) -> Result<String, SubmissionError> {
    let normalized = extension.trim().trim_start_matches('.');
    let valid = normalized
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(normalized.to_string())
    } else {
        Err(SubmissionError::InvalidExtension(extension.to_string()))
    }
}

/// Blob name of an uploaded input: `<file id>.<extension>`, or just the id without one.
pub fn input_blob_name(file_id: Uuid, extension: &str) -> String {
    let extension = extension.trim().trim_start_matches('.');
    if extension.is_empty() {
        file_id.to_string()
    } else {
        format!("{file_id}.{extension}")
    }
}

/// Blob name of the computation output for a given input file.
pub fn output_blob_name(input_file_id: Uuid) -> String {
    input_file_id.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_kind_labels() {
        assert_eq!(TaskKind::from_label("regression"), Ok(TaskKind::Regression));
        assert_eq!(TaskKind::from_label("reg"), Ok(TaskKind::Regression));
        assert_eq!(
            TaskKind::from_label(" Classification "),
            Ok(TaskKind::Classification)
        );
        assert_eq!(
            TaskKind::from_label("survey"),
            Err(SubmissionError::UnsupportedTask("survey".into()))
        );
    }

    #[test]
    fn algorithm_labels_translate_to_canonical_names() {
        assert_eq!(
            Algorithm::from_label("Linear regression"),
            Ok(Algorithm::LinearRegression)
        );
        assert_eq!(
            Algorithm::from_label("Случайный лес"),
            Ok(Algorithm::RandomForest)
        );
        assert_eq!(
            Algorithm::from_label("support_vector_machine"),
            Ok(Algorithm::SupportVectorMachine)
        );
        assert_eq!(
            Algorithm::from_label("k-means"),
            Err(SubmissionError::UnsupportedAlgorithm("k-means".into()))
        );
        assert_eq!(Algorithm::LogisticRegression.to_string(), "logistic_regression");
    }

    #[test]
    fn algorithm_task_compatibility() {
        assert!(Algorithm::LinearRegression.supports(TaskKind::Regression));
        assert!(Algorithm::SupportVectorMachine.supports(TaskKind::Regression));
        assert!(Algorithm::RandomForest.supports(TaskKind::Classification));
        assert!(Algorithm::LogisticRegression.supports(TaskKind::Classification));
        assert!(!Algorithm::RandomForest.supports(TaskKind::Regression));
        assert!(!Algorithm::LinearRegression.supports(TaskKind::Classification));
    }

    #[test]
    fn model_spec_rejects_mismatch_and_empty_column() {
        let spec = ModelSpec::from_labels("reg", "Linear regression", " price ").unwrap();
        assert_eq!(spec.task, TaskKind::Regression);
        assert_eq!(spec.target_column, "price");

        assert_eq!(
            ModelSpec::from_labels("classification", "Linear regression", "label"),
            Err(SubmissionError::IncompatibleAlgorithm {
                algorithm: "linear_regression",
                task: TaskKind::Classification,
            })
        );
        assert_eq!(
            ModelSpec::from_labels("regression", "Linear regression", "  "),
            Err(SubmissionError::MissingTargetColumn)
        );
    }

    #[test]
    fn blob_names() {
        let id = Uuid::new_v4();
        assert_eq!(input_blob_name(id, "csv"), format!("{id}.csv"));
        assert_eq!(input_blob_name(id, ".xlsx"), format!("{id}.xlsx"));
        assert_eq!(input_blob_name(id, ""), id.to_string());
        assert_eq!(output_blob_name(id), id.to_string());
    }

    #[test]
    fn extension_hint_is_normalized_or_rejected() {
        assert_eq!(checked_extension("csv").unwrap(), "csv");
        assert_eq!(checked_extension(" .xlsx ").unwrap(), "xlsx");
        assert_eq!(checked_extension("tar.gz").unwrap(), "tar.gz");
        assert_eq!(checked_extension("").unwrap(), "");

        for bad in ["csv/../x", "a\\b", "c sv", "csv\0"] {
            assert_eq!(
                checked_extension(bad),
                Err(SubmissionError::InvalidExtension(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn file_record_blob_name_from_path() {
        let id = Uuid::new_v4();
        let record = FileRecord::create(
            id,
            NewFile {
                shipment_id: Uuid::new_v4(),
                class: FileClass::Input,
                path: PathBuf::from(format!("/data/inputs/{id}.csv")),
            },
        );
        assert_eq!(record.blob_name(), Some(format!("{id}.csv").as_str()));

        let empty = FileRecord::create(
            id,
            NewFile {
                shipment_id: Uuid::new_v4(),
                class: FileClass::Input,
                path: PathBuf::new(),
            },
        );
        assert_eq!(empty.blob_name(), None);
    }

    #[test]
    fn new_shipment_starts_accepted() {
        let shipment = Shipment::create(
            Uuid::new_v4(),
            NewShipment {
                owner_id: 7,
                project_name: "housing".into(),
                task_kind: "regression".into(),
                algorithm: "Linear regression".into(),
                target_column: "price".into(),
            },
        );
        assert_eq!(shipment.status, ShipmentStatus::Accepted);
        assert_eq!(shipment.owner_id, 7);
    }

    #[test]
    fn shipment_serialization_roundtrip() {
        let shipment = Shipment::create(
            Uuid::new_v4(),
            NewShipment {
                owner_id: 1,
                project_name: "iris".into(),
                task_kind: "classification".into(),
                algorithm: "Random forest".into(),
                target_column: "species".into(),
            },
        );
        let json = serde_json::to_string(&shipment).unwrap();
        assert!(json.contains("\"status\":\"accepted\""));
        let back: Shipment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, shipment);
    }
}
