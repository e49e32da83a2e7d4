use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::InvokeError;
use crate::metrics;
use crate::shipment::{Algorithm, Metrics, TaskKind};

/// Runs the external modeling computation for one shipment.
pub trait ModelInvoker: Send + Sync + 'static {
    /// Fits `algorithm` for `task` on the dataset at `input`, writes the model
    /// to `output` and returns the quality metrics it reports.
    fn run(
        &self,
        task: TaskKind,
        algorithm: Algorithm,
        target_column: &str,
        input: &Path,
        output: &Path,
    ) -> impl Future<Output = Result<Metrics, InvokeError>> + Send;
}

/// Invokes one script per task kind through an interpreter:
/// `<interpreter> <script> <algorithm> <target column> <input path> <output path>`.
#[derive(Debug, Clone)]
pub struct ScriptInvoker {
    pub interpreter: String,
    pub regression_script: PathBuf,
    pub classification_script: PathBuf,
}

impl ScriptInvoker {
    pub fn new(
        interpreter: impl Into<String>,
        regression_script: impl Into<PathBuf>,
        classification_script: impl Into<PathBuf>,
    ) -> Self {
        Self {
            interpreter: interpreter.into(),
            regression_script: regression_script.into(),
            classification_script: classification_script.into(),
        }
    }

    fn script(&self, task: TaskKind) -> &Path {
        match task {
            TaskKind::Regression => &self.regression_script,
            TaskKind::Classification => &self.classification_script,
        }
    }
}

impl ModelInvoker for ScriptInvoker {
    async fn run(
        &self,
        task: TaskKind,
        algorithm: Algorithm,
        target_column: &str,
        input: &Path,
        output: &Path,
    ) -> Result<Metrics, InvokeError> {
        algorithm.check(task)?;
        let script = self.script(task);

        tracing::info!(
            program = %self.interpreter,
            script = %script.display(),
            %algorithm,
            target_column = %target_column,
            input = %input.display(),
            output = %output.display(),
            "launching computation"
        );

        let out = Command::new(&self.interpreter)
            .arg(script)
            .arg(algorithm.canonical_name())
            .arg(target_column)
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(false)
            .output()
            .await
            .map_err(|source| InvokeError::Launch {
                program: self.interpreter.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&out.stdout);
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
            tracing::warn!(code = ?out.status.code(), %stderr, "computation failed");
            return Err(InvokeError::Exit {
                code: out.status.code(),
                stderr,
            });
        }
        if !out.stderr.is_empty() {
            tracing::debug!(stderr = %String::from_utf8_lossy(&out.stderr), "computation stderr");
        }

        let lines = metrics::metric_lines(&stdout);
        tracing::debug!(stdout = %lines.join(" | "), "computation stdout");
        let parsed = metrics::parse(lines).inspect_err(|e| {
            tracing::warn!(error = %e, "computation output rejected");
        })?;
        Ok(parsed)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::{ParseError, SubmissionError};
    use tempfile::TempDir;

    // Writes `body` as a shell script and returns an invoker running it for both tasks.
    fn shell_invoker(tmp: &TempDir, body: &str) -> ScriptInvoker {
        let script = tmp.path().join("model.sh");
        std::fs::write(&script, body).unwrap();
        ScriptInvoker::new("sh", &script, &script)
    }

    fn paths(tmp: &TempDir) -> (PathBuf, PathBuf) {
        (tmp.path().join("in.csv"), tmp.path().join("out"))
    }

    #[tokio::test]
    async fn parses_metrics_from_stdout() {
        let tmp = TempDir::new().unwrap();
        let invoker = shell_invoker(&tmp, "printf 'R2 Score: 0.87\\nMAE: 3.21\\n\\n'\n");
        let (input, output) = paths(&tmp);

        let metrics = invoker
            .run(
                TaskKind::Regression,
                Algorithm::LinearRegression,
                "price",
                &input,
                &output,
            )
            .await
            .unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics["R2 Score"], 0.87);
        assert_eq!(metrics["MAE"], 3.21);
    }

    #[tokio::test]
    async fn passes_positional_arguments() {
        let tmp = TempDir::new().unwrap();
        // Reports the argument count and writes the output file.
        let invoker = shell_invoker(
            &tmp,
            "printf 'args: %s\\n' \"$#\"\n\
             [ \"$1\" = random_forest ] || exit 3\n\
             [ \"$2\" = species ] || exit 4\n\
             printf model > \"$4\"\n",
        );
        let (input, output) = paths(&tmp);

        let metrics = invoker
            .run(
                TaskKind::Classification,
                Algorithm::RandomForest,
                "species",
                &input,
                &output,
            )
            .await
            .unwrap();
        assert_eq!(metrics["args"], 4.0);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "model");
    }

    // Collects formatted log lines for assertions.
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn launch_is_logged_with_structured_fields() {
        let tmp = TempDir::new().unwrap();
        let invoker = shell_invoker(&tmp, "printf 'MAE: 1\\n'\n");
        let (input, output) = paths(&tmp);

        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        invoker
            .run(
                TaskKind::Regression,
                Algorithm::LinearRegression,
                "price",
                &input,
                &output,
            )
            .await
            .unwrap();

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = text
            .lines()
            .find(|l| l.contains("launching computation"))
            .expect("launch line");
        assert!(line.contains("program=sh"), "{line}");
        assert!(line.contains("algorithm=linear_regression"), "{line}");
        assert!(line.contains("target_column=price"), "{line}");
        assert!(line.contains(&format!("input={}", input.display())), "{line}");
        assert!(line.contains(&format!("output={}", output.display())), "{line}");
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let invoker = shell_invoker(&tmp, "echo 'Traceback' >&2\nexit 1\n");
        let (input, output) = paths(&tmp);

        let err = invoker
            .run(
                TaskKind::Regression,
                Algorithm::LinearRegression,
                "price",
                &input,
                &output,
            )
            .await
            .unwrap_err();
        match err {
            InvokeError::Exit { code, stderr } => {
                assert_eq!(code, Some(1));
                assert!(stderr.contains("Traceback"));
            }
            other => panic!("expected Exit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_output_is_a_parse_error() {
        let tmp = TempDir::new().unwrap();
        let invoker = shell_invoker(&tmp, "printf 'BadLine\\n'\n");
        let (input, output) = paths(&tmp);

        let err = invoker
            .run(
                TaskKind::Regression,
                Algorithm::LinearRegression,
                "price",
                &input,
                &output,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Parse(ParseError::Malformed { line_no: 1, .. })
        ));
    }

    #[tokio::test]
    async fn missing_interpreter_is_a_launch_error() {
        let tmp = TempDir::new().unwrap();
        let invoker = ScriptInvoker::new(
            "definitely-not-an-interpreter-xyz",
            tmp.path().join("a"),
            tmp.path().join("b"),
        );
        let (input, output) = paths(&tmp);

        let err = invoker
            .run(
                TaskKind::Regression,
                Algorithm::LinearRegression,
                "price",
                &input,
                &output,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, InvokeError::Launch { .. }));
    }

    #[tokio::test]
    async fn mismatched_algorithm_is_rejected_before_launch() {
        let tmp = TempDir::new().unwrap();
        let invoker = shell_invoker(&tmp, "touch \"$4\"\n");
        let (input, output) = paths(&tmp);

        let err = invoker
            .run(
                TaskKind::Classification,
                Algorithm::LinearRegression,
                "label",
                &input,
                &output,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvokeError::Rejected(SubmissionError::IncompatibleAlgorithm { .. })
        ));
        assert!(!output.exists());
    }
}
