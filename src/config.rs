//! Configuração do modelrun carregada a partir de `modelrun.toml`.
//!
//! A struct [`AppConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `MODELRUN_PYTHON` tem precedência sobre o arquivo.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuração de nível superior carregada de `modelrun.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Diretório do documento de registros (`records.json`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Diretório dos arquivos enviados pelo usuário.
    #[serde(default = "default_inputs_dir")]
    pub inputs_dir: PathBuf,

    /// Diretório dos modelos produzidos pela computação.
    #[serde(default = "default_outputs_dir")]
    pub outputs_dir: PathBuf,

    /// Interpretador usado para executar os scripts de modelagem.
    #[serde(default = "default_python")]
    pub python: String,

    #[serde(default = "default_regression_script")]
    pub regression_script: PathBuf,

    #[serde(default = "default_classification_script")]
    pub classification_script: PathBuf,

    /// Prazo em milissegundos para cada operação de metadados.
    #[serde(default = "default_metadata_timeout_ms")]
    pub metadata_timeout_ms: u64,

    /// Prazo em milissegundos para a gravação transacional dos resultados.
    #[serde(default = "default_persist_timeout_ms")]
    pub persist_timeout_ms: u64,

    /// Prazo em milissegundos para cada passo da finalização e limpeza.
    #[serde(default = "default_cleanup_timeout_ms")]
    pub cleanup_timeout_ms: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_inputs_dir() -> PathBuf {
    PathBuf::from("data/inputs")
}

fn default_outputs_dir() -> PathBuf {
    PathBuf::from("data/outputs")
}

fn default_python() -> String {
    "python".to_string()
}

fn default_regression_script() -> PathBuf {
    PathBuf::from("python/model_reg.py")
}

fn default_classification_script() -> PathBuf {
    PathBuf::from("python/model_class.py")
}

// Operações de metadados: 5s.
fn default_metadata_timeout_ms() -> u64 {
    5_000
}

// Gravação final de arquivo + métricas: 30s.
fn default_persist_timeout_ms() -> u64 {
    30_000
}

// Finalização: 5min.
fn default_cleanup_timeout_ms() -> u64 {
    300_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            inputs_dir: default_inputs_dir(),
            outputs_dir: default_outputs_dir(),
            python: default_python(),
            regression_script: default_regression_script(),
            classification_script: default_classification_script(),
            metadata_timeout_ms: default_metadata_timeout_ms(),
            persist_timeout_ms: default_persist_timeout_ms(),
            cleanup_timeout_ms: default_cleanup_timeout_ms(),
        }
    }
}

/// Prazos aplicados às chamadas ao armazenamento de registros.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadlines {
    pub metadata: Duration,
    pub persist: Duration,
    pub cleanup: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        AppConfig::default().deadlines()
    }
}

impl AppConfig {
    /// Carrega a configuração de `modelrun.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("modelrun.toml"))
    }

    /// Carrega a configuração do caminho fornecido, com os mesmos fallbacks de [`AppConfig::load`].
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<AppConfig>(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para o interpretador.
        if let Ok(python) = std::env::var("MODELRUN_PYTHON")
            && !python.is_empty()
        {
            config.python = python;
        }

        Ok(config)
    }

    pub fn records_path(&self) -> PathBuf {
        self.data_dir.join("records.json")
    }

    pub fn deadlines(&self) -> Deadlines {
        Deadlines {
            metadata: Duration::from_millis(self.metadata_timeout_ms),
            persist: Duration::from_millis(self.persist_timeout_ms),
            cleanup: Duration::from_millis(self.cleanup_timeout_ms),
        }
    }
}
