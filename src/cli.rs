//! Interface de linha de comando do modelrun baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (submit, result, status)
//! e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// modelrun: executa modelos sobre conjuntos de dados enviados e registra suas métricas.
#[derive(Debug, Parser)]
#[command(name = "modelrun", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./modelrun.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Envia um conjunto de dados e executa o modelo sobre ele.
    Submit {
        /// Identificador do usuário dono do envio.
        #[arg(long)]
        owner: u64,

        /// Nome do projeto.
        #[arg(long)]
        project: String,

        /// Tipo de tarefa: regression ou classification.
        #[arg(long)]
        task: String,

        /// Algoritmo (ex.: "Linear regression", "Random forest").
        #[arg(long)]
        algorithm: String,

        /// Coluna alvo do conjunto de dados.
        #[arg(long)]
        target: String,

        /// Arquivo de dados (csv, xls, xlsx ou pkl).
        file: PathBuf,
    },

    /// Mostra as métricas de um envio concluído.
    Result {
        /// Identificador do envio.
        id: Uuid,

        /// Imprime o resultado em JSON.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Copia o modelo produzido para este caminho.
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Mostra o registro e o status de um envio.
    Status {
        /// Identificador do envio.
        id: Uuid,
    },
}

/// Extensão do nome de arquivo: o texto após o último ponto, ou vazio se não houver ponto.
pub fn file_extension(path: &std::path::Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default()
}
