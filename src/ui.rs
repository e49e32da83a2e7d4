//! Interface de terminal do modelrun: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`SubmitProgress`] acompanha visualmente
//! a execução de um envio no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::coordinator::{ShipmentOutcome, ShipmentResult};
use crate::error::SubmitError;
use crate::metrics;
use crate::shipment::{Shipment, ShipmentStatus};

/// Indicador visual de progresso para um envio em execução.
///
/// Exibe um spinner animado durante o processamento e mensagens
/// coloridas para sucesso (verde), rejeição (amarelo) e falha (vermelho).
pub struct SubmitProgress {
    // Spinner do indicatif.
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
}

impl SubmitProgress {
    /// Inicia o spinner com o nome do projeto.
    pub fn start(project: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Running shipment: {project}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Finaliza o spinner e exibe o resultado do envio.
    pub fn complete(&self, outcome: &Result<ShipmentOutcome, SubmitError>) {
        self.pb.finish_and_clear();
        match outcome {
            Ok(outcome) => {
                println!(
                    "  {} Shipment {} finished",
                    self.green.apply_to("✓"),
                    outcome.shipment_id
                );
                print!("{}", indent(&metrics::format(&outcome.metrics)));
            }
            Err(err @ SubmitError::Rejected { .. }) => {
                println!("  {} {}{}", self.yellow.apply_to("✗"), err, shipment_suffix(err));
            }
            Err(err @ SubmitError::Errored { .. }) => {
                println!("  {} {}{}", self.red.apply_to("✗"), err, shipment_suffix(err));
            }
        }
    }
}

fn shipment_suffix(err: &SubmitError) -> String {
    err.shipment_id()
        .map(|id| format!(" (shipment {id})"))
        .unwrap_or_default()
}

fn indent(text: &str) -> String {
    text.lines().map(|line| format!("    {line}\n")).collect()
}

/// Imprime o resultado armazenado de um envio concluído.
pub fn print_result(result: &ShipmentResult) {
    let bold = Style::new().bold();
    println!(
        "{} {} ({}, {})",
        bold.apply_to("Shipment"),
        result.shipment.id,
        result.shipment.project_name,
        result.shipment.algorithm
    );
    println!("  output: {}", result.output_path.display());
    print!("{}", indent(&metrics::format(&result.metrics)));
}

/// Imprime o registro de um envio com o status colorido.
pub fn print_shipment(shipment: &Shipment) {
    let style = match shipment.status {
        ShipmentStatus::Finished => Style::new().green().bold(),
        ShipmentStatus::Failed => Style::new().red().bold(),
        ShipmentStatus::Denied => Style::new().yellow().bold(),
        status if !status.is_terminal() => Style::new().cyan(),
        _ => Style::new(),
    };
    println!("{}", style.apply_to(format!("─── {} ───", shipment.status)));
    println!(
        "{}",
        serde_json::to_string_pretty(shipment).unwrap_or_default()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn indent_prefixes_every_line() {
        assert_eq!(indent("MAE: 3.21\nR2: 0.8\n"), "    MAE: 3.21\n    R2: 0.8\n");
        assert_eq!(indent(""), "");
    }

    #[test]
    fn suffix_names_shipment_when_known() {
        let id = Uuid::new_v4();
        let err = SubmitError::Errored {
            shipment_id: Some(id),
        };
        assert_eq!(shipment_suffix(&err), format!(" (shipment {id})"));
        let err = SubmitError::Rejected { shipment_id: None };
        assert_eq!(shipment_suffix(&err), "");
    }
}
