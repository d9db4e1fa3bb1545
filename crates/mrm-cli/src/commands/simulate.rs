//! Scenario replay against simulated loaders

use crate::output::{gb, Formattable, OutputFormatter};
use crate::scenario::{Scenario, ScenarioRunner, StepOutcome};
use anyhow::{bail, Result};
use mrm_coordinator::{LedgerSnapshot, ResourceManager};
use mrm_core::{ChannelSink, Config, MemoryAllocation, ModelType, ResourceEvent};
use mrm_dev::{ScriptedUnloader, UnloadLog};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct SimulationReport {
    name: Option<String>,
    steps: Vec<StepOutcome>,
    unload_calls: Vec<String>,
    ledger: LedgerSnapshot,
    events: Vec<ResourceEvent>,
}

#[derive(Debug, Serialize)]
struct AllocationRow<'a>(&'a MemoryAllocation);

impl Formattable for AllocationRow<'_> {
    fn table_headers() -> Vec<String> {
        ["Model", "Reserved", "Precision", "Since"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn table_row(&self) -> Vec<String> {
        vec![
            self.0.model_id.clone(),
            gb(self.0.vram_allocated_gb),
            self.0.precision.to_string(),
            self.0.allocated_at.format("%H:%M:%S%.3f").to_string(),
        ]
    }

    fn key_value_pairs(&self) -> Vec<(String, String)> {
        Self::table_headers()
            .into_iter()
            .zip(self.table_row())
            .collect()
    }
}

/// Replay a scenario file and print what the manager decided at each step
///
/// Fails when any step declared an expectation that was not met.
pub async fn run_simulation(
    config: Config,
    scenario_path: &Path,
    formatter: &OutputFormatter,
) -> Result<()> {
    let scenario = Scenario::from_file(scenario_path)?;
    let config = scenario.apply(config);
    info!(
        scenario = %scenario_path.display(),
        steps = scenario.steps.len(),
        "Running scenario"
    );

    let (sink, mut events_rx) = ChannelSink::channel();
    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = events_rx.recv().await {
            debug!(kind = event.kind(), model_id = event.model_id(), "Event");
            events.push(event);
        }
        events
    });

    // Unloaders may sleep; keep the manager off the async workers. Dropping
    // it closes the event channel.
    let (steps, unload_calls, ledger) = tokio::task::spawn_blocking({
        let scenario = scenario.clone();
        move || -> Result<(Vec<StepOutcome>, Vec<String>, LedgerSnapshot)> {
            let manager = ResourceManager::from_config(config, Arc::new(sink))?;
            let log = UnloadLog::new();
            for model_type in ModelType::ALL {
                let unloader = ScriptedUnloader::new(model_type.as_str(), log.clone());
                for model_id in &scenario.failing_unloads {
                    unloader.fail_on(model_id.clone());
                }
                manager.register_unloader(model_type, Arc::new(unloader));
            }

            let steps = ScenarioRunner::new(&manager).run(&scenario.steps);
            let ledger = manager.ledger_snapshot();
            manager.handle().verify()?;
            Ok((steps, log.calls(), ledger))
        }
    })
    .await??;

    let report = SimulationReport {
        name: scenario.name.clone(),
        steps,
        unload_calls,
        ledger,
        events: collector.await?,
    };
    print_report(&report, formatter)?;

    let unexpected = report.steps.iter().filter(|s| !s.as_expected).count();
    if unexpected > 0 {
        bail!("{} step(s) did not match their expectation", unexpected);
    }
    Ok(())
}

fn print_report(report: &SimulationReport, formatter: &OutputFormatter) -> Result<()> {
    if formatter.format().is_structured() {
        return formatter.print_document(report);
    }

    if let Some(name) = &report.name {
        formatter.print_heading(name);
    }
    formatter.print_list(&report.steps)?;

    formatter.print_heading("Ledger");
    let rows: Vec<AllocationRow<'_>> = report.ledger.allocations.iter().map(AllocationRow).collect();
    formatter.print_list(&rows)?;

    let summary = format!(
        "{} reserved, {} unreserved of {}; {} unload call(s), {} event(s)",
        gb(report.ledger.used_gb),
        gb(report.ledger.unreserved_gb),
        gb(report.ledger.available_gb),
        report.unload_calls.len(),
        report.events.len()
    );
    if report.steps.iter().all(|s| s.as_expected) {
        formatter.print_success(&summary)
    } else {
        formatter.print_warning(&summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use mrm_dev::create_test_config;
    use std::io::Write;

    fn scenario_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_simulation_passes() {
        let file = scenario_file(
            r#"
vram_gb: 12
steps:
  - load: { model: tts-model, expect: admitted }
  - loaded: { model: tts-model }
  - load: { model: sd-model, expect: admitted }
"#,
        );
        let formatter = OutputFormatter::new(OutputFormat::Json);
        run_simulation(create_test_config(12.0), file.path(), &formatter)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unmet_expectation_fails() {
        let file = scenario_file(
            r#"
vram_gb: 4
failing_unloads: [stt-model]
steps:
  - load: { model: stt-model }
  - loaded: { model: stt-model }
  - load: { model: tts-model, precision: fp32, expect: admitted }
"#,
        );
        let formatter = OutputFormatter::new(OutputFormat::Text);
        let err = run_simulation(create_test_config(4.0), file.path(), &formatter)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not match"));
    }
}
