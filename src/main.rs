mod simulation;

use std::{
    env,
    num::NonZeroUsize,
    path::{Path, PathBuf},
    process,
};

use anyhow::Context;
use forecaster::{FieldSnapshot, OnlineForecastUpdate, UpdateConfig, UpdateReport};
use log::info;
use serde::Serialize;
use state_store::{FileStateStore, RegionNames, SharedMemoryStateStore, State};

use crate::simulation::SyntheticField;

const DEFAULT_STATE_PATH: &str = "state.json";
const FIELD_NODES: NonZeroUsize = NonZeroUsize::new(64).unwrap();
const FIELD_GROWTH: f64 = 0.05;

/// What a run leaves behind, printed as JSON once the host loop ends.
#[derive(Debug, Default, Serialize)]
struct RunSummary {
    mode: &'static str,
    cycles: u64,
    last_cycle: Option<u64>,
    loss: Option<f64>,
    state: Option<State>,
    torn_down: bool,
}

impl RunSummary {
    fn new(mode: &'static str, cycles: u64) -> Self {
        Self {
            mode,
            cycles,
            ..Default::default()
        }
    }

    fn record(&mut self, report: &UpdateReport) {
        self.last_cycle = Some(report.cycle);
        self.loss = Some(report.loss);
        self.state = Some(report.state);
    }
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} <file|shm> <cycles> [config.json]");
    eprintln!("       {program} cleanup");
    process::exit(1);
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("insitu-forecast");

    let mode = match args.get(1).map(String::as_str) {
        Some("cleanup") => {
            SharedMemoryStateStore::remove(&RegionNames::default())
                .context("failed to remove shared state regions")?;
            info!("shared state regions removed");
            return Ok(());
        }
        Some(mode @ ("file" | "shm")) => mode,
        _ => usage(program),
    };

    let Some(cycles) = args.get(2) else {
        usage(program);
    };
    let cycles: u64 = cycles
        .parse()
        .with_context(|| format!("cycles must be a non-negative integer, got '{cycles}'"))?;

    let config = match args.get(3) {
        Some(path) => UpdateConfig::from_json_file(path)
            .with_context(|| format!("cannot load config from '{path}'"))?,
        None if mode == "file" => UpdateConfig::file_deployment(),
        None => UpdateConfig::shared_memory_deployment(),
    };

    let field = SyntheticField::new(FIELD_NODES, FIELD_GROWTH);

    let summary = if mode == "file" {
        let path = env::var_os("STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH));
        run_file(&path, &field, cycles, config)?
    } else {
        run_shared_memory(&field, cycles, config)?
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Drives the update against a state file, one call per cycle.
fn run_file(
    path: &Path,
    field: &SyntheticField,
    cycles: u64,
    config: UpdateConfig,
) -> anyhow::Result<RunSummary> {
    info!("running {cycles} cycles against {}", path.display());

    let mut summary = RunSummary::new("file", cycles);
    let store = FileStateStore::new(path);
    let mut updater = OnlineForecastUpdate::new(store, FieldSnapshot::default(), config)?;

    for cycle in 0..cycles {
        updater.source_mut().replace(cycle, field.values(cycle));
        let report = updater
            .update()
            .with_context(|| format!("update failed at cycle {cycle}"))?;
        summary.record(&report);
    }

    Ok(summary)
}

/// Drives the update against the shared memory regions, one call per cycle.
///
/// The regions are destroyed at the configured terminal cycle and recreated by the next
/// cycle, if any. On failure the mapping is released and the regions are kept so a rerun
/// resumes from the last persisted state.
fn run_shared_memory(
    field: &SyntheticField,
    cycles: u64,
    config: UpdateConfig,
) -> anyhow::Result<RunSummary> {
    info!("running {cycles} cycles against shared memory");

    let mut summary = RunSummary::new("shm", cycles);
    let mut attached = None;

    for cycle in 0..cycles {
        let mut updater = match attached.take() {
            Some(updater) => updater,
            None => open_shared_memory(&config)?,
        };

        updater.source_mut().replace(cycle, field.values(cycle));
        let report = updater
            .update()
            .with_context(|| format!("update failed at cycle {cycle}"))?;
        summary.record(&report);

        if report.terminal {
            updater
                .destroy()
                .context("failed to tear down shared state regions")?;
            summary.torn_down = true;
            info!("terminal cycle {cycle} reached, shared state torn down");
        } else {
            attached = Some(updater);
        }
    }

    if let Some(updater) = attached {
        let (store, _) = updater.into_parts();
        store.release();
    }

    Ok(summary)
}

fn open_shared_memory(
    config: &UpdateConfig,
) -> anyhow::Result<OnlineForecastUpdate<SharedMemoryStateStore, FieldSnapshot>> {
    let store =
        SharedMemoryStateStore::open_default().context("cannot open shared state regions")?;
    Ok(OnlineForecastUpdate::new(
        store,
        FieldSnapshot::default(),
        config.clone(),
    )?)
}

#[cfg(test)]
mod tests {
    use state_store::StateStore;

    use super::*;

    #[test]
    fn file_run_persists_last_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let field = SyntheticField::new(FIELD_NODES, FIELD_GROWTH);

        let summary = run_file(&path, &field, 12, UpdateConfig::file_deployment()).unwrap();

        assert_eq!(summary.last_cycle, Some(11));
        assert_eq!(FileStateStore::new(&path).load().unwrap(), summary.state.unwrap());
    }

    #[test]
    fn file_run_resumes_from_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let field = SyntheticField::new(FIELD_NODES, FIELD_GROWTH);

        let once = run_file(&path, &field, 10, UpdateConfig::file_deployment()).unwrap();
        let again = run_file(&path, &field, 10, UpdateConfig::file_deployment()).unwrap();

        assert_ne!(once.state, again.state);
    }

    #[test]
    fn zero_cycles_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let field = SyntheticField::new(FIELD_NODES, FIELD_GROWTH);

        let summary = run_file(&path, &field, 0, UpdateConfig::file_deployment()).unwrap();

        assert_eq!(summary.state, None);
        assert!(!path.exists());
    }
}
