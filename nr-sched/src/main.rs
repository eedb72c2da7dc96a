/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use nr_sched::config::{ScenarioConfig, ScenarioConfigManager};
use nr_sched::sim::scenario::{RunSummary, Scenario};
use nr_sched::ue::Direction;

// ── CLI argument definition ───────────────────────────────────────────────────

/// NR slot-scheduling simulator.
///
/// Example:
///   nr-sched --config scenario.yaml --slots 2000 --runs 4 --seed 7
#[derive(Debug, Parser)]
#[command(
    name = "nr-sched",
    about = "NR OFDMA scheduler, link adaptation and interference simulation",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML scenario file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Slots simulated per run.
    #[arg(short = 'n', long = "slots", default_value_t = 1000)]
    slots: u64,

    /// Independent runs, executed in parallel.
    #[arg(short = 'r', long = "runs", default_value_t = 1)]
    runs: u64,

    /// Seed of the first run; run `i` uses `seed + i`.
    #[arg(short = 's', long = "seed", default_value_t = 1)]
    seed: u64,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!(
        config = ?cli.config,
        slots = cli.slots,
        runs = cli.runs,
        seed = cli.seed,
        "nr-sched starting up"
    );

    // ── Load scenario ─────────────────────────────────────────────────────────
    let mut manager = ScenarioConfigManager::new();
    match &cli.config {
        Some(path) => {
            if let Err(e) = manager.load_from_file(path) {
                error!("Failed to load scenario: {:#}", e);
                process::exit(1);
            }
        }
        None => {
            warn!("No scenario file provided, using the default single-cell scenario");
        }
    }
    let config = manager.into_config();

    // ── Run ───────────────────────────────────────────────────────────────────
    let summaries = match run_all(config, cli.slots, cli.runs, cli.seed).await {
        Ok(s) => s,
        Err(e) => {
            error!("Simulation failed: {:#}", e);
            process::exit(1);
        }
    };

    for s in &summaries {
        for cell in &s.cells {
            info!(
                seed = s.seed,
                cell = cell.cell_id,
                dl_bler = cell.dl.stats.bler(),
                dl_mcs = cell.dl.stats.mean_mcs(),
                dl_mbps = cell.dl.throughput_mbps(s.elapsed),
                ul_bler = cell.ul.stats.bler(),
                ul_mcs = cell.ul.stats.mean_mcs(),
                ul_mbps = cell.ul.throughput_mbps(s.elapsed),
                "cell result"
            );
        }
    }
    if summaries.len() > 1 {
        let n = summaries.len() as f64;
        let mean = |dir: Direction| summaries.iter().map(|s| s.total_throughput_mbps(dir)).sum::<f64>() / n;
        info!(
            runs = summaries.len(),
            dl_mbps = mean(Direction::Downlink),
            ul_mbps = mean(Direction::Uplink),
            "mean over runs"
        );
    }
}

/// One blocking task per run; results sorted by seed.
async fn run_all(config: ScenarioConfig, slots: u64, runs: u64, seed: u64) -> anyhow::Result<Vec<RunSummary>> {
    let mut set = JoinSet::new();
    for i in 0..runs {
        let config = config.clone();
        let run_seed = seed.wrapping_add(i);
        set.spawn_blocking(move || -> anyhow::Result<RunSummary> {
            let mut scenario = Scenario::new(&config, run_seed)?;
            Ok(scenario.run(slots)?)
        });
    }

    let mut summaries = Vec::with_capacity(runs as usize);
    while let Some(joined) = set.join_next().await {
        summaries.push(joined??);
    }
    summaries.sort_by_key(|s| s.seed);
    Ok(summaries)
}
