/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scenario configuration loading and management.
//!
//! The expected YAML structure is:
//! ```yaml
//! carrier:
//!   center_frequency_hz: 3.5e9
//!   num_rbs: 52
//!   subcarrier_spacing_hz: 30000
//!   rb_per_rbg: 4
//!   symbols_per_slot: 14
//! scheduler:
//!   policy: { type: proportional_fair, alpha: 1.0, time_window: 99 }
//!   dl_notch_mask: [true, true, false, ...]   # one entry per RBG
//!   fronthaul: { method: postponing, capacity_mbps: 2000 }
//!   shuffle_seed: 1
//! link_adaptation:
//!   target_bler: 0.1
//!   cqi_validity_slots: 1000
//! cells:
//!   - cell_id: 1
//!     tx_power_dbm: 35
//!     ues:
//!       - { rnti: 1, beam: 0, path_gain_db: -105, dl_bytes_per_slot: 4000 }
//! ```
//!
//! Every section and almost every field is optional; missing values fall
//! back to the defaults below.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::amc::MAX_MCS;
use crate::link_adaptation::LinkAdaptationConfig;
use crate::scheduler::{FhControlMethod, SchedulerConfig, SchedulingPolicy};
use crate::sim::error_model::LogisticErrorModel;
use crate::spectrum::psd::PowerAllocation;
use crate::spectrum::SubcarrierSpacing;
use crate::ue::{BeamId, CellId, Rnti};

// ── Private YAML deserialization types ────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    #[serde(default)]
    carrier: CarrierEntry,
    #[serde(default)]
    scheduler: SchedulerEntry,
    #[serde(default)]
    link_adaptation: LinkAdaptationEntry,
    #[serde(default)]
    error_model: ErrorModelEntry,
    #[serde(default = "default_inter_cell_loss_db")]
    inter_cell_loss_db: f64,
    #[serde(default)]
    cells: Vec<CellEntry>,
}

#[derive(Debug, Deserialize)]
struct CarrierEntry {
    #[serde(default = "default_center_frequency_hz")]
    center_frequency_hz: f64,
    #[serde(default = "default_num_rbs")]
    num_rbs: u32,
    #[serde(default = "default_subcarrier_spacing_hz")]
    subcarrier_spacing_hz: f64,
    #[serde(default = "default_rb_per_rbg")]
    rb_per_rbg: u32,
    #[serde(default = "default_symbols_per_slot")]
    symbols_per_slot: u32,
}

impl Default for CarrierEntry {
    fn default() -> Self {
        Self {
            center_frequency_hz: default_center_frequency_hz(),
            num_rbs: default_num_rbs(),
            subcarrier_spacing_hz: default_subcarrier_spacing_hz(),
            rb_per_rbg: default_rb_per_rbg(),
            symbols_per_slot: default_symbols_per_slot(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PolicyEntry {
    RoundRobin,
    ProportionalFair {
        #[serde(default = "default_alpha")]
        alpha: f64,
        #[serde(default = "default_time_window")]
        time_window: f64,
    },
    DelayPriority {
        #[serde(default = "default_alpha")]
        alpha: f64,
        #[serde(default = "default_time_window")]
        time_window: f64,
        #[serde(default = "default_beta")]
        beta: f64,
    },
}

impl Default for PolicyEntry {
    fn default() -> Self {
        PolicyEntry::ProportionalFair {
            alpha: default_alpha(),
            time_window: default_time_window(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FronthaulEntry {
    #[serde(default)]
    method: FhControlMethod,
    capacity_mbps: f64,
}

#[derive(Debug, Default, Deserialize)]
struct SchedulerEntry {
    #[serde(default)]
    policy: PolicyEntry,
    dl_notch_mask: Option<Vec<bool>>,
    ul_notch_mask: Option<Vec<bool>>,
    fronthaul: Option<FronthaulEntry>,
    #[serde(default)]
    shuffle_seed: u64,
}

/// Partial link-adaptation overrides.
#[derive(Debug, Default, Deserialize)]
struct LinkAdaptationEntry {
    target_bler: Option<f64>,
    low_bler_threshold: Option<f64>,
    step_scale: Option<f64>,
    max_step: Option<i32>,
    window_capacity: Option<usize>,
    cqi_validity_slots: Option<u32>,
    start_mcs_dl: Option<u8>,
    start_mcs_ul: Option<u8>,
    max_mcs_dl: Option<u8>,
    max_mcs_ul: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorModelEntry {
    slope_per_db: Option<f64>,
    bler_at_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CellEntry {
    cell_id: CellId,
    #[serde(default = "default_gnb_tx_power_dbm")]
    tx_power_dbm: f64,
    #[serde(default)]
    power_allocation: PowerAllocation,
    #[serde(default = "default_gnb_noise_figure_db")]
    noise_figure_db: f64,
    #[serde(default = "default_gnb_antennas")]
    num_antennas: usize,
    #[serde(default)]
    ues: Vec<UeEntry>,
}

#[derive(Debug, Deserialize)]
struct UeEntry {
    rnti: Rnti,
    #[serde(default)]
    beam: u16,
    #[serde(default = "default_path_gain_db")]
    path_gain_db: f64,
    #[serde(default)]
    dl_bytes_per_slot: u32,
    #[serde(default)]
    ul_bytes_per_slot: u32,
    #[serde(default = "default_ue_tx_power_dbm")]
    tx_power_dbm: f64,
    #[serde(default = "default_ue_noise_figure_db")]
    noise_figure_db: f64,
    #[serde(default = "default_ue_antennas")]
    num_antennas: usize,
}

fn default_center_frequency_hz() -> f64 {
    3.5e9
}
fn default_num_rbs() -> u32 {
    52
}
fn default_subcarrier_spacing_hz() -> f64 {
    30_000.0
}
fn default_rb_per_rbg() -> u32 {
    4
}
fn default_symbols_per_slot() -> u32 {
    14
}
fn default_alpha() -> f64 {
    1.0
}
fn default_time_window() -> f64 {
    99.0
}
fn default_beta() -> f64 {
    0.1
}
fn default_inter_cell_loss_db() -> f64 {
    15.0
}
fn default_gnb_tx_power_dbm() -> f64 {
    35.0
}
fn default_gnb_noise_figure_db() -> f64 {
    5.0
}
fn default_gnb_antennas() -> usize {
    4
}
fn default_path_gain_db() -> f64 {
    -110.0
}
fn default_ue_tx_power_dbm() -> f64 {
    23.0
}
fn default_ue_noise_figure_db() -> f64 {
    9.0
}
fn default_ue_antennas() -> usize {
    1
}

// ── Public data structures ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct CarrierConfig {
    pub center_frequency_hz: f64,
    pub num_rbs: u32,
    pub subcarrier_spacing: SubcarrierSpacing,
    pub rb_per_rbg: u32,
    pub symbols_per_slot: u32,
}

impl CarrierConfig {
    pub fn slot_duration(&self) -> Duration {
        self.subcarrier_spacing.slot_duration()
    }

    /// Duration of one OFDM symbol of the slot.
    pub fn symbol_duration(&self) -> Duration {
        self.slot_duration() / self.symbols_per_slot.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FronthaulConfig {
    pub method: FhControlMethod,
    pub capacity_mbps: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    pub policy: SchedulingPolicy,
    pub dl_notch_mask: Option<Vec<bool>>,
    pub ul_notch_mask: Option<Vec<bool>>,
    pub fronthaul: Option<FronthaulConfig>,
    pub shuffle_seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UeConfig {
    pub rnti: Rnti,
    pub beam: BeamId,
    /// Power gain to the serving cell.
    pub path_gain_db: f64,
    pub dl_bytes_per_slot: u32,
    pub ul_bytes_per_slot: u32,
    pub tx_power_dbm: f64,
    pub noise_figure_db: f64,
    pub num_antennas: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellConfig {
    pub cell_id: CellId,
    pub tx_power_dbm: f64,
    pub power_allocation: PowerAllocation,
    pub noise_figure_db: f64,
    pub num_antennas: usize,
    pub ues: Vec<UeConfig>,
}

impl CellConfig {
    /// Returns the fallback cell used when the file lists none: two users on
    /// separate beams with downlink-heavy traffic.
    pub fn default_config(cell_id: CellId) -> Self {
        let ue = |rnti: Rnti, beam: u16, path_gain_db: f64| UeConfig {
            rnti,
            beam: BeamId(beam),
            path_gain_db,
            dl_bytes_per_slot: 4_000,
            ul_bytes_per_slot: 500,
            tx_power_dbm: default_ue_tx_power_dbm(),
            noise_figure_db: default_ue_noise_figure_db(),
            num_antennas: default_ue_antennas(),
        };
        Self {
            cell_id,
            tx_power_dbm: default_gnb_tx_power_dbm(),
            power_allocation: PowerAllocation::default(),
            noise_figure_db: default_gnb_noise_figure_db(),
            num_antennas: default_gnb_antennas(),
            ues: vec![ue(1, 0, -100.0), ue(2, 1, -110.0)],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub carrier: CarrierConfig,
    pub scheduler: SchedulerSettings,
    pub link_adaptation: LinkAdaptationConfig,
    pub error_model: LogisticErrorModel,
    /// Extra loss between a device and every cell that does not serve it.
    pub inter_cell_loss_db: f64,
    pub cells: Vec<CellConfig>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            carrier: CarrierConfig {
                center_frequency_hz: default_center_frequency_hz(),
                num_rbs: default_num_rbs(),
                subcarrier_spacing: SubcarrierSpacing::Khz30,
                rb_per_rbg: default_rb_per_rbg(),
                symbols_per_slot: default_symbols_per_slot(),
            },
            scheduler: SchedulerSettings {
                policy: SchedulingPolicy::default(),
                dl_notch_mask: None,
                ul_notch_mask: None,
                fronthaul: None,
                shuffle_seed: 0,
            },
            link_adaptation: LinkAdaptationConfig::default(),
            error_model: LogisticErrorModel::default(),
            inter_cell_loss_db: default_inter_cell_loss_db(),
            cells: vec![CellConfig::default_config(1)],
        }
    }
}

impl ScenarioConfig {
    /// Allocator settings for this carrier.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            policy: self.scheduler.policy.clone(),
            num_rbs: self.carrier.num_rbs,
            rb_per_rbg: self.carrier.rb_per_rbg,
            symbols_per_slot: self.carrier.symbols_per_slot,
            dl_notch_mask: self.scheduler.dl_notch_mask.clone(),
            ul_notch_mask: self.scheduler.ul_notch_mask.clone(),
            shuffle_seed: self.scheduler.shuffle_seed,
        }
    }

    pub fn num_ues(&self) -> usize {
        self.cells.iter().map(|c| c.ues.len()).sum()
    }
}

// ── ScenarioConfigManager ─────────────────────────────────────────────────────

/// Loads and holds one scenario from a YAML file.
#[derive(Debug, Default)]
pub struct ScenarioConfigManager {
    config: ScenarioConfig,
    loaded: bool,
}

impl ScenarioConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `path` and replaces the held scenario.
    ///
    /// * An empty `cells` list yields a single default cell.
    /// * On error the previously held scenario is reset to the defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the YAML is invalid, or
    /// the scenario is inconsistent (unsupported subcarrier spacing,
    /// duplicate cell ids or RNTIs, out-of-range MCS bounds).
    pub fn load_from_file(&mut self, path: &Path) -> Result<()> {
        info!("Loading scenario configuration from: {}", path.display());

        self.config = ScenarioConfig::default();
        self.loaded = false;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot open configuration file: {}", path.display()))?;

        let file: ScenarioFile = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML file: {}", path.display()))?;

        let config = Self::build(file).with_context(|| format!("Invalid scenario in {}", path.display()))?;

        info!(
            cells = config.cells.len(),
            ues = config.num_ues(),
            num_rbs = config.carrier.num_rbs,
            policy = config.scheduler.policy.name(),
            "Successfully loaded scenario"
        );
        for cell in &config.cells {
            debug!(
                cell_id = cell.cell_id,
                tx_power_dbm = cell.tx_power_dbm,
                ues = cell.ues.len(),
                "  cell"
            );
        }

        self.config = config;
        self.loaded = true;
        Ok(())
    }

    fn build(file: ScenarioFile) -> Result<ScenarioConfig> {
        let subcarrier_spacing = SubcarrierSpacing::from_hz(file.carrier.subcarrier_spacing_hz)
            .context("carrier.subcarrier_spacing_hz")?;
        let carrier = CarrierConfig {
            center_frequency_hz: file.carrier.center_frequency_hz,
            num_rbs: file.carrier.num_rbs,
            subcarrier_spacing,
            rb_per_rbg: file.carrier.rb_per_rbg,
            symbols_per_slot: file.carrier.symbols_per_slot,
        };

        let policy = match file.scheduler.policy {
            PolicyEntry::RoundRobin => SchedulingPolicy::RoundRobin,
            PolicyEntry::ProportionalFair { alpha, time_window } => {
                SchedulingPolicy::ProportionalFair { alpha, time_window }
            }
            PolicyEntry::DelayPriority {
                alpha,
                time_window,
                beta,
            } => SchedulingPolicy::DelayPriority {
                alpha,
                time_window,
                beta,
            },
        };
        let scheduler = SchedulerSettings {
            policy,
            dl_notch_mask: file.scheduler.dl_notch_mask,
            ul_notch_mask: file.scheduler.ul_notch_mask,
            fronthaul: file.scheduler.fronthaul.map(|f| FronthaulConfig {
                method: f.method,
                capacity_mbps: f.capacity_mbps,
            }),
            shuffle_seed: file.scheduler.shuffle_seed,
        };

        let la = file.link_adaptation;
        let d = LinkAdaptationConfig::default();
        let link_adaptation = LinkAdaptationConfig {
            target_bler: la.target_bler.unwrap_or(d.target_bler),
            low_bler_threshold: la.low_bler_threshold.unwrap_or(d.low_bler_threshold),
            step_scale: la.step_scale.unwrap_or(d.step_scale),
            max_step: la.max_step.unwrap_or(d.max_step),
            window_capacity: la.window_capacity.unwrap_or(d.window_capacity),
            cqi_validity_slots: la.cqi_validity_slots.unwrap_or(d.cqi_validity_slots),
            start_mcs_dl: la.start_mcs_dl.unwrap_or(d.start_mcs_dl),
            start_mcs_ul: la.start_mcs_ul.unwrap_or(d.start_mcs_ul),
            max_mcs_dl: la.max_mcs_dl.unwrap_or(d.max_mcs_dl),
            max_mcs_ul: la.max_mcs_ul.unwrap_or(d.max_mcs_ul),
        };
        for (name, mcs) in [
            ("start_mcs_dl", link_adaptation.start_mcs_dl),
            ("start_mcs_ul", link_adaptation.start_mcs_ul),
            ("max_mcs_dl", link_adaptation.max_mcs_dl),
            ("max_mcs_ul", link_adaptation.max_mcs_ul),
        ] {
            if mcs > MAX_MCS {
                bail!("link_adaptation.{name} = {mcs} exceeds the highest MCS {MAX_MCS}");
            }
        }
        if link_adaptation.window_capacity == 0 {
            bail!("link_adaptation.window_capacity must be positive");
        }

        let em = LogisticErrorModel::default();
        let error_model = LogisticErrorModel {
            slope_per_db: file.error_model.slope_per_db.unwrap_or(em.slope_per_db),
            bler_at_threshold: file.error_model.bler_at_threshold.unwrap_or(em.bler_at_threshold),
        };

        let mut cells = Vec::with_capacity(file.cells.len());
        let mut cell_ids = BTreeSet::new();
        let mut rntis = BTreeSet::new();
        for entry in file.cells {
            if !cell_ids.insert(entry.cell_id) {
                bail!("cell {} is listed twice", entry.cell_id);
            }
            let mut ues = Vec::with_capacity(entry.ues.len());
            for ue in entry.ues {
                if !rntis.insert(ue.rnti) {
                    bail!("RNTI {} is used more than once", ue.rnti);
                }
                ues.push(UeConfig {
                    rnti: ue.rnti,
                    beam: BeamId(ue.beam),
                    path_gain_db: ue.path_gain_db,
                    dl_bytes_per_slot: ue.dl_bytes_per_slot,
                    ul_bytes_per_slot: ue.ul_bytes_per_slot,
                    tx_power_dbm: ue.tx_power_dbm,
                    noise_figure_db: ue.noise_figure_db,
                    num_antennas: ue.num_antennas,
                });
            }
            cells.push(CellConfig {
                cell_id: entry.cell_id,
                tx_power_dbm: entry.tx_power_dbm,
                power_allocation: entry.power_allocation,
                noise_figure_db: entry.noise_figure_db,
                num_antennas: entry.num_antennas,
                ues,
            });
        }

        if cells.is_empty() {
            warn!("No cells found in configuration file, using default cell");
            cells.push(CellConfig::default_config(1));
        }

        Ok(ScenarioConfig {
            carrier,
            scheduler,
            link_adaptation,
            error_model,
            inter_cell_loss_db: file.inter_cell_loss_db,
            cells,
        })
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn get_cell_config(&self, cell_id: CellId) -> Option<&CellConfig> {
        self.config.cells.iter().find(|c| c.cell_id == cell_id)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn into_config(self) -> ScenarioConfig {
        self.config
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    fn load(yaml: &str) -> Result<ScenarioConfigManager> {
        let f = yaml_tempfile(yaml);
        let mut mgr = ScenarioConfigManager::new();
        mgr.load_from_file(f.path())?;
        Ok(mgr)
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn default_cell_has_two_users_on_separate_beams() {
        let cell = CellConfig::default_config(7);
        assert_eq!(cell.cell_id, 7);
        assert_eq!(cell.ues.len(), 2);
        assert_ne!(cell.ues[0].beam, cell.ues[1].beam);
    }

    #[test]
    fn empty_file_yields_default_scenario() {
        let mgr = load("{}\n").unwrap();
        assert!(mgr.is_loaded());
        assert_eq!(mgr.config(), &ScenarioConfig::default());
        assert!(mgr.get_cell_config(1).is_some());
    }

    #[test]
    fn symbol_duration_divides_the_slot() {
        let c = ScenarioConfig::default();
        assert_eq!(c.carrier.slot_duration(), Duration::from_micros(500));
        assert_eq!(c.carrier.symbol_duration(), Duration::from_nanos(35_714));
    }

    // ── load_from_file ────────────────────────────────────────────────────────

    #[test]
    fn load_full_scenario() {
        let yaml = r#"
carrier:
  center_frequency_hz: 28.0e9
  num_rbs: 66
  subcarrier_spacing_hz: 120000
  rb_per_rbg: 6
scheduler:
  policy: { type: delay_priority, beta: 0.5 }
  dl_notch_mask: [true, true, true, false, true, true, true, true, true, true, true]
  fronthaul: { method: optimize_mcs, capacity_mbps: 1500 }
  shuffle_seed: 42
link_adaptation:
  target_bler: 0.05
  max_mcs_ul: 20
cells:
  - cell_id: 1
    tx_power_dbm: 30
    power_allocation: { type: uniform_bandwidth }
    ues:
      - { rnti: 10, beam: 2, path_gain_db: -90, dl_bytes_per_slot: 1000 }
      - { rnti: 11, ul_bytes_per_slot: 200 }
  - cell_id: 2
    ues:
      - { rnti: 20 }
"#;
        let mgr = load(yaml).unwrap();
        let c = mgr.config();

        assert_eq!(c.carrier.subcarrier_spacing, SubcarrierSpacing::Khz120);
        assert_eq!(c.carrier.num_rbs, 66);
        assert_eq!(c.carrier.symbols_per_slot, 14);
        assert_eq!(
            c.scheduler.policy,
            SchedulingPolicy::DelayPriority {
                alpha: 1.0,
                time_window: 99.0,
                beta: 0.5
            }
        );
        assert_eq!(c.scheduler.dl_notch_mask.as_ref().map(Vec::len), Some(11));
        assert_eq!(c.scheduler.ul_notch_mask, None);
        assert_eq!(
            c.scheduler.fronthaul,
            Some(FronthaulConfig {
                method: FhControlMethod::OptimizeMcs,
                capacity_mbps: 1500.0
            })
        );
        assert_eq!(c.link_adaptation.target_bler, 0.05);
        assert_eq!(c.link_adaptation.low_bler_threshold, 0.02);
        assert_eq!(c.link_adaptation.max_mcs_ul, 20);

        let cell1 = mgr.get_cell_config(1).unwrap();
        assert_eq!(cell1.power_allocation, PowerAllocation::UniformBandwidth);
        assert_eq!(cell1.ues[0].beam, BeamId(2));
        assert_eq!(cell1.ues[1].path_gain_db, -110.0);
        assert_eq!(cell1.ues[1].ul_bytes_per_slot, 200);
        assert_eq!(mgr.get_cell_config(2).unwrap().tx_power_dbm, 35.0);
        assert_eq!(c.num_ues(), 3);

        let sc = c.scheduler_config();
        assert_eq!(sc.rb_per_rbg, 6);
        assert_eq!(sc.shuffle_seed, 42);
    }

    #[test]
    fn policy_without_parameters_uses_defaults() {
        let mgr = load("scheduler:\n  policy: { type: proportional_fair }\n").unwrap();
        assert_eq!(mgr.config().scheduler.policy, SchedulingPolicy::default());
        let mgr = load("scheduler:\n  policy: { type: round_robin }\n").unwrap();
        assert_eq!(mgr.config().scheduler.policy, SchedulingPolicy::RoundRobin);
    }

    #[test]
    fn missing_file_returns_error() {
        let mut mgr = ScenarioConfigManager::new();
        let result = mgr.load_from_file(Path::new("/nonexistent/path/scenario.yaml"));
        assert!(result.is_err());
        assert!(!mgr.is_loaded());
    }

    #[test]
    fn malformed_yaml_returns_error() {
        assert!(load("this is: not: valid: yaml: content:::").is_err());
        assert!(load("carrier: { num_rbs: many }\n").is_err());
        assert!(load("unknown_section: 1\n").is_err());
    }

    #[test]
    fn inconsistent_scenarios_are_rejected() {
        assert!(load("carrier: { subcarrier_spacing_hz: 20000 }\n").is_err());
        assert!(load("cells: [ { cell_id: 1 }, { cell_id: 1 } ]\n").is_err());
        assert!(load("cells: [ { cell_id: 1, ues: [ { rnti: 3 } ] }, { cell_id: 2, ues: [ { rnti: 3 } ] } ]\n").is_err());
        assert!(load("link_adaptation: { max_mcs_dl: 29 }\n").is_err());
        assert!(load("link_adaptation: { window_capacity: 0 }\n").is_err());
    }

    #[test]
    fn reload_replaces_previous_scenario() {
        let f1 = yaml_tempfile("cells: [ { cell_id: 5 } ]\n");
        let f2 = yaml_tempfile("cells: [ { cell_id: 6 } ]\n");
        let mut mgr = ScenarioConfigManager::new();
        mgr.load_from_file(f1.path()).unwrap();
        assert!(mgr.get_cell_config(5).is_some());
        mgr.load_from_file(f2.path()).unwrap();
        assert!(mgr.get_cell_config(5).is_none(), "old cell must be gone");
        assert!(mgr.get_cell_config(6).is_some());
    }
}
