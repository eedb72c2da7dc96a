/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! Scenario driver: cells, users and the radio links between them.
//!
//! ```text
//!  Slot ──► CellSimulation::schedule_slot ──► Reception per receiver
//!                                                  │
//!  TxStart ──► add_signal at every receiver ◄──────┘
//!              start_rx at the addressed one
//!                                                  │
//!  RxEnd ──► end_rx ──► mean SINR ──► error model ─┴─► link adaptation
//! ```
//!
//! Downlink and uplink use paired carriers on the same grid: downlink signals
//! reach every UE, uplink signals every gNB.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::error_model::{effective_sinr, LogisticErrorModel, TbOutcome};
use super::{EventQueue, EventScheduler, SimTime};
use crate::amc::Amc;
use crate::channel::{
    received_psd, AntennaArray, BeamformingProvider, ChannelProvider, FlatFadingChannel, Position,
    UniformBeamforming,
};
use crate::config::{CarrierConfig, CellConfig, ScenarioConfig, UeConfig};
use crate::interference::{AveragingChunkProcessor, InterferenceAccumulator, InterfererExpiry, ReceiverId};
use crate::link_adaptation::{mask_uplink_sinr, BlerStats, DlCqiReport, LinkAdaptation};
use crate::scheduler::{active_ue_map, FronthaulCapacity, OfdmaScheduler, ResourceGrant, SchedulerError, UeMap};
use crate::spectrum::psd::{noise_power_spectral_density, tx_power_spectral_density, PowerAllocation};
use crate::spectrum::{SpectrumError, SpectrumModel, SpectrumModelCache, SpectrumValue};
use crate::ue::{CellId, Direction, LinkState, Rnti, UeContext};

/// UE device ids start here; gNB ids are their cell ids.
const UE_DEVICE_BASE: u32 = 0x1_0000;

fn ue_device_id(rnti: Rnti) -> u32 {
    UE_DEVICE_BASE + u32::from(rnti)
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("spectrum: {0}")]
    Spectrum(#[from] SpectrumError),

    #[error("scheduler: {0}")]
    Scheduler(#[from] SchedulerError),
}

#[derive(Debug)]
pub enum Event {
    Slot,
    TxStart { reception: u64 },
    RxEnd { reception: u64 },
    InterfererExpired(InterfererExpiry),
}

impl From<InterfererExpiry> for Event {
    fn from(e: InterfererExpiry) -> Self {
        Event::InterfererExpired(e)
    }
}

// ── CellSimulation ────────────────────────────────────────────────────────────

/// Byte counters of one cell and direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficCounters {
    pub offered_bytes: u64,
    pub scheduled_bytes: u64,
    pub delivered_bytes: u64,
    pub grants: u64,
}

/// A transport block on its way to the receiver.
#[derive(Debug, Clone)]
pub struct ScheduledTb {
    pub grant: ResourceGrant,
    /// Backlog bytes the block carries; returned to the backlog if it fails.
    pub payload: u32,
}

/// Per-cell state: allocator, link adaptation and the attached users.
pub struct CellSimulation {
    cell_id: CellId,
    tx_power_dbm: f64,
    power_allocation: PowerAllocation,
    scheduler: OfdmaScheduler,
    link_adaptation: LinkAdaptation,
    ues: UeMap,
    profiles: BTreeMap<Rnti, UeConfig>,
    traffic: BTreeMap<Direction, TrafficCounters>,
}

impl CellSimulation {
    /// # Errors
    /// [`SchedulerError`] if the carrier or scheduler settings are unusable.
    pub fn new(cell: &CellConfig, scenario: &ScenarioConfig, amc: &Amc, shuffle_seed: u64) -> Result<Self, SchedulerError> {
        let mut sched_config = scenario.scheduler_config();
        sched_config.shuffle_seed = shuffle_seed;
        let mut scheduler = OfdmaScheduler::new(sched_config, amc.clone())?;
        if let Some(fh) = scenario.scheduler.fronthaul {
            scheduler = scheduler.with_fronthaul(Box::new(FronthaulCapacity::new(
                fh.method,
                fh.capacity_mbps,
                scenario.carrier.slot_duration(),
                scenario.carrier.rb_per_rbg,
                amc.clone(),
            )));
        }

        let mut link_adaptation = LinkAdaptation::new(cell.cell_id, scenario.link_adaptation.clone(), amc.clone());
        let policy = scheduler.policy().clone();
        let mut ues = UeMap::new();
        let mut profiles = BTreeMap::new();
        for ue in &cell.ues {
            link_adaptation.attach(ue.rnti);
            let dl = LinkState::new(scenario.link_adaptation.start_mcs(Direction::Downlink), policy.new_metrics());
            let ul = LinkState::new(scenario.link_adaptation.start_mcs(Direction::Uplink), policy.new_metrics());
            ues.insert(ue.rnti, UeContext::new(cell.cell_id, ue.rnti, ue.beam, dl, ul));
            profiles.insert(ue.rnti, ue.clone());
        }

        Ok(Self {
            cell_id: cell.cell_id,
            tx_power_dbm: cell.tx_power_dbm,
            power_allocation: cell.power_allocation.clone(),
            scheduler,
            link_adaptation,
            ues,
            profiles,
            traffic: BTreeMap::new(),
        })
    }

    pub fn cell_id(&self) -> CellId {
        self.cell_id
    }

    pub fn ues(&self) -> &UeMap {
        &self.ues
    }

    pub fn link_adaptation(&self) -> &LinkAdaptation {
        &self.link_adaptation
    }

    pub fn traffic(&self, dir: Direction) -> TrafficCounters {
        self.traffic.get(&dir).copied().unwrap_or_default()
    }

    /// New traffic, CQI ageing and one scheduling trigger per direction.
    /// Returns the downlink and uplink blocks of the slot.
    ///
    /// # Errors
    /// [`SchedulerError`] from the allocator.
    pub fn schedule_slot(&mut self, symbols: u32) -> Result<(Vec<ScheduledTb>, Vec<ScheduledTb>), SchedulerError> {
        for ue in self.ues.values_mut() {
            if let Some(p) = self.profiles.get(&ue.rnti) {
                ue.dl.backlog = ue.dl.backlog.saturating_add(p.dl_bytes_per_slot);
                ue.ul.backlog = ue.ul.backlog.saturating_add(p.ul_bytes_per_slot);
                self.traffic.entry(Direction::Downlink).or_default().offered_bytes += u64::from(p.dl_bytes_per_slot);
                self.traffic.entry(Direction::Uplink).or_default().offered_bytes += u64::from(p.ul_bytes_per_slot);
            }
            for dir in Direction::BOTH {
                self.link_adaptation.refresh(ue, dir);
            }
        }

        self.scheduler.start_slot();
        let dl = self.schedule_direction(Direction::Downlink, symbols)?;
        let ul = self.schedule_direction(Direction::Uplink, symbols)?;
        Ok((dl, ul))
    }

    fn schedule_direction(&mut self, dir: Direction, symbols: u32) -> Result<Vec<ScheduledTb>, SchedulerError> {
        self.scheduler.on_slot_trigger(dir, &mut self.ues);
        let active = active_ue_map(&self.ues, dir);
        let grants = self.scheduler.schedule(dir, symbols, &active, &mut self.ues)?;

        let counters = self.traffic.entry(dir).or_default();
        let mut out = Vec::with_capacity(grants.len());
        for grant in grants {
            let Some(ue) = self.ues.get_mut(&grant.rnti) else {
                continue;
            };
            let link = ue.link_mut(dir);
            let payload = grant.tb_size.min(link.backlog);
            link.backlog -= payload;
            counters.grants += 1;
            counters.scheduled_bytes += u64::from(payload);
            out.push(ScheduledTb { grant, payload });
        }
        Ok(out)
    }

    /// Transmit PSD of each block, in order.
    ///
    /// Downlink blocks over the same symbols share one gNB PSD built over
    /// their joint RBs; each block keeps its own RBs of it, so a slot never
    /// radiates more than the cell's power.  Uplink blocks carry their UE's
    /// power over their own RBs.
    ///
    /// # Errors
    /// [`SpectrumError`] from the PSD builder.
    pub fn tx_psds(
        &self,
        tbs: &[ScheduledTb],
        model: &Arc<SpectrumModel>,
        rb_per_rbg: u32,
    ) -> Result<Vec<SpectrumValue>, SpectrumError> {
        let mut joint: BTreeMap<u32, BTreeSet<usize>> = BTreeMap::new();
        for tb in tbs.iter().filter(|tb| tb.grant.direction == Direction::Downlink) {
            joint
                .entry(tb.grant.sym_start)
                .or_default()
                .extend(tb.grant.active_rbs(rb_per_rbg));
        }
        let mut beam_psd: BTreeMap<u32, SpectrumValue> = BTreeMap::new();
        for (sym_start, rbs) in joint {
            let rbs: Vec<usize> = rbs.into_iter().collect();
            let psd = tx_power_spectral_density(self.tx_power_dbm, &rbs, model, &self.power_allocation)?;
            beam_psd.insert(sym_start, psd);
        }

        tbs.iter()
            .map(|tb| {
                let grant = &tb.grant;
                let rbs = grant.active_rbs(rb_per_rbg);
                match (grant.direction, beam_psd.get(&grant.sym_start)) {
                    (Direction::Downlink, Some(shared)) => {
                        let mut psd = SpectrumValue::zeros(model);
                        for rb in rbs.into_iter().filter(|&rb| rb < shared.len()) {
                            psd[rb] = shared[rb];
                        }
                        Ok(psd)
                    }
                    _ => {
                        let power_dbm = self
                            .profiles
                            .get(&grant.rnti)
                            .map(|p| p.tx_power_dbm)
                            .unwrap_or(self.tx_power_dbm);
                        tx_power_spectral_density(power_dbm, &rbs, model, &PowerAllocation::UniformUsed)
                    }
                }
            })
            .collect()
    }

    pub fn on_tb_decoded(&mut self, tb: &ScheduledTb, outcome: TbOutcome, num_rb: u32) {
        let g = &tb.grant;
        self.link_adaptation
            .record_outcome(g.rnti, g.direction, outcome.corrupted, g.mcs, outcome.tbler, num_rb);
        let counters = self.traffic.entry(g.direction).or_default();
        if outcome.corrupted {
            if let Some(ue) = self.ues.get_mut(&g.rnti) {
                let link = ue.link_mut(g.direction);
                link.backlog = link.backlog.saturating_add(tb.payload);
            }
        } else {
            counters.delivered_bytes += u64::from(tb.payload);
        }
    }

    /// Subband SINR measured by a UE over its downlink reception.
    pub fn on_dl_sinr(&mut self, rnti: Rnti, sinr: &[f64]) {
        if let Some(ue) = self.ues.get_mut(&rnti) {
            self.link_adaptation
                .dl_cqi_reported(ue, DlCqiReport::subband(sinr.to_vec()));
        }
    }

    /// SINR measured by the gNB over every uplink block received together.
    pub fn on_ul_sinr(&mut self, grant: &ResourceGrant, sinr: &[f64], rb_per_rbg: u32) {
        if let Some(ue) = self.ues.get_mut(&grant.rnti) {
            let masked = mask_uplink_sinr(sinr, &grant.rbg_bitmap, rb_per_rbg as usize);
            self.link_adaptation.ul_cqi_reported(ue, &masked);
        }
    }

    fn summary(&self) -> CellSummary {
        let direction = |dir: Direction| DirectionSummary {
            stats: self.link_adaptation.cell_stats(dir),
            traffic: self.traffic(dir),
        };
        CellSummary {
            cell_id: self.cell_id,
            dl: direction(Direction::Downlink),
            ul: direction(Direction::Uplink),
            ues: self
                .ues
                .values()
                .map(|ue| UeSummary {
                    rnti: ue.rnti,
                    dl_mcs: ue.dl.mcs,
                    ul_mcs: ue.ul.mcs,
                    dl: self
                        .link_adaptation
                        .ue_stats(ue.rnti, Direction::Downlink)
                        .copied()
                        .unwrap_or_default(),
                    ul: self
                        .link_adaptation
                        .ue_stats(ue.rnti, Direction::Uplink)
                        .copied()
                        .unwrap_or_default(),
                })
                .collect(),
        }
    }
}

// ── Summary ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirectionSummary {
    pub stats: BlerStats,
    pub traffic: TrafficCounters,
}

impl DirectionSummary {
    pub fn throughput_mbps(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.traffic.delivered_bytes as f64 * 8.0 / secs / 1e6
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UeSummary {
    pub rnti: Rnti,
    pub dl_mcs: u8,
    pub ul_mcs: u8,
    pub dl: BlerStats,
    pub ul: BlerStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CellSummary {
    pub cell_id: CellId,
    pub dl: DirectionSummary,
    pub ul: DirectionSummary,
    pub ues: Vec<UeSummary>,
}

impl CellSummary {
    pub fn direction(&self, dir: Direction) -> &DirectionSummary {
        match dir {
            Direction::Downlink => &self.dl,
            Direction::Uplink => &self.ul,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub seed: u64,
    pub slots: u64,
    pub elapsed: Duration,
    pub cells: Vec<CellSummary>,
}

impl RunSummary {
    /// Outcome counters of every cell in `dir`.
    pub fn total_stats(&self, dir: Direction) -> BlerStats {
        let mut total = BlerStats::default();
        for cell in &self.cells {
            total.merge(&cell.direction(dir).stats);
        }
        total
    }

    pub fn total_throughput_mbps(&self, dir: Direction) -> f64 {
        self.cells
            .iter()
            .map(|c| c.direction(dir).throughput_mbps(self.elapsed))
            .sum()
    }
}

// ── Scenario ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Device {
    antenna: AntennaArray,
    position: Position,
}

struct Receiver {
    device: Device,
    acc: InterferenceAccumulator,
    sinr: Rc<RefCell<Option<SpectrumValue>>>,
}

impl Receiver {
    fn new(device: Device, noise: SpectrumValue) -> Self {
        let sink = Rc::new(RefCell::new(None));
        let out = Rc::clone(&sink);
        let mut acc = InterferenceAccumulator::new(ReceiverId(device.antenna.id), noise, SimTime::ZERO);
        acc.add_sinr_processor(Box::new(AveragingChunkProcessor::new(move |sinr: &SpectrumValue| {
            *out.borrow_mut() = Some(sinr.clone());
        })));
        Self {
            device,
            acc,
            sinr: sink,
        }
    }
}

struct Block {
    tb: ScheduledTb,
    tx_psd: SpectrumValue,
    transmitter: Device,
}

/// Blocks addressed to one receiver over the same symbols.
struct Reception {
    cell_id: CellId,
    direction: Direction,
    receiver: ReceiverId,
    start: SimTime,
    duration: Duration,
    blocks: Vec<Block>,
}

/// One simulation run.  Single-threaded; owns everything it touches.
pub struct Scenario {
    carrier: CarrierConfig,
    amc: Amc,
    error_model: LogisticErrorModel,
    cache: SpectrumModelCache,
    model: Arc<SpectrumModel>,
    cells: BTreeMap<CellId, CellSimulation>,
    gnbs: BTreeMap<CellId, Device>,
    ue_devices: BTreeMap<Rnti, Device>,
    dl_receivers: BTreeMap<ReceiverId, Receiver>,
    ul_receivers: BTreeMap<ReceiverId, Receiver>,
    channel: Box<dyn ChannelProvider>,
    beamforming: Box<dyn BeamformingProvider>,
    queue: EventQueue<Event>,
    receptions: BTreeMap<u64, Reception>,
    ongoing: BTreeMap<ReceiverId, u64>,
    next_reception: u64,
    rng: StdRng,
    seed: u64,
    slots_run: u64,
}

impl Scenario {
    /// # Errors
    /// [`ScenarioError`] if the carrier grid or a cell's scheduler cannot be
    /// built.
    pub fn new(config: &ScenarioConfig, seed: u64) -> Result<Self, ScenarioError> {
        let carrier = config.carrier.clone();
        let mut cache = SpectrumModelCache::new();
        let model = cache.get(carrier.num_rbs, carrier.center_frequency_hz, carrier.subcarrier_spacing.hz())?;
        let amc = Amc::default();

        let mut channel = FlatFadingChannel::new(seed, 0, 0, model.num_bands());
        for serving in &config.cells {
            for ue in &serving.ues {
                for cell in &config.cells {
                    let gain = if cell.cell_id == serving.cell_id {
                        ue.path_gain_db
                    } else {
                        ue.path_gain_db - config.inter_cell_loss_db
                    };
                    channel.set_link_gain_db(u32::from(cell.cell_id), ue_device_id(ue.rnti), gain);
                }
            }
        }

        let mut cells = BTreeMap::new();
        let mut gnbs = BTreeMap::new();
        let mut ue_devices = BTreeMap::new();
        let mut dl_receivers = BTreeMap::new();
        let mut ul_receivers = BTreeMap::new();
        for cell in &config.cells {
            let shuffle_seed = config.scheduler.shuffle_seed ^ seed ^ u64::from(cell.cell_id);
            cells.insert(cell.cell_id, CellSimulation::new(cell, config, &amc, shuffle_seed)?);

            let gnb = Device {
                antenna: AntennaArray {
                    id: u32::from(cell.cell_id),
                    num_elements: cell.num_antennas.max(1),
                },
                position: Position::default(),
            };
            gnbs.insert(cell.cell_id, gnb);
            ul_receivers.insert(
                ReceiverId(gnb.antenna.id),
                Receiver::new(gnb, noise_power_spectral_density(cell.noise_figure_db, &model)),
            );

            for ue in &cell.ues {
                let device = Device {
                    antenna: AntennaArray {
                        id: ue_device_id(ue.rnti),
                        num_elements: ue.num_antennas.max(1),
                    },
                    position: Position::default(),
                };
                ue_devices.insert(ue.rnti, device);
                dl_receivers.insert(
                    ReceiverId(device.antenna.id),
                    Receiver::new(device, noise_power_spectral_density(ue.noise_figure_db, &model)),
                );
            }
        }

        info!(
            seed,
            cells = cells.len(),
            ues = ue_devices.len(),
            num_rbs = carrier.num_rbs,
            "scenario ready"
        );

        Ok(Self {
            carrier,
            amc,
            error_model: config.error_model,
            cache,
            model,
            cells,
            gnbs,
            ue_devices,
            dl_receivers,
            ul_receivers,
            channel: Box::new(channel),
            beamforming: Box::new(UniformBeamforming),
            queue: EventQueue::new(),
            receptions: BTreeMap::new(),
            ongoing: BTreeMap::new(),
            next_reception: 0,
            rng: StdRng::seed_from_u64(seed),
            seed,
            slots_run: 0,
        })
    }

    pub fn cell(&self, cell_id: CellId) -> Option<&CellSimulation> {
        self.cells.get(&cell_id)
    }

    /// Run `num_slots` slots and drain every reception they started.
    ///
    /// # Errors
    /// [`ScenarioError`] from scheduling or PSD construction.
    pub fn run(&mut self, num_slots: u64) -> Result<RunSummary, ScenarioError> {
        if num_slots > 0 {
            let at = self.queue.now();
            self.queue.schedule_at(at, Event::Slot);
        }
        let target = self.slots_run + num_slots;

        while let Some((now, event)) = self.queue.pop() {
            match event {
                Event::Slot => {
                    self.on_slot(now)?;
                    if self.slots_run < target {
                        self.queue.schedule_in(self.carrier.slot_duration(), Event::Slot);
                    }
                }
                Event::TxStart { reception } => self.on_tx_start(reception, now),
                Event::RxEnd { reception } => self.finish_reception(reception, now),
                Event::InterfererExpired(expiry) => self.on_interferer_expired(expiry, now),
            }
        }

        let summary = self.summary();
        info!(
            seed = self.seed,
            slots = summary.slots,
            dl_bler = summary.total_stats(Direction::Downlink).bler(),
            ul_bler = summary.total_stats(Direction::Uplink).bler(),
            dl_mbps = summary.total_throughput_mbps(Direction::Downlink),
            ul_mbps = summary.total_throughput_mbps(Direction::Uplink),
            "run finished"
        );
        Ok(summary)
    }

    fn on_slot(&mut self, now: SimTime) -> Result<(), ScenarioError> {
        let slot = self.slots_run;
        self.slots_run += 1;
        let symbols = self.carrier.symbols_per_slot;
        let sym_dur = self.carrier.symbol_duration();
        let rb_per_rbg = self.carrier.rb_per_rbg;

        let mut new_receptions = Vec::new();
        for cell in self.cells.values_mut() {
            let cell_id = cell.cell_id();
            let Some(&gnb) = self.gnbs.get(&cell_id) else {
                continue;
            };
            let (dl, ul) = cell.schedule_slot(symbols)?;

            let dl_psds = cell.tx_psds(&dl, &self.model, rb_per_rbg)?;
            for (tb, tx_psd) in dl.into_iter().zip(dl_psds) {
                let Some(&ue) = self.ue_devices.get(&tb.grant.rnti) else {
                    continue;
                };
                new_receptions.push(Reception {
                    cell_id,
                    direction: Direction::Downlink,
                    receiver: ReceiverId(ue.antenna.id),
                    start: now + sym_dur * tb.grant.sym_start,
                    duration: sym_dur * tb.grant.num_sym,
                    blocks: vec![Block {
                        tb,
                        tx_psd,
                        transmitter: gnb,
                    }],
                });
            }

            // one reception per beam: its users share the symbols
            let mut by_symbol: BTreeMap<u32, Reception> = BTreeMap::new();
            let ul_psds = cell.tx_psds(&ul, &self.model, rb_per_rbg)?;
            for (tb, tx_psd) in ul.into_iter().zip(ul_psds) {
                let Some(&ue) = self.ue_devices.get(&tb.grant.rnti) else {
                    continue;
                };
                let (sym_start, num_sym) = (tb.grant.sym_start, tb.grant.num_sym);
                by_symbol
                    .entry(sym_start)
                    .or_insert_with(|| Reception {
                        cell_id,
                        direction: Direction::Uplink,
                        receiver: ReceiverId(gnb.antenna.id),
                        start: now + sym_dur * sym_start,
                        duration: sym_dur * num_sym,
                        blocks: Vec::new(),
                    })
                    .blocks
                    .push(Block {
                        tb,
                        tx_psd,
                        transmitter: ue,
                    });
            }
            new_receptions.extend(by_symbol.into_values());
        }

        debug!(slot, %now, receptions = new_receptions.len(), "slot scheduled");
        for reception in new_receptions {
            let id = self.next_reception;
            self.next_reception += 1;
            self.queue.schedule_at(reception.start, Event::TxStart { reception: id });
            self.receptions.insert(id, reception);
        }
        Ok(())
    }

    fn on_tx_start(&mut self, id: u64, now: SimTime) {
        let Some((direction, receiver, duration)) = self
            .receptions
            .get(&id)
            .map(|r| (r.direction, r.receiver, r.duration))
        else {
            return;
        };

        // a reception ending at this instant is closed before the new one opens
        if let Some(&previous) = self.ongoing.get(&receiver) {
            if previous != id {
                self.finish_reception(previous, now);
            }
        }

        let Some(reception) = self.receptions.get(&id) else {
            return;
        };
        let receivers = match direction {
            Direction::Downlink => &mut self.dl_receivers,
            Direction::Uplink => &mut self.ul_receivers,
        };

        let mut wanted = Vec::with_capacity(reception.blocks.len());
        for block in &reception.blocks {
            let tx = block.transmitter;
            for (rid, r) in receivers.iter_mut() {
                let rx = r.device;
                let h = self
                    .channel
                    .channel_matrix(rx.position, tx.position, &rx.antenna, &tx.antenna);
                let w_rx = self
                    .beamforming
                    .beamforming_vector(&rx.antenna, rx.position, tx.position);
                let w_tx = self
                    .beamforming
                    .beamforming_vector(&tx.antenna, tx.position, rx.position);
                let psd = received_psd(&block.tx_psd, &h, &w_rx, &w_tx);
                r.acc.add_signal::<_, Event>(&psd, duration, &mut self.queue);
                if *rid == receiver {
                    wanted.push(psd);
                }
            }
        }

        if let Some(r) = receivers.get_mut(&receiver) {
            for psd in &wanted {
                r.acc.start_rx(psd, now);
            }
        }
        self.queue.schedule_in(duration, Event::RxEnd { reception: id });
        self.ongoing.insert(receiver, id);
    }

    fn finish_reception(&mut self, id: u64, now: SimTime) {
        let Some(reception) = self.receptions.remove(&id) else {
            return;
        };
        if self.ongoing.get(&reception.receiver) == Some(&id) {
            self.ongoing.remove(&reception.receiver);
        }

        let receivers = match reception.direction {
            Direction::Downlink => &mut self.dl_receivers,
            Direction::Uplink => &mut self.ul_receivers,
        };
        let Some(r) = receivers.get_mut(&reception.receiver) else {
            return;
        };
        r.acc.end_rx(now);
        let Some(sinr) = r.sinr.borrow_mut().take() else {
            warn!(receiver = reception.receiver.0, %now, "reception produced no SINR sample");
            return;
        };
        let Some(cell) = self.cells.get_mut(&reception.cell_id) else {
            return;
        };

        let rb_per_rbg = self.carrier.rb_per_rbg;
        for block in &reception.blocks {
            let grant = &block.tb.grant;
            let rbs = grant.active_rbs(rb_per_rbg);
            let eff = effective_sinr(sinr.values(), &rbs);
            let outcome = self.error_model.decode(&self.amc, grant.mcs, eff, &mut self.rng);
            cell.on_tb_decoded(&block.tb, outcome, rbs.len() as u32);
            match reception.direction {
                Direction::Downlink => cell.on_dl_sinr(grant.rnti, sinr.values()),
                Direction::Uplink => cell.on_ul_sinr(grant, sinr.values(), rb_per_rbg),
            }
        }
    }

    fn on_interferer_expired(&mut self, expiry: InterfererExpiry, now: SimTime) {
        let receiver = match self.dl_receivers.get_mut(&expiry.receiver) {
            Some(r) => r,
            None => match self.ul_receivers.get_mut(&expiry.receiver) {
                Some(r) => r,
                None => return,
            },
        };
        receiver.acc.on_interferer_expired(expiry, now);
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            seed: self.seed,
            slots: self.slots_run,
            elapsed: self.carrier.slot_duration() * self.slots_run as u32,
            cells: self.cells.values().map(CellSimulation::summary).collect(),
        }
    }
}

impl Drop for Scenario {
    fn drop(&mut self) {
        self.cache.clear();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
