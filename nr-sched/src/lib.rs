/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

//! NR MAC/PHY core for a discrete-event RAN simulator.
//!
//! Module layout:
//!
//! ```text
//! lib.rs
//! ├── sim/              – event queue, error model, scenario driver
//! ├── spectrum/         – frequency grids, spectrum values, PSD builders
//! ├── interference/     – per-receiver interference accumulation, chunk processors
//! ├── channel.rs        – channel matrices, beamforming, flat-fading provider
//! ├── amc.rs            – MCS/CQI tables and transport-block sizing
//! ├── ue.rs             – per-user scheduling and link state
//! ├── link_adaptation/  – CQI/MCS state machine and block-error windows
//! ├── scheduler/        – OFDMA allocator, policies, fronthaul, grant encoding
//! └── config/           – YAML scenario configuration
//! ```

pub mod amc;
pub mod channel;
pub mod config;
pub mod interference;
pub mod link_adaptation;
pub mod scheduler;
pub mod sim;
pub mod spectrum;
pub mod ue;
