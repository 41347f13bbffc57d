//! # c't-Lab Device Directory
//!
//! This module provides the [`DeviceDirectory`], which maps the logical role of a
//! module (`dcg`, `ada`, ...) to the bus index it answered at. It is filled once
//! by [`DeviceDirectory::discover`], which sends `idn?` to every index 0..=8
//! and records the first index found per known device type.
//!
//! A slot, once assigned, is never overwritten: a second scan, or a second module
//! of the same type further down the chain, leaves the recorded index alone.

use crate::constants::{CTLAB_IDN_QUERY, CTLAB_MAX_DEVICE_INDEX};
use crate::ctlab::engine::CommandEngine;
use crate::ctlab::response::{extract_device_options, extract_device_type};
use crate::ctlab::transport::Transport;
use crate::error::CtlabError;
use log::info;
use std::fmt;
use std::str::FromStr;

/// Logical role of a module on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceSlot {
    /// Analog/digital I/O board.
    Ada,
    /// DC power supply.
    Dcg,
    /// DC power supply, second generation.
    Dcg2,
    /// Electronic load.
    Edl,
    /// DDS waveform generator.
    Dds,
    /// Universal counter/controller.
    Unic,
}

impl DeviceSlot {
    pub const ALL: [DeviceSlot; 6] = [
        DeviceSlot::Ada,
        DeviceSlot::Dcg,
        DeviceSlot::Dcg2,
        DeviceSlot::Edl,
        DeviceSlot::Dds,
        DeviceSlot::Unic,
    ];

    /// Lowercase slot name as used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceSlot::Ada => "ada",
            DeviceSlot::Dcg => "dcg",
            DeviceSlot::Dcg2 => "dcg2",
            DeviceSlot::Edl => "edl",
            DeviceSlot::Dds => "dds",
            DeviceSlot::Unic => "unic",
        }
    }

    /// Device type string a module of this kind reports in its `idn?` answer.
    pub fn device_type(&self) -> &'static str {
        match self {
            DeviceSlot::Ada => "ADA",
            DeviceSlot::Dcg => "DCG",
            DeviceSlot::Dcg2 => "DCG2",
            DeviceSlot::Edl => "EDL",
            DeviceSlot::Dds => "DDS",
            DeviceSlot::Unic => "UNIC",
        }
    }

    /// Maps a reported device type to its slot. `EDL2a` maps to `edl` only
    /// when `edl2a_alias` is set.
    pub fn from_device_type(device_type: &str, edl2a_alias: bool) -> Option<DeviceSlot> {
        if edl2a_alias && device_type == "EDL2a" {
            return Some(DeviceSlot::Edl);
        }
        DeviceSlot::ALL
            .into_iter()
            .find(|slot| slot.device_type() == device_type)
    }

    fn position(self) -> usize {
        match self {
            DeviceSlot::Ada => 0,
            DeviceSlot::Dcg => 1,
            DeviceSlot::Dcg2 => 2,
            DeviceSlot::Edl => 3,
            DeviceSlot::Dds => 4,
            DeviceSlot::Unic => 5,
        }
    }
}

impl fmt::Display for DeviceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for DeviceSlot {
    type Err = CtlabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        DeviceSlot::ALL
            .into_iter()
            .find(|slot| slot.name() == lower)
            .ok_or_else(|| CtlabError::Other(format!("unknown device slot '{s}'")))
    }
}

/// One module that answered the `idn?` scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub index: u8,
    pub device_type: String,
    pub options: Option<String>,
    /// The full identification line.
    pub identification: String,
}

/// Slot to bus index assignments, first writer wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDirectory {
    slots: [Option<u8>; 6],
}

impl DeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus index recorded for `slot`, if any.
    pub fn get(&self, slot: DeviceSlot) -> Option<u8> {
        self.slots[slot.position()]
    }

    /// Like [`get`](Self::get), failing with [`CtlabError::SlotUnassigned`].
    pub fn require(&self, slot: DeviceSlot) -> Result<u8, CtlabError> {
        self.get(slot)
            .ok_or_else(|| CtlabError::SlotUnassigned(slot.name().to_string()))
    }

    /// Records `index` for `slot` unless the slot is already taken.
    ///
    /// Returns whether the slot was assigned by this call.
    pub fn assign(&mut self, slot: DeviceSlot, index: u8) -> bool {
        let entry = &mut self.slots[slot.position()];
        if entry.is_some() {
            return false;
        }
        *entry = Some(index);
        true
    }

    /// Records a module reporting `device_type` at `index`.
    pub fn record(
        &mut self,
        index: u8,
        device_type: &str,
        edl2a_alias: bool,
    ) -> Option<DeviceSlot> {
        let slot = DeviceSlot::from_device_type(device_type, edl2a_alias)?;
        self.assign(slot, index).then_some(slot)
    }

    /// All assigned slots with their indices.
    pub fn assigned(&self) -> Vec<(DeviceSlot, u8)> {
        DeviceSlot::ALL
            .into_iter()
            .filter_map(|slot| self.get(slot).map(|index| (slot, index)))
            .collect()
    }

    /// Scans bus indices 0..=8 with `idn?` and records every known module.
    ///
    /// Indices without a module (the request comes back as a pure echo) are
    /// skipped. With `verbose` set, a scan report is logged at info level.
    pub async fn discover<T: Transport>(
        &mut self,
        engine: &mut CommandEngine<T>,
        verbose: bool,
    ) -> Result<Vec<ScanRecord>, CtlabError> {
        let edl2a_alias = engine.config().policy.edl2a_alias;
        let mut records = Vec::new();

        if verbose {
            info!("Scan for devices:");
        }
        for index in 0..=CTLAB_MAX_DEVICE_INDEX {
            let Some(answer) = engine.send_command_result(index, CTLAB_IDN_QUERY).await? else {
                continue;
            };

            let record = ScanRecord {
                index,
                device_type: extract_device_type(&answer),
                options: extract_device_options(&answer),
                identification: String::from_utf8_lossy(&answer).into_owned(),
            };
            if verbose {
                info!("Index {}: Device: {:>3}", record.index, record.device_type);
                if let Some(options) = &record.options {
                    info!("    Options: {options}");
                }
            }

            self.record(index, &record.device_type, edl2a_alias);
            records.push(record);
        }

        Ok(records)
    }
}
