//! # Calibration Dump and Restore
//!
//! A DCG2 power supply keeps its DAC/ADC offsets and scale factors in numbered
//! registers (`100?` reads register 100, `100=5!` writes it after a `wen=1!`
//! write enable). This module copies those registers into a
//! [`CalibrationSnapshot`] and back, and stores snapshots as JSON:
//!
//! ```json
//! {
//!   "META": [ { "index": 254, "value": "DCG2 ..." }, { "index": 233, "value": 31.5 } ],
//!   "Offset_Voltages_DAC_low": [ { "index": 100, "value": 12 } ],
//!   ...
//! }
//! ```
//!
//! Sections keep their insertion order, so a dump reads in register-table order.

use crate::ctlab::response::value_after_equals;
use crate::ctlab::transport::Transport;
use crate::device_directory::DeviceSlot;
use crate::error::CtlabError;
use crate::lab::Ctlab;
use crate::logging::log_debug;
use log::info;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Section holding identification and temperature; never uploaded.
pub const META_SECTION: &str = "META";
/// Register with the module's identification string.
pub const IDN_REGISTER: u16 = 254;
/// Register with the module's heat sink temperature.
pub const TEMPERATURE_REGISTER: u16 = 233;
/// Unlocks the calibration registers for writing.
pub const WRITE_ENABLE_COMMAND: &str = "wen=1!";

/// How a register's answer is converted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterKind {
    Int,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRegister {
    pub index: u16,
    pub name: &'static str,
    pub kind: RegisterKind,
}

const fn reg(index: u16, name: &'static str, kind: RegisterKind) -> CalibrationRegister {
    CalibrationRegister { index, name, kind }
}

/// Calibration registers of the DCG2, in dump order.
pub const DCG2_CALIBRATION_REGISTERS: &[CalibrationRegister] = &[
    reg(100, "Offset_Voltages_DAC_low", RegisterKind::Int),
    reg(101, "Offset_Voltages_DAC_high", RegisterKind::Int),
    reg(102, "Offset_Current_DAC_2mA", RegisterKind::Int),
    reg(103, "Offset_Current_DAC_20mA", RegisterKind::Int),
    reg(104, "Offset_Current_DAC_200mA", RegisterKind::Int),
    reg(105, "Offset_Current_DAC_2A", RegisterKind::Int),
    reg(110, "Offset_Voltages_ADC_low", RegisterKind::Int),
    reg(111, "Offset_Voltages_ADC_high", RegisterKind::Int),
    reg(112, "Offset_Current_ADC_2mA", RegisterKind::Int),
    reg(113, "Offset_Current_ADC_20mA", RegisterKind::Int),
    reg(114, "Offset_Current_ADC_200mA", RegisterKind::Int),
    reg(115, "Offset_Current_ADC_2A", RegisterKind::Int),
    reg(200, "Scale_Voltages_DAC_low", RegisterKind::Float),
    reg(201, "Scale_Voltages_DAC_high", RegisterKind::Float),
    reg(202, "Scale_Current_DAC_2mA", RegisterKind::Float),
    reg(203, "Scale_Current_DAC_20mA", RegisterKind::Float),
    reg(204, "Scale_Current_DAC_200mA", RegisterKind::Float),
    reg(205, "Scale_Current_DAC_2A", RegisterKind::Float),
    reg(210, "Scale_Voltages_ADC_low", RegisterKind::Float),
    reg(211, "Scale_Voltages_ADC_high", RegisterKind::Float),
    reg(212, "Scale_Current_ADC_2mA", RegisterKind::Float),
    reg(213, "Scale_Current_ADC_20mA", RegisterKind::Float),
    reg(214, "Scale_Current_ADC_200mA", RegisterKind::Float),
    reg(215, "Scale_Current_ADC_2A", RegisterKind::Float),
    reg(150, "Default_Output_Voltage", RegisterKind::Float),
    reg(151, "Default_Output_Current", RegisterKind::Float),
    reg(156, "U_max_DCG", RegisterKind::Float),
    reg(171, "Fan-Switching-Temperature", RegisterKind::Float),
];

/// A stored register value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegisterValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterValue::Int(v) => write!(f, "{v}"),
            // Plain decimal notation; whole numbers keep one fractional digit ("1.0").
            RegisterValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            RegisterValue::Float(v) => write!(f, "{v}"),
            RegisterValue::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterEntry {
    pub index: u16,
    pub value: RegisterValue,
}

/// Ordered collection of named register sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationSnapshot {
    sections: Vec<(String, Vec<RegisterEntry>)>,
}

impl CalibrationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry` to section `name`, creating the section if needed.
    pub fn push(&mut self, name: &str, entry: RegisterEntry) {
        match self.sections.iter_mut().find(|(n, _)| n == name) {
            Some((_, entries)) => entries.push(entry),
            None => self.sections.push((name.to_string(), vec![entry])),
        }
    }

    pub fn section(&self, name: &str) -> Option<&[RegisterEntry]> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entries)| entries.as_slice())
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &[RegisterEntry])> {
        self.sections
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn to_json(&self) -> Result<String, CtlabError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CtlabError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), CtlabError> {
        std::fs::write(path, self.to_json()?)
            .map_err(|e| CtlabError::Calibration(format!("{}: {e}", path.display())))
    }

    pub fn load(path: &Path) -> Result<Self, CtlabError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CtlabError::Calibration(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }
}

impl Serialize for CalibrationSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (name, entries) in &self.sections {
            map.serialize_entry(name, entries)?;
        }
        map.end()
    }
}

struct SnapshotVisitor;

impl<'de> Visitor<'de> for SnapshotVisitor {
    type Value = CalibrationSnapshot;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of register sections")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut snapshot = CalibrationSnapshot::new();
        while let Some((name, entries)) = access.next_entry::<String, Vec<RegisterEntry>>()? {
            for entry in entries {
                snapshot.push(&name, entry);
            }
        }
        Ok(snapshot)
    }
}

impl<'de> Deserialize<'de> for CalibrationSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SnapshotVisitor)
    }
}

fn parse_number(answer: &str) -> Result<f64, CtlabError> {
    let text = value_after_equals(answer).trim();
    text.parse::<f64>().map_err(|e| CtlabError::MalformedValue {
        response: answer.to_string(),
        reason: format!("'{text}' is not a number: {e}"),
    })
}

/// Converts a register answer line according to `kind`.
pub fn convert_answer(answer: &str, kind: RegisterKind) -> Result<RegisterValue, CtlabError> {
    let number = parse_number(answer)?;
    Ok(match kind {
        RegisterKind::Int => RegisterValue::Int(number.trunc() as i64),
        RegisterKind::Float => RegisterValue::Float(number),
    })
}

async fn pause_for(pause: Duration) {
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
}

/// Reads identification, temperature, and every register of `registers` from
/// the module at `slot`, pausing `pause` after each register.
pub async fn download<T: Transport>(
    lab: &mut Ctlab<T>,
    slot: DeviceSlot,
    registers: &[CalibrationRegister],
    pause: Duration,
) -> Result<CalibrationSnapshot, CtlabError> {
    let device = lab.index_of(slot)?;
    let mut snapshot = CalibrationSnapshot::new();

    let idn = lab.send_command_result_as_text(device, "idn?").await?;
    let idn = value_after_equals(&idn).to_string();
    info!("{IDN_REGISTER:5} --> {idn}");
    snapshot.push(
        META_SECTION,
        RegisterEntry {
            index: IDN_REGISTER,
            value: RegisterValue::Text(idn),
        },
    );

    let answer = lab
        .send_command_result_as_text(device, &format!("{TEMPERATURE_REGISTER}?"))
        .await?;
    let temperature = convert_answer(&answer, RegisterKind::Float)?;
    info!("{TEMPERATURE_REGISTER:5} --> {temperature}");
    snapshot.push(
        META_SECTION,
        RegisterEntry {
            index: TEMPERATURE_REGISTER,
            value: temperature,
        },
    );

    for register in registers {
        let answer = lab
            .send_command_result_as_text(device, &format!("{}?", register.index))
            .await?;
        let value = convert_answer(&answer, register.kind)?;
        info!("{:5} --> {value}", register.index);
        snapshot.push(
            register.name,
            RegisterEntry {
                index: register.index,
                value,
            },
        );
        pause_for(pause).await;
    }

    Ok(snapshot)
}

/// Writes every non-META register of `snapshot` to the module at `slot`.
///
/// Each write is preceded by a write enable. Returns the number of registers
/// written.
pub async fn upload<T: Transport>(
    lab: &mut Ctlab<T>,
    slot: DeviceSlot,
    snapshot: &CalibrationSnapshot,
    pause: Duration,
) -> Result<usize, CtlabError> {
    let device = lab.index_of(slot)?;
    let mut written = 0;

    for (name, entries) in snapshot.sections() {
        if name == META_SECTION {
            continue;
        }
        for entry in entries {
            let enable = lab
                .send_command_result_as_text(device, WRITE_ENABLE_COMMAND)
                .await?;
            log_debug(&format!("write enable: {enable}"));

            let command = format!("{}={}!", entry.index, entry.value);
            info!("{command}");
            pause_for(pause).await;
            lab.send_command_result_as_text(device, &command).await?;
            pause_for(pause).await;
            written += 1;
        }
    }

    Ok(written)
}
