//! # c't-Lab Facade
//!
//! [`Ctlab`] bundles one [`CommandEngine`] with the [`DeviceDirectory`] it filled,
//! so callers can address modules by role instead of bus index:
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), ctlab_rs::CtlabError> {
//! use ctlab_rs::Ctlab;
//!
//! let mut lab = Ctlab::open("/dev/ttyUSB0")?;
//! lab.discover(true).await?;
//! lab.dcg_set_voltage(5.0).await?;
//! let volts = lab.dcg_measure_voltage().await?;
//! # let _ = volts;
//! # Ok(())
//! # }
//! ```
//!
//! The typed accessors only format command strings; the modules interpret them.

use crate::ctlab::engine::CommandEngine;
use crate::ctlab::policy::EngineConfig;
use crate::ctlab::transport::{SerialConfig, SerialTransport, Transport};
use crate::device_directory::{DeviceDirectory, DeviceSlot, ScanRecord};
use crate::error::CtlabError;

/// A connection to a chain of c't-Lab modules.
pub struct Ctlab<T: Transport> {
    engine: CommandEngine<T>,
    directory: DeviceDirectory,
}

impl Ctlab<SerialTransport> {
    /// Opens `port_name` with default serial settings and the default policy.
    pub fn open(port_name: &str) -> Result<Self, CtlabError> {
        Self::open_with_config(port_name, SerialConfig::default(), EngineConfig::default())
    }

    pub fn open_with_config(
        port_name: &str,
        serial: SerialConfig,
        engine: EngineConfig,
    ) -> Result<Self, CtlabError> {
        let transport = SerialTransport::open_with_config(port_name, serial)?;
        Ok(Self::with_config(transport, engine))
    }
}

impl<T: Transport> Ctlab<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, EngineConfig::default())
    }

    pub fn with_config(transport: T, config: EngineConfig) -> Self {
        Ctlab {
            engine: CommandEngine::with_config(transport, config),
            directory: DeviceDirectory::new(),
        }
    }

    pub fn engine(&mut self) -> &mut CommandEngine<T> {
        &mut self.engine
    }

    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }

    /// Scans the bus; see [`DeviceDirectory::discover`].
    pub async fn discover(&mut self, verbose: bool) -> Result<Vec<ScanRecord>, CtlabError> {
        self.directory.discover(&mut self.engine, verbose).await
    }

    /// Bus index of `slot`, failing when discovery did not find it.
    pub fn index_of(&self, slot: DeviceSlot) -> Result<u8, CtlabError> {
        self.directory.require(slot)
    }

    pub async fn send_command(&mut self, device: u8, command: &str) -> Result<(), CtlabError> {
        self.engine.send_command(device, command).await
    }

    pub async fn send_command_result(
        &mut self,
        device: u8,
        command: &str,
    ) -> Result<Option<Vec<u8>>, CtlabError> {
        self.engine.send_command_result(device, command).await
    }

    pub async fn send_command_result_as_text(
        &mut self,
        device: u8,
        command: &str,
    ) -> Result<String, CtlabError> {
        self.engine.send_command_result_as_text(device, command).await
    }

    pub async fn read_value(&mut self, device: u8, command: &str) -> Result<f64, CtlabError> {
        self.engine.read_value(device, command).await
    }

    /// Status-checked send to the module recorded for `slot`.
    pub async fn slot_command(
        &mut self,
        slot: DeviceSlot,
        command: &str,
    ) -> Result<(), CtlabError> {
        let index = self.index_of(slot)?;
        self.engine.send_command(index, command).await
    }

    /// Result-returning send to the module recorded for `slot`, as text.
    pub async fn slot_query(
        &mut self,
        slot: DeviceSlot,
        command: &str,
    ) -> Result<String, CtlabError> {
        let index = self.index_of(slot)?;
        self.engine.send_command_result_as_text(index, command).await
    }

    /// Numeric read from the module recorded for `slot`.
    pub async fn slot_value(&mut self, slot: DeviceSlot, command: &str) -> Result<f64, CtlabError> {
        let index = self.index_of(slot)?;
        self.engine.read_value(index, command).await
    }

    // DCG power supply

    pub async fn dcg_measure_power(&mut self) -> Result<f64, CtlabError> {
        self.slot_value(DeviceSlot::Dcg, "msw?").await
    }

    pub async fn dcg_measure_voltage(&mut self) -> Result<f64, CtlabError> {
        self.slot_value(DeviceSlot::Dcg, "msv?").await
    }

    pub async fn dcg_set_voltage(&mut self, voltage: f64) -> Result<(), CtlabError> {
        self.slot_command(DeviceSlot::Dcg, &format!("dcv={voltage:.3}")).await
    }

    pub async fn dcg_measure_current_ma(&mut self) -> Result<f64, CtlabError> {
        self.slot_value(DeviceSlot::Dcg, "msa 1?").await
    }

    pub async fn dcg_set_current(&mut self, current: f64) -> Result<(), CtlabError> {
        self.slot_command(DeviceSlot::Dcg, &format!("dca={current:.3}")).await
    }

    pub async fn dcg_set_current_ma(&mut self, current: f64) -> Result<(), CtlabError> {
        self.slot_command(DeviceSlot::Dcg, &format!("dca 1={current:.3}")).await
    }

    // EDL electronic load

    pub async fn edl_set_current(&mut self, current: f64) -> Result<(), CtlabError> {
        self.slot_command(DeviceSlot::Edl, &format!("dca={current:.3}")).await
    }

    pub async fn edl_set_current_ma(&mut self, current: f64) -> Result<(), CtlabError> {
        self.slot_command(DeviceSlot::Edl, &format!("dca 1={current:.3}")).await
    }

    // DDS generator

    pub async fn dds_set_frequency(&mut self, frequency: f64) -> Result<(), CtlabError> {
        self.slot_command(DeviceSlot::Dds, &format!("frq={frequency:.1}")).await
    }

    pub async fn dds_set_amplitude(&mut self, amplitude: f64) -> Result<(), CtlabError> {
        self.slot_command(DeviceSlot::Dds, &format!("lvl={amplitude:.1}")).await
    }

    // ADA I/O board. DA outputs live at value channel 20+pin, internal ADC
    // inputs at 0+pin, external ADC inputs at 10+pin.

    pub async fn ada_set_da_voltage(&mut self, pin: u8, voltage: f64) -> Result<(), CtlabError> {
        let channel = 20 + u32::from(pin);
        self.slot_command(DeviceSlot::Ada, &format!("val{channel}={voltage:.4}")).await
    }

    pub async fn ada_measure_adcint(&mut self, pin: u8) -> Result<f64, CtlabError> {
        self.slot_value(DeviceSlot::Ada, &format!("val {pin}?")).await
    }

    pub async fn ada_measure_adc(&mut self, pin: u8) -> Result<f64, CtlabError> {
        let channel = 10 + u32::from(pin);
        self.slot_value(DeviceSlot::Ada, &format!("val {channel}?")).await
    }

    pub async fn ada_set_direction(&mut self, port: u8, value: i64) -> Result<(), CtlabError> {
        self.slot_command(DeviceSlot::Ada, &format!("dir{port}={value}")).await
    }

    pub async fn ada_set_port(&mut self, port: u8, value: i64) -> Result<(), CtlabError> {
        self.slot_command(DeviceSlot::Ada, &format!("pio{port}={value}")).await
    }

    /// Reads a digital port; the module reports it as a number, truncated here.
    pub async fn ada_get_port(&mut self, port: u8) -> Result<i64, CtlabError> {
        let value = self.slot_value(DeviceSlot::Ada, &format!("pio {port}?")).await?;
        Ok(value.trunc() as i64)
    }
}
