//! Interfaces to the data-acquisition unit.
//!
//! The DAQ driver itself lives outside this crate. A bench needs three calls
//! from it, one trait each, so a driver can be shared between components
//! without any of them reaching for calls that belong to another.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::analog::VoltageRange;
use crate::error::{BenchError, Result};

/// Full-word writes to a digital output port.
///
/// The port is write-only; there is no way to read back what it drives.
pub trait DigitalOut {
    fn set_digital_out(&mut self, base_address: u16, word: u16) -> Result<()>;
}

/// Batched DC voltage scans.
pub trait AnalogScanner {
    /// Scans `addresses` at one `range`, returning one reading per address
    /// in the same order.
    fn scan(&mut self, addresses: &[u16], range: VoltageRange) -> Result<Vec<f64>>;
}

pub trait AnalogOut {
    fn write_voltage_out(&mut self, channel: u16, volts: f64) -> Result<()>;
}

// One instrument usually serves all three roles, so share it behind a lock.
impl<D: DigitalOut> DigitalOut for Arc<Mutex<D>> {
    fn set_digital_out(&mut self, base_address: u16, word: u16) -> Result<()> {
        self.lock().set_digital_out(base_address, word)
    }
}

impl<D: AnalogScanner> AnalogScanner for Arc<Mutex<D>> {
    fn scan(&mut self, addresses: &[u16], range: VoltageRange) -> Result<Vec<f64>> {
        self.lock().scan(addresses, range)
    }
}

impl<D: AnalogOut> AnalogOut for Arc<Mutex<D>> {
    fn write_voltage_out(&mut self, channel: u16, volts: f64) -> Result<()> {
        self.lock().write_voltage_out(channel, volts)
    }
}

/// A DAQ that records every call and answers scans from a table of
/// per-address readings (0.0 when unset).
#[derive(Debug, Default, Clone)]
pub struct SimulatedDaq {
    pub digital_writes: Vec<(u16, u16)>,
    pub scans: Vec<(Vec<u16>, VoltageRange)>,
    pub analog_writes: Vec<(u16, f64)>,
    pub readings: HashMap<u16, f64>,
    // Makes the next digital write fail, then clears itself.
    pub fail_next_write: bool,
}

impl SimulatedDaq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reading(mut self, address: u16, volts: f64) -> Self {
        self.readings.insert(address, volts);
        self
    }

    /// Last word written to `base_address`, if any.
    pub fn last_word(&self, base_address: u16) -> Option<u16> {
        self.digital_writes
            .iter()
            .rev()
            .find(|(base, _)| *base == base_address)
            .map(|(_, word)| *word)
    }
}

impl DigitalOut for SimulatedDaq {
    fn set_digital_out(&mut self, base_address: u16, word: u16) -> Result<()> {
        if std::mem::take(&mut self.fail_next_write) {
            return Err(BenchError::Instrument(format!(
                "write of {:#06x} to {:#x} rejected",
                word, base_address
            )));
        }
        self.digital_writes.push((base_address, word));
        Ok(())
    }
}

impl AnalogScanner for SimulatedDaq {
    fn scan(&mut self, addresses: &[u16], range: VoltageRange) -> Result<Vec<f64>> {
        self.scans.push((addresses.to_vec(), range));
        Ok(addresses
            .iter()
            .map(|addr| self.readings.get(addr).copied().unwrap_or(0.0))
            .collect())
    }
}

impl AnalogOut for SimulatedDaq {
    fn write_voltage_out(&mut self, channel: u16, volts: f64) -> Result<()> {
        self.analog_writes.push((channel, volts));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_handle_reaches_the_same_instrument() {
        let daq = Arc::new(Mutex::new(SimulatedDaq::new().with_reading(101, 3.3)));
        let mut digital = daq.clone();
        let mut scanner = daq.clone();

        digital.set_digital_out(0x201, 0x0042).unwrap();
        let readings = scanner.scan(&[101, 102], VoltageRange::V10).unwrap();

        assert_eq!(readings, vec![3.3, 0.0]);
        let daq = daq.lock();
        assert_eq!(daq.last_word(0x201), Some(0x0042));
        assert_eq!(daq.scans.len(), 1);
    }

    #[test]
    fn failed_write_is_not_recorded() {
        let mut daq = SimulatedDaq::new();
        daq.fail_next_write = true;
        assert!(daq.set_digital_out(0x201, 1).is_err());
        assert_eq!(daq.last_word(0x201), None);
        daq.set_digital_out(0x201, 2).unwrap();
        assert_eq!(daq.last_word(0x201), Some(2));
    }
}
