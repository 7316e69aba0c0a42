//! Shadow model of the fixture's digital output port.
//!
//! The DAQ port can only be written a full 16-bit word at a time and cannot
//! be read back, yet several unrelated pins share it. The register keeps the
//! last word written and derives every new word from it. It owns the port
//! writer, so nothing else can write a competing word. If something outside
//! the process changes the port anyway, the shadow goes stale silently; only
//! independent analog sensing of the lines could catch that.

use tracing::debug;

use crate::daq::DigitalOut;
use crate::error::{BenchError, Result};

/// Pin name to bit mask, fixed for a fixture.
#[derive(Debug, Clone, Copy)]
pub struct PinMap {
    pins: &'static [(&'static str, u16)],
}

impl PinMap {
    pub const fn new(pins: &'static [(&'static str, u16)]) -> Self {
        Self { pins }
    }

    pub fn mask(&self, name: &str) -> Option<u16> {
        self.pins
            .iter()
            .find(|(pin, _)| *pin == name)
            .map(|(_, mask)| *mask)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pins.iter().map(|(name, _)| *name)
    }
}

pub struct DigitalOutputRegister<D: DigitalOut> {
    port: D,
    base_address: u16,
    pins: PinMap,
    shadow: u16,
}

impl<D: DigitalOut> DigitalOutputRegister<D> {
    /// Takes ownership of the port and drives it to all zeros.
    pub fn new(mut port: D, base_address: u16, pins: PinMap) -> Result<Self> {
        port.set_digital_out(base_address, 0)?;
        Ok(Self {
            port,
            base_address,
            pins,
            shadow: 0,
        })
    }

    /// The word the port was last successfully driven to.
    pub fn word(&self) -> u16 {
        self.shadow
    }

    pub fn base_address(&self) -> u16 {
        self.base_address
    }

    pub fn pins(&self) -> &PinMap {
        &self.pins
    }

    pub fn port(&self) -> &D {
        &self.port
    }

    pub fn is_set(&self, name: &str) -> Result<bool> {
        Ok(self.shadow & self.resolve(name)? != 0)
    }

    pub fn set_pin(&mut self, name: &str) -> Result<()> {
        let mask = self.resolve(name)?;
        self.write(self.shadow | mask)?;
        debug!(pin = name, word = format_args!("{:#06x}", self.shadow), "pin set");
        Ok(())
    }

    pub fn clear_pin(&mut self, name: &str) -> Result<()> {
        let mask = self.resolve(name)?;
        self.write(self.shadow & !mask)?;
        debug!(pin = name, word = format_args!("{:#06x}", self.shadow), "pin cleared");
        Ok(())
    }

    /// Sets or clears `name` according to `high`.
    pub fn drive_pin(&mut self, name: &str, high: bool) -> Result<()> {
        if high {
            self.set_pin(name)
        } else {
            self.clear_pin(name)
        }
    }

    fn resolve(&self, name: &str) -> Result<u16> {
        self.pins
            .mask(name)
            .ok_or_else(|| BenchError::UnknownPin(name.to_string()))
    }

    // The shadow only moves once the port accepted the word.
    fn write(&mut self, word: u16) -> Result<()> {
        self.port.set_digital_out(self.base_address, word)?;
        self.shadow = word;
        Ok(())
    }
}
