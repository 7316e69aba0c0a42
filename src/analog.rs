//! Named analog inputs and outputs on the DAQ.

use std::fmt;

use tracing::{debug, warn};

use crate::daq::{AnalogOut, AnalogScanner};
use crate::error::{BenchError, Result};

/// Full-scale DC voltage range of a scan, in volts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoltageRange(pub u16);

impl VoltageRange {
    pub const V1: VoltageRange = VoltageRange(1);
    pub const V10: VoltageRange = VoltageRange(10);
    pub const V100: VoltageRange = VoltageRange(100);

    pub fn volts(&self) -> f64 {
        f64::from(self.0)
    }
}

impl fmt::Display for VoltageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} V", self.0)
    }
}

/// Where an analog input lives on the scanner and how it must be ranged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalogChannel {
    pub address: u16,
    pub range: VoltageRange,
}

/// Signal name to scan channel, fixed for a fixture.
#[derive(Debug, Clone, Copy)]
pub struct ChannelMap {
    channels: &'static [(&'static str, AnalogChannel)],
}

impl ChannelMap {
    pub const fn new(channels: &'static [(&'static str, AnalogChannel)]) -> Self {
        Self { channels }
    }

    pub fn get(&self, name: &str) -> Option<AnalogChannel> {
        self.channels
            .iter()
            .find(|(signal, _)| *signal == name)
            .map(|(_, channel)| *channel)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.channels.iter().map(|(name, _)| *name)
    }
}

/// Reads groups of named inputs in a single scan.
pub struct MuxedAnalogInputReader<S: AnalogScanner> {
    scanner: S,
    channels: ChannelMap,
}

impl<S: AnalogScanner> MuxedAnalogInputReader<S> {
    pub fn new(scanner: S, channels: ChannelMap) -> Self {
        Self { scanner, channels }
    }

    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    pub fn scanner(&self) -> &S {
        &self.scanner
    }

    /// Scans `names` together and returns one reading per name, in order.
    ///
    /// Every name must share one voltage range. Mixing ranges fails with
    /// [`BenchError::RangeMismatch`] before anything is scanned; widening the
    /// range instead would quietly cost resolution on the smaller signals.
    pub fn read_inputs(&mut self, names: &[&str]) -> Result<Vec<f64>> {
        let mut addresses = Vec::with_capacity(names.len());
        let mut common: Option<(&str, VoltageRange)> = None;

        for &name in names {
            let channel = self
                .channels
                .get(name)
                .ok_or_else(|| BenchError::UnknownChannel(name.to_string()))?;
            match common {
                None => common = Some((name, channel.range)),
                Some((first, expected)) if expected != channel.range => {
                    warn!(first, name, "scan list mixes voltage ranges");
                    return Err(BenchError::RangeMismatch {
                        first: first.to_string(),
                        expected,
                        name: name.to_string(),
                        found: channel.range,
                    });
                }
                Some(_) => {}
            }
            addresses.push(channel.address);
        }

        let Some((_, range)) = common else {
            return Ok(Vec::new());
        };

        debug!(?addresses, %range, "scanning");
        let readings = self.scanner.scan(&addresses, range)?;
        if readings.len() != addresses.len() {
            return Err(BenchError::Instrument(format!(
                "scan of {} channels returned {} readings",
                addresses.len(),
                readings.len()
            )));
        }
        Ok(readings)
    }

    /// Convenience for a single input.
    pub fn read_input(&mut self, name: &str) -> Result<f64> {
        let readings = self.read_inputs(&[name])?;
        Ok(readings[0])
    }
}

/// VBAT is driven through a 10x amplifier on the fixture.
pub const VBAT_GAIN: f64 = 10.0;

/// Named DAQ analog outputs.
pub struct AnalogOutputs<O: AnalogOut> {
    out: O,
    channels: &'static [(&'static str, u16)],
}

impl<O: AnalogOut> AnalogOutputs<O> {
    pub fn new(out: O, channels: &'static [(&'static str, u16)]) -> Self {
        Self { out, channels }
    }

    pub fn output(&self) -> &O {
        &self.out
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.iter().any(|(output, _)| *output == name)
    }

    fn channel(&self, name: &str) -> Result<u16> {
        self.channels
            .iter()
            .find(|(output, _)| *output == name)
            .map(|(_, channel)| *channel)
            .ok_or_else(|| BenchError::UnknownChannel(name.to_string()))
    }

    /// Sets the simulated battery voltage, compensating the amplifier gain.
    pub fn set_vbat(&mut self, volts: f64) -> Result<()> {
        let channel = self.channel("VBAT")?;
        debug!(volts, "setting VBAT");
        self.out.write_voltage_out(channel, volts / VBAT_GAIN)
    }

    /// Drives a named output. VBAT goes through [`Self::set_vbat`]; anything
    /// else is written as-is.
    pub fn set_output(&mut self, name: &str, volts: f64) -> Result<()> {
        if name == "VBAT" {
            return self.set_vbat(volts);
        }
        let channel = self.channel(name)?;
        self.out.write_voltage_out(channel, volts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daq::SimulatedDaq;
    use crate::fixture::{LOGIC_ANALOG_INPUTS, LOGIC_ANALOG_OUTPUTS, POWER_ANALOG_INPUTS};

    fn reader(channels: ChannelMap, daq: SimulatedDaq) -> MuxedAnalogInputReader<SimulatedDaq> {
        MuxedAnalogInputReader::new(daq, channels)
    }

    #[test]
    fn same_range_reads_in_request_order() {
        let daq = SimulatedDaq::new().with_reading(118, 3.7).with_reading(111, 5.0);
        let mut reader = reader(LOGIC_ANALOG_INPUTS, daq);

        let readings = reader.read_inputs(&["VSYS", "VBUS"]).unwrap();
        assert_eq!(readings, vec![3.7, 5.0]);
        assert_eq!(reader.scanner().scans, vec![(vec![118, 111], VoltageRange::V10)]);

        let readings = reader.read_inputs(&["VBUS", "VSYS"]).unwrap();
        assert_eq!(readings, vec![5.0, 3.7]);
    }

    #[test]
    fn mixed_ranges_fail_without_scanning() {
        let mut reader = reader(LOGIC_ANALOG_INPUTS, SimulatedDaq::new());
        let err = reader.read_inputs(&["VSYS", "IBAT"]).unwrap_err();
        match err {
            BenchError::RangeMismatch { first, expected, name, found } => {
                assert_eq!(first, "VSYS");
                assert_eq!(expected, VoltageRange::V10);
                assert_eq!(name, "IBAT");
                assert_eq!(found, VoltageRange::V1);
            }
            other => panic!("expected range mismatch, got {:?}", other),
        }
        assert!(reader.scanner().scans.is_empty());
    }

    #[test]
    fn unknown_channel_fails_without_scanning() {
        let mut reader = reader(POWER_ANALOG_INPUTS, SimulatedDaq::new());
        assert!(matches!(
            reader.read_inputs(&["VSYS", "NOPE"]),
            Err(BenchError::UnknownChannel(n)) if n == "NOPE"
        ));
        assert!(reader.scanner().scans.is_empty());
    }

    #[test]
    fn shared_address_names_both_resolve() {
        // IBAT and ISYS are wired to the same scan channel on the logic fixture
        let daq = SimulatedDaq::new().with_reading(106, 0.25);
        let mut reader = reader(LOGIC_ANALOG_INPUTS, daq);
        assert_eq!(reader.read_inputs(&["IBAT", "ISYS"]).unwrap(), vec![0.25, 0.25]);
    }

    #[test]
    fn hundred_volt_range_is_used_for_high_voltage_nodes() {
        let mut reader = reader(POWER_ANALOG_INPUTS, SimulatedDaq::new());
        reader.read_inputs(&["VMOTOR", "VCAP_SNS"]).unwrap();
        assert_eq!(reader.scanner().scans[0], (vec![104, 106], VoltageRange::V100));
    }

    #[test]
    fn empty_request_does_not_scan() {
        let mut reader = reader(LOGIC_ANALOG_INPUTS, SimulatedDaq::new());
        assert!(reader.read_inputs(&[]).unwrap().is_empty());
        assert!(reader.scanner().scans.is_empty());
    }

    #[test]
    fn single_input_read() {
        let daq = SimulatedDaq::new().with_reading(113, 3.0);
        let mut reader = reader(LOGIC_ANALOG_INPUTS, daq);
        assert_eq!(reader.read_input("PP3V0_MOTION").unwrap(), 3.0);
    }

    #[test]
    fn vbat_is_scaled_by_amplifier_gain() {
        let mut outputs = AnalogOutputs::new(SimulatedDaq::new(), LOGIC_ANALOG_OUTPUTS);
        outputs.set_output("VBAT", 4.2).unwrap();
        outputs.set_output("VMUX", 1.5).unwrap();
        let writes = &outputs.output().analog_writes;
        assert_eq!(writes[0].0, 204);
        assert!((writes[0].1 - 0.42).abs() < 1e-12);
        assert_eq!(writes[1], (205, 1.5));
        assert!(matches!(
            outputs.set_output("VFOO", 1.0),
            Err(BenchError::UnknownChannel(_))
        ));
    }
}
