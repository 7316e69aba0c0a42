//! Wiring tables for the two bench fixtures and the glue that builds a
//! working bench from them.
//!
//! The names, bit positions, scan addresses and ranges below must match the
//! physical harnesses exactly.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analog::{AnalogChannel, AnalogOutputs, ChannelMap, MuxedAnalogInputReader, VoltageRange};
use crate::daq::{AnalogOut, AnalogScanner, DigitalOut};
use crate::error::{BenchError, Result};
use crate::mux::{MuxBank, MuxedOutputSelector};
use crate::register::{DigitalOutputRegister, PinMap};

/// Channel number for full-word digital output writes on both fixtures.
pub const DIGITAL_BASE: u16 = 0x201;

const fn ch(address: u16, range: u16) -> AnalogChannel {
    AnalogChannel {
        address,
        range: VoltageRange(range),
    }
}

// --- Logic board fixture ---

pub const LOGIC_PINS: PinMap = PinMap::new(&[
    ("QUADB", 0x0001),
    ("QUADA", 0x0002),
    ("QUADI", 0x0004),
    ("INJECT_CTL", 0x0008),
    ("STANDBY_CTL", 0x0010),
    ("CARTRIDGE_CTL", 0x0020),
    ("ESCON_READY", 0x0040),
    ("NTC_EN", 0x0100),
    ("NTC_A0", 0x0200),
    ("NTC_A1", 0x0400),
    ("LED_SW_EN", 0x0800),
    ("LED_SW_STATE", 0x1000),
    ("VOUT_A0", 0x2000),
    ("VOUT_A1", 0x4000),
    ("VOUT_A2", 0x8000),
]);

pub const LOGIC_ANALOG_INPUTS: ChannelMap = ChannelMap::new(&[
    ("CONTACTOR_EN", ch(101, 10)),
    ("CHARGE_EN", ch(102, 10)),
    ("ESCON_EN", ch(103, 10)),
    ("IMOTION", ch(104, 1)),
    ("IVCC", ch(105, 1)),
    ("IBAT", ch(106, 1)),
    ("ISYS", ch(106, 1)),
    ("IBUS", ch(108, 1)),
    ("VBUS", ch(111, 10)),
    ("PP3V0_MICRO", ch(112, 10)),
    ("PP3V0_MOTION", ch(113, 10)),
    ("I2C_SDA", ch(114, 10)),
    ("I2C_SCL", ch(115, 10)),
    ("VCELL", ch(116, 10)),
    ("UI_POWER", ch(117, 10)),
    ("VSYS", ch(118, 10)),
    ("PP5V0_ESCON", ch(119, 10)),
    ("ESCON_POWER_EN", ch(120, 10)),
]);

pub const LOGIC_ANALOG_OUTPUTS: &[(&str, u16)] = &[("VBAT", 204), ("VMUX", 205)];

/// The DAQ output feeding the logic fixture's analog output mux.
pub const LOGIC_MUXED_OUTPUT: &str = "VMUX";

/// Signals sharing the logic fixture's muxed analog line, by mux address.
pub const LOGIC_SHARED_CHANNELS: &[(&str, u8)] = &[
    ("IMICRO", 3),
    ("IMOTION", 4),
    ("ISYS", 2),
    ("IMOTOR", 1),
    ("VCAP_DIV", 0),
    ("VMOTOR_DIV", 5),
];

pub const LOGIC_MUX_BANKS: &[MuxBank] = &[MuxBank {
    name: "VOUT",
    address_pins: &["VOUT_A0", "VOUT_A1", "VOUT_A2"],
    signals: LOGIC_SHARED_CHANNELS,
}];

// --- Power board fixture ---

pub const POWER_PINS: PinMap = PinMap::new(&[
    ("MOTOREN", 0x0001),
    ("CONTACTOR_EN", 0x0002),
    ("nCAPCHG_EN", 0x0004),
    ("ESCON_EN", 0x0008),
    ("CH1_A0", 0x0010),
    ("CH1_A1", 0x0020),
    ("CH2_A0", 0x0040),
    ("CH2_A1", 0x0100),
]);

pub const POWER_ANALOG_INPUTS: ChannelMap = ChannelMap::new(&[
    ("ESCON_READY", ch(101, 10)),
    ("VMOTOR_DIV", ch(102, 10)),
    ("PP5V0_ESCON", ch(103, 10)),
    ("VMOTOR", ch(104, 100)),
    ("IMOTOR", ch(105, 10)),
    ("VCAP_SNS", ch(106, 100)),
    ("VCAP_DIV", ch(107, 10)),
    ("Q4_DRAIN", ch(108, 10)),
    ("Q3_GATE", ch(109, 10)),
    ("Q4_GATE", ch(110, 10)),
    ("Q4_SOURCE", ch(111, 10)),
    ("nSHDN", ch(112, 10)),
    ("Q6_SOURCE", ch(113, 10)),
    ("ISYS", ch(114, 1)),
    ("VSYS", ch(115, 10)),
    ("IBAT", ch(116, 1)),
]);

/// Scope channel muxes, in lookup priority order.
pub const POWER_MUX_BANKS: &[MuxBank] = &[
    MuxBank {
        name: "CH1",
        address_pins: &["CH1_A0", "CH1_A1"],
        signals: &[("VMOTOR", 0), ("IMOTOR", 1), ("CONTACTOR_EN", 2), ("VSYS", 3)],
    },
    MuxBank {
        name: "CH2",
        address_pins: &["CH2_A0", "CH2_A1"],
        signals: &[("VCAP", 0), ("ESCON_PWM", 1), ("PWR_EN", 2)],
    },
];

/// Which harness is on the bench.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixtureKind {
    #[default]
    Logic,
    Power,
}

/// The static wiring of one fixture.
#[derive(Debug, Clone, Copy)]
pub struct FixtureTables {
    pub digital_base: u16,
    pub pins: PinMap,
    pub analog_inputs: ChannelMap,
    pub analog_outputs: &'static [(&'static str, u16)],
    pub mux_banks: &'static [MuxBank],
    /// Output whose voltage the mux banks distribute, if any.
    pub muxed_output: Option<&'static str>,
}

impl FixtureKind {
    pub fn tables(self) -> FixtureTables {
        match self {
            FixtureKind::Logic => FixtureTables {
                digital_base: DIGITAL_BASE,
                pins: LOGIC_PINS,
                analog_inputs: LOGIC_ANALOG_INPUTS,
                analog_outputs: LOGIC_ANALOG_OUTPUTS,
                mux_banks: LOGIC_MUX_BANKS,
                muxed_output: Some(LOGIC_MUXED_OUTPUT),
            },
            FixtureKind::Power => FixtureTables {
                digital_base: DIGITAL_BASE,
                pins: POWER_PINS,
                analog_inputs: POWER_ANALOG_INPUTS,
                analog_outputs: &[],
                mux_banks: POWER_MUX_BANKS,
                muxed_output: None,
            },
        }
    }
}

/// The shared fixture resources, ready to use.
///
/// `digital`, `scanner` and `analog_out` are usually handles to the same
/// instrument (see the `Arc<Mutex<_>>` impls in [`crate::daq`]).
pub struct Fixture<D: DigitalOut, S: AnalogScanner, O: AnalogOut> {
    pub kind: FixtureKind,
    pub register: DigitalOutputRegister<D>,
    pub inputs: MuxedAnalogInputReader<S>,
    pub outputs: AnalogOutputs<O>,
    pub mux: MuxedOutputSelector,
    muxed_output: Option<&'static str>,
}

impl<D: DigitalOut, S: AnalogScanner, O: AnalogOut> Fixture<D, S, O> {
    /// Builds the fixture and drives the digital port to zero.
    pub fn new(kind: FixtureKind, digital: D, scanner: S, analog_out: O) -> Result<Self> {
        let tables = kind.tables();
        let register = DigitalOutputRegister::new(digital, tables.digital_base, tables.pins)?;
        info!(?kind, base = format_args!("{:#x}", tables.digital_base), "fixture ready");
        Ok(Self {
            kind,
            register,
            inputs: MuxedAnalogInputReader::new(scanner, tables.analog_inputs),
            outputs: AnalogOutputs::new(analog_out, tables.analog_outputs),
            mux: MuxedOutputSelector::new(tables.mux_banks),
            muxed_output: tables.muxed_output,
        })
    }

    pub fn set_pin(&mut self, name: &str) -> Result<()> {
        self.register.set_pin(name)
    }

    pub fn clear_pin(&mut self, name: &str) -> Result<()> {
        self.register.clear_pin(name)
    }

    pub fn read_inputs(&mut self, names: &[&str]) -> Result<Vec<f64>> {
        self.inputs.read_inputs(names)
    }

    /// Routes `signal` to its shared line.
    pub fn select(&mut self, signal: &str) -> Result<()> {
        self.mux.select(&mut self.register, signal).map(|_| ())
    }

    /// Drives a named analog output.
    ///
    /// Outputs wired straight to the DAQ are written directly. Signals behind
    /// the output mux get the voltage on the muxed line, then the mux is
    /// pointed at them.
    pub fn set_output(&mut self, name: &str, volts: f64) -> Result<()> {
        if self.outputs.contains(name) {
            return self.outputs.set_output(name, volts);
        }
        let unknown = || BenchError::UnknownChannel(name.to_string());
        let line = self.muxed_output.ok_or_else(unknown)?;
        self.mux.resolve(name).map_err(|e| match e {
            BenchError::UnknownSignal(_) => unknown(),
            other => other,
        })?;
        self.outputs.set_output(line, volts)?;
        self.select(name)
    }
}
