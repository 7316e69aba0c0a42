//! # Logic Board Bench Library
//!
//! Drives a logic board under test over its serial command link and manages
//! the fixture resources around it: the shared digital output port, the
//! scanned analog inputs and the scope multiplexers on the DAQ.
//!
//! The instrument drivers stay outside this crate; they plug in through the
//! traits in [`daq`].

pub mod analog;
pub mod board;
pub mod command;
pub mod config;
pub mod daq;
pub mod error;
pub mod fixture;
pub mod logging;
pub mod mux;
pub mod protocol;
pub mod register;
pub mod sim;
pub mod transport;

pub use analog::{AnalogOutputs, ChannelMap, MuxedAnalogInputReader, VoltageRange};
pub use board::LogicBoard;
pub use command::Command;
pub use config::{BenchConfig, ConfigError};
pub use daq::{AnalogOut, AnalogScanner, DigitalOut, SimulatedDaq};
pub use error::{BenchError, Result};
pub use fixture::{Fixture, FixtureKind};
pub use mux::MuxedOutputSelector;
pub use protocol::ProtocolEngine;
pub use register::{DigitalOutputRegister, PinMap};
pub use sim::SimulatedBoard;
pub use transport::{LoopbackTransport, SerialTransport, Transport};
