//! Error kinds shared by every layer of the bench.

use std::time::Duration;

use thiserror::Error;

use crate::analog::VoltageRange;

// Every failure the core reports. Nothing here is retried automatically.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The response was missing its delimiter or carried an unknown status token.
    #[error("malformed response frame: {0:?}")]
    ProtocolFraming(String),
    /// The board answered `ER`; the value is an opaque diagnostic code.
    #[error("board reported error code {code}")]
    Device { code: String },
    /// No complete frame arrived within the response window.
    #[error("no response within {0:?}")]
    Timeout(Duration),
    /// The pin name is not in the fixture's pin map.
    #[error("unknown digital pin '{0}'")]
    UnknownPin(String),
    /// The analog signal name is not in the fixture's channel map.
    #[error("unknown analog channel '{0}'")]
    UnknownChannel(String),
    /// No mux bank routes the signal.
    #[error("no mux bank routes signal '{0}'")]
    UnknownSignal(String),
    /// A mux table entry names an address its bank's pins cannot reach.
    #[error("mux bank {bank} cannot address {address} for '{signal}'")]
    MuxAddress {
        bank: &'static str,
        signal: String,
        address: u8,
    },
    /// A batched scan mixed channels with different voltage ranges.
    #[error("scan mixes ranges: '{first}' is {expected}, '{name}' is {found}")]
    RangeMismatch {
        first: String,
        expected: VoltageRange,
        name: String,
        found: VoltageRange,
    },
    /// A reply parsed as a frame but its value was not what the command returns.
    #[error("unexpected value {value:?} for {opcode}")]
    UnexpectedValue { opcode: &'static str, value: String },
    /// The instrument behind a DAQ interface rejected the call.
    #[error("instrument error: {0}")]
    Instrument(String),
    /// A global tracing subscriber was already installed.
    #[error("failed to initialize logging: {0}")]
    Logging(String),
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, BenchError>;
