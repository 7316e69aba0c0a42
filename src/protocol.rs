//! Request/response engine for the logic board link.
//!
//! The link is half-duplex: one request frame out, one response frame back.
//! A response looks like `VALUE:STATUS\r\n`, with STATUS either `OK` or `ER`.
//! On `ER` the value is a diagnostic code that this layer passes through
//! untouched.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::command::{Command, EOL, FIELD_DELIMITER};
use crate::error::{BenchError, Result};
use crate::transport::Transport;

/// Default bound on how long a response may take.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

// Upper bound on a single transport read, so the deadline is checked often.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

const STATUS_OK: &str = "OK";
const STATUS_ERROR: &str = "ER";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

/// The payload of a successful response, kept as the text the board sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value(String);

impl Value {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Interprets the payload as a number (or anything else `FromStr`).
    pub fn parse<T: FromStr>(&self) -> Option<T> {
        self.0.trim().parse().ok()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub value: String,
}

impl Response {
    /// Parses one frame with the terminator already removed.
    pub fn parse(frame: &str) -> Result<Self> {
        let (value, status) = frame
            .rsplit_once(FIELD_DELIMITER)
            .ok_or_else(|| BenchError::ProtocolFraming(frame.to_string()))?;
        let status = match status {
            STATUS_OK => Status::Ok,
            STATUS_ERROR => Status::Error,
            _ => return Err(BenchError::ProtocolFraming(frame.to_string())),
        };
        Ok(Self {
            status,
            value: value.to_string(),
        })
    }

    pub fn into_result(self) -> Result<Value> {
        match self.status {
            Status::Ok => Ok(Value(self.value)),
            Status::Error => Err(BenchError::Device { code: self.value }),
        }
    }
}

/// Owns the link to the board and runs one exchange at a time.
pub struct ProtocolEngine<T: Transport> {
    link: Mutex<T>,
    timeout: Duration,
}

impl<T: Transport> ProtocolEngine<T> {
    pub fn new(link: T) -> Self {
        Self::with_timeout(link, DEFAULT_RESPONSE_TIMEOUT)
    }

    pub fn with_timeout(link: T, timeout: Duration) -> Self {
        Self {
            link: Mutex::new(link),
            timeout,
        }
    }

    /// Sends `command` and waits for its response.
    ///
    /// The lock is held for the whole exchange, so concurrent callers never
    /// interleave frames. Stale input is discarded before transmitting.
    pub fn send(&self, command: Command) -> Result<Value> {
        let mut link = self.link.lock();

        link.discard_input()?;
        debug!(request = %command, "tx");
        link.write_all(&command.to_frame())?;

        let frame = match read_frame(&mut *link, self.timeout) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(request = %command, error = %e, "no response");
                return Err(e);
            }
        };
        debug!(response = %frame, "rx");

        let result = Response::parse(&frame)?.into_result();
        if let Err(BenchError::Device { code }) = &result {
            warn!(request = %command, code = %code, "board returned error");
        }
        result
    }

    /// Gives the link back, e.g. to reopen a session after a failure.
    pub fn into_inner(self) -> T {
        self.link.into_inner()
    }

    /// Direct access to the link between exchanges.
    pub fn with_link<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut link = self.link.lock();
        f(&mut *link)
    }
}

// Accumulates bytes until the end-of-line marker shows up or time runs out.
fn read_frame<T: Transport + ?Sized>(link: &mut T, timeout: Duration) -> Result<String> {
    let deadline = Instant::now() + timeout;
    let mut acc: Vec<u8> = Vec::with_capacity(64);
    let mut chunk = [0u8; 64];

    loop {
        if let Some(pos) = acc.windows(EOL.len()).position(|w| w == EOL) {
            acc.truncate(pos);
            return String::from_utf8(acc).map_err(|e| {
                BenchError::ProtocolFraming(String::from_utf8_lossy(e.as_bytes()).into_owned())
            });
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(BenchError::Timeout(timeout));
        }
        let wait = (deadline - now).min(POLL_INTERVAL);
        let n = link.read_some(&mut chunk, wait)?;
        acc.extend_from_slice(&chunk[..n]);
    }
}
