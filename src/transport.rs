//! Byte-stream links to the logic board.
//!
//! The protocol engine only needs three things from a link: throw away
//! whatever is sitting in the receive buffer, write a whole frame, and read
//! whatever has arrived within a short wait.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};
use tracing::debug;

use crate::error::Result;
use crate::sim::SimulatedBoard;

/// UART settings used by the board's virtual COM port.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

pub trait Transport: Send {
    /// Drops any bytes received but not yet read.
    fn discard_input(&mut self) -> io::Result<()>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Reads whatever is available, waiting at most `wait`.
    ///
    /// Returns `Ok(0)` when nothing arrived in time; that is not an error.
    fn read_some(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<usize>;
}

/// A board attached over a serial port.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Opens `path` at `baud_rate`, 8N1.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .timeout(Duration::from_millis(10))
            .open()?;
        debug!(port = path, baud_rate, "serial port opened");
        Ok(Self { port })
    }

    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }
}

impl Transport for SerialTransport {
    fn discard_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn read_some(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<usize> {
        // serialport rejects a zero timeout on some platforms
        let wait = wait.max(Duration::from_millis(1));
        self.port.set_timeout(wait).map_err(io::Error::from)?;
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }
}

/// Loops frames through an in-memory [`SimulatedBoard`].
///
/// Every complete request line written is answered immediately; the answer
/// sits in the receive buffer until read or discarded, just like on the wire.
pub struct LoopbackTransport {
    board: SimulatedBoard,
    pending_tx: Vec<u8>,
    rx: Vec<u8>,
}

impl LoopbackTransport {
    pub fn new(board: SimulatedBoard) -> Self {
        Self {
            board,
            pending_tx: Vec::new(),
            rx: Vec::new(),
        }
    }

    pub fn board(&self) -> &SimulatedBoard {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut SimulatedBoard {
        &mut self.board
    }

    /// Queues bytes as if the board had sent them unprompted.
    pub fn inject_rx(&mut self, bytes: &[u8]) {
        self.rx.extend_from_slice(bytes);
    }
}

impl Transport for LoopbackTransport {
    fn discard_input(&mut self) -> io::Result<()> {
        self.rx.clear();
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.pending_tx.extend_from_slice(bytes);
        while let Some(pos) = self.pending_tx.windows(2).position(|w| w == b"\r\n") {
            let line: Vec<u8> = self.pending_tx.drain(..pos + 2).collect();
            let request = String::from_utf8_lossy(&line[..pos]);
            let reply = self.board.process_request(&request);
            self.rx.extend_from_slice(reply.as_bytes());
        }
        Ok(())
    }

    fn read_some(&mut self, buf: &mut [u8], wait: Duration) -> io::Result<usize> {
        if self.rx.is_empty() {
            std::thread::sleep(wait);
            return Ok(0);
        }
        let n = buf.len().min(self.rx.len());
        buf[..n].copy_from_slice(&self.rx[..n]);
        self.rx.drain(..n);
        Ok(n)
    }
}
