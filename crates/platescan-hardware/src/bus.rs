//! Request/response client for the scanner peripheral.
//!
//! The scanner sits on the bus as a slave at a single well-known address and
//! answers fixed-format requests:
//!
//! ```text
//! request frame (5 bytes, little endian)
//! +---------------------+---------+
//! | sequence: i32       | command |
//! +---------------------+---------+
//! ```
//!
//! Every exchange is: write the frame, read one byte to flush the response
//! the slave prepared for the previous request, then read exactly the width
//! of the expected value. A transfer that fails or returns fewer bytes than
//! expected yields `None` rather than a stale value.
//!
//! # Examples
//!
//! ```
//! use platescan_hardware::bus::{BusClient, BusCommand};
//! use platescan_hardware::mock::SimulatedScanner;
//!
//! let (scanner, handle) = SimulatedScanner::new(0x10);
//! let mut bus = BusClient::new(scanner, 0x10);
//!
//! handle.complete_scan(0.42);
//! let result: Option<f32> = bus.request(BusCommand::GetResult);
//! assert_eq!(result, Some(0.42));
//! ```

use bytes::{Buf, BufMut, BytesMut};
use embedded_hal::i2c::I2c;
use platescan_core::constants::BUS_FRAME_SIZE;
use tracing::{debug, trace};

use crate::error::{HardwareError, Result};

/// Commands understood by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BusCommand {
    /// Query whether a scan is in progress (`bool`).
    IsScanning = 2,
    /// Begin a scan.
    StartScan = 3,
    /// Query the latest result (`f32`, `-1.0` while unavailable).
    GetResult = 4,
}

impl BusCommand {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a command by its wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            2 => Some(Self::IsScanning),
            3 => Some(Self::StartScan),
            4 => Some(Self::GetResult),
            _ => None,
        }
    }
}

/// A value that can be decoded from a scanner response.
pub trait BusValue: Sized {
    /// Number of bytes read for one response.
    const SIZE: usize;

    /// Decode from the first [`SIZE`](BusValue::SIZE) bytes.
    ///
    /// Returns `None` when fewer bytes are given.
    fn decode(bytes: &[u8]) -> Option<Self>;
}

impl BusValue for f32 {
    const SIZE: usize = 4;

    fn decode(mut bytes: &[u8]) -> Option<Self> {
        (bytes.remaining() >= Self::SIZE).then(|| bytes.get_f32_le())
    }
}

impl BusValue for i32 {
    const SIZE: usize = 4;

    fn decode(mut bytes: &[u8]) -> Option<Self> {
        (bytes.remaining() >= Self::SIZE).then(|| bytes.get_i32_le())
    }
}

impl BusValue for u8 {
    const SIZE: usize = 1;

    fn decode(mut bytes: &[u8]) -> Option<Self> {
        bytes.has_remaining().then(|| bytes.get_u8())
    }
}

impl BusValue for bool {
    const SIZE: usize = 1;

    fn decode(bytes: &[u8]) -> Option<Self> {
        u8::decode(bytes).map(|b| b != 0)
    }
}

impl<const N: usize> BusValue for [u8; N] {
    const SIZE: usize = N;

    fn decode(bytes: &[u8]) -> Option<Self> {
        bytes.get(..N)?.try_into().ok()
    }
}

/// Encode a request frame.
pub fn encode_frame(sequence: i32, command: BusCommand) -> [u8; BUS_FRAME_SIZE] {
    let mut buf = BytesMut::with_capacity(BUS_FRAME_SIZE);
    buf.put_i32_le(sequence);
    buf.put_u8(command.code());

    let mut frame = [0u8; BUS_FRAME_SIZE];
    frame.copy_from_slice(&buf);
    frame
}

/// Client issuing framed requests to the scanner.
///
/// Stateless apart from the request sequence number, which increments on
/// every transmitted frame and wraps on overflow.
pub struct BusClient<I> {
    i2c: I,
    address: u8,
    sequence: i32,
}

impl<I: I2c> BusClient<I> {
    /// Create a client for the peripheral at `address`.
    pub fn new(i2c: I, address: u8) -> Self {
        Self {
            i2c,
            address,
            sequence: 0,
        }
    }

    /// Check that the peripheral acknowledges its address.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InitializationFailed` if the address is not
    /// acknowledged. Nothing useful can run without the scanner, so callers
    /// treat this as fatal.
    pub fn probe(&mut self) -> Result<()> {
        self.i2c.write(self.address, &[]).map_err(|e| {
            HardwareError::initialization_failed(format!(
                "scanner at 0x{:02X} not responding: {:?}",
                self.address,
                embedded_hal::i2c::Error::kind(&e)
            ))
        })
    }

    /// Send a frame and flush the stale response byte.
    ///
    /// # Errors
    ///
    /// Returns a communication error if the frame write fails. A failed flush
    /// read is ignored.
    pub fn transmit(&mut self, sequence: i32, command: BusCommand) -> Result<()> {
        let frame = encode_frame(sequence, command);
        self.i2c
            .write(self.address, &frame)
            .map_err(HardwareError::from_bus)?;

        let mut stale = [0u8; 1];
        if let Err(e) = self.i2c.read(self.address, &mut stale) {
            trace!(sequence, error = ?embedded_hal::i2c::Error::kind(&e), "Flush read failed");
        }
        Ok(())
    }

    /// Send a command that expects no response value.
    ///
    /// # Errors
    ///
    /// Returns a communication error if the frame write fails.
    pub fn command(&mut self, command: BusCommand) -> Result<()> {
        let sequence = self.next_sequence();
        debug!(sequence, ?command, "Sending scanner command");
        self.transmit(sequence, command)
    }

    /// Request a typed value.
    ///
    /// Returns `None` when the request could not be sent or the response did
    /// not contain exactly `T::SIZE` bytes.
    pub fn request<T: BusValue>(&mut self, command: BusCommand) -> Option<T> {
        let sequence = self.next_sequence();
        if let Err(e) = self.transmit(sequence, command) {
            debug!(sequence, ?command, error = %e, "Scanner request not sent");
            return None;
        }

        let mut buf = vec![0u8; T::SIZE];
        match self.i2c.read(self.address, &mut buf) {
            Ok(()) => T::decode(&buf),
            Err(e) => {
                debug!(
                    sequence,
                    ?command,
                    expected = T::SIZE,
                    error = ?embedded_hal::i2c::Error::kind(&e),
                    "No data from scanner"
                );
                None
            }
        }
    }

    /// Request a fixed-length string, trimming trailing NUL bytes.
    pub fn request_string<const N: usize>(&mut self, command: BusCommand) -> Option<String> {
        let raw: [u8; N] = self.request(command)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(N);
        Some(String::from_utf8_lossy(&raw[..end]).into_owned())
    }

    /// Sequence number the next frame will carry.
    pub fn sequence(&self) -> i32 {
        self.sequence
    }

    /// Peripheral address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Release the underlying bus.
    pub fn release(self) -> I {
        self.i2c
    }

    fn next_sequence(&mut self) -> i32 {
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        sequence
    }
}
