//! Simulated scanner peripheral.
//!
//! Implements [`embedded_hal::i2c::I2c`] and answers the framed request
//! protocol the way the scanner firmware does: a 5 byte request, a one byte
//! flush read, then the response value. Results are driven from the
//! [`ScannerHandle`], so a test or the host binary decides when a scan
//! finishes and what it measured.

use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::i2c::{self, ErrorKind, I2c, NoAcknowledgeSource, Operation};
use platescan_core::constants::BUS_FRAME_SIZE;
use tracing::trace;

use crate::bus::BusCommand;

/// Result value the scanner reports while none is available.
pub const NO_RESULT: f32 = -1.0;

/// Bus error raised by the simulated scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedBusError(ErrorKind);

impl i2c::Error for SimulatedBusError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Flush,
    Respond,
}

#[derive(Debug)]
struct ScannerState {
    online: bool,
    scanning: bool,
    result: f32,
    phase: Phase,
    response: Vec<u8>,
    last_sequence: Option<i32>,
    starts: usize,
    requests: usize,
}

impl Default for ScannerState {
    fn default() -> Self {
        Self {
            online: true,
            scanning: false,
            result: NO_RESULT,
            phase: Phase::Idle,
            response: Vec::new(),
            last_sequence: None,
            starts: 0,
            requests: 0,
        }
    }
}

impl ScannerState {
    fn handle_frame(&mut self, frame: &[u8]) {
        let sequence = i32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        self.last_sequence = Some(sequence);
        self.requests += 1;

        self.response = match BusCommand::from_code(frame[4]) {
            Some(BusCommand::StartScan) => {
                self.scanning = true;
                self.result = NO_RESULT;
                self.starts += 1;
                Vec::new()
            }
            Some(BusCommand::IsScanning) => vec![u8::from(self.scanning)],
            Some(BusCommand::GetResult) => self.result.to_le_bytes().to_vec(),
            None => Vec::new(),
        };
        trace!(sequence, command = frame[4], "Scanner frame received");
        self.phase = Phase::Flush;
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), SimulatedBusError> {
        match self.phase {
            Phase::Flush => {
                buf.fill(0);
                self.phase = Phase::Respond;
                Ok(())
            }
            Phase::Respond if buf.len() <= self.response.len() => {
                buf.copy_from_slice(&self.response[..buf.len()]);
                self.phase = Phase::Idle;
                Ok(())
            }
            _ => {
                self.phase = Phase::Idle;
                Err(SimulatedBusError(ErrorKind::NoAcknowledge(
                    NoAcknowledgeSource::Data,
                )))
            }
        }
    }
}

fn lock(state: &Mutex<ScannerState>) -> MutexGuard<'_, ScannerState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Scanner simulation attached to a virtual bus.
#[derive(Debug)]
pub struct SimulatedScanner {
    address: u8,
    state: Arc<Mutex<ScannerState>>,
}

impl SimulatedScanner {
    /// Create a scanner answering at `address`.
    pub fn new(address: u8) -> (Self, ScannerHandle) {
        let state = Arc::new(Mutex::new(ScannerState::default()));
        let scanner = Self {
            address,
            state: Arc::clone(&state),
        };
        (scanner, ScannerHandle { state })
    }
}

impl i2c::ErrorType for SimulatedScanner {
    type Error = SimulatedBusError;
}

impl I2c for SimulatedScanner {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);

        if address != self.address || !state.online {
            return Err(SimulatedBusError(ErrorKind::NoAcknowledge(
                NoAcknowledgeSource::Address,
            )));
        }

        for operation in operations {
            match operation {
                Operation::Write(bytes) if bytes.is_empty() => {}
                Operation::Write(bytes) if bytes.len() == BUS_FRAME_SIZE => {
                    state.handle_frame(&bytes[..]);
                }
                Operation::Write(_) => {
                    return Err(SimulatedBusError(ErrorKind::NoAcknowledge(
                        NoAcknowledgeSource::Data,
                    )));
                }
                Operation::Read(buf) => state.read(&mut buf[..])?,
            }
        }
        Ok(())
    }
}

/// Control handle for a [`SimulatedScanner`].
#[derive(Debug, Clone)]
pub struct ScannerHandle {
    state: Arc<Mutex<ScannerState>>,
}

impl ScannerHandle {
    /// Finish the running scan with `percentage`.
    pub fn complete_scan(&self, percentage: f32) {
        let mut state = lock(&self.state);
        state.scanning = false;
        state.result = percentage;
    }

    /// Overwrite the reported result without touching the scanning flag.
    pub fn set_result(&self, value: f32) {
        lock(&self.state).result = value;
    }

    /// Take the scanner off the bus, or put it back.
    pub fn set_online(&self, online: bool) {
        lock(&self.state).online = online;
    }

    /// Whether a scan is running.
    pub fn is_scanning(&self) -> bool {
        lock(&self.state).scanning
    }

    /// Number of scans started.
    pub fn start_count(&self) -> usize {
        lock(&self.state).starts
    }

    /// Number of request frames received.
    pub fn request_count(&self) -> usize {
        lock(&self.state).requests
    }

    /// Sequence number of the last frame received.
    pub fn last_sequence(&self) -> Option<i32> {
        lock(&self.state).last_sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusClient;

    const ADDR: u8 = 0x10;

    #[test]
    fn test_probe() {
        let (scanner, handle) = SimulatedScanner::new(ADDR);
        let mut bus = BusClient::new(scanner, ADDR);
        assert!(bus.probe().is_ok());

        handle.set_online(false);
        assert!(bus.probe().is_err());
    }

    #[test]
    fn test_wrong_address_not_acknowledged() {
        let (scanner, _handle) = SimulatedScanner::new(ADDR);
        let mut bus = BusClient::new(scanner, 0x11);
        assert!(bus.probe().is_err());
        assert_eq!(bus.request::<f32>(BusCommand::GetResult), None);
    }

    #[test]
    fn test_no_result_before_scan() {
        let (scanner, _handle) = SimulatedScanner::new(ADDR);
        let mut bus = BusClient::new(scanner, ADDR);
        assert_eq!(bus.request::<f32>(BusCommand::GetResult), Some(NO_RESULT));
        assert_eq!(bus.request::<bool>(BusCommand::IsScanning), Some(false));
    }

    #[test]
    fn test_scan_lifecycle() {
        let (scanner, handle) = SimulatedScanner::new(ADDR);
        let mut bus = BusClient::new(scanner, ADDR);

        handle.set_result(0.9);
        bus.command(BusCommand::StartScan).unwrap();
        assert!(handle.is_scanning());
        assert_eq!(handle.start_count(), 1);
        assert_eq!(bus.request::<bool>(BusCommand::IsScanning), Some(true));
        // Starting a scan clears the previous result
        assert_eq!(bus.request::<f32>(BusCommand::GetResult), Some(NO_RESULT));

        handle.complete_scan(0.5);
        assert_eq!(bus.request::<bool>(BusCommand::IsScanning), Some(false));
        assert_eq!(bus.request::<f32>(BusCommand::GetResult), Some(0.5));
        assert_eq!(handle.request_count(), 5);
        assert_eq!(handle.last_sequence(), Some(4));
    }

    #[test]
    fn test_oversized_read_is_short_response() {
        let (scanner, _handle) = SimulatedScanner::new(ADDR);
        let mut bus = BusClient::new(scanner, ADDR);
        // IsScanning only answers one byte.
        assert_eq!(bus.request::<f32>(BusCommand::IsScanning), None);
    }

    #[test]
    fn test_offline_yields_no_data() {
        let (scanner, handle) = SimulatedScanner::new(ADDR);
        let mut bus = BusClient::new(scanner, ADDR);
        handle.set_online(false);
        assert_eq!(bus.request::<f32>(BusCommand::GetResult), None);
        assert!(bus.command(BusCommand::StartScan).is_err());
        assert_eq!(handle.start_count(), 0);
    }
}
