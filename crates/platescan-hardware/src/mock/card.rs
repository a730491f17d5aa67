//! Mock NFC reader implementation for testing and development.
//!
//! The reader and its handle share one simulated RF field. The handle places
//! cards in the field, lifts them away and injects faults; the reader side
//! implements [`CardReader`] against the same state, so the handle can be
//! driven from another thread while the control loop blocks on removal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use platescan_core::MenuRecord;
use platescan_core::constants::{CARD_BLOCK_SIZE, DEFAULT_CARD_BLOCK};

use crate::{
    HardwareError, Result,
    traits::CardReader,
    types::{MifareKey, ReaderInfo},
};

/// Simulated Mifare Classic 1K card.
#[derive(Debug, Clone)]
pub struct MockCard {
    uid: Vec<u8>,
    key: MifareKey,
    blocks: HashMap<u8, [u8; CARD_BLOCK_SIZE]>,
}

impl MockCard {
    /// A card with factory key and all-zero data blocks.
    pub fn blank(uid: Vec<u8>) -> Self {
        Self {
            uid,
            key: MifareKey::default(),
            blocks: HashMap::new(),
        }
    }

    /// A card already carrying a station record in the default block.
    pub fn with_record(uid: Vec<u8>, record: &MenuRecord) -> Self {
        let mut card = Self::blank(uid);
        card.blocks.insert(DEFAULT_CARD_BLOCK, record.to_block());
        card
    }

    /// Replace the sector key.
    pub fn with_key(mut self, key: MifareKey) -> Self {
        self.key = key;
        self
    }

    /// Raw contents of a block.
    pub fn block(&self, block: u8) -> [u8; CARD_BLOCK_SIZE] {
        self.blocks.get(&block).copied().unwrap_or([0; CARD_BLOCK_SIZE])
    }

    pub fn uid(&self) -> &[u8] {
        &self.uid
    }

    /// Get the UID as a hexadecimal string.
    pub fn uid_hex(&self) -> String {
        self.uid.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

/// Reader operation that can be made to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Discovery poll fails.
    Poll,
    /// Sector authentication fails at transport level.
    Authenticate,
    /// Block read fails.
    Read,
    /// Write command phase is not acknowledged.
    WriteCommand,
    /// Data phase is not acknowledged.
    WriteData,
}

#[derive(Debug, Default)]
struct Field {
    card: Option<MockCard>,
    last_card: Option<MockCard>,
    authenticated_sector: Option<u8>,
    faults: Vec<Fault>,
    auto_remove: Option<usize>,
    presence_remaining: Option<usize>,
    presence_checks: usize,
    discovery_restarts: usize,
}

impl Field {
    fn take_fault(&mut self, fault: Fault) -> bool {
        match self.faults.iter().position(|f| *f == fault) {
            Some(index) => {
                self.faults.remove(index);
                true
            }
            None => false,
        }
    }

    fn lift(&mut self) {
        if let Some(card) = self.card.take() {
            self.last_card = Some(card);
        }
        self.authenticated_sector = None;
    }

    fn require_sector(&self, block: u8) -> Result<()> {
        if self.card.is_none() {
            return Err(HardwareError::NoCard);
        }
        if self.authenticated_sector != Some(block / 4) {
            return Err(HardwareError::authentication(block));
        }
        Ok(())
    }
}

fn lock(field: &Mutex<Field>) -> MutexGuard<'_, Field> {
    // A panicked test thread must not wedge the other side.
    field.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock NFC reader for testing and development.
///
/// # Examples
///
/// ```
/// use platescan_hardware::mock::{MockCard, MockCardReader};
/// use platescan_hardware::traits::CardReader;
///
/// let (mut reader, handle) = MockCardReader::new();
/// assert!(!reader.poll_tag().unwrap());
///
/// handle.present(MockCard::blank(vec![0x01, 0x02, 0x03, 0x04]));
/// assert!(reader.poll_tag().unwrap());
/// ```
#[derive(Debug)]
pub struct MockCardReader {
    field: Arc<Mutex<Field>>,
    name: String,
}

impl MockCardReader {
    /// Create a new mock reader with the default name.
    pub fn new() -> (Self, MockCardHandle) {
        Self::with_name("Mock NFC Reader")
    }

    /// Create a new mock reader with a custom name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockCardHandle) {
        let field = Arc::new(Mutex::new(Field::default()));
        let reader = Self {
            field: Arc::clone(&field),
            name: name.into(),
        };
        (reader, MockCardHandle { field })
    }
}

impl CardReader for MockCardReader {
    fn poll_tag(&mut self) -> Result<bool> {
        let mut field = lock(&self.field);
        if field.take_fault(Fault::Poll) {
            return Err(HardwareError::communication("discovery poll failed"));
        }
        Ok(field.card.is_some())
    }

    fn is_tag_present(&mut self) -> Result<bool> {
        let mut field = lock(&self.field);
        field.presence_checks += 1;

        if field.card.is_none() {
            return Ok(false);
        }

        match field.presence_remaining {
            Some(0) => {
                field.lift();
                Ok(false)
            }
            Some(n) => {
                field.presence_remaining = Some(n - 1);
                Ok(true)
            }
            None => Ok(true),
        }
    }

    fn authenticate(&mut self, block: u8, key: &MifareKey) -> Result<()> {
        let mut field = lock(&self.field);
        field.authenticated_sector = None;

        if field.take_fault(Fault::Authenticate) {
            return Err(HardwareError::communication("authentication timed out"));
        }

        let card = field.card.as_ref().ok_or(HardwareError::NoCard)?;
        if card.key != *key {
            return Err(HardwareError::authentication(block));
        }

        field.authenticated_sector = Some(block / 4);
        Ok(())
    }

    fn read_block(&mut self, block: u8) -> Result<[u8; CARD_BLOCK_SIZE]> {
        let mut field = lock(&self.field);
        field.require_sector(block)?;

        if field.take_fault(Fault::Read) {
            return Err(HardwareError::card_read(format!("block {block} read failed")));
        }

        let card = field.card.as_ref().ok_or(HardwareError::NoCard)?;
        Ok(card.block(block))
    }

    fn write_block(&mut self, block: u8, data: &[u8; CARD_BLOCK_SIZE]) -> Result<()> {
        let mut field = lock(&self.field);
        field.require_sector(block)?;

        if field.take_fault(Fault::WriteCommand) {
            return Err(HardwareError::card_write(format!(
                "write command for block {block} not acknowledged"
            )));
        }
        if field.take_fault(Fault::WriteData) {
            return Err(HardwareError::card_write(format!(
                "data for block {block} not acknowledged"
            )));
        }

        let card = field.card.as_mut().ok_or(HardwareError::NoCard)?;
        card.blocks.insert(block, *data);
        Ok(())
    }

    fn restart_discovery(&mut self) -> Result<()> {
        let mut field = lock(&self.field);
        field.discovery_restarts += 1;
        field.authenticated_sector = None;
        Ok(())
    }

    fn reader_info(&self) -> ReaderInfo {
        ReaderInfo::new(self.name.clone(), vec!["ISO14443A".to_string()])
    }
}

/// Handle for controlling a mock NFC reader.
#[derive(Debug, Clone)]
pub struct MockCardHandle {
    field: Arc<Mutex<Field>>,
}

impl MockCardHandle {
    /// Place a card in the field.
    pub fn present(&self, card: MockCard) {
        let mut field = lock(&self.field);
        field.presence_remaining = field.auto_remove;
        field.authenticated_sector = None;
        field.card = Some(card);
    }

    /// Place the most recently lifted card back in the field.
    ///
    /// Returns `false` if no card has been lifted yet.
    pub fn present_last(&self) -> bool {
        let card = lock(&self.field).last_card.clone();
        match card {
            Some(card) => {
                self.present(card);
                true
            }
            None => false,
        }
    }

    /// Lift the card out of the field.
    pub fn remove(&self) {
        lock(&self.field).lift();
    }

    /// Lift the card automatically after `checks` positive presence checks.
    ///
    /// `None` keeps cards in the field until [`remove`](Self::remove).
    pub fn set_auto_remove(&self, checks: Option<usize>) {
        lock(&self.field).auto_remove = checks;
    }

    /// Make the next matching operation fail.
    pub fn inject_fault(&self, fault: Fault) {
        lock(&self.field).faults.push(fault);
    }

    /// Whether a card is currently in the field.
    pub fn in_field(&self) -> bool {
        lock(&self.field).card.is_some()
    }

    /// Contents of a block on the card in the field, or on the last lifted
    /// card if the field is empty.
    pub fn card_block(&self, block: u8) -> Option<[u8; CARD_BLOCK_SIZE]> {
        let field = lock(&self.field);
        field
            .card
            .as_ref()
            .or(field.last_card.as_ref())
            .map(|card| card.block(block))
    }

    /// Number of presence checks made so far.
    pub fn presence_checks(&self) -> usize {
        lock(&self.field).presence_checks
    }

    /// Number of discovery restarts so far.
    pub fn discovery_restarts(&self) -> usize {
        lock(&self.field).discovery_restarts
    }
}
