//! Card session manager.
//!
//! Wraps a [`CardReader`] with the station's record format and the tap
//! lifecycle used by the session controller:
//!
//! 1. [`is_card_present`](CardSession::is_card_present) reports a tap once.
//! 2. The caller reads or writes the record and renders feedback.
//! 3. [`wait_for_removal`](CardSession::wait_for_removal) blocks until the
//!    card leaves the field.
//! 4. [`reset_discovery`](CardSession::reset_discovery) re-arms detection.
//!
//! The record lives in one data block protected by the factory key and
//! starts with a two-byte marker; see [`platescan_core::constants`].

use embedded_hal::delay::DelayNs;
use platescan_core::MenuRecord;
use platescan_core::constants::{DEFAULT_CARD_BLOCK, DEFAULT_REMOVAL_POLL_MS};
use tracing::{debug, info, warn};

use crate::error::CardError;
use crate::traits::CardReader;
use crate::types::MifareKey;

/// Card session manager over a reader and a delay source.
///
/// # Examples
///
/// ```
/// use embedded_hal_mock::eh1::delay::NoopDelay;
/// use platescan_core::{MenuRecord, UserId};
/// use platescan_hardware::card::CardSession;
/// use platescan_hardware::mock::{MockCard, MockCardReader};
///
/// let (reader, handle) = MockCardReader::new();
/// let mut session = CardSession::new(reader, NoopDelay::new());
///
/// let record = MenuRecord::with_items(UserId::new(1).unwrap(), &[1, 56, 80]).unwrap();
/// handle.present(MockCard::with_record(vec![0x04, 0xAB, 0xCD, 0xEF], &record));
///
/// assert!(session.is_card_present());
/// assert_eq!(session.read_record().unwrap(), record);
/// ```
pub struct CardSession<R, D> {
    reader: R,
    delay: D,
    block: u8,
    key: MifareKey,
    removal_poll_ms: u32,
    armed: bool,
}

impl<R: CardReader, D: DelayNs> CardSession<R, D> {
    /// Create a session using the default block and factory key.
    pub fn new(reader: R, delay: D) -> Self {
        Self {
            reader,
            delay,
            block: DEFAULT_CARD_BLOCK,
            key: MifareKey::default(),
            removal_poll_ms: DEFAULT_REMOVAL_POLL_MS as u32,
            armed: true,
        }
    }

    /// Use a different data block for the record.
    pub fn with_block(mut self, block: u8) -> Self {
        self.block = block;
        self
    }

    /// Use a different sector key.
    pub fn with_key(mut self, key: MifareKey) -> Self {
        self.key = key;
        self
    }

    /// Set the interval between presence checks during a removal wait.
    pub fn with_removal_poll_ms(mut self, interval_ms: u32) -> Self {
        self.removal_poll_ms = interval_ms;
        self
    }

    /// Non-blocking tap detection.
    ///
    /// Returns `true` at most once per tap: after a positive result the
    /// session stays disarmed until [`reset_discovery`](Self::reset_discovery).
    pub fn is_card_present(&mut self) -> bool {
        if !self.armed {
            return false;
        }

        match self.reader.poll_tag() {
            Ok(true) => {
                debug!("Card tap detected");
                self.armed = false;
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(error = %e, "Card discovery poll failed");
                false
            }
        }
    }

    /// Block until the card is no longer in the field.
    ///
    /// Only returns when the card has been lifted away (or the reader stops
    /// answering, which is treated the same way). There is no timeout.
    pub fn wait_for_removal(&mut self) {
        debug!("Waiting for card removal");
        loop {
            match self.reader.is_tag_present() {
                Ok(true) => self.delay.delay_ms(self.removal_poll_ms),
                Ok(false) => break,
                Err(e) => {
                    debug!(error = %e, "Presence check failed, assuming removed");
                    break;
                }
            }
        }
        debug!("Card removed");
    }

    /// Re-arm discovery so the next tap is sensed.
    pub fn reset_discovery(&mut self) {
        if let Err(e) = self.reader.restart_discovery() {
            warn!(error = %e, "Restarting card discovery failed");
        }
        self.armed = true;
    }

    /// Read and validate the record on the tapped card.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `CardError::Authentication` if the card rejects the key
    /// - `CardError::Transport` if the card stops responding
    /// - `CardError::Unrecognized` if the marker does not match
    /// - `CardError::InvalidRecord` if the record contents are impossible
    pub fn read_record(&mut self) -> Result<MenuRecord, CardError> {
        self.reader.authenticate(self.block, &self.key)?;
        let block = self.reader.read_block(self.block)?;

        match MenuRecord::from_block(&block) {
            Ok(record) => {
                info!(user_id = %record.user_id(), items = record.item_count(), "Card record read");
                Ok(record)
            }
            Err(e) => {
                warn!(error = %e, "Card record rejected");
                Err(e.into())
            }
        }
    }

    /// Write a record to the tapped card.
    ///
    /// # Errors
    ///
    /// Returns `CardError::Authentication` or `CardError::Transport` if either
    /// step fails; the block is left as it was.
    pub fn write_record(&mut self, record: &MenuRecord) -> Result<(), CardError> {
        self.reader.authenticate(self.block, &self.key)?;
        self.reader.write_block(self.block, &record.to_block())?;
        info!(user_id = %record.user_id(), items = record.item_count(), "Card record written");
        Ok(())
    }

    /// Access the underlying reader.
    pub fn reader(&self) -> &R {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::mock::{Fault, MockCard, MockCardReader};
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use platescan_core::UserId;

    const UID: [u8; 4] = [0x04, 0xAB, 0xCD, 0xEF];

    fn record(user: u8, items: &[u8]) -> MenuRecord {
        MenuRecord::with_items(UserId::new(user).unwrap(), items).unwrap()
    }

    fn session() -> (
        CardSession<MockCardReader, NoopDelay>,
        crate::mock::MockCardHandle,
    ) {
        let (reader, handle) = MockCardReader::new();
        (CardSession::new(reader, NoopDelay::new()), handle)
    }

    #[test]
    fn test_no_tap_polls_false() {
        let (mut session, _handle) = session();
        assert!(!session.is_card_present());
        assert!(!session.is_card_present());
    }

    #[test]
    fn test_single_tap_reported_once() {
        let (mut session, handle) = session();
        handle.present(MockCard::blank(UID.to_vec()));

        assert!(session.is_card_present());
        assert!(!session.is_card_present());
        assert!(!session.is_card_present());
    }

    #[test]
    fn test_reset_discovery_rearms() {
        let (mut session, handle) = session();
        handle.set_auto_remove(Some(2));
        handle.present(MockCard::blank(UID.to_vec()));

        assert!(session.is_card_present());
        session.wait_for_removal();
        session.reset_discovery();
        assert!(!session.is_card_present());
        assert_eq!(handle.discovery_restarts(), 1);

        handle.present(MockCard::blank(UID.to_vec()));
        assert!(session.is_card_present());
    }

    #[test]
    fn test_wait_for_removal_blocks_until_lifted() {
        let (mut session, handle) = session();
        handle.set_auto_remove(Some(3));
        handle.present(MockCard::blank(UID.to_vec()));

        session.wait_for_removal();
        assert!(!handle.in_field());
        assert_eq!(handle.presence_checks(), 4);
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let (mut session, handle) = session();
        handle.present(MockCard::blank(UID.to_vec()));

        let written = record(1, &[1, 56, 80]);
        session.write_record(&written).unwrap();
        let read = session.read_record().unwrap();

        assert_eq!(read, written);
    }

    #[test]
    fn test_full_record_round_trip() {
        let (mut session, handle) = session();
        handle.present(MockCard::blank(UID.to_vec()));

        let written = record(200, &[9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 255, 128]);
        session.write_record(&written).unwrap();
        assert_eq!(session.read_record().unwrap(), written);
    }

    #[test]
    fn test_blank_card_is_unrecognized() {
        let (mut session, handle) = session();
        handle.present(MockCard::blank(UID.to_vec()));

        let mut current = Some(record(5, &[1]));
        match session.read_record() {
            Ok(r) => current = Some(r),
            Err(e) => assert!(matches!(e, CardError::Unrecognized)),
        }
        assert_eq!(current, Some(record(5, &[1])));
    }

    #[test]
    fn test_wrong_key_is_authentication_error() {
        let (mut session, handle) = session();
        handle.present(MockCard::blank(UID.to_vec()).with_key(MifareKey::new([0; 6])));

        assert!(matches!(
            session.read_record(),
            Err(CardError::Authentication { block: 4 })
        ));
    }

    #[test]
    fn test_read_fault_is_transport_error() {
        let (mut session, handle) = session();
        handle.present(MockCard::with_record(UID.to_vec(), &record(1, &[1])));
        handle.inject_fault(Fault::Read);

        assert!(matches!(
            session.read_record(),
            Err(CardError::Transport(_))
        ));
    }

    #[test]
    fn test_failed_write_leaves_block_unchanged() {
        for fault in [Fault::Authenticate, Fault::WriteCommand, Fault::WriteData] {
            let (mut session, handle) = session();
            let original = record(2, &[3, 4]);
            handle.present(MockCard::with_record(UID.to_vec(), &original));
            handle.inject_fault(fault);

            assert!(session.write_record(&record(9, &[9, 9, 9])).is_err());
            assert_eq!(session.read_record().unwrap(), original);
        }
    }

    #[test]
    fn test_custom_block() {
        let (reader, handle) = MockCardReader::new();
        let mut session = CardSession::new(reader, NoopDelay::new()).with_block(5);
        handle.present(MockCard::blank(UID.to_vec()));

        let written = record(3, &[1]);
        session.write_record(&written).unwrap();
        assert_eq!(handle.card_block(5), Some(written.to_block()));
        assert_eq!(handle.card_block(4), Some([0u8; 16]));
    }

    #[test]
    fn test_read_without_card_is_transport_error() {
        let (mut session, _handle) = session();
        assert!(matches!(
            session.read_record(),
            Err(CardError::Transport(_))
        ));
    }
}
