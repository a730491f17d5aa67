//! Hardware device trait definitions.
//!
//! These traits establish the contract between the session controller and
//! the peripherals it drives that are not covered by `embedded-hal`: the NFC
//! reader and the status display. The scanner bus uses
//! [`embedded_hal::i2c::I2c`] directly.
//!
//! All methods are synchronous. The station runs a single cooperative
//! control loop, so every call here is expected to complete within one
//! iteration; the only deliberate blocking wait (card removal) is built on
//! top of [`CardReader::is_tag_present`] by [`CardSession`](crate::card::CardSession).

use crate::error::Result;
use crate::types::{MifareKey, ReaderInfo};

/// Contactless reader capability (PN7150 class NCI controller).
///
/// The physical protocol stack (anti-collision, ISO14443 activation, Mifare
/// crypto) lives behind this trait.
///
/// # Examples
///
/// ```
/// use platescan_hardware::traits::CardReader;
/// use platescan_hardware::types::MifareKey;
/// use platescan_hardware::error::Result;
///
/// fn dump_block<R: CardReader>(reader: &mut R, block: u8) -> Result<[u8; 16]> {
///     reader.authenticate(block, &MifareKey::default())?;
///     reader.read_block(block)
/// }
/// ```
pub trait CardReader {
    /// Non-blocking discovery poll.
    ///
    /// Returns `true` when discovery has activated a tag. Stays `true` while
    /// the activated tag remains in the field; discovery has to be restarted
    /// with [`restart_discovery`](CardReader::restart_discovery) to sense a
    /// new tap.
    fn poll_tag(&mut self) -> Result<bool>;

    /// Check whether the activated tag is still in the field.
    fn is_tag_present(&mut self) -> Result<bool>;

    /// Authenticate the sector containing `block` with key A.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::AuthenticationFailed` if the card rejects the
    /// key, `HardwareError::NoCard` if no tag is active.
    fn authenticate(&mut self, block: u8, key: &MifareKey) -> Result<()>;

    /// Read one 16 byte block from an authenticated sector.
    fn read_block(&mut self, block: u8) -> Result<[u8; 16]>;

    /// Write one 16 byte block to an authenticated sector.
    ///
    /// Mifare writes are two exchanges (write command, then data). The card
    /// only commits after the data phase is acknowledged, so a failure in
    /// either phase leaves the block unchanged.
    fn write_block(&mut self, block: u8, data: &[u8; 16]) -> Result<()>;

    /// Reset the controller and restart discovery.
    fn restart_discovery(&mut self) -> Result<()>;

    /// Get reader information.
    fn reader_info(&self) -> ReaderInfo;
}

/// Character display the status buffer is flushed to.
pub trait DisplayPanel {
    /// Replace the panel contents with `lines`.
    fn show(&mut self, lines: &[String]) -> Result<()>;
}

impl<T: CardReader + ?Sized> CardReader for &mut T {
    fn poll_tag(&mut self) -> Result<bool> {
        (**self).poll_tag()
    }

    fn is_tag_present(&mut self) -> Result<bool> {
        (**self).is_tag_present()
    }

    fn authenticate(&mut self, block: u8, key: &MifareKey) -> Result<()> {
        (**self).authenticate(block, key)
    }

    fn read_block(&mut self, block: u8) -> Result<[u8; 16]> {
        (**self).read_block(block)
    }

    fn write_block(&mut self, block: u8, data: &[u8; 16]) -> Result<()> {
        (**self).write_block(block, data)
    }

    fn restart_discovery(&mut self) -> Result<()> {
        (**self).restart_discovery()
    }

    fn reader_info(&self) -> ReaderInfo {
        (**self).reader_info()
    }
}

impl<T: DisplayPanel + ?Sized> DisplayPanel for Box<T> {
    fn show(&mut self, lines: &[String]) -> Result<()> {
        (**self).show(lines)
    }
}
