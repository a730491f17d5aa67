//! Peripheral layer for the PlateScan station.
//!
//! The station talks to three peripherals:
//!
//! - the **scanner**, a bus slave answering framed requests
//!   ([`bus::BusClient`] over any [`embedded_hal::i2c::I2c`]),
//! - the **NFC reader**, holding the user's card ([`traits::CardReader`],
//!   wrapped by [`card::CardSession`]),
//! - the **status display** ([`traits::DisplayPanel`]).
//!
//! Everything here is synchronous and generic over the `embedded-hal` 1.0
//! traits, so the same code runs against real drivers on the device and
//! against the simulations in [`mock`] on a host.
//!
//! # Example
//!
//! ```
//! use embedded_hal_mock::eh1::delay::NoopDelay;
//! use platescan_core::{MenuRecord, UserId};
//! use platescan_hardware::{BusClient, BusCommand, CardSession};
//! use platescan_hardware::mock::{MockCard, MockCardReader, SimulatedScanner};
//!
//! let (scanner, scan) = SimulatedScanner::new(0x10);
//! let mut bus = BusClient::new(scanner, 0x10);
//! bus.probe().unwrap();
//!
//! let (reader, field) = MockCardReader::new();
//! let mut cards = CardSession::new(reader, NoopDelay::new());
//!
//! let record = MenuRecord::with_items(UserId::new(7).unwrap(), &[3, 14]).unwrap();
//! field.present(MockCard::with_record(vec![1, 2, 3, 4], &record));
//! assert!(cards.is_card_present());
//! assert_eq!(cards.read_record().unwrap().user_id().as_u8(), 7);
//!
//! bus.command(BusCommand::StartScan).unwrap();
//! scan.complete_scan(0.3);
//! assert_eq!(bus.request::<f32>(BusCommand::GetResult), Some(0.3));
//! ```

pub mod bus;
pub mod card;
pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod traits;
pub mod types;

pub use bus::{BusClient, BusCommand, BusValue};
pub use card::CardSession;
pub use error::{CardError, HardwareError, Result};
pub use traits::{CardReader, DisplayPanel};
pub use types::{MifareKey, ReaderInfo};
