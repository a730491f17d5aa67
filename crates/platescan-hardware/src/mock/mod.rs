//! Simulated peripherals for host builds and tests.
//!
//! Every device comes paired with a cloneable handle sharing its state, so
//! tests (or the host binary's input thread) can drive the hardware while
//! the control loop owns the device itself.

pub mod card;
pub mod display;
pub mod scanner;

pub use card::{Fault, MockCard, MockCardHandle, MockCardReader};
pub use display::{MockDisplay, MockDisplayHandle};
pub use scanner::{NO_RESULT, ScannerHandle, SimulatedBusError, SimulatedScanner};
