//! PlateScan station firmware.
//!
//! Ties the peripherals and the cloud channel together into the station's
//! scan workflow: a validated [`StateMachine`], the [`VirtualDisplay`] the
//! loop draws into, the debounced [`StartSignal`] and the
//! [`SessionController`] that runs one loop iteration per tick.

pub mod display;
pub mod session;
pub mod signal;
pub mod state_machine;

pub use display::{Alignment, VirtualDisplay, VirtualDisplayBuilder, align_text, truncate_text};
pub use session::SessionController;
pub use signal::StartSignal;
pub use state_machine::{SessionState, StateMachine, StateTransition};
