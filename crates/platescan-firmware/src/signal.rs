//! Debounced start-button signal.
//!
//! The button side calls [`StartSignal::trigger`] (from an interrupt handler
//! on the target, from the stdin thread on the host); the control loop
//! consumes the request with [`StartSignal::take`]. The two sides share
//! nothing but atomics, so the signal can sit in an `Arc` and be triggered
//! from any thread.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::trace;

/// Marker for "never triggered".
const NEVER: u64 = u64::MAX;

/// One-slot start request flag with a minimum re-trigger interval.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use platescan_firmware::StartSignal;
///
/// let signal = StartSignal::new(Duration::from_millis(200));
/// assert!(!signal.take());
///
/// signal.trigger();
/// assert!(signal.take());
/// assert!(!signal.take());
/// ```
#[derive(Debug)]
pub struct StartSignal {
    requested: AtomicBool,
    last_trigger_ms: AtomicU64,
    debounce_ms: u64,
    epoch: Instant,
}

impl StartSignal {
    pub fn new(debounce: Duration) -> Self {
        Self {
            requested: AtomicBool::new(false),
            last_trigger_ms: AtomicU64::new(NEVER),
            debounce_ms: u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX),
            epoch: Instant::now(),
        }
    }

    /// Register a button press now.
    ///
    /// Returns `false` if the press fell inside the debounce window and was
    /// ignored.
    pub fn trigger(&self) -> bool {
        let now_ms = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.trigger_at(now_ms)
    }

    /// Register a press at `now_ms` milliseconds after the signal was created.
    ///
    /// The first press is always accepted.
    pub fn trigger_at(&self, now_ms: u64) -> bool {
        let last = self.last_trigger_ms.load(Ordering::Acquire);
        if last != NEVER && now_ms.saturating_sub(last) < self.debounce_ms {
            trace!(now_ms, last, "Start press debounced");
            return false;
        }

        self.last_trigger_ms.store(now_ms, Ordering::Release);
        self.requested.store(true, Ordering::Release);
        true
    }

    /// Read and clear the pending request.
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::AcqRel)
    }

    /// Whether a request is pending, without consuming it.
    pub fn is_pending(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

impl Default for StartSignal {
    fn default() -> Self {
        Self::new(Duration::from_millis(
            platescan_core::constants::DEFAULT_DEBOUNCE_MS,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;
    use std::thread;

    fn signal() -> StartSignal {
        StartSignal::new(Duration::from_millis(200))
    }

    #[test]
    fn test_take_clears_request() {
        let signal = signal();
        assert!(signal.trigger_at(0));
        assert!(signal.is_pending());
        assert!(signal.take());
        assert!(!signal.is_pending());
        assert!(!signal.take());
    }

    #[rstest]
    #[case(1, false)]
    #[case(199, false)]
    #[case(200, true)]
    #[case(5_000, true)]
    fn test_debounce_window(#[case] second_press_ms: u64, #[case] accepted: bool) {
        let signal = signal();
        assert!(signal.trigger_at(1_000));
        signal.take();

        assert_eq!(signal.trigger_at(1_000 + second_press_ms), accepted);
        assert_eq!(signal.take(), accepted);
    }

    #[test]
    fn test_bounce_does_not_extend_window() {
        let signal = signal();
        assert!(signal.trigger_at(0));
        assert!(!signal.trigger_at(150));
        assert!(signal.trigger_at(210));
    }

    #[test]
    fn test_presses_coalesce_until_taken() {
        let signal = signal();
        signal.trigger_at(0);
        signal.trigger_at(500);
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn test_trigger_from_other_thread() {
        let signal = Arc::new(signal());
        let remote = Arc::clone(&signal);

        thread::spawn(move || remote.trigger())
            .join()
            .unwrap();

        assert!(signal.take());
    }
}
