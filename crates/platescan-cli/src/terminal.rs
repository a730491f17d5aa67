//! Host stand-ins for the display and the delay timer.

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use platescan_hardware::{DisplayPanel, HardwareError};

/// Draws the status display as a framed block on stdout.
///
/// Only frames that differ from the previous one are drawn.
#[derive(Debug, Default)]
pub struct TerminalDisplay {
    last: Vec<String>,
}

impl TerminalDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplayPanel for TerminalDisplay {
    fn show(&mut self, lines: &[String]) -> platescan_hardware::Result<()> {
        if lines == self.last.as_slice() {
            return Ok(());
        }

        let width = lines.iter().map(|line| line.len()).max().unwrap_or(0);
        let border = format!("+{}+", "-".repeat(width));

        let mut out = io::stdout().lock();
        let mut draw = || -> io::Result<()> {
            writeln!(out, "{border}")?;
            for line in lines {
                writeln!(out, "|{line:width$}|")?;
            }
            writeln!(out, "{border}")?;
            out.flush()
        };
        draw().map_err(|e| HardwareError::communication(format!("terminal: {e}")))?;

        self.last = lines.to_vec();
        Ok(())
    }
}

/// Delay backed by `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
