//! Mock display capturing every frame it is asked to show.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::{HardwareError, Result, traits::DisplayPanel};

#[derive(Debug, Default)]
struct Panel {
    frames: Vec<Vec<String>>,
    fail: bool,
}

fn lock(panel: &Mutex<Panel>) -> MutexGuard<'_, Panel> {
    panel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Display panel that records frames instead of driving a screen.
#[derive(Debug)]
pub struct MockDisplay {
    panel: Arc<Mutex<Panel>>,
}

impl MockDisplay {
    pub fn new() -> (Self, MockDisplayHandle) {
        let panel = Arc::new(Mutex::new(Panel::default()));
        (
            Self {
                panel: Arc::clone(&panel),
            },
            MockDisplayHandle { panel },
        )
    }
}

impl DisplayPanel for MockDisplay {
    fn show(&mut self, lines: &[String]) -> Result<()> {
        let mut panel = lock(&self.panel);
        if panel.fail {
            return Err(HardwareError::disconnected("display"));
        }
        panel.frames.push(lines.to_vec());
        Ok(())
    }
}

/// Handle for inspecting a [`MockDisplay`].
#[derive(Debug, Clone)]
pub struct MockDisplayHandle {
    panel: Arc<Mutex<Panel>>,
}

impl MockDisplayHandle {
    /// Most recently shown frame.
    pub fn last_frame(&self) -> Option<Vec<String>> {
        lock(&self.panel).frames.last().cloned()
    }

    /// All frames shown so far, oldest first.
    pub fn frames(&self) -> Vec<Vec<String>> {
        lock(&self.panel).frames.clone()
    }

    pub fn frame_count(&self) -> usize {
        lock(&self.panel).frames.len()
    }

    /// Whether any frame so far contained `text` on some line.
    pub fn has_shown(&self, text: &str) -> bool {
        lock(&self.panel)
            .frames
            .iter()
            .any(|frame| frame.iter().any(|line| line.contains(text)))
    }

    /// Make subsequent `show` calls fail.
    pub fn set_failing(&self, fail: bool) {
        lock(&self.panel).fail = fail;
    }
}
