//! Session controller.
//!
//! Owns every peripheral and runs one control loop iteration per
//! [`tick`](SessionController::tick):
//!
//! 1. Poll the scanner for the latest result and the scanning flag.
//! 2. Service the cloud link and handle inbound commands.
//! 3. Dispatch on the current [`SessionState`].
//! 4. Render the display buffer once.
//!
//! ```text
//!          tap (record ok)         start pressed
//!   Idle ─────────────────► ConfirmScan ─────────► Scanning
//!    ▲  ◄─────────────────────┘ tap (cancel)          │
//!    │                                                │ scan done, result valid
//!    └──────────── tap (confirm, publish) ◄──── ConfirmResult
//! ```
//!
//! Every branch that handles a tap renders its feedback, waits for the card
//! to leave the field, then re-arms discovery, so one physical tap is never
//! seen twice.

use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use platescan_cloud::transport::InboundMessage;
use platescan_cloud::{EnrollmentRequest, TelemetryLink, TelemetryRecord};
use platescan_core::{MenuRecord, RatingLevel};
use platescan_hardware::{BusClient, BusCommand, CardReader, CardSession, DisplayPanel};
use tracing::{debug, error, info, trace, warn};

use crate::display::VirtualDisplay;
use crate::signal::StartSignal;
use crate::state_machine::{SessionState, StateMachine};

/// The station's control loop state and peripherals.
pub struct SessionController<I, R, D, P, L> {
    bus: BusClient<I>,
    cards: CardSession<R, D>,
    panel: P,
    link: L,
    signal: Arc<StartSignal>,
    machine: StateMachine,
    display: VirtualDisplay,
    device_id: String,
    record: Option<MenuRecord>,
    percentage: Option<f32>,
    scanning: bool,
    pending_enrollment: Option<MenuRecord>,
    status: Option<String>,
}

impl<I, R, D, P, L> SessionController<I, R, D, P, L>
where
    I: I2c,
    R: CardReader,
    D: DelayNs,
    P: DisplayPanel,
    L: TelemetryLink,
{
    pub fn new(
        bus: BusClient<I>,
        cards: CardSession<R, D>,
        panel: P,
        link: L,
        signal: Arc<StartSignal>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            cards,
            panel,
            link,
            signal,
            machine: StateMachine::new(),
            display: VirtualDisplay::builder().build(),
            device_id: device_id.into(),
            record: None,
            percentage: None,
            scanning: false,
            pending_enrollment: None,
            status: None,
        }
    }

    /// Use a display buffer of a different size.
    pub fn with_display(mut self, display: VirtualDisplay) -> Self {
        self.display = display;
        self
    }

    /// Run one control loop iteration and return the resulting state.
    ///
    /// May block while a card is in the field or while the cloud link is
    /// down; everything else completes within the call.
    pub fn tick(&mut self) -> SessionState {
        self.poll_scanner();

        for message in self.link.service() {
            self.handle_command(&message);
        }

        // Presses outside ConfirmScan are dropped, not queued.
        let start_requested = self.signal.take();

        match *self.machine.current_state() {
            SessionState::Idle => self.on_idle(),
            SessionState::ConfirmScan => self.on_confirm_scan(start_requested),
            SessionState::Scanning => self.on_scanning(),
            SessionState::ConfirmResult => self.on_confirm_result(),
        }

        self.compose_screen();
        self.render();
        *self.machine.current_state()
    }

    pub fn state(&self) -> SessionState {
        *self.machine.current_state()
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Record of the card in the current session.
    pub fn record(&self) -> Option<&MenuRecord> {
        self.record.as_ref()
    }

    /// Latest valid scan result, if one has been read since the scan started.
    pub fn percentage(&self) -> Option<f32> {
        self.percentage
    }

    /// Record waiting to be written to the next tapped card.
    pub fn pending_enrollment(&self) -> Option<&MenuRecord> {
        self.pending_enrollment.as_ref()
    }

    pub fn display(&self) -> &VirtualDisplay {
        &self.display
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn signal(&self) -> &Arc<StartSignal> {
        &self.signal
    }

    fn poll_scanner(&mut self) {
        if let Some(value) = self.bus.request::<f32>(BusCommand::GetResult) {
            if (0.0..=1.0).contains(&value) {
                self.percentage = Some(value);
            } else {
                trace!(value, "No scan result available");
            }
        }

        if let Some(scanning) = self.bus.request::<bool>(BusCommand::IsScanning) {
            self.scanning = scanning;
        }
    }

    fn handle_command(&mut self, message: &InboundMessage) {
        debug!(topic = %message.topic, "Handling command");

        let request = match EnrollmentRequest::from_json(&message.payload) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Command is not an enrollment request");
                return;
            }
        };

        match request.into_record() {
            Ok(record) => {
                info!(user_id = %record.user_id(), items = record.item_count(), "Enrollment armed");
                self.pending_enrollment = Some(record);
            }
            Err(e) => warn!(error = %e, "Enrollment request rejected"),
        }
    }

    fn on_idle(&mut self) {
        if !self.cards.is_card_present() {
            return;
        }

        if let Some(record) = self.pending_enrollment.take() {
            self.enroll(record);
            return;
        }

        match self.cards.read_record() {
            Ok(record) => {
                let user_line = format!("USER {}", record.user_id());
                self.record = Some(record);
                self.percentage = None;
                self.enter(SessionState::ConfirmScan);
                self.finish_card_interaction(&["CARD ACCEPTED", &user_line, "REMOVE CARD"]);
            }
            Err(e) => {
                warn!(error = %e, "Card rejected");
                self.record = None;
                self.status = Some(e.display_text().to_string());
                self.finish_card_interaction(&[e.display_text(), "REMOVE CARD"]);
            }
        }
    }

    fn enroll(&mut self, record: MenuRecord) {
        let user_line = format!("USER {}", record.user_id());

        match self.cards.write_record(&record) {
            Ok(()) => {
                info!(user_id = %record.user_id(), "Card enrolled");
                self.status = Some("CARD ENROLLED".to_string());
                self.finish_card_interaction(&["CARD ENROLLED", &user_line, "REMOVE CARD"]);
            }
            Err(e) => {
                warn!(error = %e, "Enrollment write failed, keeping request");
                self.pending_enrollment = Some(record);
                self.status = Some("WRITE FAILED".to_string());
                self.finish_card_interaction(&["WRITE FAILED", "TRY AGAIN", "REMOVE CARD"]);
            }
        }
    }

    fn on_confirm_scan(&mut self, start_requested: bool) {
        if self.cards.is_card_present() {
            info!("Session cancelled by card tap");
            self.end_session();
            self.enter(SessionState::Idle);
            self.status = Some("CANCELLED".to_string());
            self.finish_card_interaction(&["CANCELLED", "REMOVE CARD"]);
            return;
        }

        if !start_requested {
            return;
        }

        match self.bus.command(BusCommand::StartScan) {
            Ok(()) => {
                info!("Scan started");
                self.percentage = None;
                self.scanning = true;
                self.enter(SessionState::Scanning);
            }
            Err(e) => {
                warn!(error = %e, "Scanner did not accept start command");
                self.status = Some("SCANNER ERROR".to_string());
            }
        }
    }

    fn on_scanning(&mut self) {
        if self.scanning {
            return;
        }

        if let Some(percentage) = self.percentage {
            info!(percentage, "Scan finished");
            self.enter(SessionState::ConfirmResult);
        }
    }

    fn on_confirm_result(&mut self) {
        if !self.cards.is_card_present() {
            return;
        }

        let (Some(record), Some(percentage)) = (self.record.take(), self.percentage.take()) else {
            error!("Result confirmed without a loaded session");
            self.end_session();
            self.machine.reset();
            self.finish_card_interaction(&["SESSION LOST", "REMOVE CARD"]);
            return;
        };

        let rating = RatingLevel::from_percentage(percentage);
        let telemetry = TelemetryRecord::new(&record, percentage, self.device_id.as_str());
        match self.link.send(&telemetry) {
            Ok(()) => info!(user_id = telemetry.user_id, rating = telemetry.rating, "Result published"),
            Err(e) => warn!(error = %e, "Result not published"),
        }

        self.enter(SessionState::Idle);
        self.status = Some("THANK YOU".to_string());
        let rating_line = format!("RATING {rating}");
        self.finish_card_interaction(&["THANK YOU", &rating_line, "REMOVE CARD"]);
    }

    fn enter(&mut self, state: SessionState) {
        let dwell = self.machine.time_in_current_state();
        match self.machine.transition_to(state) {
            Ok(transition) => {
                info!(
                    from = %transition.from,
                    to = %transition.to,
                    dwell_ms = u64::try_from(dwell.as_millis()).unwrap_or(u64::MAX),
                    "Session state changed"
                );
                self.status = None;
            }
            Err(e) => {
                error!(error = %e, "Illegal session transition, resetting");
                self.end_session();
                self.machine.reset();
            }
        }
    }

    fn end_session(&mut self) {
        self.record = None;
        self.percentage = None;
    }

    fn finish_card_interaction(&mut self, feedback: &[&str]) {
        self.display.show(feedback);
        self.render();
        self.cards.wait_for_removal();
        self.cards.reset_discovery();
    }

    fn compose_screen(&mut self) {
        let status = self.status.clone().unwrap_or_default();

        match *self.machine.current_state() {
            SessionState::Idle => {
                let enrollment = self
                    .pending_enrollment
                    .as_ref()
                    .map(|record| format!("ENROLL USER {}", record.user_id()))
                    .unwrap_or_default();
                self.display
                    .show(&["PLATESCAN", "TAP YOUR CARD", &enrollment, &status]);
            }
            SessionState::ConfirmScan => {
                let (user, items) = match &self.record {
                    Some(record) => (
                        format!("USER {}", record.user_id()),
                        format!("ITEMS: {}", record.item_count()),
                    ),
                    None => (String::new(), String::new()),
                };
                let hint = if status.is_empty() { "TAP TO CANCEL" } else { status.as_str() };
                self.display.show(&[&user, &items, "PRESS START", hint]);
            }
            SessionState::Scanning => {
                let user = self
                    .record
                    .as_ref()
                    .map(|record| format!("USER {}", record.user_id()))
                    .unwrap_or_default();
                self.display.show(&["SCANNING...", &user]);
            }
            SessionState::ConfirmResult => {
                let (result, rating) = match self.percentage {
                    Some(percentage) => (
                        format!("RESULT {:.0}%", percentage * 100.0),
                        format!("RATING {}", RatingLevel::from_percentage(percentage)),
                    ),
                    None => (String::new(), String::new()),
                };
                self.display.show(&[&result, &rating, "TAP TO CONFIRM"]);
            }
        }
    }

    fn render(&mut self) {
        if let Err(e) = self.panel.show(&self.display.frame()) {
            warn!(error = %e, "Display update failed");
        }
    }
}
