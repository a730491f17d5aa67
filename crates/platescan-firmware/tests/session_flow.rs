//! Complete station sessions over simulated peripherals and a mock broker.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use embedded_hal_mock::eh1::delay::NoopDelay;
use platescan_cloud::mock::{MockBrokerHandle, MockTransport};
use platescan_cloud::{Channel, ChannelSettings, ManualClock, TokenManager};
use platescan_core::{Config, MenuRecord, UserId};
use platescan_firmware::{SessionController, SessionState, StartSignal, VirtualDisplay};
use platescan_hardware::mock::{
    MockCard, MockCardHandle, MockCardReader, MockDisplay, MockDisplayHandle, ScannerHandle,
    SimulatedScanner,
};
use platescan_hardware::{BusClient, CardSession};
use rstest::rstest;
use serde_json::{Value, json};

const CONFIG: &str = r#"
[device]
device_id = "LabDevice1"
device_key = "c2VjcmV0a2V5"

[hub]
host = "platescan.azure-devices.net"
"#;

const TELEMETRY_TOPIC: &str = "devices/LabDevice1/messages/events/";

type Link = Channel<MockTransport, ManualClock, NoopDelay>;

type Controller =
    SessionController<SimulatedScanner, MockCardReader, NoopDelay, MockDisplay, Link>;

struct Station {
    controller: Controller,
    signal: Arc<StartSignal>,
    scanner: ScannerHandle,
    cards: MockCardHandle,
    panel: MockDisplayHandle,
    broker: MockBrokerHandle,
}

impl Station {
    fn new() -> Self {
        let config = Config::from_toml_str(CONFIG).unwrap();

        let (scanner, scanner_handle) = SimulatedScanner::new(config.bus.address);
        let mut bus = BusClient::new(scanner, config.bus.address);
        bus.probe().unwrap();

        let (reader, cards) = MockCardReader::new();
        cards.set_auto_remove(Some(0));
        let card_session = CardSession::new(reader, NoopDelay::new()).with_block(config.card.block);

        let (panel, panel_handle) = MockDisplay::new();

        let clock = ManualClock::at(Utc.with_ymd_and_hms(2024, 11, 4, 12, 0, 0).unwrap());
        let tokens = TokenManager::new(
            clock,
            &config.hub.host,
            &config.device.device_id,
            &config.device.device_key,
        )
        .unwrap();
        let (transport, broker) = MockTransport::new();
        let channel = Channel::new(
            transport,
            tokens,
            NoopDelay::new(),
            ChannelSettings::from_config(&config),
        );

        let signal = Arc::new(StartSignal::new(Duration::ZERO));
        let controller = SessionController::new(
            bus,
            card_session,
            panel,
            channel,
            Arc::clone(&signal),
            config.device.device_id.clone(),
        )
        .with_display(VirtualDisplay::new(
            config.display.lines,
            config.display.columns,
            "TAP YOUR CARD",
        ));

        Self {
            controller,
            signal,
            scanner: scanner_handle,
            cards,
            panel: panel_handle,
            broker,
        }
    }

    /// Tick and check the invariants that must hold after every iteration.
    fn tick(&mut self) -> SessionState {
        let state = self.controller.tick();
        if state == SessionState::ConfirmResult {
            assert!(self.controller.percentage().is_some());
        }
        if state != SessionState::Idle {
            assert!(self.controller.record().is_some());
        }
        state
    }

    fn telemetry(&self) -> Vec<Value> {
        self.broker
            .published()
            .into_iter()
            .filter(|(topic, _)| topic == TELEMETRY_TOPIC)
            .filter_map(|(_, payload)| serde_json::from_slice::<Value>(&payload).ok())
            .filter(|value| value.is_object())
            .collect()
    }

    fn run_session(&mut self, card: MockCard, result: f32) {
        self.cards.present(card);
        assert_eq!(self.tick(), SessionState::ConfirmScan);

        self.signal.trigger();
        assert_eq!(self.tick(), SessionState::Scanning);

        self.scanner.complete_scan(result);
        assert_eq!(self.tick(), SessionState::ConfirmResult);

        assert!(self.cards.present_last());
        assert_eq!(self.tick(), SessionState::Idle);
    }
}

fn card(user: u8, items: &[u8]) -> MockCard {
    let record = MenuRecord::with_items(UserId::new(user).unwrap(), items).unwrap();
    MockCard::with_record(vec![0x04, user, 0x5A, 0xA5], &record)
}

#[test]
fn test_session_publishes_telemetry() {
    let mut station = Station::new();
    assert_eq!(station.tick(), SessionState::Idle);
    assert!(station.broker.is_connected());

    station.run_session(card(1, &[1, 56, 80]), 0.61);

    assert_eq!(
        station.telemetry(),
        vec![json!({"UserID": 1, "Rating": 0.61, "DeviceID": "LabDevice1", "Menu": [1, 56, 80]})]
    );
    assert!(station.panel.has_shown("THANK YOU"));
}

#[rstest]
#[case(0.60, "RATING 5/5")]
#[case(0.599_999, "RATING 4/5")]
#[case(0.48, "RATING 4/5")]
#[case(0.36, "RATING 3/5")]
#[case(0.24, "RATING 2/5")]
#[case(0.239_999, "RATING 1/5")]
#[case(0.0, "RATING 1/5")]
fn test_rating_boundaries(#[case] result: f32, #[case] rating_line: &str) {
    let mut station = Station::new();
    station.run_session(card(3, &[9]), result);

    assert!(station.panel.has_shown(rating_line));

    // The hub receives the measured fraction, not the level.
    let telemetry = station.telemetry();
    assert_eq!(telemetry.len(), 1);
    assert!(telemetry[0]["Rating"].is_f64());
    assert_eq!(telemetry[0]["Rating"].as_f64().unwrap() as f32, result);
}

#[test]
fn test_scanning_only_entered_from_confirm_scan() {
    let mut station = Station::new();

    // Start presses with no card loaded never start a scan.
    for _ in 0..3 {
        station.signal.trigger();
        assert_eq!(station.tick(), SessionState::Idle);
    }
    assert_eq!(station.scanner.start_count(), 0);

    station.run_session(card(2, &[5, 6]), 0.3);
    station.run_session(card(4, &[]), 0.7);

    let history = station.controller.machine().history();
    assert_eq!(history.len(), 8);
    for transition in history {
        if transition.to == SessionState::Scanning {
            assert_eq!(transition.from, SessionState::ConfirmScan);
        }
        if transition.to == SessionState::ConfirmResult {
            assert_eq!(transition.from, SessionState::Scanning);
        }
    }
    assert_eq!(station.telemetry().len(), 2);
}

#[test]
fn test_result_never_confirmed_without_value() {
    let mut station = Station::new();
    station.cards.present(card(5, &[1]));
    station.tick();
    station.signal.trigger();
    station.tick();

    // Scanner reports done before a result is ready.
    station.scanner.complete_scan(-1.0);
    for _ in 0..5 {
        assert_eq!(station.tick(), SessionState::Scanning);
    }

    // A tap while scanning is not a confirmation.
    station.cards.present(card(5, &[1]));
    assert_eq!(station.tick(), SessionState::Scanning);
    station.cards.remove();

    station.scanner.set_result(0.42);
    assert_eq!(station.tick(), SessionState::ConfirmResult);
}

#[test]
fn test_cancel_publishes_nothing() {
    let mut station = Station::new();
    station.cards.present(card(6, &[2]));
    assert_eq!(station.tick(), SessionState::ConfirmScan);

    station.cards.present_last();
    assert_eq!(station.tick(), SessionState::Idle);
    assert!(station.telemetry().is_empty());
    assert_eq!(station.scanner.start_count(), 0);
}

#[test]
fn test_foreign_card_then_valid_card() {
    let mut station = Station::new();
    station.cards.present(MockCard::blank(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    assert_eq!(station.tick(), SessionState::Idle);
    assert!(station.panel.has_shown("UNKNOWN CARD"));
    assert!(station.controller.record().is_none());

    station.run_session(card(8, &[11, 12]), 0.5);
    assert_eq!(station.telemetry()[0]["UserID"], json!(8));
}

#[test]
fn test_enrollment_over_cloud_command() {
    let mut station = Station::new();
    station.tick();

    station.broker.send_to_device(
        "devices/LabDevice1/messages/devicebound/",
        br#"{"UserID": 21, "Menu": [7, 14, 21]}"#.to_vec(),
    );
    station.tick();
    assert!(station.panel.has_shown("ENROLL USER 21"));

    station.cards.present(MockCard::blank(vec![0x10, 0x20, 0x30, 0x40]));
    assert_eq!(station.tick(), SessionState::Idle);
    assert!(station.panel.has_shown("CARD ENROLLED"));

    station.cards.present_last();
    assert_eq!(station.tick(), SessionState::ConfirmScan);
    station.signal.trigger();
    station.tick();
    station.scanner.complete_scan(0.37);
    station.tick();
    station.cards.present_last();
    station.tick();

    assert_eq!(
        station.telemetry(),
        vec![json!({"UserID": 21, "Rating": 0.37, "DeviceID": "LabDevice1", "Menu": [7, 14, 21]})]
    );
}

#[test]
fn test_reconnects_after_broker_drop() {
    let mut station = Station::new();
    station.tick();

    station.broker.drop_connection();
    station.broker.fail_next_connects(2);
    station.run_session(card(9, &[1]), 0.9);

    assert!(station.broker.is_connected());
    assert_eq!(station.telemetry().len(), 1);
    assert_eq!(station.broker.connect_attempts(), 4);
}
