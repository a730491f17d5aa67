//! PlateScan station, host build.
//!
//! Runs the station firmware on a workstation: the scanner, card reader and
//! start button are simulated and driven from the console, the display is
//! drawn in the terminal, and telemetry goes to the configured IoT hub over
//! MQTT/TLS.
//!
//! ```text
//! platescan [config.toml]
//! ```
//!
//! The configuration path defaults to `$PLATESCAN_CONFIG`, then
//! `platescan.toml`.

mod console;
mod terminal;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use platescan_cloud::mqtt::MqttTransport;
use platescan_cloud::{Channel, ChannelSettings, Clock, SystemClock, TokenManager};
use platescan_core::Config;
use platescan_firmware::{SessionController, StartSignal, VirtualDisplay};
use platescan_hardware::mock::{MockCardReader, SimulatedScanner};
use platescan_hardware::{BusClient, CardSession};
use tracing::{error, info};

use console::{Console, HELP};
use terminal::{StdDelay, TerminalDisplay};

const CONFIG_ENV: &str = "PLATESCAN_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "platescan.toml";

fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(CONFIG_ENV))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Wait until the wall clock can be trusted for token expiry.
fn wait_for_clock(clock: &impl Clock) {
    while clock.now().is_none() {
        info!("Waiting for clock synchronization");
        thread::sleep(Duration::from_secs(1));
    }
}

/// Park the station for good.
fn halt() -> ! {
    error!("Station halted");
    loop {
        thread::park();
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let path = config_path();
    let config = Config::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    info!(device_id = %config.device.device_id, hub = %config.hub.host, "Configuration loaded");

    let clock = SystemClock;
    wait_for_clock(&clock);

    // Scanner
    let (scanner, scanner_handle) = SimulatedScanner::new(config.bus.address);
    let mut bus = BusClient::new(scanner, config.bus.address);
    if let Err(e) = bus.probe() {
        error!(error = %e, "Scanner bus initialization failed");
        halt();
    }
    info!(address = %format!("0x{:02X}", config.bus.address), "Scanner found");

    // Card reader
    let (reader, card_handle) = MockCardReader::new();
    let removal_poll_ms = u32::try_from(config.card.removal_poll_ms).unwrap_or(u32::MAX);
    let cards = CardSession::new(reader, StdDelay)
        .with_block(config.card.block)
        .with_removal_poll_ms(removal_poll_ms);

    // Cloud channel
    let tokens = TokenManager::new(
        clock,
        &config.hub.host,
        &config.device.device_id,
        &config.device.device_key,
    )
    .context("Invalid device key")?;
    let transport = MqttTransport::new(config.hub.host.clone(), config.hub.port)
        .with_keep_alive(Duration::from_secs(config.hub.keep_alive_secs));
    let channel = Channel::new(
        transport,
        tokens,
        StdDelay,
        ChannelSettings::from_config(&config),
    );

    // Start button
    let signal = Arc::new(StartSignal::new(Duration::from_millis(
        config.session.debounce_ms,
    )));

    let console = Console {
        cards: card_handle,
        scanner: scanner_handle,
        signal: Arc::clone(&signal),
    };
    thread::Builder::new()
        .name("console".into())
        .spawn(move || console.run(io::stdin().lock()))
        .context("Failed to start console thread")?;
    println!("{HELP}");

    let display = VirtualDisplay::builder()
        .with_size(config.display.lines, config.display.columns)
        .build();
    let mut controller = SessionController::new(
        bus,
        cards,
        TerminalDisplay::new(),
        channel,
        signal,
        config.device.device_id.clone(),
    )
    .with_display(display);

    info!("Station running");
    let interval = Duration::from_millis(config.session.loop_interval_ms);
    loop {
        controller.tick();
        thread::sleep(interval);
    }
}
