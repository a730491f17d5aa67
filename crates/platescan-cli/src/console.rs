//! Operator console for the simulated peripherals.
//!
//! Each line read from stdin is one command:
//!
//! ```text
//! tap <user> [items...]   place a card carrying a record in the field
//! blank                   place a blank card in the field
//! again                   place the last card back in the field
//! remove                  lift the card out of the field
//! start                   press the start button
//! result <fraction>       finish the running scan with a result
//! offline | online        take the scanner off the bus or put it back
//! help                    list commands
//! ```

use std::io::BufRead;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use platescan_core::{ItemCode, MenuRecord, UserId};
use platescan_firmware::StartSignal;
use platescan_hardware::mock::{MockCard, MockCardHandle, ScannerHandle};
use tracing::{info, warn};

pub const HELP: &str = "\
commands:
  tap <user> [items...]   present a card with a record
  blank                   present a blank card
  again                   present the last card again
  remove                  lift the card away
  start                   press the start button
  result <fraction>       finish the scan (0.0 - 1.0)
  offline | online        unplug or replug the scanner
  help                    show this text";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Tap(MenuRecord),
    Blank,
    Again,
    Remove,
    Start,
    Result(f32),
    Online(bool),
    Help,
}

impl Command {
    /// Parse a console line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "tap" => {
                let user: u8 = words
                    .next()
                    .ok_or_else(|| anyhow!("usage: tap <user> [items...]"))?
                    .parse()
                    .context("user id must be 1-255")?;
                let items = words
                    .map(|word| word.parse::<ItemCode>())
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .context("item codes must be 0-255")?;
                Self::Tap(MenuRecord::with_items(UserId::new(user)?, &items)?)
            }
            "blank" => Self::Blank,
            "again" => Self::Again,
            "remove" => Self::Remove,
            "start" => Self::Start,
            "result" => {
                let value: f32 = words
                    .next()
                    .ok_or_else(|| anyhow!("usage: result <fraction>"))?
                    .parse()
                    .context("result must be a number")?;
                Self::Result(value)
            }
            "offline" => Self::Online(false),
            "online" => Self::Online(true),
            "help" | "?" => Self::Help,
            other => bail!("unknown command '{other}', try 'help'"),
        };
        Ok(Some(command))
    }
}

/// Handles to everything the operator can touch.
#[derive(Clone)]
pub struct Console {
    pub cards: MockCardHandle,
    pub scanner: ScannerHandle,
    pub signal: Arc<StartSignal>,
}

impl Console {
    pub fn apply(&self, command: Command) {
        match command {
            Command::Tap(record) => {
                let uid = vec![0x04, record.user_id().as_u8(), 0xC0, 0xDE];
                info!(%record, "Card presented");
                self.cards.present(MockCard::with_record(uid, &record));
            }
            Command::Blank => {
                info!("Blank card presented");
                self.cards.present(MockCard::blank(vec![0x04, 0x00, 0xB1, 0xA4]));
            }
            Command::Again => {
                if !self.cards.present_last() {
                    warn!("No card has been presented yet");
                }
            }
            Command::Remove => self.cards.remove(),
            Command::Start => {
                if !self.signal.trigger() {
                    info!("Start press ignored (debounce)");
                }
            }
            Command::Result(value) => self.scanner.complete_scan(value),
            Command::Online(online) => self.scanner.set_online(online),
            Command::Help => println!("{HELP}"),
        }
    }

    /// Read commands until stdin closes.
    pub fn run(self, input: impl BufRead) {
        for line in input.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Console input failed");
                    break;
                }
            };

            match Command::parse(&line) {
                Ok(Some(command)) => self.apply(command),
                Ok(None) => {}
                Err(e) => println!("{e:#}"),
            }
        }
        info!("Console closed");
    }
}
