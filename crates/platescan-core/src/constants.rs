//! Station-wide constants.
//!
//! Values here describe fixed wire and storage formats shared by the firmware
//! crates: the card record layout, the scanner bus framing, the IoT Hub
//! topic scheme and the rating thresholds. Changing any of them breaks
//! compatibility with cards already written or with the scanner firmware.
//!
//! # Card Record Layout
//!
//! ```text
//! offset  0      2        3           4                       16
//!         +------+--------+-----------+-----------------------+
//!         |marker|user id |item count | items (zero padded)   |
//!         +------+--------+-----------+-----------------------+
//! ```

// ============================================================================
// Card Storage
// ============================================================================

/// Size of one Mifare Classic data block in bytes.
pub const CARD_BLOCK_SIZE: usize = 16;

/// Two-byte marker written at the start of every station record ("PS").
pub const CARD_MARKER: [u8; 2] = [0x50, 0x53];

/// Offset of the user id within the record block.
pub const CARD_USER_OFFSET: usize = 2;

/// Offset of the item count within the record block.
pub const CARD_COUNT_OFFSET: usize = 3;

/// Offset of the first item code within the record block.
pub const CARD_ITEMS_OFFSET: usize = 4;

/// Maximum number of menu items a record can hold.
///
/// # Examples
///
/// ```
/// use platescan_core::constants::{CARD_BLOCK_SIZE, CARD_ITEMS_OFFSET, MAX_MENU_ITEMS};
///
/// assert_eq!(CARD_ITEMS_OFFSET + MAX_MENU_ITEMS, CARD_BLOCK_SIZE);
/// ```
pub const MAX_MENU_ITEMS: usize = CARD_BLOCK_SIZE - CARD_ITEMS_OFFSET;

/// Physical block holding the record (first data block of sector 1).
pub const DEFAULT_CARD_BLOCK: u8 = 4;

/// Factory default Mifare Classic key A.
pub const DEFAULT_CARD_KEY: [u8; 6] = [0xFF; 6];

/// Interval between presence checks while waiting for card removal.
pub const DEFAULT_REMOVAL_POLL_MS: u64 = 50;

// ============================================================================
// Scanner Bus
// ============================================================================

/// 7-bit bus address of the scanner peripheral.
pub const DEFAULT_BUS_ADDRESS: u8 = 0x10;

/// Bus clock frequency in Hz.
pub const DEFAULT_BUS_FREQUENCY_HZ: u32 = 100_000;

/// Size of a request frame: `i32` sequence number followed by a command byte.
pub const BUS_FRAME_SIZE: usize = 5;

// ============================================================================
// Cloud Channel
// ============================================================================

/// Secure MQTT port used by IoT Hub.
pub const DEFAULT_HUB_PORT: u16 = 8883;

/// Token lifetime requested on every (re)connect.
pub const DEFAULT_TOKEN_TTL_MINUTES: u32 = 60;

/// Delay between failed connection attempts.
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;

/// Transport buffer size; the broker rejects authenticated packets above the
/// client default of 256 bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// MQTT keep-alive interval.
pub const DEFAULT_KEEP_ALIVE_SECS: u64 = 30;

/// IoT Hub API version advertised in the MQTT username.
pub const DEFAULT_API_VERSION: &str = "2020-09-30";

/// Inbound cloud-to-device command topic, subscribed after every connect.
pub const COMMAND_TOPIC: &str = "devices/+/messages/devicebound/#";

// ============================================================================
// Session
// ============================================================================

/// Minimum interval between accepted start button edges.
pub const DEFAULT_DEBOUNCE_MS: u64 = 200;

/// Pause between control loop iterations on the host build.
pub const DEFAULT_LOOP_INTERVAL_MS: u64 = 20;

/// Rating thresholds, highest first. A percentage equal to a threshold
/// belongs to that level.
pub const RATING_THRESHOLDS: [f32; 4] = [0.60, 0.48, 0.36, 0.24];

/// Default text display geometry (128x64 OLED at text size 1).
pub const DEFAULT_DISPLAY_LINES: usize = 4;

/// Default number of characters per display line.
pub const DEFAULT_DISPLAY_COLUMNS: usize = 21;
