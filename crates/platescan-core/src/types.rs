use crate::{
    Result,
    constants::{
        CARD_BLOCK_SIZE, CARD_COUNT_OFFSET, CARD_ITEMS_OFFSET, CARD_MARKER, CARD_USER_OFFSET,
        MAX_MENU_ITEMS, RATING_THRESHOLDS,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Menu item code as stored on the card.
pub type ItemCode = u8;

/// Diner identifier (1-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct UserId(u8);

impl UserId {
    /// Create a new user id.
    ///
    /// # Errors
    /// Returns `Error::InvalidUserId` for zero, which marks an empty record.
    pub fn new(id: u8) -> Result<Self> {
        if id == 0 {
            return Err(Error::InvalidUserId(id));
        }
        Ok(UserId(id))
    }

    /// Get the raw user id.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for UserId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        UserId::new(value)
    }
}

impl From<UserId> for u8 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Record stored on a diner's card: who they are and what they were served.
///
/// The item count is always derived from the stored sequence, so it can
/// never disagree with it, and the sequence never exceeds [`MAX_MENU_ITEMS`].
///
/// # Examples
///
/// ```
/// use platescan_core::{MenuRecord, UserId};
///
/// let mut record = MenuRecord::new(UserId::new(1).unwrap());
/// record.push_item(56).unwrap();
/// record.push_item(80).unwrap();
///
/// assert_eq!(record.item_count(), 2);
/// assert_eq!(record.items(), &[56, 80]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuRecord {
    user_id: UserId,
    items: Vec<ItemCode>,
}

impl MenuRecord {
    /// Create an empty record for a user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            items: Vec::with_capacity(MAX_MENU_ITEMS),
        }
    }

    /// Create a record with items.
    ///
    /// # Errors
    /// Returns `Error::CapacityExceeded` when more than [`MAX_MENU_ITEMS`]
    /// items are given.
    pub fn with_items(user_id: UserId, items: &[ItemCode]) -> Result<Self> {
        if items.len() > MAX_MENU_ITEMS {
            return Err(Error::CapacityExceeded {
                max: MAX_MENU_ITEMS,
            });
        }
        Ok(Self {
            user_id,
            items: items.to_vec(),
        })
    }

    /// Append an item code.
    ///
    /// # Errors
    /// Returns `Error::CapacityExceeded` if the record is already full.
    pub fn push_item(&mut self, item: ItemCode) -> Result<()> {
        if self.items.len() >= MAX_MENU_ITEMS {
            return Err(Error::CapacityExceeded {
                max: MAX_MENU_ITEMS,
            });
        }
        self.items.push(item);
        Ok(())
    }

    /// Remove all items, keeping the user.
    pub fn clear_items(&mut self) {
        self.items.clear();
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn items(&self) -> &[ItemCode] {
        &self.items
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Encode the record into a card data block.
    ///
    /// Layout: `[marker:2][user:1][count:1][items:12]`, unused item slots are
    /// zero.
    pub fn to_block(&self) -> [u8; CARD_BLOCK_SIZE] {
        let mut block = [0u8; CARD_BLOCK_SIZE];
        block[..CARD_MARKER.len()].copy_from_slice(&CARD_MARKER);
        block[CARD_USER_OFFSET] = self.user_id.as_u8();
        // Capacity is enforced on insertion, so the count fits in a byte.
        block[CARD_COUNT_OFFSET] = self.items.len() as u8;
        block[CARD_ITEMS_OFFSET..CARD_ITEMS_OFFSET + self.items.len()]
            .copy_from_slice(&self.items);
        block
    }

    /// Decode a record from a card data block.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `Error::UnrecognizedCard` if the block does not start with the marker
    /// - `Error::InvalidRecord` if the user id is zero or the count exceeds
    ///   the item capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use platescan_core::{Error, MenuRecord};
    ///
    /// let blank = [0u8; 16];
    /// assert!(matches!(
    ///     MenuRecord::from_block(&blank),
    ///     Err(Error::UnrecognizedCard { .. })
    /// ));
    /// ```
    pub fn from_block(block: &[u8; CARD_BLOCK_SIZE]) -> Result<Self> {
        let found = [block[0], block[1]];
        if found != CARD_MARKER {
            return Err(Error::UnrecognizedCard { found });
        }

        let user_id = UserId::new(block[CARD_USER_OFFSET])
            .map_err(|_| Error::InvalidRecord("user id is zero".to_string()))?;

        let count = block[CARD_COUNT_OFFSET] as usize;
        if count > MAX_MENU_ITEMS {
            return Err(Error::InvalidRecord(format!(
                "item count {count} exceeds {MAX_MENU_ITEMS}"
            )));
        }

        Ok(Self {
            user_id,
            items: block[CARD_ITEMS_OFFSET..CARD_ITEMS_OFFSET + count].to_vec(),
        })
    }
}

impl fmt::Display for MenuRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "user {} ({} items)", self.user_id, self.items.len())
    }
}

/// Discrete rating level derived from a scan result.
///
/// Thresholds are closed at the lower bound: a result exactly on a threshold
/// belongs to the higher level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatingLevel {
    /// Result at or above 0.60.
    Top,
    /// Result at or above 0.48.
    High,
    /// Result at or above 0.36.
    Medium,
    /// Result at or above 0.24.
    Low,
    /// Anything below 0.24.
    Lowest,
}

impl RatingLevel {
    /// Bucket a scan result.
    ///
    /// # Examples
    ///
    /// ```
    /// use platescan_core::RatingLevel;
    ///
    /// assert_eq!(RatingLevel::from_percentage(0.60), RatingLevel::Top);
    /// assert_eq!(RatingLevel::from_percentage(0.1), RatingLevel::Lowest);
    /// ```
    pub fn from_percentage(percentage: f32) -> Self {
        let [top, high, medium, low] = RATING_THRESHOLDS;
        if percentage >= top {
            Self::Top
        } else if percentage >= high {
            Self::High
        } else if percentage >= medium {
            Self::Medium
        } else if percentage >= low {
            Self::Low
        } else {
            Self::Lowest
        }
    }

    /// Numeric score shown on the display (5 for `Top` down to 1).
    pub fn score(&self) -> u8 {
        match self {
            Self::Top => 5,
            Self::High => 4,
            Self::Medium => 3,
            Self::Low => 2,
            Self::Lowest => 1,
        }
    }
}

impl fmt::Display for RatingLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/5", self.score())
    }
}
