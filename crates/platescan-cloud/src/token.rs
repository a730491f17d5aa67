//! Shared access signature (SAS) tokens for the IoT hub.
//!
//! A token authorizes the device for a bounded time:
//!
//! ```text
//! resource  = urlencode("{host}/devices/{device_id}")
//! signature = base64(HMAC-SHA256(base64decode(device_key), resource + "\n" + expiry))
//! token     = "SharedAccessSignature sr={resource}&sig={urlencode(signature)}&se={expiry}"
//! ```
//!
//! `expiry` is an absolute Unix timestamp in seconds. The manager keeps one
//! live token; generating a new one replaces it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::TokenError;

type HmacSha256 = Hmac<Sha256>;

/// Characters left as-is when URL encoding (RFC 3986 unreserved set).
const URL_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const TOKEN_PREFIX: &str = "SharedAccessSignature";

pub(crate) fn url_encode(input: &str) -> String {
    utf8_percent_encode(input, URL_ENCODE_SET).to_string()
}

/// A generated token and its expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct SasToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl SasToken {
    /// The token string presented as the channel password.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

// The token is a credential.
impl std::fmt::Debug for SasToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SasToken")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Read the `se=` field back out of a token string.
///
/// Returns `None` if the field is missing, not a number, or zero.
pub fn parse_expiry(token: &str) -> Option<DateTime<Utc>> {
    let fields = token.strip_prefix(TOKEN_PREFIX)?.trim_start();
    let seconds: i64 = fields
        .split('&')
        .find_map(|field| field.strip_prefix("se="))?
        .parse()
        .ok()?;

    if seconds == 0 {
        return None;
    }
    DateTime::from_timestamp(seconds, 0)
}

/// Generates and tracks the device's SAS token.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use platescan_cloud::clock::ManualClock;
/// use platescan_cloud::token::TokenManager;
///
/// let clock = ManualClock::at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
/// let mut tokens = TokenManager::new(clock.clone(), "hub.example.net", "dev1", "c2VjcmV0").unwrap();
///
/// tokens.generate(60).unwrap();
/// assert!(!tokens.is_expired());
///
/// clock.advance(Duration::minutes(61));
/// assert!(tokens.is_expired());
/// ```
pub struct TokenManager<C> {
    clock: C,
    resource: String,
    key: Vec<u8>,
    token: Option<SasToken>,
}

impl<C: Clock> TokenManager<C> {
    /// Create a manager for `device_id` on `host`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::InvalidKey` if `device_key` is not base64 or
    /// decodes to nothing.
    pub fn new(clock: C, host: &str, device_id: &str, device_key: &str) -> Result<Self, TokenError> {
        let key = STANDARD
            .decode(device_key.trim())
            .map_err(|_| TokenError::InvalidKey)?;
        if key.is_empty() {
            return Err(TokenError::InvalidKey);
        }

        Ok(Self {
            clock,
            resource: url_encode(&format!("{host}/devices/{device_id}")),
            key,
            token: None,
        })
    }

    /// Generate a token valid for `ttl_minutes` from now.
    ///
    /// The previous token is cleared first, so on failure no token is live.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::ClockUnavailable` if the clock is not
    /// synchronized, `TokenError::Signing` if signing fails, and
    /// `TokenError::ExpiryDecode` if the expiry cannot be read back from the
    /// token.
    pub fn generate(&mut self, ttl_minutes: u32) -> Result<&SasToken, TokenError> {
        self.token = None;

        let now = self.clock.now().ok_or(TokenError::ClockUnavailable)?;
        let expiry = (now + Duration::minutes(i64::from(ttl_minutes))).timestamp();

        let signature = self.sign(&format!("{}\n{}", self.resource, expiry))?;
        if signature.is_empty() {
            return Err(TokenError::Signing("empty signature".into()));
        }

        let token = format!(
            "{TOKEN_PREFIX} sr={}&sig={}&se={}",
            self.resource,
            url_encode(&signature),
            expiry
        );
        let expires_at = parse_expiry(&token).ok_or_else(|| {
            warn!("Generated token carries no usable expiry");
            TokenError::ExpiryDecode
        })?;

        info!(expires_at = %expires_at, "SAS token generated");
        Ok(&*self.token.insert(SasToken { token, expires_at }))
    }

    /// Whether the current token must not be presented any more.
    ///
    /// True when there is no token, when the clock is unavailable, or when
    /// `now >= expiry`.
    pub fn is_expired(&self) -> bool {
        let Some(token) = &self.token else {
            return true;
        };
        match self.clock.now() {
            Some(now) => now >= token.expires_at,
            None => {
                debug!("Clock unavailable, treating token as expired");
                true
            }
        }
    }

    /// The live token, if any.
    pub fn token(&self) -> Option<&SasToken> {
        self.token.as_ref()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn sign(&self, string_to_sign: &str) -> Result<String, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        mac.update(string_to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use proptest::prelude::*;

    const KEY: &str = "c2VjcmV0a2V5c2VjcmV0a2V5";

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap()
    }

    fn manager(clock: ManualClock) -> TokenManager<ManualClock> {
        TokenManager::new(clock, "hub.example.net", "LabDevice1", KEY).unwrap()
    }

    #[test]
    fn test_token_format() {
        let mut tokens = manager(ManualClock::at(start()));
        let token = tokens.generate(60).unwrap();
        let expiry = start().timestamp() + 3600;

        assert!(token.as_str().starts_with(
            "SharedAccessSignature sr=hub.example.net%2Fdevices%2FLabDevice1&sig="
        ));
        assert!(token.as_str().ends_with(&format!("&se={expiry}")));
        assert_eq!(token.expires_at().timestamp(), expiry);
    }

    #[test]
    fn test_signature_is_hmac_of_resource_and_expiry() {
        let mut tokens = manager(ManualClock::at(start()));
        let expiry = start().timestamp() + 3600;
        let token = tokens.generate(60).unwrap().as_str().to_string();

        let mut mac = HmacSha256::new_from_slice(&STANDARD.decode(KEY).unwrap()).unwrap();
        mac.update(format!("hub.example.net%2Fdevices%2FLabDevice1\n{expiry}").as_bytes());
        let expected = url_encode(&STANDARD.encode(mac.finalize().into_bytes()));

        assert!(token.contains(&format!("&sig={expected}&")));
    }

    #[test]
    fn test_expired_after_ttl() {
        let clock = ManualClock::at(start());
        let mut tokens = manager(clock.clone());
        tokens.generate(60).unwrap();

        clock.advance(Duration::minutes(59));
        assert!(!tokens.is_expired());

        clock.advance(Duration::minutes(2));
        assert!(tokens.is_expired());
    }

    #[test]
    fn test_expired_exactly_at_expiry() {
        let clock = ManualClock::at(start());
        let mut tokens = manager(clock.clone());
        tokens.generate(1).unwrap();

        clock.advance(Duration::seconds(60));
        assert!(tokens.is_expired());
    }

    #[test]
    fn test_no_token_is_expired() {
        let tokens = manager(ManualClock::at(start()));
        assert!(tokens.is_expired());
        assert!(tokens.token().is_none());
    }

    #[test]
    fn test_clock_loss_reports_expired() {
        let clock = ManualClock::at(start());
        let mut tokens = manager(clock.clone());
        tokens.generate(60).unwrap();

        clock.set(None);
        assert!(tokens.is_expired());
    }

    #[test]
    fn test_generate_without_clock_clears_token() {
        let clock = ManualClock::at(start());
        let mut tokens = manager(clock.clone());
        tokens.generate(60).unwrap();

        clock.set(None);
        assert_eq!(tokens.generate(60), Err(TokenError::ClockUnavailable));
        assert!(tokens.token().is_none());
    }

    #[test]
    fn test_regenerate_replaces_token() {
        let clock = ManualClock::at(start());
        let mut tokens = manager(clock.clone());
        let first = tokens.generate(60).unwrap().clone();

        clock.advance(Duration::minutes(30));
        let second = tokens.generate(60).unwrap().clone();

        assert_ne!(first, second);
        assert_eq!(second.expires_at(), start() + Duration::minutes(90));
    }

    #[test]
    fn test_invalid_key_rejected() {
        let clock = ManualClock::at(start());
        assert!(matches!(
            TokenManager::new(clock.clone(), "h", "d", "not base64!"),
            Err(TokenError::InvalidKey)
        ));
        assert!(matches!(
            TokenManager::new(clock, "h", "d", ""),
            Err(TokenError::InvalidKey)
        ));
    }

    #[test]
    fn test_parse_expiry() {
        assert_eq!(
            parse_expiry("SharedAccessSignature sr=a&sig=b&se=1700000000").map(|t| t.timestamp()),
            Some(1_700_000_000)
        );
        assert_eq!(parse_expiry("SharedAccessSignature sr=a&sig=b&se=0"), None);
        assert_eq!(parse_expiry("SharedAccessSignature sr=a&sig=b"), None);
        assert_eq!(parse_expiry("SharedAccessSignature sr=a&se=soon"), None);
        assert_eq!(parse_expiry("sr=a&sig=b&se=1700000000"), None);
    }

    #[test]
    fn test_debug_hides_token() {
        let mut tokens = manager(ManualClock::at(start()));
        let token = tokens.generate(60).unwrap();
        assert!(!format!("{token:?}").contains("sig="));
    }

    proptest! {
        #[test]
        fn prop_never_fresh_past_expiry(ttl in 1u32..=1440, past in 0i64..100_000) {
            let clock = ManualClock::at(start());
            let mut tokens = manager(clock.clone());
            let expires_at = tokens.generate(ttl).unwrap().expires_at();

            clock.set(Some(expires_at + Duration::seconds(past)));
            prop_assert!(tokens.is_expired());
        }
    }
}
