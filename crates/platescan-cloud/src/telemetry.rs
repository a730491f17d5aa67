//! Telemetry and inbound command payloads.
//!
//! Payloads are JSON objects with the hub-side field names:
//!
//! ```json
//! {"UserID": 1, "Rating": 0.5, "DeviceID": "LabDevice1", "Menu": [1, 56, 80]}
//! ```

use platescan_core::{ItemCode, MenuRecord, UserId};
use serde::{Deserialize, Serialize};

/// Result of one completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(rename = "UserID")]
    pub user_id: u8,

    /// Measured scan result as a fraction in `[0, 1]`.
    #[serde(rename = "Rating")]
    pub rating: f32,

    #[serde(rename = "DeviceID")]
    pub device_id: String,

    #[serde(rename = "Menu")]
    pub menu: Vec<ItemCode>,
}

impl TelemetryRecord {
    pub fn new(record: &MenuRecord, percentage: f32, device_id: impl Into<String>) -> Self {
        Self {
            user_id: record.user_id().as_u8(),
            rating: percentage,
            device_id: device_id.into(),
            menu: record.items().to_vec(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Cloud-to-device request to write a record to the next tapped card.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnrollmentRequest {
    #[serde(rename = "UserID")]
    pub user_id: UserId,

    #[serde(rename = "Menu", default)]
    pub menu: Vec<ItemCode>,
}

impl EnrollmentRequest {
    pub fn from_json(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    /// Build the card record.
    ///
    /// # Errors
    ///
    /// Returns `Error::CapacityExceeded` if the menu does not fit on a card.
    pub fn into_record(self) -> platescan_core::Result<MenuRecord> {
        MenuRecord::with_items(self.user_id, &self.menu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn record() -> MenuRecord {
        MenuRecord::with_items(UserId::new(1).unwrap(), &[1, 56, 80]).unwrap()
    }

    #[test]
    fn test_telemetry_json_field_names() {
        let telemetry = TelemetryRecord::new(&record(), 0.5, "LabDevice1");
        let json: serde_json::Value =
            serde_json::from_str(&telemetry.to_json().unwrap()).unwrap();

        assert_eq!(json["UserID"], 1);
        assert!(json["Rating"].is_f64());
        assert_eq!(json["Rating"], 0.5);
        assert_eq!(json["DeviceID"], "LabDevice1");
        assert_eq!(json["Menu"], serde_json::json!([1, 56, 80]));
    }

    #[rstest]
    #[case(0.0)]
    #[case(0.25)]
    #[case(0.6)]
    #[case(1.0)]
    fn test_telemetry_rating_is_raw_fraction(#[case] percentage: f32) {
        let telemetry = TelemetryRecord::new(&record(), percentage, "LabDevice1");
        let json: serde_json::Value =
            serde_json::from_str(&telemetry.to_json().unwrap()).unwrap();

        assert!(json["Rating"].is_f64());
        assert_eq!(json["Rating"].as_f64().unwrap() as f32, percentage);
    }

    #[test]
    fn test_enrollment_request() {
        let request = EnrollmentRequest::from_json(br#"{"UserID": 7, "Menu": [3, 14]}"#).unwrap();
        let record = request.into_record().unwrap();
        assert_eq!(record.user_id().as_u8(), 7);
        assert_eq!(record.items(), &[3, 14]);
    }

    #[test]
    fn test_enrollment_without_menu() {
        let request = EnrollmentRequest::from_json(br#"{"UserID": 2}"#).unwrap();
        assert!(request.into_record().unwrap().is_empty());
    }

    #[rstest]
    #[case(br#"{"UserID": 0, "Menu": []}"#.as_slice())]
    #[case(br#"{"UserID": 300}"#.as_slice())]
    #[case(br#"{"Menu": [1]}"#.as_slice())]
    #[case(b"hello".as_slice())]
    fn test_enrollment_rejects_bad_payloads(#[case] payload: &[u8]) {
        assert!(EnrollmentRequest::from_json(payload).is_err());
    }

    #[test]
    fn test_enrollment_too_many_items() {
        let request =
            EnrollmentRequest::from_json(br#"{"UserID": 1, "Menu": [1,2,3,4,5,6,7,8,9,10,11,12,13]}"#)
                .unwrap();
        assert!(request.into_record().is_err());
    }
}
