//! Location types
//!
//! Transport-independent view of a shared location and of the inbound
//! "location received" event.

use serde::{Deserialize, Serialize};

/// A geographic point as shared by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Live period in seconds; presence of a positive value marks a live location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_period: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proximity_alert_radius: Option<u32>,
}

impl Location {
    /// Static location at the given coordinates
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            live_period: None,
            horizontal_accuracy: None,
            heading: None,
            proximity_alert_radius: None,
        }
    }

    /// Mark as live for `seconds`
    pub fn with_live_period(mut self, seconds: i64) -> Self {
        self.live_period = Some(seconds);
        self
    }

    /// Positive live period, if any
    pub fn live_seconds(&self) -> Option<i64> {
        self.live_period.filter(|p| *p > 0)
    }

    pub fn is_live(&self) -> bool {
        self.live_seconds().is_some()
    }

    /// Coordinates within [-90, 90] x [-180, 180]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl From<&teloxide::types::Location> for Location {
    fn from(loc: &teloxide::types::Location) -> Self {
        Self {
            latitude: loc.latitude,
            longitude: loc.longitude,
            live_period: loc.live_period.map(|p| i64::from(p.seconds())),
            horizontal_accuracy: loc.horizontal_accuracy,
            heading: loc.heading,
            proximity_alert_radius: loc.proximity_alert_radius,
        }
    }
}

/// Inbound "location received" event
#[derive(Debug, Clone)]
pub struct LocationEvent {
    /// Chat the location was shared in
    pub chat_id: Option<i64>,
    pub location: Option<Location>,
    /// True for edited messages (live location updates / termination)
    pub edited: bool,
}

impl LocationEvent {
    pub fn new(chat_id: i64, location: Location) -> Self {
        Self {
            chat_id: Some(chat_id),
            location: Some(location),
            edited: false,
        }
    }

    pub fn edited(chat_id: i64, location: Location) -> Self {
        Self {
            edited: true,
            ..Self::new(chat_id, location)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_period_must_be_positive() {
        assert!(!Location::new(1.0, 2.0).is_live());
        assert!(!Location::new(1.0, 2.0).with_live_period(0).is_live());
        assert!(!Location::new(1.0, 2.0).with_live_period(-5).is_live());
        assert_eq!(Location::new(1.0, 2.0).with_live_period(600).live_seconds(), Some(600));
    }

    #[test]
    fn test_coordinate_ranges() {
        assert!(Location::new(55.7558, 37.6176).is_valid());
        assert!(Location::new(-90.0, 180.0).is_valid());
        assert!(!Location::new(999.0, 999.0).is_valid());
        assert!(!Location::new(0.0, -180.5).is_valid());
    }

    #[test]
    fn test_deserialize_telegram_shape() {
        let loc: Location = serde_json::from_str(
            r#"{"latitude": 55.7558, "longitude": 37.6176, "live_period": 600, "heading": 90}"#,
        )
        .unwrap();
        assert_eq!(loc.live_seconds(), Some(600));
        assert_eq!(loc.heading, Some(90));
        assert!(loc.horizontal_accuracy.is_none());
    }

    #[test]
    fn test_edited_event() {
        let event = LocationEvent::edited(42, Location::new(0.0, 0.0));
        assert!(event.edited);
        assert_eq!(event.chat_id, Some(42));
    }
}
