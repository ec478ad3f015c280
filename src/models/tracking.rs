use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::models::address::Coordinates;
use crate::models::order::{OrderId, OrderSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationPayload {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushMessage {
    StatusUpdate {
        order_id: OrderId,
        status: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
    LocationUpdate {
        payload: LocationPayload,
    },
}

impl PushMessage {
    /// Unknown message types and malformed frames yield `None`.
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSource {
    Live,
    /// Shown from the local fallback copy; data may be stale.
    Fallback,
}

/// Most recent courier positions kept for drawing the trail.
pub const LOCATION_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingView {
    pub order: Option<OrderSnapshot>,
    pub degraded: bool,
    pub error: Option<String>,
    pub courier_location: Option<Coordinates>,
    pub location_history: VecDeque<Coordinates>,
}

impl TrackingView {
    pub fn record_location(&mut self, position: Coordinates) {
        if self.location_history.len() == LOCATION_HISTORY_LIMIT {
            self.location_history.pop_front();
        }
        self.location_history.push_back(position);
        self.courier_location = Some(position);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    OrderLoaded {
        order: OrderSnapshot,
        source: OrderSource,
    },
    StatusChanged {
        order_id: OrderId,
        status: String,
        timestamp: Option<String>,
    },
    CourierMoved(Coordinates),
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::{LocationPayload, PushMessage};

    #[test]
    fn parses_status_update() {
        let msg = PushMessage::parse(
            r#"{"type":"status_update","order_id":47,"status":"preparing","timestamp":"2025-05-31T14:47:23Z"}"#,
        );
        assert_eq!(
            msg,
            Some(PushMessage::StatusUpdate {
                order_id: 47,
                status: "preparing".to_string(),
                timestamp: Some("2025-05-31T14:47:23Z".to_string()),
            })
        );
    }

    #[test]
    fn parses_location_update() {
        let msg = PushMessage::parse(
            r#"{"type":"location_update","payload":{"latitude":55.68,"longitude":12.57}}"#,
        );
        assert_eq!(
            msg,
            Some(PushMessage::LocationUpdate {
                payload: LocationPayload {
                    latitude: 55.68,
                    longitude: 12.57,
                },
            })
        );
    }

    #[test]
    fn ignores_unknown_frames() {
        assert!(PushMessage::parse(r#"{"type":"hello"}"#).is_none());
        assert!(PushMessage::parse("not json").is_none());
    }
}
