//! Notification event model

use std::collections::HashMap;

use crate::constants::{
    ATTR_DATE_FORMAT, ATTR_DELETE_TYPE, ATTR_EVENT_TYPE, ATTR_SECRET_ID, ATTR_TIMESTAMP,
    ATTR_VERSION_ID, ROTATE_EVENT_TYPE,
};

/// One delivered rotation notification.
///
/// Built once per delivery and never mutated. The payload is opaque to the
/// worker; only the selected rotation handler interprets it.
#[derive(Debug, Clone)]
pub struct RotationEvent {
    pub secret_id: String,
    pub event_type: String,
    pub date_format: String,
    pub timestamp: String,
    pub version_id: String,
    pub delete_type: String,
    pub payload: Vec<u8>,
}

fn attr(attributes: &HashMap<String, String>, key: &str) -> String {
    attributes.get(key).cloned().unwrap_or_default()
}

impl RotationEvent {
    /// Build an event from a delivery's attribute map and body.
    ///
    /// Missing attributes map to empty strings; absence is meaningful to the
    /// filter, not an error.
    pub fn from_delivery(attributes: &HashMap<String, String>, payload: Vec<u8>) -> Self {
        Self {
            secret_id: attr(attributes, ATTR_SECRET_ID),
            event_type: attr(attributes, ATTR_EVENT_TYPE),
            date_format: attr(attributes, ATTR_DATE_FORMAT),
            timestamp: attr(attributes, ATTR_TIMESTAMP),
            version_id: attr(attributes, ATTR_VERSION_ID),
            delete_type: attr(attributes, ATTR_DELETE_TYPE),
            payload,
        }
    }

    /// Whether this event should trigger a rotation at all
    pub fn is_rotation_trigger(&self) -> bool {
        self.event_type == ROTATE_EVENT_TYPE
    }
}
