//! User-facing filter settings.
//!
//! The host hands settings over as a JSON document (its settings store is
//! JSON-backed); [`FilterSettings::from_json`] is the entry point for that.
//! Absent fields fall back to defaults so a partial update payload works.

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Stream name used when the user has not picked one.
pub const DEFAULT_SENDER_NAME: &str = "Framecast Output";

/// Smallest supported ring (classic double buffering).
pub const MIN_RING_DEPTH: usize = 2;
/// Largest supported ring.
pub const MAX_RING_DEPTH: usize = 8;
/// Ring depth used when the settings do not specify one.
pub const DEFAULT_RING_DEPTH: usize = 2;

/// Settings attached to one filter instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// User-visible name of the outbound stream.
    pub sender_name: String,
    /// Number of ring slots. Read once at filter creation; see
    /// [`clamped_ring_depth`](Self::clamped_ring_depth).
    pub ring_depth: usize,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            sender_name: DEFAULT_SENDER_NAME.to_string(),
            ring_depth: DEFAULT_RING_DEPTH,
        }
    }
}

impl FilterSettings {
    /// Parse a host settings payload.
    pub fn from_json(payload: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Ring depth forced into the supported range.
    pub fn clamped_ring_depth(&self) -> usize {
        self.ring_depth.clamp(MIN_RING_DEPTH, MAX_RING_DEPTH)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = FilterSettings::default();
        assert_eq!(s.sender_name, "Framecast Output");
        assert_eq!(s.ring_depth, 2);
    }

    #[test]
    fn partial_payload_uses_defaults() {
        let s = FilterSettings::from_json(r#"{"sender_name":"Studio A"}"#).unwrap();
        assert_eq!(s.sender_name, "Studio A");
        assert_eq!(s.ring_depth, DEFAULT_RING_DEPTH);
    }

    #[test]
    fn bad_payload_is_a_settings_error() {
        let err = FilterSettings::from_json("{not json").unwrap_err();
        assert!(matches!(err, RelayError::Settings(_)));
    }

    #[test]
    fn ring_depth_clamps() {
        let mut s = FilterSettings::default();
        s.ring_depth = 1;
        assert_eq!(s.clamped_ring_depth(), 2);
        s.ring_depth = 64;
        assert_eq!(s.clamped_ring_depth(), 8);
        s.ring_depth = 4;
        assert_eq!(s.clamped_ring_depth(), 4);
    }

    #[test]
    fn roundtrip() {
        let s = FilterSettings {
            sender_name: "Aux".into(),
            ring_depth: 8,
        };
        let text = serde_json::to_string(&s).unwrap();
        let parsed = FilterSettings::from_json(&text).unwrap();
        assert_eq!(parsed, s);
    }
}
