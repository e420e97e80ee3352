//! Session journal events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of a project's session journal.
///
/// Producers append independently; consumers order by timestamp only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        at: DateTime<Utc>,
    },
    SessionEnded {
        at: DateTime<Utc>,
    },
    Edit {
        at: DateTime<Utc>,
        file_path: String,
        #[serde(default)]
        description: Option<String>,
    },
    Test {
        at: DateTime<Utc>,
        passed: bool,
        #[serde(default)]
        error_message: Option<String>,
    },
    Decision {
        at: DateTime<Utc>,
        decision: String,
        reason: String,
    },
    Mistake {
        at: DateTime<Utc>,
        description: String,
        #[serde(default)]
        file_path: Option<String>,
    },
}

impl SessionEvent {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            SessionEvent::SessionStarted { at }
            | SessionEvent::SessionEnded { at }
            | SessionEvent::Edit { at, .. }
            | SessionEvent::Test { at, .. }
            | SessionEvent::Decision { at, .. }
            | SessionEvent::Mistake { at, .. } => *at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = SessionEvent::Edit {
            at: Utc::now(),
            file_path: "src/lib.rs".into(),
            description: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"edit\""));
        assert!(json.contains("src/lib.rs"));

        let parsed: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
