use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

static NAMED_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*"?([^"<]*?)"?\s*<([^>]+)>\s*$"#).expect("valid regex"));

/// What a tracked thread is waiting on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThreadTrackerType {
    /// The user replied and is waiting on the other party
    Awaiting,
    /// The other party is waiting on a reply from the user
    NeedsReply,
    /// The thread needs some non-reply action from the user
    NeedsAction,
}

impl ThreadTrackerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadTrackerType::Awaiting => "AWAITING",
            ThreadTrackerType::NeedsReply => "NEEDS_REPLY",
            ThreadTrackerType::NeedsAction => "NEEDS_ACTION",
        }
    }
}

impl fmt::Display for ThreadTrackerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreadTrackerType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "AWAITING" => Ok(ThreadTrackerType::Awaiting),
            "NEEDS_REPLY" => Ok(ThreadTrackerType::NeedsReply),
            "NEEDS_ACTION" => Ok(ThreadTrackerType::NeedsAction),
            other => Err(format!("unknown tracker type '{}'", other)),
        }
    }
}

/// A persisted record marking a thread as awaiting reply or needing action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThreadTracker {
    pub id: String,
    pub user_id: String,
    pub thread_id: String,
    #[serde(rename = "type")]
    pub tracker_type: ThreadTrackerType,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

impl ThreadTracker {
    pub fn new(user_id: &str, thread_id: &str, tracker_type: ThreadTrackerType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            thread_id: thread_id.to_string(),
            tracker_type,
            resolved: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageHeaders {
    pub from: String,
    pub subject: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub date: String,
}

/// A message as hydrated from the mail provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedMessage {
    pub id: String,
    pub thread_id: String,
    pub headers: MessageHeaders,
    pub snippet: String,
    pub internal_date: DateTime<Utc>,
}

/// A thread with its messages in provider order (oldest first)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thread {
    pub id: String,
    pub messages: Vec<ParsedMessage>,
}

impl Thread {
    pub fn last_message(&self) -> Option<&ParsedMessage> {
        self.messages.last()
    }

    /// Internal date of the last message, epoch when the thread is empty
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message()
            .map(|m| m.internal_date)
            .unwrap_or(DateTime::UNIX_EPOCH)
    }
}

/// The message a user chose to nudge or reply to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedEmail {
    pub thread_id: String,
    pub message_id: String,
}

/// Convert Gmail's internalDate (millis since epoch) to a timestamp
pub fn internal_date_to_datetime(millis: Option<i64>) -> DateTime<Utc> {
    millis
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Split a "Name <email@example.com>" header into its parts
pub fn parse_address(header: &str) -> (Option<String>, String) {
    match NAMED_ADDRESS.captures(header) {
        Some(caps) => {
            let name = caps[1].trim();
            let email = caps[2].trim().to_string();
            ((!name.is_empty()).then(|| name.to_string()), email)
        }
        None => (None, header.trim().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_serialization_uses_wire_names() {
        let tracker = ThreadTracker::new("user-1", "thread-1", ThreadTrackerType::NeedsAction);
        let json = serde_json::to_value(&tracker).unwrap();

        assert_eq!(json["type"], "NEEDS_ACTION");
        assert_eq!(json["resolved"], false);

        let back: ThreadTracker = serde_json::from_value(json).unwrap();
        assert_eq!(back, tracker);
    }

    #[test]
    fn test_tracker_type_from_str() {
        assert_eq!("awaiting".parse(), Ok(ThreadTrackerType::Awaiting));
        assert_eq!("needs-reply".parse(), Ok(ThreadTrackerType::NeedsReply));
        assert_eq!("NEEDS_ACTION".parse(), Ok(ThreadTrackerType::NeedsAction));
        assert!("later".parse::<ThreadTrackerType>().is_err());
    }

    #[test]
    fn test_internal_date_conversion() {
        let dt = internal_date_to_datetime(Some(1_704_124_800_000));
        assert_eq!(dt.timestamp(), 1_704_124_800);
        assert_eq!(internal_date_to_datetime(None), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("\"Jane Doe\" <jane@example.com>"),
            (Some("Jane Doe".to_string()), "jane@example.com".to_string())
        );
        assert_eq!(
            parse_address("<bot@example.com>"),
            (None, "bot@example.com".to_string())
        );
        assert_eq!(
            parse_address("plain@example.com"),
            (None, "plain@example.com".to_string())
        );
    }

    #[test]
    fn test_empty_thread_last_activity_is_epoch() {
        let thread = Thread {
            id: "t".to_string(),
            messages: vec![],
        };
        assert!(thread.last_message().is_none());
        assert_eq!(thread.last_activity(), DateTime::UNIX_EPOCH);
    }
}
