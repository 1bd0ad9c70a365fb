//! Notification payload model.
//!
//! Serializes to the gateway's JSON shape:
//!
//! ```json
//! {"aps":{"alert":{"title":"Hi","body":"There"},"badge":1},"custom":"value"}
//! ```
//!
//! Absent fields are omitted; `content-available` and `mutable-content` are
//! emitted as `1` only when enabled.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `aps.alert` value: a plain string or a structured alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Alert {
    /// Plain alert text.
    Text(String),
    /// Structured alert with title, body and localization keys.
    Rich(RichAlert),
}

impl From<&str> for Alert {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Alert {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<RichAlert> for Alert {
    fn from(alert: RichAlert) -> Self {
        Self::Rich(alert)
    }
}

/// Structured alert dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RichAlert {
    /// Short title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Secondary title line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    /// Alert body text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Localization key for the title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_loc_key: Option<String>,
    /// Format arguments for `title-loc-key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_loc_args: Option<Vec<String>>,
    /// Localization key for the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc_key: Option<String>,
    /// Format arguments for `loc-key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc_args: Option<Vec<String>>,
    /// Localization key for the action button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_loc_key: Option<String>,
    /// Launch image file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_image: Option<String>,
}

/// The `aps` dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Aps {
    /// Alert to display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<Alert>,
    /// Badge count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    /// Sound file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    /// Notification category identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Thread identifier for grouping.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// `1` for background (silent) notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_available: Option<u8>,
    /// `1` to let a notification service extension modify the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mutable_content: Option<u8>,
}

/// A complete notification payload.
///
/// Immutable once handed to the client; one payload is shared by every token
/// in a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Apple-defined keys.
    #[serde(default)]
    pub aps: Aps,
    /// Application-defined top-level keys.
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl Payload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the alert.
    pub fn alert(mut self, alert: impl Into<Alert>) -> Self {
        self.aps.alert = Some(alert.into());
        self
    }

    /// Set the badge count.
    pub fn badge(mut self, badge: u32) -> Self {
        self.aps.badge = Some(badge);
        self
    }

    /// Set the sound name.
    pub fn sound(mut self, sound: impl Into<String>) -> Self {
        self.aps.sound = Some(sound.into());
        self
    }

    /// Set the category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.aps.category = Some(category.into());
        self
    }

    /// Set the thread id.
    pub fn thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.aps.thread_id = Some(thread_id.into());
        self
    }

    /// Mark as a background notification.
    pub fn content_available(mut self) -> Self {
        self.aps.content_available = Some(1);
        self
    }

    /// Allow a notification service extension to modify the content.
    pub fn mutable_content(mut self) -> Self {
        self.aps.mutable_content = Some(1);
        self
    }

    /// Add an application-defined top-level key.
    ///
    /// A key named `aps` is ignored; it would collide with the Apple dictionary.
    pub fn custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != "aps" {
            self.custom.insert(key, value.into());
        }
        self
    }

    /// Encode to the compact JSON body sent on the wire.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// A payload addressed to one device token.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Hex device token.
    pub token: String,
    /// Payload to deliver.
    pub payload: Payload,
}

impl Notification {
    /// Pair a token with a payload.
    pub fn new(token: impl Into<String>, payload: Payload) -> Self {
        Self {
            token: token.into(),
            payload,
        }
    }
}
