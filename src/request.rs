//! Request body and header construction.
//!
//! A batch shares one payload and one set of delivery options, so the body
//! and headers are built once per batch into a [`PreparedRequest`] and only
//! the path differs per token.

use std::str::FromStr;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use http::HeaderMap;

use crate::constants::BEARER_PREFIX;
use crate::credential::CredentialProvider;
use crate::error::DispatchError;
use crate::payload::Payload;

/// `apns-priority` header name.
pub const APNS_PRIORITY: HeaderName = HeaderName::from_static("apns-priority");
/// `apns-topic` header name.
pub const APNS_TOPIC: HeaderName = HeaderName::from_static("apns-topic");
/// `apns-expiration` header name.
pub const APNS_EXPIRATION: HeaderName = HeaderName::from_static("apns-expiration");

/// Delivery priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Deliver right away (wire value `10`).
    #[default]
    Immediate,
    /// Deliver at a time that conserves device power (wire value `5`).
    Delayed,
}

impl Priority {
    /// The `apns-priority` header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Immediate => "10",
            Priority::Delayed => "5",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "immediate" | "10" => Ok(Priority::Immediate),
            "delayed" | "5" => Ok(Priority::Delayed),
            other => Err(format!("unknown priority '{other}' (expected immediate or delayed)")),
        }
    }
}

/// Per-batch delivery options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOptions {
    /// Delivery priority.
    pub priority: Priority,
    /// Topic (usually the app's bundle id).
    pub topic: Option<String>,
    /// Absolute expiration (seconds since the Unix epoch).
    pub expiration: Option<i64>,
}

impl DeliveryOptions {
    /// Options with the given topic and defaults otherwise.
    pub fn with_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            ..Self::default()
        }
    }
}

/// Body and headers shared by every request in a batch.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// Compact JSON body.
    pub body: Bytes,
    /// Request headers.
    pub headers: HeaderMap,
}

/// Build the body and headers for a payload.
///
/// When `credentials` is given, the Authorization header carries the current
/// provider token, regenerated first if it has expired.
pub fn prepare(
    payload: &Payload,
    options: &DeliveryOptions,
    credentials: Option<&CredentialProvider>,
) -> Result<PreparedRequest, DispatchError> {
    let body = payload
        .to_bytes()
        .map_err(|e| DispatchError::Serialization(format!("payload: {e}")))?;

    let mut headers = HeaderMap::new();

    if options.priority != Priority::default() {
        headers.insert(APNS_PRIORITY, HeaderValue::from_static(options.priority.as_str()));
    }

    if let Some(topic) = &options.topic {
        headers.insert(APNS_TOPIC, header_value(topic, "apns-topic")?);
    }

    if let Some(expiration) = options.expiration {
        headers.insert(APNS_EXPIRATION, HeaderValue::from(expiration));
    }

    if let Some(provider) = credentials {
        let credential = provider.get_credential()?;
        let value = format!("{BEARER_PREFIX}{}", credential.token);
        headers.insert(AUTHORIZATION, header_value(&value, "authorization")?);
    }

    Ok(PreparedRequest {
        body: Bytes::from(body),
        headers,
    })
}

fn header_value(value: &str, name: &str) -> Result<HeaderValue, DispatchError> {
    HeaderValue::from_str(value)
        .map_err(|e| DispatchError::Serialization(format!("{name} header: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::ecdsa::SigningKey;
    use p256::elliptic_curve::rand_core::OsRng;

    #[test]
    fn test_default_options_produce_no_headers() {
        let payload = Payload::new().alert("hi");
        let prepared = prepare(&payload, &DeliveryOptions::default(), None).unwrap();
        assert!(prepared.headers.is_empty());
        assert_eq!(&prepared.body[..], br#"{"aps":{"alert":"hi"}}"#);
    }

    #[test]
    fn test_priority_header_only_when_not_default() {
        let options = DeliveryOptions {
            priority: Priority::Delayed,
            ..DeliveryOptions::default()
        };
        let prepared = prepare(&Payload::new(), &options, None).unwrap();
        assert_eq!(prepared.headers.get("apns-priority").unwrap(), "5");
    }

    #[test]
    fn test_topic_and_expiration_headers() {
        let options = DeliveryOptions {
            topic: Some("com.example.app".to_string()),
            expiration: Some(1_700_000_000),
            ..DeliveryOptions::default()
        };
        let prepared = prepare(&Payload::new(), &options, None).unwrap();
        assert_eq!(prepared.headers.get("apns-topic").unwrap(), "com.example.app");
        assert_eq!(prepared.headers.get("apns-expiration").unwrap(), "1700000000");
        assert!(prepared.headers.get("apns-priority").is_none());
    }

    #[test]
    fn test_authorization_header_uses_bearer_token() {
        let provider = CredentialProvider::new("TEAM", "KID", SigningKey::random(&mut OsRng));
        let prepared =
            prepare(&Payload::new(), &DeliveryOptions::default(), Some(&provider)).unwrap();

        let auth = prepared.headers.get(AUTHORIZATION).unwrap().to_str().unwrap();
        let token = provider.get_credential().unwrap().token;
        assert_eq!(auth, format!("bearer {token}"));
    }

    #[test]
    fn test_invalid_topic_is_serialization_error() {
        let options = DeliveryOptions::with_topic("bad\ntopic");
        let err = prepare(&Payload::new(), &options, None).unwrap_err();
        assert!(matches!(err, DispatchError::Serialization(_)));
    }

    #[test]
    fn test_priority_from_str() {
        assert_eq!("immediate".parse::<Priority>().unwrap(), Priority::Immediate);
        assert_eq!("Delayed".parse::<Priority>().unwrap(), Priority::Delayed);
        assert_eq!("5".parse::<Priority>().unwrap(), Priority::Delayed);
        assert!("urgent".parse::<Priority>().is_err());
    }
}
