//! Notification payload and its size-constrained JSON rendering.
//!
//! The rendered document has the shape
//!
//! ```text
//! {"aps":{"sound":"...","badge":1,"alert":...,"content-available":1},"custom":...}
//! ```
//!
//! Sizes are counted in characters. When the rendered document exceeds the
//! active maximum, the alert body is cropped once by the excess and the
//! document is rendered again. Cropping `n` characters from the body shrinks
//! the document by at least `n` characters, so the second rendering always fits.

use crate::alert::{AlertItem, AlertValue};
use crate::error::ProtocolError;
use crate::{EXTENDED_PAYLOAD_SIZE, LEGACY_PAYLOAD_SIZE};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Default delivery timeout (one day).
pub const DEFAULT_DELIVERY_TIMEOUT: u32 = 86_400;

/// Delivery priority carried by the frame format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Priority {
    /// Deliver now.
    #[default]
    Immediate,
    /// Deliver at a time that conserves power on the device.
    ConservePower,
}

impl Priority {
    pub fn code(&self) -> u8 {
        match self {
            Priority::Immediate => 10,
            Priority::ConservePower => 5,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        match code {
            10 => Ok(Priority::Immediate),
            5 => Ok(Priority::ConservePower),
            other => Err(ProtocolError::InvalidPriority(other)),
        }
    }
}

/// A notification payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    identifier: u32,
    delivery_timeout: u32,
    badge: Option<u32>,
    sound: Option<String>,
    content_available: bool,
    priority: Priority,
    extended: bool,
    alert: Option<AlertItem>,
    custom: BTreeMap<String, Value>,
}

impl Default for Payload {
    fn default() -> Self {
        Self::new()
    }
}

impl Payload {
    pub fn new() -> Self {
        Self {
            identifier: 0,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            badge: None,
            sound: None,
            content_available: false,
            priority: Priority::Immediate,
            extended: false,
            alert: None,
            custom: BTreeMap::new(),
        }
    }

    /// Identifier echoed back in an error response for this notification.
    pub fn with_identifier(mut self, identifier: u32) -> Self {
        self.identifier = identifier;
        self
    }

    /// Seconds after sending during which the gateway keeps retrying delivery.
    pub fn with_delivery_timeout(mut self, seconds: u32) -> Self {
        self.delivery_timeout = seconds;
        self
    }

    /// Sets the badge number. Negative values are clamped to 0.
    pub fn with_badge(mut self, badge: i64) -> Self {
        self.badge = Some(badge.clamp(0, i64::from(u32::MAX)) as u32);
        self
    }

    pub fn without_badge(mut self) -> Self {
        self.badge = None;
        self
    }

    pub fn with_sound(mut self, file: impl Into<String>) -> Self {
        self.sound = Some(file.into());
        self
    }

    pub fn with_content_available(mut self, available: bool) -> Self {
        self.content_available = available;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the priority from its wire code (10 or 5).
    pub fn set_priority(&mut self, code: u8) -> Result<&mut Self, ProtocolError> {
        self.priority = Priority::from_code(code)?;
        Ok(self)
    }

    /// Selects the 2048-character limit instead of 256.
    pub fn with_extended_size(mut self, extended: bool) -> Self {
        self.extended = extended;
        self
    }

    pub fn with_alert(mut self, alert: AlertItem) -> Self {
        self.alert = Some(alert);
        self
    }

    /// Replaces the alert item, returning the previous one.
    pub fn set_alert(&mut self, alert: Option<AlertItem>) -> Option<AlertItem> {
        std::mem::replace(&mut self.alert, alert)
    }

    /// Adds a top-level field next to `aps`.
    pub fn with_custom_field(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, ProtocolError> {
        let key = key.into();
        if key == "aps" {
            return Err(ProtocolError::ReservedField(key));
        }
        self.custom.insert(key, value.into());
        Ok(self)
    }

    pub fn identifier(&self) -> u32 {
        self.identifier
    }

    pub fn delivery_timeout(&self) -> u32 {
        self.delivery_timeout
    }

    pub fn badge(&self) -> Option<u32> {
        self.badge
    }

    pub fn sound(&self) -> Option<&str> {
        self.sound.as_deref()
    }

    pub fn is_content_available(&self) -> bool {
        self.content_available
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    pub fn alert(&self) -> Option<&AlertItem> {
        self.alert.as_ref()
    }

    pub fn custom_fields(&self) -> &BTreeMap<String, Value> {
        &self.custom
    }

    /// Maximum rendered length selected by the extended size flag.
    pub fn max_length(&self) -> usize {
        if self.extended {
            EXTENDED_PAYLOAD_SIZE
        } else {
            LEGACY_PAYLOAD_SIZE
        }
    }

    /// Absolute expiration epoch, computed from the current time.
    pub fn expiration_time(&self) -> u32 {
        self.expiration_at(Utc::now().timestamp())
    }

    /// Absolute expiration epoch relative to `now` (Unix seconds).
    pub fn expiration_at(&self, now: i64) -> u32 {
        let expiration = now.saturating_add(i64::from(self.delivery_timeout));
        expiration.clamp(0, i64::from(u32::MAX)) as u32
    }

    /// Builds the JSON document, or `None` when no field would be emitted.
    pub fn document(&self) -> Option<Document<'_>> {
        let aps = Aps {
            sound: self.sound.as_deref(),
            badge: self.badge,
            alert: self.alert.as_ref().and_then(AlertItem::render),
            content_available: self.content_available.then_some(1),
        };
        let aps = (!aps.is_empty()).then_some(aps);

        if aps.is_none() && self.custom.is_empty() {
            return None;
        }
        Some(Document {
            aps,
            custom: &self.custom,
        })
    }

    /// Serializes the document without any size check.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(&self.document())?)
    }

    /// Renders the payload within its own maximum length.
    pub fn render(&mut self) -> Result<String, ProtocolError> {
        self.render_within(self.max_length())
    }

    /// Renders the payload within `max` characters, cropping the alert body
    /// once if needed.
    ///
    /// Fails with [`ProtocolError::PayloadTooLarge`] when the body cannot be
    /// cropped far enough. The alert item is left cropped on success.
    pub fn render_within(&mut self, max: usize) -> Result<String, ProtocolError> {
        let rendered = self.to_json()?;
        let length = rendered.chars().count();
        if length <= max {
            return Ok(rendered);
        }

        let excess = length - max;
        let alert = self
            .alert
            .as_mut()
            .ok_or(ProtocolError::PayloadTooLarge { max })?;
        let target = alert.body_length().saturating_sub(excess);
        alert
            .crop(target)
            .map_err(|_| ProtocolError::PayloadTooLarge { max })?;

        self.to_json()
    }
}

/// Rendered payload document.
#[derive(Debug, Serialize)]
pub struct Document<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    aps: Option<Aps<'a>>,
    #[serde(flatten)]
    custom: &'a BTreeMap<String, Value>,
}

#[derive(Debug, Serialize)]
struct Aps<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    alert: Option<AlertValue<'a>>,
    #[serde(rename = "content-available", skip_serializing_if = "Option::is_none")]
    content_available: Option<u8>,
}

impl Aps<'_> {
    fn is_empty(&self) -> bool {
        self.sound.is_none()
            && self.badge.is_none()
            && self.alert.is_none()
            && self.content_available.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::TRUNCATION_MARKER;
    use serde_json::json;

    /// Characters in `{"aps":{"alert":""}}`.
    const BARE_ALERT_OVERHEAD: usize = 20;

    fn body_only(body: &str) -> Payload {
        Payload::new().with_alert(AlertItem::new().with_body(body))
    }

    #[test]
    fn test_simple_alert_rendering() {
        let mut payload = Payload::new()
            .with_alert(AlertItem::new().with_body("test1"))
            .with_badge(1)
            .with_identifier(42);

        assert_eq!(
            payload.render().unwrap(),
            r#"{"aps":{"badge":1,"alert":"test1"}}"#
        );
        assert_eq!(payload.identifier(), 42);
        assert_eq!(payload.alert().unwrap().body(), Some("test1"));
    }

    #[test]
    fn test_full_aps_order() {
        let mut payload = Payload::new()
            .with_alert(AlertItem::new().with_body("hi"))
            .with_badge(3)
            .with_sound("bingbong.aiff")
            .with_content_available(true);

        assert_eq!(
            payload.render().unwrap(),
            r#"{"aps":{"sound":"bingbong.aiff","badge":3,"alert":"hi","content-available":1}}"#
        );
    }

    #[test]
    fn test_empty_payload_renders_null() {
        let mut payload = Payload::new();
        assert!(payload.document().is_none());
        assert_eq!(payload.render().unwrap(), "null");

        let mut payload = Payload::new().with_alert(AlertItem::new());
        assert_eq!(payload.render().unwrap(), "null");
    }

    #[test]
    fn test_content_available_false_omitted() {
        let mut payload = Payload::new().with_badge(0).with_content_available(false);
        assert_eq!(payload.render().unwrap(), r#"{"aps":{"badge":0}}"#);
    }

    #[test]
    fn test_negative_badge_clamped() {
        let payload = Payload::new().with_badge(-5);
        assert_eq!(payload.badge(), Some(0));
        assert_eq!(payload.without_badge().badge(), None);
    }

    #[test]
    fn test_unicode_not_escaped() {
        let mut payload = body_only("Привет");
        assert_eq!(
            payload.render().unwrap(),
            r#"{"aps":{"alert":"Привет"}}"#
        );
    }

    #[test]
    fn test_custom_fields() {
        let mut payload = body_only("You got your emails.")
            .with_badge(9)
            .with_sound("bingbong.aiff")
            .with_custom_field("acme", "foo")
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&payload.render().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "aps": {"sound": "bingbong.aiff", "badge": 9, "alert": "You got your emails."},
                "acme": "foo",
            })
        );
    }

    #[test]
    fn test_custom_fields_without_aps() {
        let mut payload = Payload::new().with_custom_field("acme", 1).unwrap();
        assert_eq!(payload.render().unwrap(), r#"{"acme":1}"#);
    }

    #[test]
    fn test_custom_field_aps_reserved() {
        let result = Payload::new().with_custom_field("aps", "x");
        assert!(matches!(result, Err(ProtocolError::ReservedField(_))));
    }

    #[test]
    fn test_priority() {
        let mut payload = Payload::new();
        assert_eq!(payload.priority(), Priority::Immediate);

        payload.set_priority(5).unwrap();
        assert_eq!(payload.priority(), Priority::ConservePower);

        assert!(matches!(
            payload.set_priority(7),
            Err(ProtocolError::InvalidPriority(7))
        ));
        assert_eq!(payload.priority(), Priority::ConservePower);

        assert_eq!(Priority::Immediate.code(), 10);
        assert_eq!(Priority::ConservePower.code(), 5);
    }

    #[test]
    fn test_expiration() {
        let payload = Payload::new();
        assert_eq!(payload.delivery_timeout(), DEFAULT_DELIVERY_TIMEOUT);
        assert_eq!(payload.expiration_at(1_000), 1_000 + 86_400);

        let payload = Payload::new().with_delivery_timeout(0);
        assert_eq!(payload.expiration_at(-10), 0);

        let payload = Payload::new().with_delivery_timeout(60);
        let now = Utc::now().timestamp();
        let expiration = i64::from(payload.expiration_time());
        assert!(expiration >= now + 60 && expiration <= now + 61);
    }

    #[test]
    fn test_max_length() {
        assert_eq!(Payload::new().max_length(), LEGACY_PAYLOAD_SIZE);
        assert_eq!(
            Payload::new().with_extended_size(true).max_length(),
            EXTENDED_PAYLOAD_SIZE
        );
    }

    #[test]
    fn test_exactly_at_limit_is_unmodified() {
        let body = "a".repeat(LEGACY_PAYLOAD_SIZE - BARE_ALERT_OVERHEAD);
        let mut payload = body_only(&body);

        let rendered = payload.render().unwrap();
        assert_eq!(rendered.chars().count(), LEGACY_PAYLOAD_SIZE);
        assert_eq!(payload.alert().unwrap().body(), Some(body.as_str()));
    }

    #[test]
    fn test_one_over_limit_is_cropped() {
        let length = LEGACY_PAYLOAD_SIZE - BARE_ALERT_OVERHEAD + 1;
        let mut payload = body_only(&"a".repeat(length));

        let rendered = payload.render().unwrap();
        let body = payload.alert().unwrap().body().unwrap();
        assert_eq!(payload.alert().unwrap().body_length(), length - 1);
        assert!(body.ends_with(TRUNCATION_MARKER));
        assert_eq!(rendered.chars().count(), LEGACY_PAYLOAD_SIZE);
    }

    #[test]
    fn test_ten_over_limit() {
        let length = LEGACY_PAYLOAD_SIZE - BARE_ALERT_OVERHEAD + 10;
        let mut payload = body_only(&"a".repeat(length));

        let rendered = payload.render().unwrap();
        let alert = payload.alert().unwrap();
        assert_eq!(alert.body_length(), length - 10);
        assert!(alert.body().unwrap().ends_with(TRUNCATION_MARKER));
        assert!(rendered.chars().count() <= LEGACY_PAYLOAD_SIZE);
    }

    #[test]
    fn test_multibyte_body_cropped_by_characters() {
        let length = LEGACY_PAYLOAD_SIZE - BARE_ALERT_OVERHEAD + 4;
        let mut payload = body_only(&"ж".repeat(length));

        let rendered = payload.render().unwrap();
        assert_eq!(rendered.chars().count(), LEGACY_PAYLOAD_SIZE);
        assert_eq!(payload.alert().unwrap().body_length(), length - 4);
    }

    #[test]
    fn test_extended_limit() {
        let body = "a".repeat(1_000);
        let mut payload = body_only(&body).with_extended_size(true);
        payload.render().unwrap();
        assert_eq!(payload.alert().unwrap().body(), Some(body.as_str()));

        let mut payload = body_only(&body);
        payload.render_within(EXTENDED_PAYLOAD_SIZE).unwrap();
        assert_eq!(payload.alert().unwrap().body(), Some(body.as_str()));
    }

    #[test]
    fn test_cannot_crop_is_error() {
        let mut payload = Payload::new()
            .with_alert(AlertItem::new().with_body("short"))
            .with_sound("x".repeat(300));

        assert!(matches!(
            payload.render(),
            Err(ProtocolError::PayloadTooLarge { max: 256 })
        ));
    }

    #[test]
    fn test_oversized_without_alert_is_error() {
        let mut payload = Payload::new().with_sound("x".repeat(300));
        assert!(matches!(
            payload.render(),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_set_alert_replaces() {
        let mut payload = body_only("first");
        let previous = payload.set_alert(Some(AlertItem::new().with_body("second")));
        assert_eq!(previous.unwrap().body(), Some("first"));
        assert_eq!(payload.alert().unwrap().body(), Some("second"));
    }
}
