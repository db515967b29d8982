//! Alert sub-document of a notification payload.
//!
//! An alert renders either as a bare body string or, when any other field
//! is set, as a dictionary:
//!
//! ```text
//! "alert": "You got mail"
//! "alert": {"loc-key": "MAIL", "loc-args": ["Bob"], "action-loc-key": null, "body": "..."}
//! ```

use crate::error::CannotCropBody;
use serde::Serialize;

/// Default floor for the body length when cropping.
pub const DEFAULT_MINIMUM_LENGTH: usize = 3;

/// Appended to a cropped body.
pub const TRUNCATION_MARKER: char = '…';

/// Localization key for the action button.
///
/// `Unset` omits the key entirely, `NoButton` renders an explicit `null`
/// which tells the device to show the alert without an action button.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActionKey {
    #[default]
    Unset,
    NoButton,
    Key(String),
}

/// Human-visible part of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertItem {
    body: Option<String>,
    action_key: ActionKey,
    loc_key: Option<String>,
    loc_args: Option<Vec<String>>,
    launch_image: Option<String>,
    title: Option<String>,
    title_loc_key: Option<String>,
    title_loc_args: Option<Vec<String>>,
    minimum_length: usize,
}

impl Default for AlertItem {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertItem {
    pub fn new() -> Self {
        Self {
            body: None,
            action_key: ActionKey::Unset,
            loc_key: None,
            loc_args: None,
            launch_image: None,
            title: None,
            title_loc_key: None,
            title_loc_args: None,
            minimum_length: DEFAULT_MINIMUM_LENGTH,
        }
    }

    /// Sets the floor below which [`crop`](Self::crop) refuses to shorten the body.
    /// Values below 1 are raised to 1.
    pub fn with_minimum_length(mut self, length: usize) -> Self {
        self.minimum_length = length.max(1);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_action_key(mut self, key: ActionKey) -> Self {
        self.action_key = key;
        self
    }

    pub fn with_action_loc_key(self, key: impl Into<String>) -> Self {
        self.with_action_key(ActionKey::Key(key.into()))
    }

    /// Shows the alert with a single dismiss button.
    pub fn without_action_button(self) -> Self {
        self.with_action_key(ActionKey::NoButton)
    }

    pub fn with_loc_key(mut self, key: impl Into<String>) -> Self {
        self.loc_key = Some(key.into());
        self
    }

    pub fn with_loc_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.loc_args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_launch_image(mut self, file: impl Into<String>) -> Self {
        self.launch_image = Some(file.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_title_loc_key(mut self, key: impl Into<String>) -> Self {
        self.title_loc_key = Some(key.into());
        self
    }

    pub fn with_title_loc_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.title_loc_args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Body length in characters, 0 when no body is set.
    pub fn body_length(&self) -> usize {
        self.body.as_deref().map_or(0, |b| b.chars().count())
    }

    pub fn action_key(&self) -> &ActionKey {
        &self.action_key
    }

    pub fn minimum_length(&self) -> usize {
        self.minimum_length
    }

    /// Keeps the first `length - 1` characters of the body and appends
    /// [`TRUNCATION_MARKER`].
    ///
    /// Fails when `length` is not greater than the minimum length, meaning no
    /// further reduction is allowed.
    pub fn crop(&mut self, length: usize) -> Result<(), CannotCropBody> {
        if length <= self.minimum_length {
            return Err(CannotCropBody {
                target: length,
                minimum: self.minimum_length,
            });
        }

        if let Some(body) = self.body.as_mut() {
            let mut cropped: String = body.chars().take(length - 1).collect();
            cropped.push(TRUNCATION_MARKER);
            *body = cropped;
        }
        Ok(())
    }

    /// Renders the alert, or `None` when nothing is set.
    pub fn render(&self) -> Option<AlertValue<'_>> {
        let dictionary = AlertDictionary {
            loc_key: self.loc_key.as_deref(),
            loc_args: self.loc_args.as_deref(),
            launch_image: self.launch_image.as_deref(),
            action_loc_key: match &self.action_key {
                ActionKey::Unset => None,
                ActionKey::NoButton => Some(None),
                ActionKey::Key(key) => Some(Some(key.as_str())),
            },
            title: self.title.as_deref(),
            title_loc_key: self.title_loc_key.as_deref(),
            title_loc_args: self.title_loc_args.as_deref(),
            body: None,
        };

        match (dictionary.is_empty(), self.body.as_deref()) {
            (true, None) => None,
            (true, Some(body)) => Some(AlertValue::Body(body)),
            (false, body) => Some(AlertValue::Dictionary(AlertDictionary { body, ..dictionary })),
        }
    }
}

/// Rendered alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AlertValue<'a> {
    Body(&'a str),
    Dictionary(AlertDictionary<'a>),
}

/// Dictionary form of a rendered alert. Unset fields are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertDictionary<'a> {
    #[serde(rename = "loc-key", skip_serializing_if = "Option::is_none")]
    loc_key: Option<&'a str>,
    #[serde(rename = "loc-args", skip_serializing_if = "Option::is_none")]
    loc_args: Option<&'a [String]>,
    #[serde(rename = "launch-image", skip_serializing_if = "Option::is_none")]
    launch_image: Option<&'a str>,
    #[serde(rename = "action-loc-key", skip_serializing_if = "Option::is_none")]
    action_loc_key: Option<Option<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(rename = "title-loc-key", skip_serializing_if = "Option::is_none")]
    title_loc_key: Option<&'a str>,
    #[serde(rename = "title-loc-args", skip_serializing_if = "Option::is_none")]
    title_loc_args: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

impl AlertDictionary<'_> {
    fn is_empty(&self) -> bool {
        self.loc_key.is_none()
            && self.loc_args.is_none()
            && self.launch_image.is_none()
            && self.action_loc_key.is_none()
            && self.title.is_none()
            && self.title_loc_key.is_none()
            && self.title_loc_args.is_none()
            && self.body.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn rendered(item: &AlertItem) -> serde_json::Value {
        serde_json::to_value(item.render()).unwrap()
    }

    #[test]
    fn test_crop_shorter_body_gets_marker() {
        let mut item = AlertItem::new().with_body("abc");
        item.crop(10).unwrap();
        assert_eq!(item.body(), Some("abc…"));
    }

    #[test]
    fn test_crop_equal_body() {
        let mut item = AlertItem::new().with_body("abcdefghij");
        item.crop(10).unwrap();
        assert_eq!(item.body(), Some("abcdefghi…"));
        assert_eq!(item.body_length(), 10);
    }

    #[test]
    fn test_crop_without_body() {
        let mut item = AlertItem::new().with_loc_key("GAME_INVITE");
        item.crop(10).unwrap();
        assert_eq!(item.body(), None);
    }

    #[test]
    fn test_crop_longer_body() {
        let mut item = AlertItem::new().with_body("а".repeat(11));
        item.crop(10).unwrap();
        let expected = format!("{}{}", "а".repeat(9), TRUNCATION_MARKER);
        assert_eq!(item.body(), Some(expected.as_str()));
        assert_eq!(item.body_length(), 10);
    }

    #[test]
    fn test_crop_counts_characters_not_bytes() {
        let mut item = AlertItem::new().with_minimum_length(1).with_body("абв");
        item.crop(2).unwrap();
        assert_eq!(item.body(), Some("а…"));
    }

    #[test]
    fn test_crop_below_minimum() {
        let mut item = AlertItem::new().with_minimum_length(5).with_body("foobar");
        let err = item.crop(4).unwrap_err();
        assert_eq!(err.minimum, 5);
        assert_eq!(item.body(), Some("foobar"));
    }

    #[test]
    fn test_crop_at_minimum() {
        let mut item = AlertItem::new().with_minimum_length(5).with_body("foobar");
        assert!(item.crop(5).is_err());
    }

    #[test]
    fn test_minimum_length_floor() {
        let item = AlertItem::new().with_minimum_length(0);
        assert_eq!(item.minimum_length(), 1);
        assert_eq!(AlertItem::new().minimum_length(), DEFAULT_MINIMUM_LENGTH);
    }

    #[test]
    fn test_render_nothing() {
        assert!(AlertItem::new().render().is_none());
    }

    #[test]
    fn test_render_bare_body() {
        let item = AlertItem::new().with_body("test1");
        assert_eq!(item.render(), Some(AlertValue::Body("test1")));
        assert_eq!(rendered(&item), json!("test1"));
    }

    #[test]
    fn test_render_dictionary() {
        let item = AlertItem::new()
            .with_body("Bob wants to play poker")
            .with_loc_key("GAME_PLAY_REQUEST_FORMAT")
            .with_loc_args(["Jenna", "Frank"])
            .with_launch_image("poker.png")
            .with_action_loc_key("PLAY");

        assert_eq!(
            rendered(&item),
            json!({
                "loc-key": "GAME_PLAY_REQUEST_FORMAT",
                "loc-args": ["Jenna", "Frank"],
                "launch-image": "poker.png",
                "action-loc-key": "PLAY",
                "body": "Bob wants to play poker",
            })
        );
    }

    #[test]
    fn test_render_field_order() {
        let item = AlertItem::new()
            .with_body("b")
            .with_title("t")
            .with_loc_key("k");
        let text = serde_json::to_string(&item.render()).unwrap();
        assert_eq!(text, r#"{"loc-key":"k","title":"t","body":"b"}"#);
    }

    #[test]
    fn test_render_action_key_tri_state() {
        let unset = AlertItem::new().with_body("hi");
        assert_eq!(unset.action_key(), &ActionKey::Unset);
        assert_eq!(rendered(&unset), json!("hi"));

        let cleared = AlertItem::new().with_body("hi").without_action_button();
        assert_eq!(
            serde_json::to_string(&cleared.render()).unwrap(),
            r#"{"action-loc-key":null,"body":"hi"}"#
        );

        let keyed = AlertItem::new().with_action_loc_key("OPEN");
        assert_eq!(rendered(&keyed), json!({"action-loc-key": "OPEN"}));
    }

    #[test]
    fn test_render_title_fields() {
        let item = AlertItem::new()
            .with_title_loc_key("TITLE")
            .with_title_loc_args(["x"]);
        assert_eq!(
            rendered(&item),
            json!({"title-loc-key": "TITLE", "title-loc-args": ["x"]})
        );
    }

    proptest! {
        #[test]
        fn prop_crop_respects_minimum(body in "\\PC{0,40}", minimum in 1usize..10, target in 0usize..50) {
            let mut item = AlertItem::new().with_minimum_length(minimum).with_body(body.clone());
            let original = item.body_length();
            match item.crop(target) {
                Err(_) => {
                    prop_assert!(target <= minimum);
                    prop_assert_eq!(item.body(), Some(body.as_str()));
                }
                Ok(()) => {
                    prop_assert!(target > minimum);
                    let kept: String = body.chars().take(target - 1).collect();
                    prop_assert_eq!(item.body_length(), original.min(target - 1) + 1);
                    let expected = format!("{}{}", kept, TRUNCATION_MARKER);
                    prop_assert_eq!(item.body(), Some(expected.as_str()));
                }
            }
        }
    }
}
