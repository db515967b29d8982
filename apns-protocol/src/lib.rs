//! # apns-protocol
//!
//! Wire protocol for the legacy binary Apple Push Notification service.
//!
//! This crate provides:
//! - Alert and payload models with size-constrained JSON rendering
//! - Push command framing for the simple, enhanced and frame formats
//! - The 6-byte error-response packet and its status-code table
//! - The 38-byte feedback record

pub mod alert;
pub mod command;
pub mod error;
pub mod feedback;
pub mod payload;
pub mod response;

pub use alert::{ActionKey, AlertItem, AlertValue};
pub use command::{CommandFormat, DeviceToken, PushCommand};
pub use error::{CannotCropBody, ProtocolError};
pub use feedback::FeedbackRecord;
pub use payload::{Payload, Priority};
pub use response::{ErrorResponse, StatusCode};

/// Notification gateway, production.
pub const GATEWAY_PRODUCTION: &str = "gateway.push.apple.com";

/// Notification gateway, sandbox.
pub const GATEWAY_SANDBOX: &str = "gateway.sandbox.push.apple.com";

/// Notification gateway port.
pub const GATEWAY_PORT: u16 = 2195;

/// Feedback service, production.
pub const FEEDBACK_PRODUCTION: &str = "feedback.push.apple.com";

/// Feedback service, sandbox.
pub const FEEDBACK_SANDBOX: &str = "feedback.sandbox.push.apple.com";

/// Feedback service port.
pub const FEEDBACK_PORT: u16 = 2196;

/// Length of a binary device token.
pub const DEVICE_TOKEN_SIZE: usize = 32;

/// Maximum payload length for the legacy formats, in characters.
pub const LEGACY_PAYLOAD_SIZE: usize = 256;

/// Maximum payload length with the extended size flag or the frame format, in characters.
pub const EXTENDED_PAYLOAD_SIZE: usize = 2048;
