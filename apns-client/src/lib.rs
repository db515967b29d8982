//! # apns-client
//!
//! Client library for the legacy binary Apple Push Notification service.
//!
//! This crate provides:
//! - TLS connections with a client certificate and connect retries
//! - A notification client that interprets the gateway's error responses
//! - A feedback client that drains unreachable device tokens

pub mod connection;
pub mod error;
pub mod feedback;
pub mod notification;
mod stream;
pub mod tls;

#[cfg(test)]
mod testing;

pub use connection::{ConnectionConfig, Connector, Dial, ProtocolScheme, TlsDialer};
pub use error::{ClientError, SendError};
pub use feedback::{FeedbackClient, FeedbackStats, ProcessingError};
pub use notification::NotificationClient;
