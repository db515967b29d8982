//! Feedback service record.
//!
//! ```text
//! +-----------+-----------+--------------+
//! | timestamp | token_len | device token |
//! | 4 bytes   | 2 bytes   | 32 bytes     |
//! +-----------+-----------+--------------+
//! ```

use crate::command::DeviceToken;
use crate::error::ProtocolError;
use crate::DEVICE_TOKEN_SIZE;
use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};

/// Size of a feedback record.
pub const FEEDBACK_RECORD_SIZE: usize = 4 + 2 + DEVICE_TOKEN_SIZE;

/// A device that stopped accepting notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRecord {
    /// Unix time at which the gateway determined the app was gone.
    pub timestamp: u32,
    /// Device token, lowercase hex.
    pub token: String,
}

impl FeedbackRecord {
    pub fn new(timestamp: u32, token: &DeviceToken) -> Self {
        Self {
            timestamp,
            token: token.to_hex(),
        }
    }

    /// Decodes a full record. The token length field is not interpreted;
    /// the token always spans the last 32 bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let record: &[u8; FEEDBACK_RECORD_SIZE] =
            buf.try_into().map_err(|_| ProtocolError::Truncated {
                what: "feedback record",
                needed: FEEDBACK_RECORD_SIZE,
                actual: buf.len(),
            })?;
        Ok(Self {
            timestamp: u32::from_be_bytes([record[0], record[1], record[2], record[3]]),
            token: hex::encode(&record[6..]),
        })
    }

    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let token = DeviceToken::parse(&self.token)?;
        let mut buf = BytesMut::with_capacity(FEEDBACK_RECORD_SIZE);
        buf.put_u32(self.timestamp);
        buf.put_u16(DEVICE_TOKEN_SIZE as u16);
        buf.put_slice(token.as_bytes());
        Ok(buf)
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(i64::from(self.timestamp), 0)
    }
}
