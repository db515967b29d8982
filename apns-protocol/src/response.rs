//! Error-response packet sent by the gateway after a rejected command.
//!
//! ```text
//! +---------+--------+------------+
//! | command | status | identifier |
//! | 1 byte  | 1 byte | 4 bytes    |
//! +---------+--------+------------+
//! ```

use crate::error::ProtocolError;
use bytes::{BufMut, BytesMut};
use std::fmt;

/// Command byte of an error response.
pub const COMMAND_RESPONSE: u8 = 8;

/// Size of an error response.
pub const RESPONSE_SIZE: usize = 6;

/// Status codes the gateway reports in an error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    NoErrors,
    Processing,
    MissingDeviceToken,
    MissingTopic,
    MissingPayload,
    InvalidTokenSize,
    InvalidTopicSize,
    InvalidPayloadSize,
    InvalidToken,
    Shutdown,
    Unknown,
}

impl StatusCode {
    /// Maps a status byte, or `None` for codes outside the table.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(StatusCode::NoErrors),
            1 => Some(StatusCode::Processing),
            2 => Some(StatusCode::MissingDeviceToken),
            3 => Some(StatusCode::MissingTopic),
            4 => Some(StatusCode::MissingPayload),
            5 => Some(StatusCode::InvalidTokenSize),
            6 => Some(StatusCode::InvalidTopicSize),
            7 => Some(StatusCode::InvalidPayloadSize),
            8 => Some(StatusCode::InvalidToken),
            10 => Some(StatusCode::Shutdown),
            255 => Some(StatusCode::Unknown),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            StatusCode::NoErrors => 0,
            StatusCode::Processing => 1,
            StatusCode::MissingDeviceToken => 2,
            StatusCode::MissingTopic => 3,
            StatusCode::MissingPayload => 4,
            StatusCode::InvalidTokenSize => 5,
            StatusCode::InvalidTopicSize => 6,
            StatusCode::InvalidPayloadSize => 7,
            StatusCode::InvalidToken => 8,
            StatusCode::Shutdown => 10,
            StatusCode::Unknown => 255,
        }
    }

    /// Gateway description of the status.
    pub fn message(&self) -> &'static str {
        match self {
            StatusCode::NoErrors => "No errors encountered",
            StatusCode::Processing => "Processing error",
            StatusCode::MissingDeviceToken => "Missing device token",
            StatusCode::MissingTopic => "Missing topic",
            StatusCode::MissingPayload => "Missing payload",
            StatusCode::InvalidTokenSize => "Invalid token size",
            StatusCode::InvalidTopicSize => "Invalid topic size",
            StatusCode::InvalidPayloadSize => "Invalid payload size",
            StatusCode::InvalidToken => "Invalid token",
            StatusCode::Shutdown => "Shutdown",
            StatusCode::Unknown => "None (unknown)",
        }
    }

    /// Whether resending the same notification may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StatusCode::Processing | StatusCode::Shutdown)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A decoded error response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorResponse {
    pub command: u8,
    pub status: u8,
    /// Identifier of the rejected notification.
    pub identifier: u32,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, identifier: u32) -> Self {
        Self {
            command: COMMAND_RESPONSE,
            status: status.code(),
            identifier,
        }
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let packet: &[u8; RESPONSE_SIZE] =
            buf.try_into().map_err(|_| ProtocolError::Truncated {
                what: "error response",
                needed: RESPONSE_SIZE,
                actual: buf.len(),
            })?;
        Ok(Self {
            command: packet[0],
            status: packet[1],
            identifier: u32::from_be_bytes([packet[2], packet[3], packet[4], packet[5]]),
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(RESPONSE_SIZE);
        buf.put_u8(self.command);
        buf.put_u8(self.status);
        buf.put_u32(self.identifier);
        buf
    }

    /// Whether the command byte marks this as an error response.
    pub fn is_response_command(&self) -> bool {
        self.command == COMMAND_RESPONSE
    }

    /// Status from the table, or `None` for an unsupported code.
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_code(self.status)
    }
}
