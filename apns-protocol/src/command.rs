//! Push command framing.
//!
//! Three generations of the push command share the gateway port. All
//! integers are big-endian.
//!
//! ```text
//! simple (0):   | 0 | token_len:u16 | token | payload_len:u16 | payload |
//! enhanced (1): | 1 | identifier:u32 | expiry:u32 | token_len:u16 | token | payload_len:u16 | payload |
//! frame (2):    | 2 | frame_len:u32 | item* |
//!    item:      | item_id:u8 | item_len:u16 | value |
//! ```
//!
//! Frame items: 1 device token, 2 payload, 3 identifier (4 bytes),
//! 4 expiration (4 bytes), 5 priority (1 byte).

use crate::error::ProtocolError;
use crate::payload::Priority;
use crate::{DEVICE_TOKEN_SIZE, EXTENDED_PAYLOAD_SIZE};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::str::FromStr;

pub const COMMAND_SIMPLE: u8 = 0;
pub const COMMAND_ENHANCED: u8 = 1;
pub const COMMAND_FRAME: u8 = 2;

pub const ITEM_DEVICE_TOKEN: u8 = 1;
pub const ITEM_PAYLOAD: u8 = 2;
pub const ITEM_IDENTIFIER: u8 = 3;
pub const ITEM_EXPIRATION: u8 = 4;
pub const ITEM_PRIORITY: u8 = 5;

const SIMPLE_HEADER_SIZE: usize = 1 + 2;
const ENHANCED_HEADER_SIZE: usize = 1 + 4 + 4 + 2;
const FRAME_HEADER_SIZE: usize = 1 + 4;
const ITEM_HEADER_SIZE: usize = 1 + 2;

/// A device token in its 32-byte binary form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceToken([u8; DEVICE_TOKEN_SIZE]);

impl DeviceToken {
    /// Parses a hex token. Whitespace and angle brackets are ignored, so the
    /// `<740f4707 bebcf74f ...>` form is accepted.
    pub fn parse(token: &str) -> Result<Self, ProtocolError> {
        let digits: String = token
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '<' && *c != '>')
            .collect();
        let bytes = hex::decode(&digits)
            .map_err(|e| ProtocolError::InvalidToken(format!("{:?}: {}", token, e)))?;
        Self::from_slice(&bytes)
    }

    pub fn from_bytes(bytes: [u8; DEVICE_TOKEN_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let bytes: [u8; DEVICE_TOKEN_SIZE] = bytes.try_into().map_err(|_| {
            ProtocolError::InvalidToken(format!(
                "expected {} bytes, got {}",
                DEVICE_TOKEN_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; DEVICE_TOKEN_SIZE] {
        &self.0
    }

    /// Lowercase hex form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for DeviceToken {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Push command wire format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CommandFormat {
    Simple,
    Enhanced,
    #[default]
    Frame,
}

impl CommandFormat {
    pub fn code(&self) -> u8 {
        match self {
            CommandFormat::Simple => COMMAND_SIMPLE,
            CommandFormat::Enhanced => COMMAND_ENHANCED,
            CommandFormat::Frame => COMMAND_FRAME,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        match code {
            COMMAND_SIMPLE => Ok(CommandFormat::Simple),
            COMMAND_ENHANCED => Ok(CommandFormat::Enhanced),
            COMMAND_FRAME => Ok(CommandFormat::Frame),
            other => Err(ProtocolError::InvalidCommandFormat(other)),
        }
    }

    /// Whether the gateway may answer this command with an error response.
    pub fn expects_response(&self) -> bool {
        !matches!(self, CommandFormat::Simple)
    }

    /// Payload limit for this format. The frame format has its own limit;
    /// the older formats follow the payload's extended size flag.
    pub fn payload_limit(&self, payload_limit: usize) -> usize {
        match self {
            CommandFormat::Frame => EXTENDED_PAYLOAD_SIZE,
            _ => payload_limit,
        }
    }
}

impl fmt::Display for CommandFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandFormat::Simple => write!(f, "simple"),
            CommandFormat::Enhanced => write!(f, "enhanced"),
            CommandFormat::Frame => write!(f, "frame"),
        }
    }
}

impl FromStr for CommandFormat {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" | "0" => Ok(CommandFormat::Simple),
            "enhanced" | "1" => Ok(CommandFormat::Enhanced),
            "frame" | "2" => Ok(CommandFormat::Frame),
            _ => Err(ProtocolError::InvalidCommandFormat(u8::MAX)),
        }
    }
}

/// One notification addressed to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushCommand {
    pub token: DeviceToken,
    /// Rendered payload bytes.
    pub payload: Bytes,
    /// Ignored by the simple format.
    pub identifier: u32,
    /// Ignored by the simple format.
    pub expiration: u32,
    /// Only carried by the frame format.
    pub priority: Priority,
}

impl PushCommand {
    pub fn new(token: DeviceToken, payload: impl Into<Bytes>) -> Self {
        Self {
            token,
            payload: payload.into(),
            identifier: 0,
            expiration: 0,
            priority: Priority::Immediate,
        }
    }

    pub fn with_identifier(mut self, identifier: u32) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn with_expiration(mut self, expiration: u32) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Encodes the command in the given format.
    pub fn encode(&self, format: CommandFormat) -> Result<BytesMut, ProtocolError> {
        let payload_len = u16::try_from(self.payload.len()).map_err(|_| {
            ProtocolError::PayloadLengthOverflow {
                size: self.payload.len(),
                max: u16::MAX as usize,
            }
        })?;

        match format {
            CommandFormat::Simple => {
                let mut buf = BytesMut::with_capacity(
                    SIMPLE_HEADER_SIZE + DEVICE_TOKEN_SIZE + 2 + self.payload.len(),
                );
                buf.put_u8(COMMAND_SIMPLE);
                buf.put_u16(DEVICE_TOKEN_SIZE as u16);
                buf.put_slice(self.token.as_bytes());
                buf.put_u16(payload_len);
                buf.put_slice(&self.payload);
                Ok(buf)
            }
            CommandFormat::Enhanced => {
                let mut buf = BytesMut::with_capacity(
                    ENHANCED_HEADER_SIZE + DEVICE_TOKEN_SIZE + 2 + self.payload.len(),
                );
                buf.put_u8(COMMAND_ENHANCED);
                buf.put_u32(self.identifier);
                buf.put_u32(self.expiration);
                buf.put_u16(DEVICE_TOKEN_SIZE as u16);
                buf.put_slice(self.token.as_bytes());
                buf.put_u16(payload_len);
                buf.put_slice(&self.payload);
                Ok(buf)
            }
            CommandFormat::Frame => {
                let mut frame = BytesMut::with_capacity(
                    5 * ITEM_HEADER_SIZE + DEVICE_TOKEN_SIZE + self.payload.len() + 4 + 4 + 1,
                );
                put_item(&mut frame, ITEM_DEVICE_TOKEN, self.token.as_bytes());
                put_item(&mut frame, ITEM_PAYLOAD, &self.payload);
                put_item(&mut frame, ITEM_IDENTIFIER, &self.identifier.to_be_bytes());
                put_item(&mut frame, ITEM_EXPIRATION, &self.expiration.to_be_bytes());
                put_item(&mut frame, ITEM_PRIORITY, &[self.priority.code()]);

                let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + frame.len());
                buf.put_u8(COMMAND_FRAME);
                buf.put_u32(frame.len() as u32);
                buf.put_slice(&frame);
                Ok(buf)
            }
        }
    }

    /// Decodes one command from the front of `buf`.
    ///
    /// Returns `Ok(Some(..))` and consumes the command if it is complete,
    /// `Ok(None)` if more data is needed, or `Err` on malformed input.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<(CommandFormat, Self)>, ProtocolError> {
        let Some(&code) = buf.first() else {
            return Ok(None);
        };
        let format = CommandFormat::from_code(code).map_err(|_| ProtocolError::UnknownCommand(code))?;

        let total = match format {
            CommandFormat::Simple => prefixed_length(buf, SIMPLE_HEADER_SIZE)?,
            CommandFormat::Enhanced => prefixed_length(buf, ENHANCED_HEADER_SIZE)?,
            CommandFormat::Frame => {
                if buf.len() < FRAME_HEADER_SIZE {
                    None
                } else {
                    let frame_len = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]) as usize;
                    Some(FRAME_HEADER_SIZE + frame_len)
                }
            }
        };
        let Some(total) = total else {
            return Ok(None);
        };
        if buf.len() < total {
            return Ok(None);
        }

        let mut command = buf.split_to(total).freeze();
        command.advance(1);

        let decoded = match format {
            CommandFormat::Simple => decode_legacy(command, 0, 0)?,
            CommandFormat::Enhanced => {
                let identifier = command.get_u32();
                let expiration = command.get_u32();
                decode_legacy(command, identifier, expiration)?
            }
            CommandFormat::Frame => {
                command.advance(4);
                decode_frame(command)?
            }
        };
        Ok(Some((format, decoded)))
    }
}

fn put_item(buf: &mut BytesMut, id: u8, value: &[u8]) {
    buf.put_u8(id);
    buf.put_u16(value.len() as u16);
    buf.put_slice(value);
}

/// Total length of a simple or enhanced command whose token length field
/// ends at `header`, or `None` if the length fields are not buffered yet.
fn prefixed_length(buf: &[u8], header: usize) -> Result<Option<usize>, ProtocolError> {
    if buf.len() < header {
        return Ok(None);
    }
    let token_len = u16::from_be_bytes([buf[header - 2], buf[header - 1]]) as usize;
    if token_len != DEVICE_TOKEN_SIZE {
        return Err(ProtocolError::InvalidToken(format!(
            "token length field is {}",
            token_len
        )));
    }
    let payload_len_at = header + token_len;
    if buf.len() < payload_len_at + 2 {
        return Ok(None);
    }
    let payload_len = u16::from_be_bytes([buf[payload_len_at], buf[payload_len_at + 1]]) as usize;
    Ok(Some(payload_len_at + 2 + payload_len))
}

/// Decodes `token_len | token | payload_len | payload`; lengths were
/// validated by [`prefixed_length`].
fn decode_legacy(
    mut body: Bytes,
    identifier: u32,
    expiration: u32,
) -> Result<PushCommand, ProtocolError> {
    let token_len = body.get_u16() as usize;
    let token = DeviceToken::from_slice(&body.split_to(token_len))?;
    let payload_len = body.get_u16() as usize;
    let payload = body.split_to(payload_len);

    Ok(PushCommand::new(token, payload)
        .with_identifier(identifier)
        .with_expiration(expiration))
}

fn decode_frame(mut frame: Bytes) -> Result<PushCommand, ProtocolError> {
    let mut token = None;
    let mut payload = None;
    let mut identifier = 0;
    let mut expiration = 0;
    let mut priority = Priority::Immediate;

    while frame.has_remaining() {
        if frame.remaining() < ITEM_HEADER_SIZE {
            return Err(ProtocolError::Truncated {
                what: "frame item header",
                needed: ITEM_HEADER_SIZE,
                actual: frame.remaining(),
            });
        }
        let id = frame.get_u8();
        let length = frame.get_u16() as usize;
        if frame.remaining() < length {
            return Err(ProtocolError::Truncated {
                what: "frame item",
                needed: length,
                actual: frame.remaining(),
            });
        }
        let mut value = frame.split_to(length);

        match (id, length) {
            (ITEM_DEVICE_TOKEN, _) => token = Some(DeviceToken::from_slice(&value)?),
            (ITEM_PAYLOAD, _) => payload = Some(value),
            (ITEM_IDENTIFIER, 4) => identifier = value.get_u32(),
            (ITEM_EXPIRATION, 4) => expiration = value.get_u32(),
            (ITEM_PRIORITY, 1) => priority = Priority::from_code(value.get_u8())?,
            _ => return Err(ProtocolError::UnexpectedItem { id, length }),
        }
    }

    let token = token.ok_or(ProtocolError::MissingItem("device token"))?;
    let payload = payload.ok_or(ProtocolError::MissingItem("payload"))?;
    Ok(PushCommand::new(token, payload)
        .with_identifier(identifier)
        .with_expiration(expiration)
        .with_priority(priority))
}
