//! Push gateway client.

use crate::connection::{ConnectionConfig, Connector, Dial, TlsDialer};
use crate::error::{ClientError, SendError};
use crate::stream::{read_full, write_counted};
use apns_protocol::response::RESPONSE_SIZE;
use apns_protocol::{CommandFormat, DeviceToken, ErrorResponse, Payload, PushCommand, StatusCode};
use std::time::Duration;
use tokio::io::AsyncRead;
use tracing::{debug, warn};

/// Default wait between writing a command and polling for an error response.
pub const DEFAULT_READ_DELAY: Duration = Duration::from_millis(500);

/// What the gateway did with a written command.
enum Reply {
    /// The gateway sent a full error response.
    Response([u8; RESPONSE_SIZE]),
    /// The stream ended or failed before a full response.
    Closed,
    /// Nothing to read yet. The gateway only answers failures.
    Silent,
}

/// Sends notifications over a single gateway connection.
///
/// The gateway acknowledges nothing; a silent connection after the read
/// delay is taken as success. A rejected command closes the connection
/// and the next send reconnects.
pub struct NotificationClient<D: Dial = TlsDialer> {
    connector: Connector<D>,
    format: CommandFormat,
    read_delay: Duration,
}

impl NotificationClient<TlsDialer> {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(Connector::new(config))
    }
}

impl<D: Dial> NotificationClient<D> {
    pub fn with_connector(connector: Connector<D>) -> Self {
        Self {
            connector,
            format: CommandFormat::default(),
            read_delay: DEFAULT_READ_DELAY,
        }
    }

    pub fn with_format(mut self, format: CommandFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn format(&self) -> CommandFormat {
        self.format
    }

    pub fn read_delay(&self) -> Duration {
        self.read_delay
    }

    pub fn connector(&self) -> &Connector<D> {
        &self.connector
    }

    pub fn connector_mut(&mut self) -> &mut Connector<D> {
        &mut self.connector
    }

    pub async fn disconnect(&mut self) {
        self.connector.disconnect().await;
    }

    /// Sends one notification.
    ///
    /// Returns `Ok(true)` when the gateway did not reject it. Payload
    /// rendering and connect failures are always errors. Delivery failures
    /// are errors in strict mode and `Ok(false)` otherwise; a non-strict send
    /// also reports `Ok(false)` for any error response, whatever its status.
    pub async fn send(
        &mut self,
        token: &DeviceToken,
        payload: &mut Payload,
        strict: bool,
    ) -> Result<bool, ClientError> {
        let limit = self.format.payload_limit(payload.max_length());
        let rendered = payload.render_within(limit)?;
        let command = PushCommand::new(*token, rendered.into_bytes())
            .with_identifier(payload.identifier())
            .with_expiration(payload.expiration_time())
            .with_priority(payload.priority())
            .encode(self.format)?;

        let stream = self.connector.connection().await?;
        debug!(
            "Sending {} command for {} ({} bytes)",
            self.format,
            token,
            command.len()
        );
        let sent = write_counted(stream, &command).await;
        if sent != command.len() {
            self.connector.disconnect().await;
            return reject(
                strict,
                SendError::ShortWrite {
                    sent,
                    expected: command.len(),
                },
            );
        }

        if !self.format.expects_response() {
            return Ok(true);
        }

        tokio::time::sleep(self.read_delay).await;
        let stream = self.connector.connection().await?;
        match poll_reply(stream).await {
            Reply::Silent => Ok(true),
            Reply::Closed => {
                self.connector.disconnect().await;
                reject(strict, SendError::ConnectionClosed)
            }
            Reply::Response(packet) => {
                self.connector.disconnect().await;
                let response = ErrorResponse::decode(&packet)?;
                check_response(&response, strict)
            }
        }
    }
}

/// Reads whatever response is already buffered, without waiting.
async fn poll_reply<S>(stream: &mut S) -> Reply
where
    S: AsyncRead + Unpin,
{
    let mut packet = [0u8; RESPONSE_SIZE];
    match tokio::time::timeout(Duration::ZERO, read_full(stream, &mut packet)).await {
        Ok(Ok(n)) if n == RESPONSE_SIZE => Reply::Response(packet),
        Ok(Ok(n)) => {
            debug!("Gateway closed the connection after {} response bytes", n);
            Reply::Closed
        }
        Ok(Err(e)) => {
            debug!("Reading the gateway response failed: {}", e);
            Reply::Closed
        }
        Err(_) => Reply::Silent,
    }
}

/// Maps a full error response to the send outcome. Outside strict mode any
/// response means the notification was not delivered.
fn check_response(response: &ErrorResponse, strict: bool) -> Result<bool, ClientError> {
    if !strict {
        warn!(
            "Notification {} not delivered: gateway answered command {} with status {}",
            response.identifier, response.command, response.status
        );
        return Ok(false);
    }
    if !response.is_response_command() {
        return Err(SendError::UnsupportedCommand(response.command).into());
    }
    match response.status_code() {
        Some(StatusCode::NoErrors) => Ok(true),
        Some(status) => Err(SendError::Rejected {
            status,
            identifier: response.identifier,
        }
        .into()),
        None => Err(SendError::UnsupportedStatus {
            status: response.status,
            identifier: response.identifier,
        }
        .into()),
    }
}

fn reject(strict: bool, err: SendError) -> Result<bool, ClientError> {
    if strict {
        return Err(err.into());
    }
    warn!("Notification not delivered: {}", err);
    Ok(false)
}
