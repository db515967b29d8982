//! Feedback service client.

use crate::connection::{ConnectionConfig, Connector, Dial, TlsDialer};
use crate::error::ClientError;
use crate::stream::read_full;
use apns_protocol::feedback::FEEDBACK_RECORD_SIZE;
use apns_protocol::FeedbackRecord;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure reported by a feedback handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProcessingError {
    message: String,
}

impl ProcessingError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Counters for the last [`FeedbackClient::process`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackStats {
    /// Records read from the service.
    pub read: usize,
    /// Records the handler accepted.
    pub processed: usize,
    /// Records the handler declined.
    pub unprocessed: usize,
    /// Records the handler failed on.
    pub errors: usize,
}

/// Drains the feedback service.
pub struct FeedbackClient<D: Dial = TlsDialer> {
    connector: Connector<D>,
    stats: FeedbackStats,
}

impl FeedbackClient<TlsDialer> {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_connector(Connector::new(config))
    }
}

impl<D: Dial> FeedbackClient<D> {
    pub fn with_connector(connector: Connector<D>) -> Self {
        Self {
            connector,
            stats: FeedbackStats::default(),
        }
    }

    pub fn stats(&self) -> FeedbackStats {
        self.stats
    }

    pub fn connector(&self) -> &Connector<D> {
        &self.connector
    }

    pub async fn disconnect(&mut self) {
        self.connector.disconnect().await;
    }

    /// Reads records until the service closes the stream, handing each to
    /// `handler`, and returns the number of records the handler accepted.
    ///
    /// The handler returns `Ok(true)` for a processed record and `Ok(false)`
    /// for one it declined. When `panic` is set, a handler error aborts the
    /// run and is returned; otherwise it is counted and reading continues.
    /// A trailing partial record is dropped.
    pub async fn process<F>(&mut self, mut handler: F, panic: bool) -> Result<usize, ClientError>
    where
        F: FnMut(&FeedbackRecord) -> Result<bool, ProcessingError>,
    {
        self.stats = FeedbackStats::default();

        loop {
            let stream = self.connector.connection().await?;
            let mut chunk = [0u8; FEEDBACK_RECORD_SIZE];
            let n = match read_full(stream, &mut chunk).await {
                Ok(n) => n,
                Err(e) => {
                    self.connector.disconnect().await;
                    return Err(e.into());
                }
            };
            if n < FEEDBACK_RECORD_SIZE {
                if n > 0 {
                    warn!("Dropping {} trailing feedback bytes", n);
                }
                break;
            }

            let record = FeedbackRecord::decode(&chunk)?;
            self.stats.read += 1;
            debug!("Feedback for {} at {}", record.token, record.timestamp);

            match handler(&record) {
                Ok(true) => self.stats.processed += 1,
                Ok(false) => self.stats.unprocessed += 1,
                Err(e) if panic => return Err(e.into()),
                Err(e) => {
                    warn!("Feedback handler failed for {}: {}", record.token, e);
                    self.stats.errors += 1;
                }
            }
        }

        self.connector.disconnect().await;
        info!(
            "Feedback drained: {} read, {} processed, {} unprocessed, {} errors",
            self.stats.read, self.stats.processed, self.stats.unprocessed, self.stats.errors
        );
        Ok(self.stats.processed)
    }
}
