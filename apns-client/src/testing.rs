//! In-memory dialer for exercising the clients without a network.

use crate::connection::{ConnectionConfig, Dial};
use crate::error::ClientError;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::io::DuplexStream;

const PIPE_CAPACITY: usize = 16 * 1024;

/// Hands out scripted outcomes in order: refused attempts, then the client
/// halves of in-memory pipes. Attempts past the script are refused.
pub(crate) struct ScriptedDialer {
    script: Mutex<VecDeque<Option<DuplexStream>>>,
    dials: AtomicUsize,
}

impl ScriptedDialer {
    /// Returns the dialer and the server halves of its pipes.
    pub(crate) fn with_streams(streams: usize) -> (Self, Vec<DuplexStream>) {
        Self::failing_then_streams(0, streams)
    }

    pub(crate) fn failing_then_streams(
        failures: usize,
        streams: usize,
    ) -> (Self, Vec<DuplexStream>) {
        let mut script = VecDeque::new();
        let mut servers = Vec::new();
        for _ in 0..failures {
            script.push_back(None);
        }
        for _ in 0..streams {
            let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
            script.push_back(Some(client));
            servers.push(server);
        }
        let dialer = Self {
            script: Mutex::new(script),
            dials: AtomicUsize::new(0),
        };
        (dialer, servers)
    }

    pub(crate) fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

impl Dial for ScriptedDialer {
    type Stream = DuplexStream;

    async fn dial(&self, config: &ConnectionConfig) -> Result<DuplexStream, ClientError> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front().flatten();
        next.ok_or_else(|| ClientError::Connect {
            endpoint: config.endpoint(),
            timeout: config.connect_timeout,
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        })
    }
}
