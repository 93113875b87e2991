//! Stream Client (connection manager)
//!
//! Owns the credentials, the single active [`StreamConnection`] and the
//! sending half of the record queue. Every filter change builds a fresh
//! connection, handshakes it, and only on success retires the previous one
//! and installs the new one.
//!
//! # Concurrency
//!
//! - A filter change holds the swap lock for its whole duration, including
//!   the handshake round trip, so two filter changes never race to install.
//! - The active slot is guarded separately and only for synchronous access,
//!   so [`StreamClient::close`] never waits behind a handshake.
//! - Retiring a connection does not wait for its read loop to stop. Use
//!   [`StreamClient::shutdown`] when the task must be gone.
//!
//! # Back-pressure
//!
//! The queue is bounded. When it is full the read loop waits for the
//! consumer, which also delays detection of a dead stream.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::config::StreamConfig;
use crate::connection::StreamConnection;
use crate::credentials::Credentials;
use crate::endpoint::{follow_body, track_body, Endpoint};
use crate::error::StreamError;
use crate::stats::{StatsSnapshot, StreamStats};

/// Receiving half of a client's record queue
pub type RecordReceiver<T = Value> = mpsc::Receiver<T>;

struct ActiveConnection<T> {
    connection: Arc<StreamConnection<T>>,
    task: JoinHandle<()>,
}

/// Client for a streaming endpoint, generic over the record type
pub struct StreamClient<T = Value> {
    credentials: Credentials,
    config: StreamConfig,
    sink: mpsc::Sender<T>,
    stats: Arc<StreamStats>,
    swap_lock: Mutex<()>,
    active: parking_lot::Mutex<Option<ActiveConnection<T>>>,
}

impl<T> StreamClient<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Create a client with the default configuration
    ///
    /// Nothing is validated here. Returns the client and the receiver that
    /// every connection this client ever installs will feed.
    pub fn new(credentials: Credentials) -> (Self, RecordReceiver<T>) {
        Self::with_config(credentials, StreamConfig::default())
    }

    /// Create a client with an explicit configuration
    pub fn with_config(
        credentials: Credentials,
        config: StreamConfig,
    ) -> (Self, RecordReceiver<T>) {
        let (sink, records) = mpsc::channel(config.queue_capacity.max(1));
        let client = Self {
            credentials,
            config,
            sink,
            stats: Arc::new(StreamStats::default()),
            swap_lock: Mutex::new(()),
            active: parking_lot::Mutex::new(None),
        };
        (client, records)
    }

    /// Stream statuses from the given user ids
    ///
    /// # Errors
    ///
    /// See [`StreamClient::connect`].
    pub async fn follow(&self, ids: &[u64]) -> Result<(), StreamError> {
        self.connect(Endpoint::Follow, follow_body(ids)).await
    }

    /// Stream statuses matching any of the given keywords
    ///
    /// # Errors
    ///
    /// See [`StreamClient::connect`].
    pub async fn track<S: AsRef<str>>(&self, topics: &[S]) -> Result<(), StreamError> {
        self.connect(Endpoint::Track, track_body(topics)).await
    }

    /// Stream the unfiltered sample
    ///
    /// # Errors
    ///
    /// See [`StreamClient::connect`].
    pub async fn sample(&self) -> Result<(), StreamError> {
        self.connect(Endpoint::Sample, String::new()).await
    }

    /// Replace the active connection with a new one against `endpoint`
    ///
    /// An empty `body` sends a GET, anything else a form-encoded POST.
    /// On any error the previously active connection keeps running.
    ///
    /// # Errors
    ///
    /// - [`StreamError::InvalidCredentials`] if username or password is
    ///   empty; no I/O is performed
    /// - [`StreamError::Transport`] if the handshake fails
    /// - [`StreamError::Endpoint`] if the endpoint answers with a non-2xx status
    pub async fn connect(&self, endpoint: Endpoint, body: String) -> Result<(), StreamError> {
        let _swap = self.swap_lock.lock().await;

        if !self.credentials.is_valid() {
            return Err(StreamError::InvalidCredentials);
        }

        let connection = Arc::new(StreamConnection::new(
            endpoint,
            &self.credentials,
            body,
            &self.config,
            self.sink.clone(),
            Arc::clone(&self.stats),
        )?);

        let response = connection.handshake().await.map_err(|e| {
            tracing::warn!(endpoint = %endpoint, error = %e, "Handshake failed");
            e
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(endpoint = %endpoint, status = %status, "Endpoint rejected handshake");
            return Err(StreamError::Endpoint { status });
        }
        self.stats.connection_opened();

        let mut active = self.active.lock();
        if let Some(previous) = active.take() {
            if previous.connection.retire() {
                tracing::debug!(
                    endpoint = %previous.connection.endpoint(),
                    "Retired previous connection"
                );
            }
        }
        let task = connection.spawn(response);
        *active = Some(ActiveConnection { connection, task });

        tracing::info!(endpoint = %endpoint, "Stream connected");
        Ok(())
    }

    /// Retire the active connection
    ///
    /// Idempotent: a no-op when already closed or never connected. Does not
    /// wait for the read loop to stop.
    pub fn close(&self) {
        if let Some(active) = self.active.lock().as_ref() {
            if active.connection.retire() {
                tracing::info!(endpoint = %active.connection.endpoint(), "Stream closed");
            }
        }
    }

    /// Retire the active connection and wait for its read loop to exit
    pub async fn shutdown(&self) {
        let active = self.active.lock().take();
        if let Some(active) = active {
            active.connection.retire();
            if let Err(e) = active.task.await {
                tracing::warn!(error = %e, "Read loop ended abnormally");
            }
        }
    }

    /// Whether a connection is installed and not retired
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.active_endpoint().is_some()
    }

    /// Endpoint of the active, non-retired connection
    #[must_use]
    pub fn active_endpoint(&self) -> Option<Endpoint> {
        self.active
            .lock()
            .as_ref()
            .filter(|active| !active.connection.liveness().is_retiring())
            .map(|active| active.connection.endpoint())
    }

    /// Counters across every connection this client has installed
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The configuration in use
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The credentials in use
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }
}

impl<T> Drop for StreamClient<T> {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().as_ref() {
            active.connection.liveness().retire();
        }
    }
}
