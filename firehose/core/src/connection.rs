//! Stream Connection
//!
//! One physical request/response session against a streaming endpoint plus
//! the background task that reads it.
//!
//! # Read Loop
//!
//! ```text
//!   ┌──────────► retiring? ──yes──► drop transport, exit
//!   │                │ no
//!   │          read next chunk ──────► split lines ──► decode ──► queue
//!   │                │ EOF / error / stall / framing
//!   │          retiring? ──yes──┐
//!   │                │ no       │
//!   │           handshake ◄─────┼──── wait retry delay ◄── failed / non-2xx
//!   │                │ 2xx      │
//!   └──── new line decoder ◄────┘
//! ```
//!
//! The only control signal the task obeys is the [`Liveness`] transition.
//! Retiring a connection does not wait for the task; it stops on its own.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::StreamConfig;
use crate::credentials::Credentials;
use crate::endpoint::Endpoint;
use crate::error::StreamError;
use crate::line::{decode_line, FramingError, LineDecoder, LineOutcome};
use crate::liveness::Liveness;
use crate::stats::StreamStats;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Why a response body stopped yielding records
#[derive(Debug, Error)]
enum StreamDeath {
    #[error("end of stream")]
    Eof,
    #[error("read failed: {0}")]
    Io(reqwest::Error),
    #[error("no data for {0:?}")]
    Stalled(Duration),
    #[error(transparent)]
    Framing(#[from] FramingError),
}

/// A single streaming session and its reconnect state
pub struct StreamConnection<T> {
    endpoint: Endpoint,
    url: String,
    auth_header: String,
    body: String,
    /// Owned by this connection only; no idle pooling, so every handshake
    /// opens a fresh socket
    http: reqwest::Client,
    liveness: Liveness,
    sink: mpsc::Sender<T>,
    stats: Arc<StreamStats>,
    retry_delay: Duration,
    stall_timeout: Option<Duration>,
}

impl<T> StreamConnection<T> {
    /// Which endpoint this connection streams from
    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Liveness flag shared with the read loop
    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// Mark the connection `Retiring`
    ///
    /// Returns `true` if this call performed the transition. The read loop
    /// exits at its next boundary; this does not wait for it.
    pub fn retire(&self) -> bool {
        self.liveness.retire()
    }
}

impl<T> StreamConnection<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Build a connection. No I/O happens until [`StreamConnection::handshake`].
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Transport`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: Endpoint,
        credentials: &Credentials,
        body: String,
        config: &StreamConfig,
        sink: mpsc::Sender<T>,
        stats: Arc<StreamStats>,
    ) -> Result<Self, StreamError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .pool_max_idle_per_host(0)
            .tcp_nodelay(true);
        if let Some(timeout) = config.connect_timeout() {
            builder = builder.connect_timeout(timeout);
        }

        Ok(Self {
            endpoint,
            url: endpoint.url(config).to_string(),
            auth_header: credentials.authorization_header(),
            body,
            http: builder.build()?,
            liveness: Liveness::new(),
            sink,
            stats,
            retry_delay: config.retry_delay(),
            stall_timeout: config.stall_timeout(),
        })
    }

    /// Send the request and wait for the response headers
    ///
    /// GET when the body is empty, otherwise a form-encoded POST. The
    /// response is returned for any status; the caller checks it.
    ///
    /// # Errors
    ///
    /// - [`StreamError::StaleConnection`] if already retiring (no I/O)
    /// - [`StreamError::Transport`] if connecting or the exchange fails
    pub async fn handshake(&self) -> Result<reqwest::Response, StreamError> {
        if self.liveness.is_retiring() {
            return Err(StreamError::StaleConnection);
        }

        let request = if self.body.is_empty() {
            self.http.get(&self.url)
        } else {
            self.http
                .post(&self.url)
                .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
                .body(self.body.clone())
        };

        let response = request
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await?;

        tracing::debug!(
            endpoint = %self.endpoint,
            status = %response.status(),
            "Handshake complete"
        );
        Ok(response)
    }

    /// Spawn the read loop over an accepted response
    pub fn spawn(self: &Arc<Self>, response: reqwest::Response) -> JoinHandle<()> {
        let span = tracing::info_span!("stream", endpoint = %self.endpoint);
        let connection = Arc::clone(self);
        tokio::spawn(connection.run_read_loop(response).instrument(span))
    }

    /// Read, decode and deliver until retired, reconnecting on stream death
    pub async fn run_read_loop(self: Arc<Self>, response: reqwest::Response) {
        let mut body = Box::pin(response.bytes_stream());
        let mut decoder = LineDecoder::new();

        loop {
            if self.liveness.is_retiring() {
                break;
            }

            let death = match self.next_chunk(&mut body).await {
                None => continue,
                Some(Ok(chunk)) => {
                    decoder.push(&chunk);
                    match self.deliver_lines(&mut decoder).await {
                        Ok(()) => continue,
                        Err(death) => death,
                    }
                }
                Some(Err(death)) => death,
            };

            if self.liveness.is_retiring() {
                continue;
            }
            tracing::warn!(reason = %death, "Stream died, reconnecting");

            while !self.liveness.is_retiring() {
                if let Some(response) = self.reconnect().await {
                    body = Box::pin(response.bytes_stream());
                    decoder.clear();
                    break;
                }
            }
        }

        drop(body);
        tracing::debug!("Read loop stopped, transport released");
    }

    /// Next body chunk, or `None` once retired
    async fn next_chunk<S, B>(&self, body: &mut S) -> Option<Result<B, StreamDeath>>
    where
        S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    {
        let read = async {
            let next = match self.stall_timeout {
                Some(limit) => match tokio::time::timeout(limit, body.next()).await {
                    Ok(next) => next,
                    Err(_) => return Err(StreamDeath::Stalled(limit)),
                },
                None => body.next().await,
            };
            match next {
                Some(Ok(chunk)) => Ok(chunk),
                Some(Err(e)) => Err(StreamDeath::Io(e)),
                None => Err(StreamDeath::Eof),
            }
        };

        tokio::select! {
            biased;
            () = self.liveness.retired() => None,
            result = read => Some(result),
        }
    }

    /// Decode every complete buffered line and queue the records
    async fn deliver_lines(&self, decoder: &mut LineDecoder) -> Result<(), StreamDeath> {
        loop {
            let outcome = match decoder.next_line()? {
                Some(line) => decode_line::<T>(line),
                None => return Ok(()),
            };

            match outcome {
                LineOutcome::Heartbeat => self.stats.heartbeat(),
                LineOutcome::Malformed(e) => {
                    self.stats.malformed_line();
                    tracing::debug!(error = %e, "Dropping malformed line");
                }
                LineOutcome::Record(record) => {
                    if !self.enqueue(record).await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Push a record, waiting for queue capacity
    ///
    /// Returns `false` if the connection retired first; the record is then
    /// discarded. Retirement is checked again right before the record is
    /// committed, so a retired connection never enqueues.
    async fn enqueue(&self, record: T) -> bool {
        let permit = tokio::select! {
            biased;
            () = self.liveness.retired() => return false,
            permit = self.sink.reserve() => permit,
        };

        match permit {
            Ok(permit) if !self.liveness.is_retiring() => {
                permit.send(record);
                self.stats.record_delivered();
                true
            }
            Ok(_) => false,
            Err(_) => {
                tracing::info!("Record receiver dropped, retiring connection");
                self.liveness.retire();
                false
            }
        }
    }

    /// One reconnect attempt
    ///
    /// Returns the new response on a 2xx. Otherwise waits the fixed retry
    /// delay (cut short by retirement) and returns `None`. Retirement also
    /// abandons a handshake still waiting for response headers.
    async fn reconnect(&self) -> Option<reqwest::Response> {
        self.stats.reconnect_attempt();

        let handshake = tokio::select! {
            biased;
            () = self.liveness.retired() => return None,
            handshake = self.handshake() => handshake,
        };

        match handshake {
            Ok(response) if response.status().is_success() => {
                self.stats.connection_opened();
                tracing::info!("Reconnected");
                Some(response)
            }
            Ok(response) => {
                self.stats.reconnect_failure();
                tracing::warn!(
                    status = %response.status(),
                    retry_in = ?self.retry_delay,
                    "Reconnect rejected by endpoint"
                );
                drop(response);
                self.pause().await;
                None
            }
            Err(StreamError::StaleConnection) => None,
            Err(e) => {
                self.stats.reconnect_failure();
                tracing::warn!(error = %e, retry_in = ?self.retry_delay, "Reconnect failed");
                self.pause().await;
                None
            }
        }
    }

    async fn pause(&self) {
        tokio::select! {
            biased;
            () = self.liveness.retired() => {}
            () = tokio::time::sleep(self.retry_delay) => {}
        }
    }
}
