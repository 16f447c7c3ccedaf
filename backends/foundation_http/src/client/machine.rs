//! Connection state machine for a single request.
//!
//! WHY: Resolution, connection with endpoint fallback, TLS, the request
//! write and the response reads form one strictly ordered pipeline that has
//! to end in exactly one outcome, whatever stage fails.
//!
//! WHAT: `ConnectionMachine` drives a boxed [`Transport`] through
//! [`MachineState`] and yields `Result<Response, HttpClientError>`.
//!
//! HOW: The machine is moved into one spawned task and owns its transport,
//! buffers and response, so nothing is shared with the client while it runs.
//! Each transport call goes through the [`Watchdog`]; an interrupt drops the
//! pending call, closes the transport and ends the pipeline with the cause.

use super::request::serialize_request;
use super::response::{parse_header_block, parse_status_line};
use super::watchdog::{AbortSignal, Interrupt, ResponseSize, Watchdog};
use crate::dns::DnsResolver;
use crate::errors::{DnsError, HttpClientError};
use crate::message::{Message, Method, Response};
use crate::transport::{is_graceful_close, is_read_limit_exceeded, Transport};
use crate::url::ParsedUrl;
use bytes::Bytes;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

const CRLF: &[u8] = b"\r\n";

/// Stage the machine is in. Stages only ever move forward, except for
/// repeated `Connecting` while endpoints remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Idle,
    Resolving,
    Connecting { endpoint: SocketAddr, attempt: usize },
    Handshaking,
    WritingRequest,
    ReadingStatusLine,
    ReadingHeaders,
    ReadingBody,
    Completed,
}

/// Per-request limits copied from the client configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineSettings {
    /// Deadline per stage; `None` arms no timer.
    pub timeout: Option<Duration>,
    /// Response ceiling in bytes; 0 is unlimited.
    pub max_response_size: usize,
}

/// Runs `$op` under the watchdog, returning early from the enclosing
/// function with the interrupt cause if it loses the race.
macro_rules! guarded {
    ($machine:ident, $op:expr) => {
        match $machine.watchdog.guard($op).await {
            Ok(output) => output,
            Err(interrupt) => return Err($machine.interrupted(interrupt)),
        }
    };
}

pub struct ConnectionMachine<R: DnsResolver> {
    transport: Box<dyn Transport>,
    resolver: R,
    watchdog: Watchdog,
    size: ResponseSize,
    response: Response,
    state: MachineState,
}

impl<R: DnsResolver> fmt::Debug for ConnectionMachine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionMachine")
            .field("state", &self.state)
            .field("received", &self.size.received())
            .finish_non_exhaustive()
    }
}

impl<R: DnsResolver> ConnectionMachine<R> {
    #[must_use]
    pub fn new(
        transport: Box<dyn Transport>,
        resolver: R,
        settings: MachineSettings,
        abort: AbortSignal,
    ) -> Self {
        Self {
            transport,
            resolver,
            watchdog: Watchdog::new(settings.timeout, abort),
            size: ResponseSize::new(settings.max_response_size),
            response: Response::default(),
            state: MachineState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> MachineState {
        self.state
    }

    /// Serializes the request and runs the machine on `runtime`.
    ///
    /// `sink` is called exactly once with the outcome, from the spawned task.
    pub fn start<F>(
        self,
        runtime: &Handle,
        method: Method,
        url: &ParsedUrl,
        message: &Message,
        sink: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<Response, HttpClientError>) + Send + 'static,
    {
        let request = serialize_request(method, &url.host_header(), url.path(), message);
        let host = url.host().to_string();
        let port = url.port();
        tracing::debug!(
            %method,
            scheme = %url.scheme(),
            host = %host,
            port,
            path = url.path(),
            "starting request"
        );

        runtime.spawn(async move {
            let outcome = self.run(&host, port, request).await;
            sink(outcome);
        })
    }

    /// Runs the whole request on the current task.
    ///
    /// # Errors
    ///
    /// The terminal error of whichever stage failed.
    pub async fn execute(
        self,
        method: Method,
        url: &ParsedUrl,
        message: &Message,
    ) -> Result<Response, HttpClientError> {
        let request = serialize_request(method, &url.host_header(), url.path(), message);
        self.run(url.host(), url.port(), request).await
    }

    async fn run(
        mut self,
        host: &str,
        port: u16,
        request: Bytes,
    ) -> Result<Response, HttpClientError> {
        let outcome = self.drive(host, port, &request).await;

        self.transport.shutdown_and_close();
        self.transition(MachineState::Completed);

        match outcome {
            Ok(()) => {
                tracing::debug!(
                    status = self.response.status(),
                    received = self.size.received(),
                    "request completed"
                );
                Ok(std::mem::take(&mut self.response))
            }
            Err(err) => {
                tracing::warn!(host, port, error = %err, "request failed");
                Err(err)
            }
        }
    }

    async fn drive(&mut self, host: &str, port: u16, request: &[u8]) -> Result<(), HttpClientError> {
        self.transition(MachineState::Resolving);
        let endpoints = guarded!(self, self.resolver.resolve(host, port))?;

        self.connect_any(host, &endpoints).await?;

        self.transition(MachineState::Handshaking);
        guarded!(self, self.transport.handshake())
            .map_err(|err| HttpClientError::Handshake(err.to_string()))?;

        self.transition(MachineState::WritingRequest);
        let written = guarded!(self, self.transport.write_all(request))?;
        tracing::debug!(written, "request written");

        self.transition(MachineState::ReadingStatusLine);
        let line = self.read_line().await?;
        self.response.set_status(parse_status_line(&line)?);

        self.transition(MachineState::ReadingHeaders);
        loop {
            let line = self.read_line().await?;
            if line.as_ref() == CRLF {
                break;
            }
            for (name, value) in parse_header_block(&line) {
                self.response.add_header(name, value);
            }
        }

        let leftover = self.transport.take_buffered();
        if !leftover.is_empty() {
            self.size.record(leftover.len())?;
            self.response.append_body(&leftover);
        }

        self.transition(MachineState::ReadingBody);
        loop {
            match guarded!(self, self.transport.read_some()) {
                Ok(Some(chunk)) => {
                    self.size.record(chunk.len())?;
                    self.response.append_body(&chunk);
                }
                Ok(None) => break,
                Err(err) if is_graceful_close(&err) => {
                    tracing::debug!(error = %err, "peer closed while reading body");
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }

    /// Reads one CRLF-terminated line and counts it against the ceiling.
    ///
    /// The transport is only allowed to buffer what is left of the ceiling,
    /// so an unterminated line fails with the size error as soon as it
    /// outgrows it.
    async fn read_line(&mut self) -> Result<Bytes, HttpClientError> {
        let budget = self.size.remaining();
        let line = match guarded!(self, self.transport.read_until(CRLF, budget)) {
            Ok(line) => line,
            Err(err) if is_read_limit_exceeded(&err) => return Err(self.size.exceeded()),
            Err(err) => return Err(err.into()),
        };
        self.size.record(line.len())?;
        Ok(line)
    }

    /// Tries each endpoint in order until one accepts the connection.
    async fn connect_any(
        &mut self,
        host: &str,
        endpoints: &[SocketAddr],
    ) -> Result<SocketAddr, HttpClientError> {
        let mut last_error = None;

        for (attempt, &endpoint) in endpoints.iter().enumerate() {
            self.transition(MachineState::Connecting { endpoint, attempt });
            match guarded!(self, self.transport.connect(endpoint)) {
                Ok(()) => return Ok(endpoint),
                Err(err) => {
                    tracing::debug!(%endpoint, attempt, error = %err, "connect failed");
                    self.transport.shutdown_and_close();
                    last_error = Some(err);
                }
            }
        }

        Err(last_error.map_or_else(
            || DnsError::NoAddressesFound(host.to_string()).into(),
            HttpClientError::connect,
        ))
    }

    fn interrupted(&mut self, interrupt: Interrupt) -> HttpClientError {
        tracing::warn!(state = ?self.state, cause = ?interrupt, "interrupting pending operation");
        self.transport.shutdown_and_close();
        interrupt.into()
    }

    fn transition(&mut self, next: MachineState) {
        tracing::debug!(from = ?self.state, to = ?next, "connection state");
        self.state = next;
    }
}
