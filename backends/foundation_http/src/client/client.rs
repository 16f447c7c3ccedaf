use super::machine::{ConnectionMachine, MachineSettings};
use super::signal::{Completion, CompletionSignal};
use super::watchdog::AbortHandle;
use crate::config::ClientConfig;
use crate::dispatch::SessionDispatcher;
use crate::dns::{DnsResolver, SystemDnsResolver};
use crate::errors::HttpClientError;
use crate::message::{Header, Message, Method};
use crate::tls::build_connector;
use crate::transport::{PlainTransport, SecureTransport, Transport};
use crate::url::{ParsedUrl, Scheme};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

struct ActiveRequest {
    abort: AbortHandle,
    /// Cleared on abort; the completion relay checks it before emitting.
    interest: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Asynchronous HTTP client that owns at most one request at a time.
///
/// WHY: Callers want to fire a request and be told once when it finished,
/// without blocking and without managing sockets, timers or TLS.
///
/// WHAT: Parses the URL, picks the plain or TLS transport, starts a
/// connection state machine on the tokio runtime and relays its outcome to
/// the [`CompletionSignal`] subscribers, optionally through a session
/// dispatcher.
///
/// HOW: `request` rejects bad input synchronously and otherwise returns as
/// soon as the machine is spawned. Starting a new request, calling `abort`
/// or dropping the client cancels the one in flight; a cancelled request
/// never reaches the subscribers.
///
/// # Examples
///
/// ```no_run
/// use foundation_http::HttpClient;
///
/// # async fn demo() -> Result<(), foundation_http::HttpClientError> {
/// let mut client = HttpClient::new();
/// client.on_done(|outcome| match outcome {
///     Ok(response) => println!("{} {}", response.status(), response.body_text()),
///     Err(err) => eprintln!("request failed: {err}"),
/// });
/// client.get("http://example.com/")?;
/// # Ok(())
/// # }
/// ```
pub struct HttpClient<R: DnsResolver = SystemDnsResolver> {
    config: ClientConfig,
    resolver: R,
    runtime: Option<Handle>,
    session: Option<(Arc<dyn SessionDispatcher>, String)>,
    done: Arc<CompletionSignal>,
    active: Option<ActiveRequest>,
}

impl HttpClient<SystemDnsResolver> {
    /// Creates a client with the default configuration and system DNS.
    #[must_use]
    pub fn new() -> Self {
        Self::with_resolver(SystemDnsResolver::new())
    }
}

impl Default for HttpClient<SystemDnsResolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: DnsResolver> HttpClient<R> {
    /// Creates a client resolving host names with `resolver`.
    #[must_use]
    pub fn with_resolver(resolver: R) -> Self {
        Self {
            config: ClientConfig::default(),
            resolver,
            runtime: None,
            session: None,
            done: Arc::new(CompletionSignal::new()),
            active: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs requests on `runtime` instead of the caller's ambient runtime.
    #[must_use]
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Delivers completions through `dispatcher` on behalf of `session_id`.
    #[must_use]
    pub fn with_session(
        mut self,
        dispatcher: Arc<dyn SessionDispatcher>,
        session_id: impl Into<String>,
    ) -> Self {
        self.session = Some((dispatcher, session_id.into()));
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sets the per-stage timeout. Zero or negative disables it.
    pub fn set_timeout(&mut self, seconds: i64) {
        self.config.timeout_seconds = seconds;
    }

    #[must_use]
    pub fn timeout(&self) -> i64 {
        self.config.timeout_seconds
    }

    /// Sets the response size ceiling in bytes. Zero means unlimited.
    pub fn set_maximum_response_size(&mut self, bytes: usize) {
        self.config.max_response_size = bytes;
    }

    #[must_use]
    pub fn maximum_response_size(&self) -> usize {
        self.config.max_response_size
    }

    pub fn set_ssl_verify_file(&mut self, path: impl Into<PathBuf>) {
        self.config.verify_file = Some(path.into());
    }

    pub fn set_ssl_verify_path(&mut self, path: impl Into<PathBuf>) {
        self.config.verify_path = Some(path.into());
    }

    /// The completion event.
    #[must_use]
    pub fn done(&self) -> &CompletionSignal {
        &self.done
    }

    /// Subscribes to the completion event.
    pub fn on_done<F>(&self, subscriber: F)
    where
        F: Fn(&Completion) + Send + Sync + 'static,
    {
        self.done.connect(subscriber);
    }

    /// Whether a request is owned and has not finished yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    /// Starts `method` against `url`.
    ///
    /// Any request still in flight is aborted first. The outcome is
    /// delivered to the [`done`](Self::done) subscribers.
    ///
    /// # Errors
    ///
    /// Input errors only, returned before anything is spawned:
    /// `InvalidUrl`, `InvalidPort`, `UnsupportedScheme`, `TlsConfig`, and
    /// `NoRuntime` when no runtime was configured and the caller is not
    /// inside one.
    pub fn request(
        &mut self,
        method: Method,
        url: &str,
        message: &Message,
    ) -> Result<(), HttpClientError> {
        let parsed = ParsedUrl::parse(url)
            .inspect_err(|err| tracing::error!(url, error = %err, "rejected request URL"))?;

        let transport: Box<dyn Transport> = match parsed.scheme() {
            Scheme::Http => Box::new(PlainTransport::new()),
            Scheme::Https => {
                let connector = build_connector(&self.config)?;
                Box::new(SecureTransport::new(parsed.host(), connector)?)
            }
            Scheme::Other(scheme) => {
                tracing::error!(url, scheme = %scheme, "unsupported URL scheme");
                return Err(HttpClientError::UnsupportedScheme(scheme.clone()));
            }
        };

        let runtime = self
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or(HttpClientError::NoRuntime)?;

        self.abort();

        let (abort, signal) = AbortHandle::new();
        let interest = Arc::new(AtomicBool::new(true));
        let settings = MachineSettings {
            timeout: self.config.timeout(),
            max_response_size: self.config.max_response_size,
        };

        let machine = ConnectionMachine::new(transport, self.resolver.clone(), settings, signal);
        let relay = self.relay(Arc::clone(&interest));
        let task = machine.start(&runtime, method, &parsed, message, relay);

        self.active = Some(ActiveRequest {
            abort,
            interest,
            task,
        });
        Ok(())
    }

    /// `GET` without extra headers.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub fn get(&mut self, url: &str) -> Result<(), HttpClientError> {
        self.request(Method::Get, url, &Message::new())
    }

    /// `GET` with the given headers.
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub fn get_with_headers<I, H>(&mut self, url: &str, headers: I) -> Result<(), HttpClientError>
    where
        I: IntoIterator<Item = H>,
        H: Into<Header>,
    {
        self.request(Method::Get, url, &Message::with_headers(headers))
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub fn post(&mut self, url: &str, message: &Message) -> Result<(), HttpClientError> {
        self.request(Method::Post, url, message)
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub fn put(&mut self, url: &str, message: &Message) -> Result<(), HttpClientError> {
        self.request(Method::Put, url, message)
    }

    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub fn delete(&mut self, url: &str, message: &Message) -> Result<(), HttpClientError> {
        self.request(Method::Delete, url, message)
    }

    /// Cancels the request in flight, if any.
    ///
    /// The transport is closed by the machine's task and the subscribers
    /// are not notified. Calling it again, or after completion, does nothing.
    pub fn abort(&mut self) {
        if let Some(active) = self.active.take() {
            active.interest.store(false, Ordering::Release);
            active.abort.abort();
            tracing::debug!(finished = active.task.is_finished(), "released request");
        }
    }

    fn relay(&self, interest: Arc<AtomicBool>) -> impl FnOnce(Completion) + Send + 'static {
        let done = Arc::clone(&self.done);
        let session = self.session.clone();

        move |outcome| match session {
            Some((dispatcher, session_id)) => {
                if !interest.load(Ordering::Acquire) {
                    tracing::debug!("completion suppressed after abort");
                    return;
                }
                dispatcher.post(
                    &session_id,
                    Box::new(move || deliver(&done, &interest, &outcome)),
                );
            }
            None => deliver(&done, &interest, &outcome),
        }
    }
}

/// Emits `outcome` unless the owner lost interest. At most once per request.
fn deliver(done: &CompletionSignal, interest: &AtomicBool, outcome: &Completion) {
    if interest.swap(false, Ordering::AcqRel) {
        done.emit(outcome);
    } else {
        tracing::debug!("completion suppressed after abort");
    }
}

impl<R: DnsResolver> Drop for HttpClient<R> {
    fn drop(&mut self) {
        self.abort();
    }
}

impl<R: DnsResolver + std::fmt::Debug> std::fmt::Debug for HttpClient<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("session", &self.session.as_ref().map(|(_, id)| id))
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}
