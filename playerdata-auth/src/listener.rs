//! Local HTTP listener that captures one OAuth redirect.
//!
//! The listener serves on a background task and hands the first authorization
//! code it sees to [`CallbackListener::await_code`] through a channel of
//! capacity one. Requests without a code get a failure page and are otherwise
//! ignored, so a stray browser hit (favicon, preconnect, a mistyped URL) never
//! wakes the waiting flow.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How long a single connection may take to send its request head.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest request head we read.
const MAX_REQUEST_BYTES: usize = 8 * 1024;

const SUCCESS_PAGE: &str = "<p>Success! Please return to the terminal</p>";
const FAILURE_PAGE: &str =
    "<p>There was a parsing error, please run your script again from the terminal</p>";

/// Errors that can occur while waiting for the callback.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The port could not be bound.
    #[error("Failed to bind callback listener on port {port}: {source}")]
    Bind {
        /// Requested port.
        port: u16,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// `await_code` was called before `start`.
    #[error("Callback listener is not running")]
    NotStarted,
    /// The listener shut down before a code arrived.
    #[error("Callback listener stopped before an authorization code arrived")]
    Stopped,
    /// No code arrived within the configured timeout.
    #[error("Timed out after {0:?} waiting for the authorization callback")]
    Timeout(Duration),
}

/// What a single callback request carried.
#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Code(String),
    Malformed,
}

struct Running {
    addr: SocketAddr,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
    codes: mpsc::Receiver<String>,
}

/// Clonable handle that stops a running listener from elsewhere.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(CancellationToken);

impl ShutdownHandle {
    /// Ask the listener to stop. A pending `await_code` then fails with
    /// [`ListenerError::Stopped`].
    pub fn shutdown(&self) {
        self.0.cancel();
    }
}

/// Local listener for the authorization-code redirect.
pub struct CallbackListener {
    port: u16,
    expected_state: Option<String>,
    running: Option<Running>,
}

impl CallbackListener {
    /// Create a listener for `port`. Nothing is bound until [`start`](Self::start).
    ///
    /// Port `0` binds an ephemeral port; read it back with [`local_addr`](Self::local_addr).
    pub fn new(port: u16) -> Self {
        Self {
            port,
            expected_state: None,
            running: None,
        }
    }

    /// Only accept callbacks whose `state` parameter equals `state`.
    #[must_use]
    pub fn with_expected_state(mut self, state: impl Into<String>) -> Self {
        self.expected_state = Some(state.into());
        self
    }

    /// Bind the port and start serving in the background.
    ///
    /// Must be paired with [`stop`](Self::stop). Calling it on a running
    /// listener replaces the previous one.
    pub async fn start(&mut self) -> Result<SocketAddr, ListenerError> {
        self.stop().await;

        let port = self.port;
        let bind = move |source: std::io::Error| ListenerError::Bind { port, source };
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(bind)?;
        let addr = listener.local_addr().map_err(bind)?;

        let (tx, codes) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(serve(
            listener,
            tx,
            shutdown.clone(),
            self.expected_state.clone(),
        ));

        debug!(%addr, "OAuth callback listener started");
        self.running = Some(Running {
            addr,
            shutdown,
            handle,
            codes,
        });
        Ok(addr)
    }

    /// Address the listener is bound to, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.addr)
    }

    /// Whether the listener currently holds its port.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Handle for stopping the listener from another task.
    pub fn shutdown_handle(&self) -> Option<ShutdownHandle> {
        self.running
            .as_ref()
            .map(|r| ShutdownHandle(r.shutdown.clone()))
    }

    /// Wait until a request carrying `code` arrives and return the code.
    pub async fn await_code(&mut self) -> Result<String, ListenerError> {
        let running = self.running.as_mut().ok_or(ListenerError::NotStarted)?;
        running.codes.recv().await.ok_or(ListenerError::Stopped)
    }

    /// Like [`await_code`](Self::await_code), giving up after `timeout`.
    pub async fn await_code_timeout(&mut self, timeout: Duration) -> Result<String, ListenerError> {
        match tokio::time::timeout(timeout, self.await_code()).await {
            Ok(result) => result,
            Err(_) => Err(ListenerError::Timeout(timeout)),
        }
    }

    /// Shut the listener down and release the port.
    ///
    /// Safe to call when never started or already stopped.
    pub async fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown.cancel();
            if let Err(e) = running.handle.await {
                if e.is_panic() {
                    warn!("OAuth callback listener task panicked");
                }
            }
            debug!(addr = %running.addr, "OAuth callback listener stopped");
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown.cancel();
            running.handle.abort();
        }
    }
}

impl std::fmt::Debug for CallbackListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackListener")
            .field("port", &self.port)
            .field("addr", &self.local_addr())
            .field("running", &self.is_running())
            .finish()
    }
}

async fn serve(
    listener: TcpListener,
    codes: mpsc::Sender<String>,
    shutdown: CancellationToken,
    expected_state: Option<String>,
) {
    let mut delivered = false;
    loop {
        let stream = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    warn!(error = %e, "Failed to accept OAuth callback connection");
                    continue;
                }
            },
        };

        let handled = tokio::select! {
            _ = shutdown.cancelled() => break,
            handled = handle_connection(stream, expected_state.as_deref()) => handled,
        };

        match handled {
            // Only the first code is handed over.
            Some(code) if !delivered => {
                delivered = codes.try_send(code).is_ok();
                debug!("Received OAuth authorization code");
            }
            Some(_) => debug!("Dropped authorization code after the first"),
            None => debug!("Ignored OAuth callback without a usable code"),
        }
    }
}

async fn handle_connection(mut stream: TcpStream, expected_state: Option<&str>) -> Option<String> {
    let request = match tokio::time::timeout(READ_TIMEOUT, read_request_head(&mut stream)).await {
        Ok(Ok(request)) => request,
        Ok(Err(e)) => {
            debug!(error = %e, "Failed to read OAuth callback request");
            return None;
        }
        Err(_) => {
            debug!("OAuth callback connection sent nothing");
            return None;
        }
    };

    let callback = parse_callback_request(&request, expected_state);
    let page = match callback {
        Callback::Code(_) => SUCCESS_PAGE,
        Callback::Malformed => FAILURE_PAGE,
    };
    if let Err(e) = stream.write_all(html_response(page).as_bytes()).await {
        debug!(error = %e, "Failed to write OAuth callback response");
    }
    let _ = stream.shutdown().await;

    match callback {
        Callback::Code(code) => Some(code),
        Callback::Malformed => None,
    }
}

async fn read_request_head(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn parse_callback_request(request: &str, expected_state: Option<&str>) -> Callback {
    // GET /path?code=xxx&state=yyy HTTP/1.1
    let Some(first_line) = request.lines().next() else {
        return Callback::Malformed;
    };
    let mut parts = first_line.split_whitespace();
    let (Some("GET"), Some(target)) = (parts.next(), parts.next()) else {
        return Callback::Malformed;
    };
    let Some((_, query)) = target.split_once('?') else {
        return Callback::Malformed;
    };

    let mut code = None;
    let mut state = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "code" if code.is_none() => code = Some(value.into_owned()),
            "state" if state.is_none() => state = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(expected) = expected_state {
        if state.as_deref() != Some(expected) {
            return Callback::Malformed;
        }
    }

    code.map_or(Callback::Malformed, Callback::Code)
}

fn html_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}
