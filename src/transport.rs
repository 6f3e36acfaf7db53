//! Auto-reconnecting serial stream transport.
//!
//! A spawned task owns the connection, the line buffer and the reconnect
//! timer, so every state transition happens on that task. The handle only
//! pushes commands over a channel; `send` and `close` never block and never
//! fail. Connection failures of any kind (refused handshake, mid-stream
//! error, remote close) collapse into one `Disconnected` transition followed
//! by retry evaluation; only spending the whole retry budget is terminal.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::framing::LineBuffer;

/// Observable transport states, reported through [`StreamHandler::on_state`].
///
/// An explicit `close()` is not reported: the handle goes quiet instead, so
/// a caller tearing the console down never races a late callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Connected,
    Disconnected,
    Reconnecting { attempt: u32, max: u32 },
    /// Retry budget spent; no further attempts will be made.
    Exhausted,
}

/// Fixed-interval bounded retry, matching the portal's stock behavior of
/// five attempts every five seconds.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Consumer of the stream. Both callbacks run on the transport task.
pub trait StreamHandler: Send + 'static {
    fn on_line(&mut self, line: String);
    fn on_state(&mut self, state: StreamState);
}

/// One established duplex text channel.
pub trait Channel: Send {
    fn send_text(&mut self, text: &str) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Next inbound chunk. `None` means the remote side closed the channel.
    fn recv_text(&mut self) -> impl Future<Output = Option<anyhow::Result<String>>> + Send;

    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}

/// Connection factory; a fresh channel is dialed for every attempt.
pub trait Dial: Send + 'static {
    type Conn: Channel + 'static;

    fn dial(&mut self) -> impl Future<Output = anyhow::Result<Self::Conn>> + Send;
}

enum Command {
    Send(String),
    Close,
}

/// Handle to a running transport task.
pub struct SerialStream {
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl SerialStream {
    /// Spawns the transport task and returns immediately. A failing first
    /// dial is reported as `Disconnected` through the handler, never here.
    pub fn open<D, H>(dialer: D, policy: RetryPolicy, handler: H) -> Self
    where
        D: Dial,
        H: StreamHandler,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(run(dialer, policy, handler, cmd_rx));
        Self { cmd_tx }
    }

    /// Queues `text` for transmission. Anything submitted while the stream
    /// is not connected is dropped; an offline loss is expected behavior,
    /// not an error.
    pub fn send(&self, text: impl Into<String>) {
        let _ = self.cmd_tx.send(Command::Send(text.into()));
    }

    /// Tears the stream down: cancels any pending reconnect and stops the
    /// task. No callback fires after this.
    pub fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close);
    }
}

async fn run<D: Dial, H: StreamHandler>(
    mut dialer: D,
    policy: RetryPolicy,
    mut handler: H,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
) {
    // Fired reconnect attempts since the last successful connection. The
    // initial dial of an `open` is not counted.
    let mut attempts: u32 = 0;
    let mut lines = LineBuffer::new();

    loop {
        handler.on_state(StreamState::Connecting);

        let dial_fut = dialer.dial();
        tokio::pin!(dial_fut);
        let dialed = loop {
            tokio::select! {
                res = &mut dial_fut => break res,
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Send(_)) => {
                        log::debug!("dropping command while not connected");
                    }
                    Some(Command::Close) | None => return,
                },
            }
        };

        match dialed {
            Ok(conn) => {
                attempts = 0;
                // A tail left over from the previous connection is stale.
                lines.clear();
                log::info!("serial stream connected");
                handler.on_state(StreamState::Connected);
                if run_connected(conn, &mut lines, &mut handler, &mut cmd_rx).await {
                    return;
                }
                if !lines.pending().is_empty() {
                    log::debug!("discarding {} unterminated bytes", lines.pending().len());
                }
                handler.on_state(StreamState::Disconnected);
            }
            Err(e) => {
                log::warn!("serial stream connect failed: {e:#}");
                handler.on_state(StreamState::Disconnected);
            }
        }

        if attempts >= policy.max_attempts {
            log::error!(
                "giving up on serial stream after {} reconnect attempts",
                attempts
            );
            handler.on_state(StreamState::Exhausted);
            return;
        }
        attempts += 1;
        log::info!(
            "reconnect attempt {}/{} in {:?}",
            attempts,
            policy.max_attempts,
            policy.retry_delay
        );
        handler.on_state(StreamState::Reconnecting {
            attempt: attempts,
            max: policy.max_attempts,
        });

        let delay = tokio::time::sleep(policy.retry_delay);
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(Command::Send(_)) => {
                        log::debug!("dropping command while not connected");
                    }
                    Some(Command::Close) | None => return,
                },
            }
        }
    }
}

/// Pumps one live connection. Returns `true` when the caller closed the
/// stream, `false` when the connection died and retry should be evaluated.
async fn run_connected<C: Channel, H: StreamHandler>(
    mut conn: C,
    lines: &mut LineBuffer,
    handler: &mut H,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
) -> bool {
    enum Step {
        Chunk(Option<anyhow::Result<String>>),
        Cmd(Option<Command>),
    }

    loop {
        let step = tokio::select! {
            chunk = conn.recv_text() => Step::Chunk(chunk),
            cmd = cmd_rx.recv() => Step::Cmd(cmd),
        };
        match step {
            Step::Chunk(Some(Ok(chunk))) => {
                for line in lines.feed(&chunk) {
                    handler.on_line(line);
                }
            }
            Step::Chunk(Some(Err(e))) => {
                log::warn!("serial stream error: {e:#}");
                return false;
            }
            Step::Chunk(None) => {
                log::info!("serial stream closed by device");
                return false;
            }
            Step::Cmd(Some(Command::Send(text))) => {
                if let Err(e) = conn.send_text(&text).await {
                    log::warn!("serial stream send failed: {e:#}");
                    return false;
                }
            }
            Step::Cmd(Some(Command::Close)) | Step::Cmd(None) => {
                conn.shutdown().await;
                return true;
            }
        }
    }
}
