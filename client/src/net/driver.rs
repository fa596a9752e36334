//! Tokio runtime for a [`TerminalSession`].
//!
//! DESIGN
//! ======
//! Each socket runs in its own task and reports into one unbounded event
//! channel. Retry timers are sleep tasks that report into the same channel.
//! [`SessionDriver::run`] is the only owner of the session: it pulls
//! transport events and caller commands one at a time, so every state
//! mutation happens on a single task in arrival order.
//!
//! Callers talk to the driver through a cloneable [`SessionHandle`] and
//! observe lifecycle changes on the [`SessionEvent`] receiver returned by
//! [`SessionDriver::new`].

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Once;
use std::time::{Duration, Instant};

use canvas::camera::Point;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, warn};

use super::transport::{ABNORMAL_CLOSE, NO_STATUS_CLOSE, SocketId, TimerId, Transport, TransportEvent};
use crate::config::{ClientConfig, SessionIdentity};
use crate::error::{HandleError, RegistryError, SendError, TransportError};
use crate::session::{SessionEvent, TerminalSession};
use crate::state::terminal::TerminalWidget;

/// How often stuck `creating` terminals are checked when a timeout is set.
const CREATE_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// TokioTransport
// =============================================================================

enum Outbound {
    Text(String),
    Close(u16),
}

/// [`Transport`] backed by `tokio-tungstenite` sockets and tokio timers.
pub struct TokioTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    sockets: HashMap<SocketId, mpsc::UnboundedSender<Outbound>>,
    timers: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioTransport {
    #[must_use]
    pub fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        install_crypto_provider();
        Self { events, sockets: HashMap::new(), timers: HashMap::new() }
    }
}

impl Transport for TokioTransport {
    fn open(&mut self, socket: SocketId, url: &str) {
        self.sockets.retain(|_, tx| !tx.is_closed());
        let (tx, rx) = mpsc::unbounded_channel();
        self.sockets.insert(socket, tx);
        tokio::spawn(run_socket(socket, url.to_owned(), rx, self.events.clone()));
    }

    fn send(&mut self, socket: SocketId, text: String) -> Result<(), TransportError> {
        let tx = self.sockets.get(&socket).ok_or(TransportError::NotOpen(socket))?;
        tx.send(Outbound::Text(text)).map_err(|_| TransportError::Dropped(socket))
    }

    fn close(&mut self, socket: SocketId, code: u16) {
        let Some(tx) = self.sockets.remove(&socket) else {
            return;
        };
        if tx.send(Outbound::Close(code)).is_err() {
            debug!(%socket, "socket task already finished");
        }
    }

    fn schedule_retry(&mut self, timer: TimerId, delay: Duration) {
        self.timers.retain(|_, handle| !handle.is_finished());
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if events.send(TransportEvent::RetryDue(timer)).is_err() {
                debug!(timer = timer.0, "retry fired after driver stopped");
            }
        });
        self.timers.insert(timer, handle);
    }

    fn cancel_retry(&mut self, timer: TimerId) {
        if let Some(handle) = self.timers.remove(&timer) {
            handle.abort();
        }
    }
}

/// Install rustls' ring provider for `wss` endpoints, once per process.
pub fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            debug!("rustls crypto provider already installed");
        }
    });
}

/// One socket's lifetime: connect, pump both directions, report the close.
async fn run_socket(
    socket: SocketId,
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let emit = |event: TransportEvent| {
        if events.send(event).is_err() {
            debug!(%socket, "driver gone; dropping socket event");
        }
    };

    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(error) => {
            emit(TransportEvent::Error(socket, error.to_string()));
            emit(TransportEvent::Closed { socket, code: ABNORMAL_CLOSE });
            return;
        }
    };
    emit(TransportEvent::Opened(socket));

    let (mut sink, mut stream) = stream.split();
    let mut close_code = ABNORMAL_CLOSE;
    loop {
        tokio::select! {
            command = outbound.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(error) = sink.send(Message::Text(text.into())).await {
                        emit(TransportEvent::Error(socket, error.to_string()));
                        break;
                    }
                }
                Some(Outbound::Close(code)) => {
                    let frame = CloseFrame { code: CloseCode::from(code), reason: String::from("client closing").into() };
                    if let Err(error) = sink.send(Message::Close(Some(frame))).await {
                        debug!(%socket, %error, "close frame not delivered");
                    }
                    close_code = code;
                    break;
                }
                None => break,
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => emit(TransportEvent::Text(socket, text.as_str().to_owned())),
                Some(Ok(Message::Binary(bytes))) => emit(TransportEvent::Binary(socket, bytes.to_vec())),
                Some(Ok(Message::Close(frame))) => {
                    close_code = frame.map_or(NO_STATUS_CLOSE, |f| u16::from(f.code));
                    emit(TransportEvent::Closing(socket));
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    emit(TransportEvent::Error(socket, error.to_string()));
                    break;
                }
                None => break,
            },
        }
    }
    emit(TransportEvent::Closed { socket, code: close_code });
}

// =============================================================================
// SessionHandle
// =============================================================================

enum Command {
    Connect(SessionIdentity),
    Create {
        position: Point,
        widget: Option<Box<dyn TerminalWidget + Send>>,
        reply: oneshot::Sender<Result<String, RegistryError>>,
    },
    Attach { provisional_id: String, widget: Box<dyn TerminalWidget + Send>, reply: oneshot::Sender<Result<(), RegistryError>> },
    Input { provisional_id: String, data: String, reply: oneshot::Sender<Result<bool, SendError>> },
    Remove { provisional_id: String },
    Reconnect,
    Teardown,
}

/// Cloneable command channel into a running [`SessionDriver`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionHandle {
    pub fn connect(&self, identity: SessionIdentity) -> Result<(), HandleError> {
        self.submit(Command::Connect(identity))
    }

    /// Request a terminal at the workspace origin; resolves to its provisional id.
    pub async fn create_terminal(&self) -> Result<String, HandleError> {
        self.create_terminal_at(Point::ORIGIN).await
    }

    pub async fn create_terminal_at(&self, position: Point) -> Result<String, HandleError> {
        Ok(self.request(|reply| Command::Create { position, widget: None, reply }).await??)
    }

    /// Request a terminal with `widget` already attached, so nothing the
    /// server writes right after confirming it is missed.
    pub async fn create_terminal_with(
        &self,
        position: Point,
        widget: Box<dyn TerminalWidget + Send>,
    ) -> Result<String, HandleError> {
        Ok(self.request(|reply| Command::Create { position, widget: Some(widget), reply }).await??)
    }

    pub async fn attach(&self, provisional_id: &str, widget: Box<dyn TerminalWidget + Send>) -> Result<(), HandleError> {
        let provisional_id = provisional_id.to_owned();
        Ok(self.request(|reply| Command::Attach { provisional_id, widget, reply }).await??)
    }

    /// Forward keystrokes. Resolves to `false` if the terminal is not ready.
    pub async fn send_input(&self, provisional_id: &str, data: &str) -> Result<bool, HandleError> {
        let (provisional_id, data) = (provisional_id.to_owned(), data.to_owned());
        Ok(self.request(|reply| Command::Input { provisional_id, data, reply }).await??)
    }

    pub fn remove(&self, provisional_id: &str) -> Result<(), HandleError> {
        self.submit(Command::Remove { provisional_id: provisional_id.to_owned() })
    }

    pub fn reconnect(&self) -> Result<(), HandleError> {
        self.submit(Command::Reconnect)
    }

    /// Close the session and stop the driver.
    pub fn teardown(&self) -> Result<(), HandleError> {
        self.submit(Command::Teardown)
    }

    fn submit(&self, command: Command) -> Result<(), HandleError> {
        self.commands.send(command).map_err(|_| HandleError::Stopped)
    }

    async fn request<R>(&self, build: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R, HandleError> {
        let (tx, rx) = oneshot::channel();
        self.submit(build(tx))?;
        rx.await.map_err(|_| HandleError::Stopped)
    }
}

// =============================================================================
// SessionDriver
// =============================================================================

/// Owns a [`TerminalSession`] and runs it until teardown.
pub struct SessionDriver {
    session: TerminalSession<TokioTransport>,
    transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    observer: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionDriver {
    /// Build a driver, the handle that controls it, and the receiver of its
    /// lifecycle events. Nothing connects until [`SessionHandle::connect`].
    #[must_use]
    pub fn new(config: ClientConfig) -> (Self, SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (event_tx, transport_events) = mpsc::unbounded_channel();
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (observer, observed) = mpsc::unbounded_channel();
        let driver = Self {
            session: TerminalSession::new(TokioTransport::new(event_tx), config),
            transport_events,
            commands,
            observer,
        };
        (driver, SessionHandle { commands: command_tx }, observed)
    }

    /// Process events and commands until teardown or until every
    /// [`SessionHandle`] is dropped.
    pub async fn run(mut self) {
        let sweeping = self.session.connection().config().create_timeout.is_some();
        let mut sweep = tokio::time::interval(CREATE_SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                Some(event) = self.transport_events.recv() => {
                    let out = self.session.handle(event);
                    self.publish(out);
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        debug!("all session handles dropped; tearing down");
                        let out = self.session.teardown();
                        self.publish(out);
                        break;
                    };
                    if self.apply(command).is_break() {
                        break;
                    }
                }
                _ = sweep.tick(), if sweeping => {
                    let out = self.session.expire_stale(Instant::now());
                    self.publish(out);
                }
            }
        }
    }

    fn apply(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Connect(identity) => {
                let out = self.session.connect(identity);
                self.publish(out);
            }
            Command::Create { position, widget: None, reply } => {
                reply_to(reply, self.session.create_terminal_at(position));
            }
            Command::Create { position, widget: Some(widget), reply } => {
                reply_to(reply, self.session.create_terminal_with(position, widget));
            }
            Command::Attach { provisional_id, widget, reply } => {
                reply_to(reply, self.session.attach(&provisional_id, widget));
            }
            Command::Input { provisional_id, data, reply } => {
                reply_to(reply, self.session.send_input(&provisional_id, &data));
            }
            Command::Remove { provisional_id } => {
                if !self.session.remove_terminal(&provisional_id) {
                    debug!(provisional_id, "remove for unknown terminal");
                }
            }
            Command::Reconnect => {
                let out = self.session.reconnect();
                self.publish(out);
            }
            Command::Teardown => {
                let out = self.session.teardown();
                self.publish(out);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn publish(&self, events: Vec<SessionEvent>) {
        for event in events {
            if self.observer.send(event).is_err() {
                warn!("session observer dropped; events discarded");
                return;
            }
        }
    }
}

fn reply_to<R>(reply: oneshot::Sender<R>, value: R) {
    if reply.send(value).is_err() {
        debug!("requester went away before the reply");
    }
}
