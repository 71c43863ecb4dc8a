//! In-process transport for exercising the client without a socket.

use crate::transport::{Transport, TransportCommand, TransportEvent, TransportLink};
use chatline_core::{ApiKey, ConnectionConfig, OutboundEnvelope};
use serde_json::json;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub(crate) fn config() -> ConnectionConfig {
    ConnectionConfig::new("ws://scripted.test/chat", ApiKey::new("test-key").unwrap())
        .with_connect_timeout(Duration::from_secs(2))
        .with_reply_timeout(Duration::from_secs(2))
}

#[derive(Clone, Copy)]
enum Open {
    After(Duration),
    Never,
}

enum Replies {
    Echo,
    Silent,
    Queue(Mutex<VecDeque<String>>),
}

struct Script {
    open: Open,
    refuse: AtomicBool,
    fail_writes: bool,
    stall_writes: bool,
    replies: Replies,
    sent: Mutex<Vec<String>>,
    running: AtomicUsize,
    peer_rx: Mutex<Option<mpsc::UnboundedReceiver<PeerAction>>>,
    peer_tx: mpsc::UnboundedSender<PeerAction>,
}

/// Transport whose peer behaviour is fixed up front.
#[derive(Clone)]
pub(crate) struct ScriptedTransport(Arc<Script>);

impl ScriptedTransport {
    fn with_replies(replies: Replies) -> Self {
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        Self(Arc::new(Script {
            open: Open::After(Duration::ZERO),
            refuse: AtomicBool::new(false),
            fail_writes: false,
            stall_writes: false,
            replies,
            sent: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            peer_rx: Mutex::new(Some(peer_rx)),
            peer_tx,
        }))
    }

    /// Answers each message with `{"response": <message>}`.
    pub(crate) fn echoing() -> Self {
        Self::with_replies(Replies::Echo)
    }

    /// Never answers.
    pub(crate) fn silent() -> Self {
        Self::with_replies(Replies::Silent)
    }

    /// Answers each message with the next raw frame from `frames`.
    pub(crate) fn replying<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_replies(Replies::Queue(Mutex::new(
            frames.into_iter().map(Into::into).collect(),
        )))
    }

    fn modify(self, f: impl FnOnce(&mut Script)) -> Self {
        let mut script = Arc::try_unwrap(self.0)
            .unwrap_or_else(|_| panic!("configure the transport before cloning it"));
        f(&mut script);
        Self(Arc::new(script))
    }

    pub(crate) fn opens_after(self, delay: Duration) -> Self {
        self.modify(|s| s.open = Open::After(delay))
    }

    pub(crate) fn never_opens(self) -> Self {
        self.modify(|s| s.open = Open::Never)
    }

    pub(crate) fn refuses(self) -> Self {
        self.set_refuse(true);
        self
    }

    pub(crate) fn failing_writes(self) -> Self {
        self.modify(|s| s.fail_writes = true)
    }

    /// Accepts writes but never acknowledges them.
    pub(crate) fn stalled_writes(self) -> Self {
        self.modify(|s| s.stall_writes = true)
    }

    pub(crate) fn set_refuse(&self, refuse: bool) {
        self.0.refuse.store(refuse, Ordering::SeqCst);
    }

    pub(crate) fn peer(&self) -> Peer {
        Peer(self.0.peer_tx.clone())
    }

    /// Messages the client wrote, decoded.
    pub(crate) fn sent(&self) -> Vec<OutboundEnvelope> {
        self.0
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    /// Wait until no `run` future is alive.
    pub(crate) fn wait_until_stopped(&self, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            if self.0.running.load(Ordering::SeqCst) == 0 {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn answer(&self, frame: &str) -> Option<String> {
        match &self.0.replies {
            Replies::Silent => None,
            Replies::Echo => {
                let envelope: OutboundEnvelope = serde_json::from_str(frame).ok()?;
                Some(json!({ "response": envelope.message }).to_string())
            }
            Replies::Queue(queue) => queue.lock().unwrap().pop_front(),
        }
    }
}

/// Lets a test act as the remote end.
pub(crate) struct Peer(mpsc::UnboundedSender<PeerAction>);

enum PeerAction {
    Frame(String),
    Error(String),
    Close,
}

impl Peer {
    pub(crate) fn frame(&self, text: &str) {
        let _ = self.0.send(PeerAction::Frame(text.to_string()));
    }

    pub(crate) fn error(&self, text: &str) {
        let _ = self.0.send(PeerAction::Error(text.to_string()));
    }

    pub(crate) fn close(&self) {
        let _ = self.0.send(PeerAction::Close);
    }
}

struct RunningGuard(Arc<Script>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.running.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn next_peer_action(peer: &mut Option<mpsc::UnboundedReceiver<PeerAction>>) -> PeerAction {
    if let Some(rx) = peer {
        if let Some(action) = rx.recv().await {
            return action;
        }
    }
    std::future::pending().await
}

impl Transport for ScriptedTransport {
    fn run(
        self,
        _config: ConnectionConfig,
        mut link: TransportLink,
    ) -> impl Future<Output = ()> + Send + 'static {
        async move {
            self.0.running.fetch_add(1, Ordering::SeqCst);
            let _guard = RunningGuard(self.0.clone());

            if self.0.refuse.load(Ordering::SeqCst) {
                return link.fail("connection refused");
            }
            match self.0.open {
                Open::After(delay) => tokio::time::sleep(delay).await,
                Open::Never => std::future::pending::<()>().await,
            }
            link.emit(TransportEvent::Opened);

            let mut peer = self.0.peer_rx.lock().unwrap().take();
            let mut unacked = Vec::new();
            loop {
                tokio::select! {
                    cmd = link.commands.recv() => match cmd {
                        Some(TransportCommand::Send { frame, ack }) => {
                            if self.0.fail_writes {
                                let _ = ack.send(Err("broken pipe".into()));
                                continue;
                            }
                            if self.0.stall_writes {
                                unacked.push(ack);
                                continue;
                            }
                            self.0.sent.lock().unwrap().push(frame.clone());
                            let _ = ack.send(Ok(()));
                            if let Some(reply) = self.answer(&frame) {
                                link.emit(TransportEvent::Frame(reply));
                            }
                        }
                        Some(TransportCommand::Close) | None => {
                            link.emit(TransportEvent::Closed { code: Some(1000), reason: String::new() });
                            return;
                        }
                    },
                    action = next_peer_action(&mut peer) => match action {
                        PeerAction::Frame(text) => {
                            link.emit(TransportEvent::Frame(text));
                        }
                        PeerAction::Error(text) => {
                            link.emit(TransportEvent::Error(text));
                        }
                        PeerAction::Close => {
                            link.emit(TransportEvent::Closed { code: Some(1001), reason: "going away".into() });
                            return;
                        }
                    },
                }
            }
        }
    }
}
