//! CoAP over UDP transport.
//!
//! # Architecture
//!
//! ```text
//!   send() ──▶ CON request ──▶ socket ──▶ server
//!     ▲                          │
//!     │                     serve thread (recv_from loop)
//!     │                          │
//!     │    response ◀── pending[token] ◀── ACK / CON response
//!     │                          │
//!     └─ recv_timeout      request ──▶ Router ──▶ piggy-backed ACK
//! ```
//!
//! Outbound requests are Confirmable with a fresh token. The serve thread
//! matches responses to waiting senders by token, acknowledging separate
//! responses. A response that cannot be decoded fails its sender at once.
//! Inbound requests run through the installed routes on the serve thread and
//! are answered in the acknowledgement. The last few acknowledgements are
//! kept so a retransmitted Confirmable request is answered again without
//! running its handler twice. There is no outbound retransmission; a lost
//! exchange surfaces as a timeout.

use std::{
    collections::{HashMap, VecDeque},
    io,
    net::{SocketAddr, UdpSocket},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use bytes::Bytes;
use lwm2m_client::{Handler, RoutePattern, Router, Transport, TransportError};
use lwm2m_proto::{
    Method, Request, Response,
    coap::{Message, MessageType},
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::error::DeviceError;

/// Largest datagram read from the socket.
const MAX_DATAGRAM: usize = 1152;

/// How often the serve thread checks for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Acknowledgements remembered for duplicate detection.
const REPLY_CACHE_CAPACITY: usize = 32;

/// Outcome handed from the serve thread to a waiting sender.
type Completion = Result<Response, TransportError>;

/// UDP transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpTransportConfig {
    /// Local address to bind.
    pub bind: SocketAddr,
    /// LWM2M server address.
    pub server: SocketAddr,
    /// How long to wait for the response to an outbound request.
    pub timeout: Duration,
}

impl UdpTransportConfig {
    /// Default response timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
}

impl Default for UdpTransportConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 0)),
            server: SocketAddr::from(([127, 0, 0, 1], 5683)),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

/// State shared with the serve thread.
struct Shared {
    socket: UdpSocket,
    server: SocketAddr,
    router: RwLock<Router>,
    pending: Mutex<HashMap<Bytes, mpsc::SyncSender<Completion>>>,
    replies: Mutex<ReplyCache>,
    running: AtomicBool,
    next_message_id: AtomicU16,
}

/// Recently sent acknowledgements keyed by peer and message id, oldest first.
#[derive(Default)]
struct ReplyCache {
    entries: VecDeque<((SocketAddr, u16), Bytes)>,
}

impl ReplyCache {
    fn get(&self, key: (SocketAddr, u16)) -> Option<Bytes> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, datagram)| datagram.clone())
    }

    fn insert(&mut self, key: (SocketAddr, u16), datagram: Bytes) {
        if self.entries.len() == REPLY_CACHE_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back((key, datagram));
    }
}

/// CoAP transport over a UDP socket.
pub struct UdpTransport {
    shared: Arc<Shared>,
    timeout: Duration,
    next_token: AtomicU64,
    serve: Option<JoinHandle<()>>,
}

impl UdpTransport {
    /// Bind the local socket. Nothing is received until [`Transport::start`].
    pub fn bind(config: &UdpTransportConfig) -> Result<Self, DeviceError> {
        let socket = UdpSocket::bind(config.bind)
            .map_err(|source| DeviceError::Bind { addr: config.bind, source })?;
        socket.set_read_timeout(Some(POLL_INTERVAL))?;

        let mut seed = [0u8; 10];
        random_bytes(&mut seed);
        let [m0, m1, t @ ..] = seed;

        let shared = Shared {
            socket,
            server: config.server,
            router: RwLock::new(Router::new()),
            pending: Mutex::new(HashMap::new()),
            replies: Mutex::new(ReplyCache::default()),
            running: AtomicBool::new(false),
            next_message_id: AtomicU16::new(u16::from_be_bytes([m0, m1])),
        };
        Ok(Self {
            shared: Arc::new(shared),
            timeout: config.timeout,
            next_token: AtomicU64::new(u64::from_be_bytes(t)),
            serve: None,
        })
    }

    /// Bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr, DeviceError> {
        Ok(self.shared.socket.local_addr()?)
    }

    /// Server requests are sent to.
    pub fn server(&self) -> SocketAddr {
        self.shared.server
    }

    /// Whether the serve thread is running.
    pub fn is_serving(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Stop the serve thread and wait for it to exit.
    ///
    /// Pending senders fail with [`TransportError::Closed`].
    pub fn shutdown(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.pending.lock().clear();
        if let Some(handle) = self.serve.take() {
            if handle.join().is_err() {
                warn!("serve thread panicked");
            }
        }
    }

    fn next_token(&self) -> Bytes {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        Bytes::copy_from_slice(&token.to_be_bytes())
    }

    fn exchange(
        &self,
        datagram: &[u8],
        responses: &mpsc::Receiver<Completion>,
    ) -> Result<Response, TransportError> {
        self.shared.socket.send_to(datagram, self.shared.server)?;
        responses.recv_timeout(self.timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => TransportError::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => TransportError::Closed,
        })?
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Transport for UdpTransport {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        if !self.is_serving() {
            return Err(TransportError::Closed);
        }

        let token = self.next_token();
        let message_id = self.shared.next_message_id();
        let request = request.with_correlation(token.clone(), message_id);
        let datagram = Message::from_request(&request, MessageType::Confirmable).encode()?;

        let (tx, rx) = mpsc::sync_channel(1);
        self.shared.pending.lock().insert(token.clone(), tx);
        trace!(method = %request.method, path = %request.path_str(), message_id, "sending request");

        let result = self.exchange(&datagram, &rx);
        self.shared.pending.lock().remove(&token);
        result
    }

    fn register_route(
        &mut self,
        method: Method,
        pattern: RoutePattern,
        handler: Handler,
    ) -> Result<(), TransportError> {
        self.shared.router.write().add(method, pattern, handler);
        Ok(())
    }

    fn start(&mut self) -> Result<(), TransportError> {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new().name("coap-serve".to_owned()).spawn(move || serve(&shared));
        match spawned {
            Ok(handle) => {
                debug!(routes = self.shared.router.read().len(), "serve thread started");
                self.serve = Some(handle);
                Ok(())
            },
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                Err(e.into())
            },
        }
    }
}

fn serve(shared: &Shared) {
    let mut buf = [0u8; MAX_DATAGRAM];

    while shared.running.load(Ordering::Acquire) {
        let (len, peer) = match shared.socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue;
            },
            Err(e) => {
                warn!(error = %e, "receive failed");
                continue;
            },
        };

        match Message::decode(&buf[..len]) {
            Ok(message) => shared.handle(&message, peer),
            Err(e) => debug!(%peer, error = %e, "dropping undecodable datagram"),
        }
    }

    debug!("serve thread stopped");
}

impl Shared {
    fn next_message_id(&self) -> u16 {
        self.next_message_id.fetch_add(1, Ordering::Relaxed)
    }

    fn handle(&self, message: &Message, peer: SocketAddr) {
        if message.is_request() {
            self.answer(message, peer);
        } else if message.is_response() {
            self.complete(message, peer);
        } else if message.is_empty() && message.message_type == MessageType::Confirmable {
            // CoAP ping.
            let reset = Message { message_type: MessageType::Reset, ..Message::empty_ack(message.message_id) };
            self.reply(&reset, peer);
        }
    }

    fn answer(&self, message: &Message, peer: SocketAddr) {
        let confirmable = message.message_type == MessageType::Confirmable;
        let key = (peer, message.message_id);
        if confirmable && let Some(datagram) = self.replies.lock().get(key) {
            debug!(%peer, message_id = message.message_id, "duplicate request, resending ack");
            self.send_datagram(&datagram, peer);
            return;
        }

        let request = match message.to_request() {
            Ok(request) => request,
            Err(e) => {
                debug!(%peer, error = %e, "dropping malformed request");
                return;
            },
        };

        let response = self.router.read().handle(&request);
        if !confirmable {
            let reply = Message {
                message_id: self.next_message_id(),
                ..Message::from_response(&response, MessageType::NonConfirmable)
            };
            self.reply(&reply, peer);
            return;
        }

        match Message::from_response(&response, MessageType::Acknowledgement).encode() {
            Ok(datagram) => {
                self.send_datagram(&datagram, peer);
                self.replies.lock().insert(key, datagram);
            },
            Err(e) => warn!(%peer, error = %e, "failed to encode ack"),
        }
    }

    fn complete(&self, message: &Message, peer: SocketAddr) {
        if message.message_type == MessageType::Confirmable {
            // Separate response; acknowledge it before handing it over.
            self.reply(&Message::empty_ack(message.message_id), peer);
        }

        let Some(waiter) = self.pending.lock().remove(&message.token) else {
            debug!(%peer, code = message.code, "response for unknown token");
            return;
        };

        let completion = message.to_response().map_err(|e| {
            debug!(%peer, error = %e, "malformed response");
            TransportError::from(e)
        });
        let _ = waiter.try_send(completion);
    }

    fn reply(&self, message: &Message, peer: SocketAddr) {
        match message.encode() {
            Ok(datagram) => self.send_datagram(&datagram, peer),
            Err(e) => warn!(%peer, error = %e, "failed to encode reply"),
        }
    }

    fn send_datagram(&self, datagram: &[u8], peer: SocketAddr) {
        if let Err(e) = self.socket.send_to(datagram, peer) {
            warn!(%peer, error = %e, "failed to send reply");
        }
    }
}

fn random_bytes(buffer: &mut [u8]) {
    if let Err(e) = getrandom::fill(buffer) {
        // Predictable tokens only weaken spoofing resistance.
        warn!(error = %e, "getrandom failed, using zero seed");
        buffer.fill(0);
    }
}
