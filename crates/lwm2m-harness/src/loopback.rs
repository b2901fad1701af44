//! In-process transport.
//!
//! `LoopbackTransport` plays both sides of the wire. Outbound requests from
//! the client go to a scripted server that records them and answers with
//! queued replies, falling back to an accepting resource directory.
//! Inbound requests are injected with [`LoopbackTransport::deliver`] and run
//! through the client's routes on the calling thread.
//!
//! Clones share state, so a test keeps one handle while the client owns the
//! other.

use std::{collections::VecDeque, sync::Arc};

use lwm2m_client::{Handler, RoutePattern, Router, Transport, TransportError};
use lwm2m_proto::{Method, Request, Response, ResponseCode};
use parking_lot::{Mutex, RwLock};

#[derive(Default)]
struct ServerState {
    replies: VecDeque<Result<Response, TransportError>>,
    sent: Vec<Request>,
    registrations: u32,
}

#[derive(Default)]
struct Shared {
    router: RwLock<Router>,
    started: RwLock<bool>,
    server: Mutex<ServerState>,
}

/// Transport connecting a client to an in-process scripted server.
#[derive(Clone, Default)]
pub struct LoopbackTransport {
    shared: Arc<Shared>,
}

impl LoopbackTransport {
    /// New transport with an accepting server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the server's answer to the next outbound request.
    pub fn push_reply(&self, reply: Result<Response, TransportError>) {
        self.shared.server.lock().replies.push_back(reply);
    }

    /// Outbound requests the server has received, oldest first.
    pub fn sent(&self) -> Vec<Request> {
        self.shared.server.lock().sent.clone()
    }

    /// Most recent outbound request.
    pub fn last_sent(&self) -> Option<Request> {
        self.shared.server.lock().sent.last().cloned()
    }

    /// Whether [`Transport::start`] has been called.
    pub fn is_started(&self) -> bool {
        *self.shared.started.read()
    }

    /// Number of installed routes.
    pub fn route_count(&self) -> usize {
        self.shared.router.read().len()
    }

    /// Run an inbound request through the installed routes.
    ///
    /// Answers `5.03 Service Unavailable` before the transport is started
    /// and `4.04 Not Found` when no route matches.
    pub fn deliver(&self, request: &Request) -> Response {
        if !self.is_started() {
            return Response::reply_to(request, ResponseCode::ServiceUnavailable);
        }
        let router = self.shared.router.read().clone();
        router.handle(request)
    }

    /// Convenience for `deliver(&Request::new(method, path))`.
    pub fn request(&self, method: Method, path: &str) -> Response {
        self.deliver(&Request::new(method, path))
    }
}

impl Transport for LoopbackTransport {
    fn send(&self, request: Request) -> Result<Response, TransportError> {
        let mut server = self.shared.server.lock();
        let scripted = server.replies.pop_front();
        let reply = match scripted {
            Some(reply) => reply,
            None => Ok(default_reply(&request, &mut server.registrations)),
        };
        server.sent.push(request);
        reply
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
        *self.shared.started.write() = true;
        Ok(())
    }
}

/// Resource directory that accepts everything.
fn default_reply(request: &Request, registrations: &mut u32) -> Response {
    match (request.method, request.path.as_slice()) {
        (Method::Post, [rd]) if rd == "rd" => {
            *registrations += 1;
            Response::reply_to(request, ResponseCode::Created)
                .with_location(&format!("/rd/{registrations}"))
        },
        (Method::Post, [rd, _]) if rd == "rd" => Response::reply_to(request, ResponseCode::Changed),
        (Method::Delete, [rd, _]) if rd == "rd" => Response::reply_to(request, ResponseCode::Deleted),
        _ => Response::reply_to(request, ResponseCode::NotFound),
    }
}
