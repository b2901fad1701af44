//! Registration lifecycle with the LWM2M server.
//!
//! ```text
//! Unregistered ──register()──▶ Registering ──2.01──▶ Registered
//!      ▲                            │                    │
//!      └──────── failure ───────────┘               deregister()
//!                                                        │
//!                                                        ▼
//!                              Deregistered ◀── Deregistering
//! ```
//!
//! The session owns the state and the server-assigned location; it talks to
//! the server only through the [`Transport`] passed to each call.

use std::fmt;

use lwm2m_proto::{
    Method, ObjectLink, Request, ResponseCode,
    coap::CONTENT_FORMAT_LINK,
    link_format,
};
use tracing::{debug, info, warn};

use crate::{config::ClientConfig, error::ClientError, transport::Transport};

/// Registration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistrationState {
    /// Not registered with any server.
    Unregistered,
    /// Register request in flight.
    Registering,
    /// Registered; the server assigned a location.
    Registered,
    /// Deregister request in flight.
    Deregistering,
    /// Deregistered. Terminal.
    Deregistered,
}

impl fmt::Display for RegistrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unregistered => "unregistered",
            Self::Registering => "registering",
            Self::Registered => "registered",
            Self::Deregistering => "deregistering",
            Self::Deregistered => "deregistered",
        };
        f.write_str(name)
    }
}

/// Registration session state machine.
#[derive(Debug, Clone)]
pub struct RegistrationSession {
    state: RegistrationState,
    endpoint: Option<String>,
    location: Option<String>,
}

impl Default for RegistrationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationSession {
    /// Fresh, unregistered session.
    pub fn new() -> Self {
        Self { state: RegistrationState::Unregistered, endpoint: None, location: None }
    }

    /// Current state.
    pub fn state(&self) -> RegistrationState {
        self.state
    }

    /// Server-assigned location while registered.
    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    /// Endpoint name used for the current registration.
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// Register as `endpoint`, advertising `links`.
    ///
    /// Sends `POST /rd?ep=<endpoint>` with the link-format payload and
    /// expects `2.01 Created` with a Location-Path. On any failure the
    /// session returns to [`RegistrationState::Unregistered`].
    pub fn register(
        &mut self,
        endpoint: &str,
        links: &[ObjectLink],
        config: &ClientConfig,
        transport: &dyn Transport,
    ) -> Result<String, ClientError> {
        if self.state != RegistrationState::Unregistered {
            return Err(ClientError::StateConflict { operation: "register", state: self.state });
        }
        validate_endpoint(endpoint, config.max_endpoint_name_len)?;

        self.state = RegistrationState::Registering;
        debug!(endpoint, links = links.len(), "registering");

        let mut request =
            Request::new(Method::Post, &config.registration_path).with_query("ep", endpoint);
        if let Some(lifetime) = config.lifetime {
            request = request.with_query("lt", lifetime.to_string());
        }
        if let Some(binding) = &config.binding {
            request = request.with_query("b", binding.clone());
        }
        let request = request.with_payload(link_format::format(links), CONTENT_FORMAT_LINK);

        let result = match transport.send(request) {
            Ok(resp) if resp.code == ResponseCode::Created => {
                resp.location().ok_or(ClientError::MissingLocation)
            },
            Ok(resp) => Err(ClientError::Rejected { operation: "register", code: resp.code }),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(location) => {
                info!(endpoint, %location, "registered");
                self.state = RegistrationState::Registered;
                self.endpoint = Some(endpoint.to_owned());
                self.location = Some(location.clone());
                Ok(location)
            },
            Err(e) => {
                warn!(endpoint, error = %e, "registration failed");
                self.state = RegistrationState::Unregistered;
                Err(e)
            },
        }
    }

    /// Refresh the registration, optionally advertising a new object list.
    ///
    /// Sends `POST <location>` and expects `2.04 Changed`. A failed update
    /// leaves the session registered.
    pub fn update(
        &mut self,
        links: Option<&[ObjectLink]>,
        config: &ClientConfig,
        transport: &dyn Transport,
    ) -> Result<(), ClientError> {
        let location = match (&self.state, &self.location) {
            (RegistrationState::Registered, Some(location)) => location.clone(),
            _ => return Err(ClientError::StateConflict { operation: "update", state: self.state }),
        };

        let mut request = Request::new(Method::Post, &location);
        if let Some(lifetime) = config.lifetime {
            request = request.with_query("lt", lifetime.to_string());
        }
        if let Some(links) = links {
            request = request.with_payload(link_format::format(links), CONTENT_FORMAT_LINK);
        }

        let resp = transport.send(request)?;
        if resp.code != ResponseCode::Changed {
            warn!(%location, code = %resp.code, "update rejected");
            return Err(ClientError::Rejected { operation: "update", code: resp.code });
        }
        debug!(%location, "registration updated");
        Ok(())
    }

    /// Deregister from the server.
    ///
    /// Sends `DELETE <location>`. The session ends in
    /// [`RegistrationState::Deregistered`] whether or not the server
    /// acknowledges; the result reports what the server said.
    pub fn deregister(&mut self, transport: &dyn Transport) -> Result<(), ClientError> {
        let location = match (self.state, self.location.take()) {
            (RegistrationState::Registered, Some(location)) => location,
            (_, location) => {
                self.location = location;
                return Err(ClientError::StateConflict { operation: "deregister", state: self.state });
            },
        };

        self.state = RegistrationState::Deregistering;
        debug!(%location, "deregistering");
        let result = transport.send(Request::new(Method::Delete, &location));
        self.state = RegistrationState::Deregistered;

        match result {
            Ok(resp) if resp.code.is_success() => {
                info!(%location, "deregistered");
                Ok(())
            },
            Ok(resp) => {
                warn!(%location, code = %resp.code, "server rejected deregistration");
                Err(ClientError::Rejected { operation: "deregister", code: resp.code })
            },
            Err(e) => {
                warn!(%location, error = %e, "deregistration not acknowledged");
                Err(e.into())
            },
        }
    }
}

fn validate_endpoint(endpoint: &str, max: usize) -> Result<(), ClientError> {
    let len = endpoint.chars().count();
    if len == 0 {
        return Err(ClientError::EmptyEndpointName);
    }
    if len > max {
        return Err(ClientError::EndpointNameTooLong { len, max });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use lwm2m_proto::{ObjectPath, ObjectType, Response};

    use super::*;
    use crate::{
        error::TransportError,
        transport::{Handler, RoutePattern},
    };

    /// Answers each send with the next scripted result and keeps the requests.
    #[derive(Default)]
    struct Scripted {
        replies: Mutex<Vec<Result<Response, TransportError>>>,
        sent: Mutex<Vec<Request>>,
    }

    impl Scripted {
        fn replying(replies: Vec<Result<Response, TransportError>>) -> Self {
            Self { replies: Mutex::new(replies.into_iter().rev().collect()), sent: Mutex::default() }
        }
    }

    impl Transport for Scripted {
        fn send(&self, request: Request) -> Result<Response, TransportError> {
            self.sent.lock().unwrap().push(request);
            self.replies.lock().unwrap().pop().unwrap_or(Err(TransportError::Closed))
        }

        fn register_route(&mut self, _: Method, _: RoutePattern, _: Handler) -> Result<(), TransportError> {
            Ok(())
        }

        fn start(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn created(location: &str) -> Result<Response, TransportError> {
        Ok(Response::new(ResponseCode::Created).with_location(location))
    }

    fn links() -> Vec<ObjectLink> {
        vec![ObjectLink::bare(ObjectPath::object(ObjectType::DEVICE))]
    }

    #[test]
    fn register_stores_location() {
        let transport = Scripted::replying(vec![created("/rd/abc")]);
        let mut session = RegistrationSession::new();
        let config = ClientConfig { lifetime: Some(300), ..ClientConfig::default() };

        let location = session.register("node-1", &links(), &config, &transport).unwrap();

        assert_eq!(location, "/rd/abc");
        assert_eq!(session.state(), RegistrationState::Registered);
        assert_eq!(session.location(), Some("/rd/abc"));

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].path_str(), "/rd");
        assert_eq!(sent[0].query_value("ep"), Some("node-1"));
        assert_eq!(sent[0].query_value("lt"), Some("300"));
        assert_eq!(sent[0].payload.as_ref(), b"</3>");
        assert_eq!(sent[0].content_format, Some(CONTENT_FORMAT_LINK));
    }

    #[test]
    fn endpoint_name_bound() {
        let transport = Scripted::replying(vec![created("/rd/1")]);
        let mut session = RegistrationSession::new();
        let config = ClientConfig::default();

        let err = session.register("abcdefghijk", &links(), &config, &transport).unwrap_err();
        assert!(matches!(err, ClientError::EndpointNameTooLong { len: 11, max: 10 }));
        assert_eq!(session.state(), RegistrationState::Unregistered);
        assert!(transport.sent.lock().unwrap().is_empty());

        assert!(session.register("abcdefghij", &links(), &config, &transport).is_ok());
    }

    #[test]
    fn empty_endpoint_rejected() {
        let transport = Scripted::default();
        let mut session = RegistrationSession::new();
        let err = session.register("", &links(), &ClientConfig::default(), &transport).unwrap_err();
        assert!(matches!(err, ClientError::EmptyEndpointName));
    }

    #[test]
    fn failed_register_returns_to_unregistered() {
        let transport = Scripted::replying(vec![
            Ok(Response::new(ResponseCode::Forbidden)),
            Err(TransportError::Timeout { timeout_ms: 10 }),
            Ok(Response::new(ResponseCode::Created)),
        ]);
        let mut session = RegistrationSession::new();
        let config = ClientConfig::default();

        let err = session.register("n", &links(), &config, &transport).unwrap_err();
        assert!(matches!(err, ClientError::Rejected { code: ResponseCode::Forbidden, .. }));
        assert_eq!(session.state(), RegistrationState::Unregistered);

        let err = session.register("n", &links(), &config, &transport).unwrap_err();
        assert!(matches!(err, ClientError::Transport(TransportError::Timeout { .. })));
        assert_eq!(session.state(), RegistrationState::Unregistered);

        let err = session.register("n", &links(), &config, &transport).unwrap_err();
        assert!(matches!(err, ClientError::MissingLocation));
        assert_eq!(session.location(), None);
    }

    #[test]
    fn register_twice_conflicts() {
        let transport = Scripted::replying(vec![created("/rd/1"), created("/rd/2")]);
        let mut session = RegistrationSession::new();
        let config = ClientConfig::default();

        session.register("n", &links(), &config, &transport).unwrap();
        let err = session.register("n", &links(), &config, &transport).unwrap_err();
        assert!(matches!(
            err,
            ClientError::StateConflict { operation: "register", state: RegistrationState::Registered }
        ));
        assert_eq!(session.location(), Some("/rd/1"));
    }

    #[test]
    fn deregister_requires_registration() {
        let transport = Scripted::default();
        let mut session = RegistrationSession::new();
        let err = session.deregister(&transport).unwrap_err();
        assert!(matches!(err, ClientError::StateConflict { operation: "deregister", .. }));
        assert_eq!(session.state(), RegistrationState::Unregistered);
    }

    #[test]
    fn deregister_is_terminal_even_on_failure() {
        let transport = Scripted::replying(vec![created("/rd/7"), Err(TransportError::Closed)]);
        let mut session = RegistrationSession::new();
        session.register("n", &links(), &ClientConfig::default(), &transport).unwrap();

        assert!(session.deregister(&transport).is_err());
        assert_eq!(session.state(), RegistrationState::Deregistered);
        assert_eq!(session.location(), None);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[1].method, Method::Delete);
        assert_eq!(sent[1].path_str(), "/rd/7");
    }

    #[test]
    fn update_posts_to_location() {
        let transport = Scripted::replying(vec![
            created("/rd/7"),
            Ok(Response::new(ResponseCode::Changed)),
            Ok(Response::new(ResponseCode::NotFound)),
        ]);
        let mut session = RegistrationSession::new();
        let config = ClientConfig::default();
        session.register("n", &links(), &config, &transport).unwrap();

        session.update(Some(&links()), &config, &transport).unwrap();
        let err = session.update(None, &config, &transport).unwrap_err();
        assert!(matches!(err, ClientError::Rejected { operation: "update", .. }));
        assert_eq!(session.state(), RegistrationState::Registered);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[1].method, Method::Post);
        assert_eq!(sent[1].path_str(), "/rd/7");
        assert!(sent[2].payload.is_empty());
    }
}
