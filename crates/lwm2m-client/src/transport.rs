//! Transport seam.
//!
//! The client never touches sockets. It hands a [`Transport`] one handler per
//! `(method, path pattern)` route and sends registration requests through
//! it. Adapters own message ids, tokens and retransmission.
//!
//! Path patterns are slash-separated; a `{name}` segment matches any decimal
//! `u16`, anything else must match literally:
//!
//! ```text
//! /{object}/{instance}/{resource}   matches /3/0/13
//! /{object}/{instance}              matches /3/0
//! /{object}                         matches /3
//! ```

use std::{fmt, str::FromStr, sync::Arc};

use lwm2m_proto::{Method, Request, Response, ResponseCode, parse_segment};

use crate::error::TransportError;

/// Request handler installed for a route.
pub type Handler = Arc<dyn Fn(&Request) -> Response + Send + Sync>;

/// Request/response transport used by the client.
pub trait Transport {
    /// Send `request` and wait for the matching response.
    fn send(&self, request: Request) -> Result<Response, TransportError>;

    /// Install `handler` for inbound requests matching `method` and `pattern`.
    fn register_route(
        &mut self,
        method: Method,
        pattern: RoutePattern,
        handler: Handler,
    ) -> Result<(), TransportError>;

    /// Begin delivering inbound requests to installed routes.
    fn start(&mut self) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// Parsed route path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern such as `/{object}/{instance}`.
    pub fn parse(pattern: &str) -> Result<Self, TransportError> {
        let invalid = |reason| TransportError::InvalidRoute { pattern: pattern.to_owned(), reason };

        let mut segments = Vec::new();
        for raw in pattern.split('/').filter(|s| !s.is_empty()) {
            let segment = match raw.strip_prefix('{') {
                Some(rest) => {
                    let name = rest.strip_suffix('}').ok_or_else(|| invalid("unclosed parameter"))?;
                    if name.is_empty() {
                        return Err(invalid("empty parameter name"));
                    }
                    Segment::Param(name.to_owned())
                },
                None if raw.contains(['{', '}']) => return Err(invalid("stray brace")),
                None => Segment::Literal(raw.to_owned()),
            };
            segments.push(segment);
        }

        if segments.is_empty() {
            return Err(invalid("no segments"));
        }
        Ok(Self { source: pattern.to_owned(), segments })
    }

    /// Number of path segments the pattern matches.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether `path` matches segment for segment.
    pub fn matches<S: AsRef<str>>(&self, path: &[S]) -> bool {
        path.len() == self.segments.len()
            && self.segments.iter().zip(path).all(|(segment, part)| match segment {
                Segment::Literal(lit) => lit == part.as_ref(),
                Segment::Param(_) => parse_segment(part.as_ref()).is_some(),
            })
    }

    /// Value bound to parameter `name` in a matching `path`.
    pub fn param<'p, S: AsRef<str>>(&self, path: &'p [S], name: &str) -> Option<&'p str> {
        self.segments
            .iter()
            .zip(path)
            .find(|(segment, _)| matches!(segment, Segment::Param(n) if n == name))
            .map(|(_, part)| part.as_ref())
    }
}

impl FromStr for RoutePattern {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Route table for transport adapters.
///
/// Routes are tried in installation order; the first match handles the
/// request.
#[derive(Default, Clone)]
pub struct Router {
    routes: Vec<(Method, RoutePattern, Handler)>,
}

impl Router {
    /// Empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route.
    pub fn add(&mut self, method: Method, pattern: RoutePattern, handler: Handler) {
        self.routes.push((method, pattern, handler));
    }

    /// Number of installed routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no route is installed.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Handle `request` with the first matching route.
    pub fn route(&self, request: &Request) -> Option<Response> {
        self.routes
            .iter()
            .find(|(method, pattern, _)| *method == request.method && pattern.matches(&request.path))
            .map(|(_, _, handler)| handler(request))
    }

    /// Handle `request`, answering `4.04 Not Found` when no route matches.
    pub fn handle(&self, request: &Request) -> Response {
        self.route(request).unwrap_or_else(|| Response::reply_to(request, ResponseCode::NotFound))
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|(method, pattern, _)| format!("{method} {pattern}")))
            .finish()
    }
}
