//! CoAP method and response codes.

use std::fmt;

use crate::error::CoapError;

/// Request method (code class 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Method {
    /// 0.01 GET
    Get = 1,
    /// 0.02 POST
    Post = 2,
    /// 0.03 PUT
    Put = 3,
    /// 0.04 DELETE
    Delete = 4,
}

impl Method {
    /// Wire code byte.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse a code byte of class 0.
    pub fn from_code(code: u8) -> Result<Self, CoapError> {
        match code {
            1 => Ok(Self::Get),
            2 => Ok(Self::Post),
            3 => Ok(Self::Put),
            4 => Ok(Self::Delete),
            other => Err(CoapError::UnknownCode { class: other >> 5, detail: other & 0x1F }),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Response code, encoded as `class << 5 | detail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ResponseCode {
    /// 2.01
    Created = 0x41,
    /// 2.02
    Deleted = 0x42,
    /// 2.03
    Valid = 0x43,
    /// 2.04
    Changed = 0x44,
    /// 2.05
    Content = 0x45,
    /// 2.31
    Continue = 0x5F,
    /// 4.00
    BadRequest = 0x80,
    /// 4.01
    Unauthorized = 0x81,
    /// 4.02
    BadOption = 0x82,
    /// 4.03
    Forbidden = 0x83,
    /// 4.04
    NotFound = 0x84,
    /// 4.05
    MethodNotAllowed = 0x85,
    /// 4.06
    NotAcceptable = 0x86,
    /// 4.08
    RequestEntityIncomplete = 0x88,
    /// 4.09
    Conflict = 0x89,
    /// 4.12
    PreconditionFailed = 0x8C,
    /// 4.13
    RequestEntityTooLarge = 0x8D,
    /// 4.15
    UnsupportedContentFormat = 0x8F,
    /// 4.22
    UnprocessableEntity = 0x96,
    /// 4.29
    TooManyRequests = 0x9D,
    /// 5.00
    InternalServerError = 0xA0,
    /// 5.01
    NotImplemented = 0xA1,
    /// 5.02
    BadGateway = 0xA2,
    /// 5.03
    ServiceUnavailable = 0xA3,
    /// 5.04
    GatewayTimeout = 0xA4,
    /// 5.05
    ProxyingNotSupported = 0xA5,
    /// 5.08
    HopLimitReached = 0xA8,
}

impl ResponseCode {
    /// Wire code byte.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Code class (2, 4 or 5).
    pub fn class(self) -> u8 {
        self.code() >> 5
    }

    /// Code detail.
    pub fn detail(self) -> u8 {
        self.code() & 0x1F
    }

    /// Whether the code is a 2.xx success.
    pub fn is_success(self) -> bool {
        self.class() == 2
    }

    /// Parse a registered response code byte.
    pub fn from_code(code: u8) -> Result<Self, CoapError> {
        let parsed = match code {
            0x41 => Self::Created,
            0x42 => Self::Deleted,
            0x43 => Self::Valid,
            0x44 => Self::Changed,
            0x45 => Self::Content,
            0x5F => Self::Continue,
            0x80 => Self::BadRequest,
            0x81 => Self::Unauthorized,
            0x82 => Self::BadOption,
            0x83 => Self::Forbidden,
            0x84 => Self::NotFound,
            0x85 => Self::MethodNotAllowed,
            0x86 => Self::NotAcceptable,
            0x88 => Self::RequestEntityIncomplete,
            0x89 => Self::Conflict,
            0x8C => Self::PreconditionFailed,
            0x8D => Self::RequestEntityTooLarge,
            0x8F => Self::UnsupportedContentFormat,
            0x96 => Self::UnprocessableEntity,
            0x9D => Self::TooManyRequests,
            0xA0 => Self::InternalServerError,
            0xA1 => Self::NotImplemented,
            0xA2 => Self::BadGateway,
            0xA3 => Self::ServiceUnavailable,
            0xA4 => Self::GatewayTimeout,
            0xA5 => Self::ProxyingNotSupported,
            0xA8 => Self::HopLimitReached,
            other => {
                return Err(CoapError::UnknownCode { class: other >> 5, detail: other & 0x1F });
            },
        };
        Ok(parsed)
    }

    /// Parse a response code byte received from a peer.
    ///
    /// Unrecognised client and server errors fall back to the generic code
    /// of their class (4.00 and 5.00) so the failure still reaches the caller.
    /// Unknown success codes are rejected.
    pub fn from_peer(code: u8) -> Result<Self, CoapError> {
        match (Self::from_code(code), code >> 5) {
            (Ok(parsed), _) => Ok(parsed),
            (Err(_), 4) => Ok(Self::BadRequest),
            (Err(_), 5) => Ok(Self::InternalServerError),
            (Err(e), _) => Err(e),
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}
