//! CoAP (RFC 7252) datagram codec.
//!
//! ## Wire layout
//!
//! ```text
//! 0                   1                   2                   3
//! |Ver| T |  TKL  |      Code     |          Message ID           |
//! |   Token (0-8 bytes) ...
//! |   Options (delta/length encoded) ...
//! |1 1 1 1 1 1 1 1|    Payload ...
//! ```
//!
//! Only the options the object model uses are interpreted (Uri-Path,
//! Uri-Query, Location-Path, Content-Format); everything else is kept opaque
//! in [`Message::options`].

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{
    code::{Method, ResponseCode},
    error::CoapError,
    message::{Request, Response},
};

/// Protocol version carried in every header.
pub const VERSION: u8 = 1;

/// Location-Path option number.
pub const OPTION_LOCATION_PATH: u16 = 8;
/// Uri-Path option number.
pub const OPTION_URI_PATH: u16 = 11;
/// Content-Format option number.
pub const OPTION_CONTENT_FORMAT: u16 = 12;
/// Uri-Query option number.
pub const OPTION_URI_QUERY: u16 = 15;

/// Content-Format for `text/plain`.
pub const CONTENT_FORMAT_TEXT: u16 = 0;
/// Content-Format for `application/link-format`.
pub const CONTENT_FORMAT_LINK: u16 = 40;

const PAYLOAD_MARKER: u8 = 0xFF;
const MAX_TOKEN_LEN: usize = 8;

/// Fixed 4-byte header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct CoapHeader {
    first: u8,
    code: u8,
    message_id: [u8; 2],
}

impl CoapHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 4;

    fn new(message_type: MessageType, token_len: u8, code: u8, message_id: u16) -> Self {
        Self {
            first: (VERSION << 6) | ((message_type as u8) << 4) | (token_len & 0x0F),
            code,
            message_id: message_id.to_be_bytes(),
        }
    }

    /// Version bits.
    pub fn version(&self) -> u8 {
        self.first >> 6
    }

    /// Message type bits.
    pub fn message_type(&self) -> MessageType {
        MessageType::from_bits(self.first >> 4)
    }

    /// Token length nibble.
    pub fn token_len(&self) -> u8 {
        self.first & 0x0F
    }

    /// Raw code byte.
    pub fn code(&self) -> u8 {
        self.code
    }

    /// Message id.
    pub fn message_id(&self) -> u16 {
        u16::from_be_bytes(self.message_id)
    }
}

/// Message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Confirmable.
    Confirmable = 0,
    /// Non-confirmable.
    NonConfirmable = 1,
    /// Acknowledgement.
    Acknowledgement = 2,
    /// Reset.
    Reset = 3,
}

impl MessageType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Confirmable,
            1 => Self::NonConfirmable,
            2 => Self::Acknowledgement,
            _ => Self::Reset,
        }
    }
}

/// A decoded CoAP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type.
    pub message_type: MessageType,
    /// Raw code byte.
    pub code: u8,
    /// Message id.
    pub message_id: u16,
    /// Token.
    pub token: Bytes,
    /// Options in ascending number order.
    pub options: Vec<(u16, Bytes)>,
    /// Payload.
    pub payload: Bytes,
}

impl Message {
    /// Whether the code is a request method.
    pub fn is_request(&self) -> bool {
        self.code >> 5 == 0 && self.code != 0
    }

    /// Whether the code is a response (class 2, 4 or 5).
    pub fn is_response(&self) -> bool {
        matches!(self.code >> 5, 2 | 4 | 5)
    }

    /// Whether this is an empty message (ping, bare ACK or RST).
    pub fn is_empty(&self) -> bool {
        self.code == 0
    }

    /// Values of option `number` in order.
    pub fn option_values(&self, number: u16) -> impl Iterator<Item = &Bytes> + '_ {
        self.options.iter().filter(move |(n, _)| *n == number).map(|(_, v)| v)
    }

    fn option_strings(&self, number: u16) -> Vec<String> {
        self.option_values(number).map(|v| String::from_utf8_lossy(v).into_owned()).collect()
    }

    fn content_format(&self) -> Option<u16> {
        self.option_values(OPTION_CONTENT_FORMAT)
            .next()
            .map(|v| v.iter().fold(0u16, |acc, b| (acc << 8) | u16::from(*b)))
    }

    fn push_uint_option(&mut self, number: u16, value: u16) {
        let bytes = value.to_be_bytes();
        let trimmed = match value {
            0 => &bytes[2..],
            1..=0xFF => &bytes[1..],
            _ => &bytes[..],
        };
        self.options.push((number, Bytes::copy_from_slice(trimmed)));
    }

    /// Build an empty acknowledgement for `message_id`.
    pub fn empty_ack(message_id: u16) -> Self {
        Self {
            message_type: MessageType::Acknowledgement,
            code: 0,
            message_id,
            token: Bytes::new(),
            options: Vec::new(),
            payload: Bytes::new(),
        }
    }

    /// Encode as a datagram.
    pub fn encode(&self) -> Result<Bytes, CoapError> {
        if self.token.len() > MAX_TOKEN_LEN {
            return Err(CoapError::InvalidTokenLength(self.token.len() as u8));
        }

        let mut buf = BytesMut::with_capacity(CoapHeader::SIZE + self.payload.len() + 32);
        let header =
            CoapHeader::new(self.message_type, self.token.len() as u8, self.code, self.message_id);
        buf.put_slice(header.as_bytes());
        buf.put_slice(&self.token);

        let mut options = self.options.clone();
        options.sort_by_key(|(number, _)| *number);

        let mut previous = 0u16;
        for (number, value) in &options {
            let delta = number - previous;
            previous = *number;
            write_option_header(&mut buf, delta, value.len())?;
            buf.put_slice(value);
        }

        if !self.payload.is_empty() {
            buf.put_u8(PAYLOAD_MARKER);
            buf.put_slice(&self.payload);
        }

        Ok(buf.freeze())
    }

    /// Decode a datagram.
    pub fn decode(data: &[u8]) -> Result<Self, CoapError> {
        let (header, rest) =
            CoapHeader::read_from_prefix(data).map_err(|_| CoapError::TooShort { len: data.len() })?;

        if header.version() != VERSION {
            return Err(CoapError::UnsupportedVersion(header.version()));
        }

        let token_len = usize::from(header.token_len());
        if token_len > MAX_TOKEN_LEN {
            return Err(CoapError::InvalidTokenLength(header.token_len()));
        }
        let token = rest.get(..token_len).ok_or(CoapError::TooShort { len: data.len() })?;

        let mut pos = CoapHeader::SIZE + token_len;
        let mut options = Vec::new();
        let mut number = 0u16;
        let mut payload = Bytes::new();

        while pos < data.len() {
            let byte = data[pos];
            if byte == PAYLOAD_MARKER {
                let body = &data[pos + 1..];
                if body.is_empty() {
                    return Err(CoapError::EmptyPayload);
                }
                payload = Bytes::copy_from_slice(body);
                break;
            }

            let offset = pos;
            pos += 1;
            let delta = read_extended(data, &mut pos, byte >> 4, offset)?;
            let len = usize::from(read_extended(data, &mut pos, byte & 0x0F, offset)?);

            number = number.checked_add(delta).ok_or(CoapError::MalformedOption { offset })?;
            let value = data.get(pos..pos + len).ok_or(CoapError::MalformedOption { offset })?;
            pos += len;
            options.push((number, Bytes::copy_from_slice(value)));
        }

        Ok(Self {
            message_type: header.message_type(),
            code: header.code(),
            message_id: header.message_id(),
            token: Bytes::copy_from_slice(token),
            options,
            payload,
        })
    }

    /// Convert a request message into a [`Request`].
    pub fn to_request(&self) -> Result<Request, CoapError> {
        let method = Method::from_code(self.code)?;
        let query = self
            .option_strings(OPTION_URI_QUERY)
            .into_iter()
            .map(|q| match q.split_once('=') {
                Some((k, v)) => (k.to_owned(), v.to_owned()),
                None => (q, String::new()),
            })
            .collect();

        Ok(Request {
            method,
            path: self.option_strings(OPTION_URI_PATH),
            query,
            payload: self.payload.clone(),
            content_format: self.content_format(),
            token: self.token.clone(),
            message_id: self.message_id,
        })
    }

    /// Convert a response message into a [`Response`].
    pub fn to_response(&self) -> Result<Response, CoapError> {
        Ok(Response {
            code: ResponseCode::from_peer(self.code)?,
            payload: self.payload.clone(),
            content_format: self.content_format(),
            location_path: self.option_strings(OPTION_LOCATION_PATH),
            token: self.token.clone(),
            message_id: self.message_id,
        })
    }

    /// Build a message carrying `request`.
    pub fn from_request(request: &Request, message_type: MessageType) -> Self {
        let mut message = Self {
            message_type,
            code: request.method.code(),
            message_id: request.message_id,
            token: request.token.clone(),
            options: Vec::new(),
            payload: request.payload.clone(),
        };
        for segment in &request.path {
            message.options.push((OPTION_URI_PATH, Bytes::copy_from_slice(segment.as_bytes())));
        }
        if let Some(format) = request.content_format {
            message.push_uint_option(OPTION_CONTENT_FORMAT, format);
        }
        for (key, value) in &request.query {
            let query = if value.is_empty() { key.clone() } else { format!("{key}={value}") };
            message.options.push((OPTION_URI_QUERY, Bytes::from(query)));
        }
        message
    }

    /// Build a message carrying `response`.
    pub fn from_response(response: &Response, message_type: MessageType) -> Self {
        let mut message = Self {
            message_type,
            code: response.code.code(),
            message_id: response.message_id,
            token: response.token.clone(),
            options: Vec::new(),
            payload: response.payload.clone(),
        };
        for segment in &response.location_path {
            message
                .options
                .push((OPTION_LOCATION_PATH, Bytes::copy_from_slice(segment.as_bytes())));
        }
        if let Some(format) = response.content_format {
            message.push_uint_option(OPTION_CONTENT_FORMAT, format);
        }
        message
    }
}

fn write_option_header(buf: &mut BytesMut, delta: u16, len: usize) -> Result<(), CoapError> {
    let len = u16::try_from(len).map_err(|_| CoapError::OptionTooLong { len })?;
    if len > u16::MAX - 269 {
        return Err(CoapError::OptionTooLong { len: usize::from(len) });
    }

    let (delta_nibble, delta_ext) = nibble(delta);
    let (len_nibble, len_ext) = nibble(len);
    buf.put_u8((delta_nibble << 4) | len_nibble);
    buf.put_slice(&delta_ext);
    buf.put_slice(&len_ext);
    Ok(())
}

fn nibble(value: u16) -> (u8, Vec<u8>) {
    match value {
        0..=12 => (value as u8, Vec::new()),
        13..=268 => (13, vec![(value - 13) as u8]),
        _ => (14, (value - 269).to_be_bytes().to_vec()),
    }
}

fn read_extended(data: &[u8], pos: &mut usize, nibble: u8, offset: usize) -> Result<u16, CoapError> {
    match nibble {
        0..=12 => Ok(u16::from(nibble)),
        13 => {
            let b = *data.get(*pos).ok_or(CoapError::MalformedOption { offset })?;
            *pos += 1;
            Ok(u16::from(b) + 13)
        },
        14 => {
            let raw = data.get(*pos..*pos + 2).ok_or(CoapError::MalformedOption { offset })?;
            *pos += 2;
            u16::from_be_bytes([raw[0], raw[1]])
                .checked_add(269)
                .ok_or(CoapError::MalformedOption { offset })
        },
        _ => Err(CoapError::MalformedOption { offset }),
    }
}
