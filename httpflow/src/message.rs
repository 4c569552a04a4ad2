//! Behavior shared by requests and responses.
//!
//! A [`Message`] holds the parts every HTTP message has: version, headers,
//! body and transmission timestamps. [`Request`](crate::Request) and
//! [`Response`](crate::Response) embed one and expose it through the
//! [`HttpMessage`] trait, so `decode`, `encode` and `replace` are written
//! once here.
//!
//! Body rewrites go through [`Decoded`], a scope guard that strips the
//! content coding on entry and restores it when dropped.

use std::ops::{Deref, DerefMut};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use httpflow_core::{CodecError, CompressionLevel, ContentEncoding};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::StateError;
use crate::headers::Headers;
use crate::pattern::Pattern;
use crate::state::{self, StateMode};

pub const CONTENT_ENCODING: &str = "content-encoding";

/// Identity of one request or response instance.
///
/// Generated on creation, and again for every copy, wrap and restore, so two
/// messages compare equal only when they are the same logical instance no
/// matter how their fields change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Transport stream a message arrived on (an HTTP/2 stream, for example).
///
/// Carried through `wrap` untouched; this crate never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u32);

/// HTTP protocol version as a `(major, minor)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HttpVersion {
    pub major: u8,
    pub minor: u8,
}

impl HttpVersion {
    pub const HTTP_10: HttpVersion = HttpVersion::new(1, 0);
    pub const HTTP_11: HttpVersion = HttpVersion::new(1, 1);
    pub const HTTP_2: HttpVersion = HttpVersion::new(2, 0);

    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl Default for HttpVersion {
    fn default() -> Self {
        Self::HTTP_11
    }
}

impl std::fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

impl From<(u8, u8)> for HttpVersion {
    fn from((major, minor): (u8, u8)) -> Self {
        Self::new(major, minor)
    }
}

impl From<http::Version> for HttpVersion {
    fn from(version: http::Version) -> Self {
        match version {
            http::Version::HTTP_09 => Self::new(0, 9),
            http::Version::HTTP_10 => Self::HTTP_10,
            http::Version::HTTP_2 => Self::HTTP_2,
            http::Version::HTTP_3 => Self::new(3, 0),
            _ => Self::HTTP_11,
        }
    }
}

/// Message body.
///
/// `Missing` means content existed on the wire but was not captured. A
/// captured zero-length body is `Bytes` with no data; the two are never
/// conflated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Missing,
    Bytes(Bytes),
}

impl Body {
    pub fn empty() -> Self {
        Body::Bytes(Bytes::new())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Body::Missing)
    }

    /// True for `Missing` and for a captured empty body.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Missing => true,
            Body::Bytes(bytes) => bytes.is_empty(),
        }
    }

    /// Byte length, or `None` when the content was not captured.
    pub fn len(&self) -> Option<usize> {
        match self {
            Body::Missing => None,
            Body::Bytes(bytes) => Some(bytes.len()),
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Body::Missing => None,
            Body::Bytes(bytes) => Some(bytes),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::empty()
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Body {
    fn from(bytes: &'static [u8]) -> Self {
        Body::Bytes(Bytes::from_static(bytes))
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Bytes(Bytes::from(text))
    }
}

/// The parts shared by every HTTP message.
///
/// Cloning deep-copies the headers; the body bytes are reference counted
/// and shared until one side replaces them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub http_version: HttpVersion,
    pub headers: Headers,
    pub body: Body,
    pub timestamp_start: Option<f64>,
    pub timestamp_end: Option<f64>,
}

impl Message {
    pub fn new(http_version: HttpVersion, headers: Headers, body: Body) -> Self {
        Self {
            http_version,
            headers,
            body,
            timestamp_start: None,
            timestamp_end: None,
        }
    }

    /// The supported encoding named by the first `Content-Encoding` value.
    pub fn content_encoding(&self) -> Option<ContentEncoding> {
        self.headers
            .get_first(CONTENT_ENCODING)
            .and_then(ContentEncoding::from_name)
    }

    /// Encoding to strip, if the body is non-empty and coded with a
    /// supported encoding.
    fn decodable(&self) -> Option<(ContentEncoding, &Bytes)> {
        let encoding = self.content_encoding()?;
        match &self.body {
            Body::Bytes(bytes) if !bytes.is_empty() => Some((encoding, bytes)),
            _ => None,
        }
    }

    /// The body with its content coding removed, without modifying the
    /// message.
    ///
    /// Empty or missing bodies, and bodies without a supported encoding, are
    /// returned as they are.
    pub fn decoded_content(&self) -> Result<Body, CodecError> {
        match self.decodable() {
            Some((encoding, bytes)) => httpflow_core::decode(encoding, bytes).map(Body::Bytes),
            None => Ok(self.body.clone()),
        }
    }

    /// Decode the body in place and drop the `Content-Encoding` header.
    ///
    /// Returns false, leaving the message untouched, when there is nothing
    /// to decode or the body does not decode.
    pub fn decode(&mut self) -> bool {
        let Some((encoding, bytes)) = self.decodable() else {
            return false;
        };
        match httpflow_core::decode(encoding, bytes) {
            Ok(decoded) => {
                self.body = Body::Bytes(decoded);
                self.headers.remove(CONTENT_ENCODING);
                true
            }
            Err(_) => false,
        }
    }

    /// Encode the body with `encoding` and set `Content-Encoding` to it.
    ///
    /// Any existing coding is not removed first. A missing body stays
    /// missing; only the header changes.
    pub fn encode(&mut self, encoding: ContentEncoding) -> Result<(), CodecError> {
        self.encode_with_level(encoding, CompressionLevel::Default)
    }

    pub fn encode_with_level(
        &mut self,
        encoding: ContentEncoding,
        level: CompressionLevel,
    ) -> Result<(), CodecError> {
        if let Body::Bytes(bytes) = &self.body {
            self.body = Body::Bytes(httpflow_core::encode_with_level(encoding, bytes, level)?);
        }
        self.headers.insert(CONTENT_ENCODING, encoding.as_str());
        Ok(())
    }

    /// Decode for the lifetime of the returned guard.
    pub fn decoded(&mut self) -> Decoded<'_> {
        Decoded::new(self)
    }

    /// Substitute `pattern` in the decoded body and in every header value.
    ///
    /// The body is re-encoded with its original coding before this returns.
    /// Returns the total number of substitutions.
    pub fn replace(&mut self, pattern: &Pattern, replacement: &str) -> usize {
        let body_count = {
            let mut decoded = self.decoded();
            decoded.replace_body(pattern, replacement)
        };
        body_count + self.headers.replace_values(pattern, replacement)
    }

    fn replace_body(&mut self, pattern: &Pattern, replacement: &str) -> usize {
        let Body::Bytes(bytes) = &self.body else {
            return 0;
        };
        let (replaced, count) = pattern.replace_bytes(bytes, replacement);
        if count > 0 {
            self.body = Body::from(replaced);
        }
        count
    }

    /// Derived fields added to short snapshots in place of the body.
    pub(crate) fn short_state(&self, state: &mut Map<String, Value>) {
        let length = match self.body.len() {
            Some(len) => Value::from(len),
            None => Value::Null,
        };
        state.insert("contentLength".to_string(), length);
    }
}

/// Scope guard that keeps a message decoded while it is alive.
///
/// On creation the message is decoded if its `Content-Encoding` names a
/// supported encoding. On drop it is re-encoded with that same encoding,
/// whether or not the initial decode succeeded. When the decode fails the
/// body is therefore coded a second time on release; a warning is logged
/// when that happens.
pub struct Decoded<'a> {
    message: &'a mut Message,
    encoding: Option<ContentEncoding>,
}

impl<'a> Decoded<'a> {
    pub fn new(message: &'a mut Message) -> Self {
        let encoding = message.content_encoding();
        if let Some(encoding) = encoding {
            if !message.decode() && !message.body.is_empty() {
                tracing::warn!(
                    target: "httpflow",
                    %encoding,
                    "body did not decode; it will be re-encoded on release"
                );
            }
        }
        Self { message, encoding }
    }

    /// The encoding that will be restored on drop.
    pub fn encoding(&self) -> Option<ContentEncoding> {
        self.encoding
    }
}

impl Deref for Decoded<'_> {
    type Target = Message;

    fn deref(&self) -> &Message {
        self.message
    }
}

impl DerefMut for Decoded<'_> {
    fn deref_mut(&mut self) -> &mut Message {
        self.message
    }
}

impl Drop for Decoded<'_> {
    fn drop(&mut self) {
        if let Some(encoding) = self.encoding {
            if let Err(err) = self.message.encode(encoding) {
                tracing::warn!(target: "httpflow", error = %err, "re-encode on release failed");
            }
        }
    }
}

/// Shared capability of requests and responses.
pub trait HttpMessage {
    fn message(&self) -> &Message;

    fn message_mut(&mut self) -> &mut Message;

    fn headers(&self) -> &Headers {
        &self.message().headers
    }

    fn headers_mut(&mut self) -> &mut Headers {
        &mut self.message_mut().headers
    }

    fn body(&self) -> &Body {
        &self.message().body
    }

    fn set_body(&mut self, body: Body) {
        self.message_mut().body = body;
    }

    fn decoded_content(&self) -> Result<Body, CodecError> {
        self.message().decoded_content()
    }

    fn decode(&mut self) -> bool {
        self.message_mut().decode()
    }

    fn encode(&mut self, encoding: ContentEncoding) -> Result<(), CodecError> {
        self.message_mut().encode(encoding)
    }

    fn decoded(&mut self) -> Decoded<'_> {
        self.message_mut().decoded()
    }
}

impl HttpMessage for Message {
    fn message(&self) -> &Message {
        self
    }

    fn message_mut(&mut self) -> &mut Message {
        self
    }
}

// Snapshot accessors for the message fields, generic so that every message
// type can list them in its own schema.

pub(crate) fn get_http_version<M: HttpMessage>(m: &M, _: StateMode) -> Value {
    let version = m.message().http_version;
    Value::Array(vec![Value::from(version.major), Value::from(version.minor)])
}

pub(crate) fn set_http_version<M: HttpMessage>(m: &mut M, v: &Value) -> Result<(), StateError> {
    const FIELD: &str = "http_version";
    let mismatch = StateError::TypeMismatch {
        field: FIELD,
        expected: "a [major, minor] pair",
    };
    if v.is_null() {
        return Err(StateError::MissingField(FIELD));
    }
    let Some([major, minor]) = v.as_array().map(Vec::as_slice) else {
        return Err(mismatch);
    };
    let major = state::to_u8(FIELD, major)?;
    let minor = state::to_u8(FIELD, minor)?;
    m.message_mut().http_version = HttpVersion::new(major, minor);
    Ok(())
}

pub(crate) fn get_headers<M: HttpMessage>(m: &M, _: StateMode) -> Value {
    m.message().headers.to_state()
}

pub(crate) fn set_headers<M: HttpMessage>(m: &mut M, v: &Value) -> Result<(), StateError> {
    m.message_mut().headers = if v.is_null() {
        Headers::new()
    } else {
        Headers::from_state("headers", v)?
    };
    Ok(())
}

pub(crate) fn get_body<M: HttpMessage>(m: &M, _: StateMode) -> Value {
    match &m.message().body {
        Body::Missing => Value::Null,
        Body::Bytes(bytes) => Value::String(BASE64.encode(bytes)),
    }
}

pub(crate) fn set_body<M: HttpMessage>(m: &mut M, v: &Value) -> Result<(), StateError> {
    m.message_mut().body = match state::to_opt_str("body", v)? {
        None => Body::Missing,
        Some(encoded) => {
            let bytes = BASE64
                .decode(encoded)
                .map_err(|err| StateError::InvalidValue {
                    field: "body",
                    reason: err.to_string(),
                })?;
            Body::from(bytes)
        }
    };
    Ok(())
}

pub(crate) fn get_timestamp_start<M: HttpMessage>(m: &M, _: StateMode) -> Value {
    state::from_opt_f64(m.message().timestamp_start)
}

pub(crate) fn set_timestamp_start<M: HttpMessage>(m: &mut M, v: &Value) -> Result<(), StateError> {
    m.message_mut().timestamp_start = state::to_opt_f64("timestamp_start", v)?;
    Ok(())
}

pub(crate) fn get_timestamp_end<M: HttpMessage>(m: &M, _: StateMode) -> Value {
    state::from_opt_f64(m.message().timestamp_end)
}

pub(crate) fn set_timestamp_end<M: HttpMessage>(m: &mut M, v: &Value) -> Result<(), StateError> {
    m.message_mut().timestamp_end = state::to_opt_f64("timestamp_end", v)?;
    Ok(())
}
