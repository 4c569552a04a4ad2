//! HTTP response model and replay refresh.

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::cookie;
use crate::date;
use crate::headers::Headers;
use crate::message::{self, Body, HttpMessage, HttpVersion, Message, MessageId, StreamId};
use crate::pattern::Pattern;
use crate::state::{self, Field, FieldKind, StateObject};

/// Headers holding absolute dates that `refresh` moves forward.
const REFRESH_HEADERS: &[&str] = &["date", "expires", "last-modified"];

/// Standard reason phrase for `code`, or `"Unknown"`.
pub fn reason_phrase(code: u16) -> &'static str {
    http::StatusCode::from_u16(code)
        .ok()
        .and_then(|status| status.canonical_reason())
        .unwrap_or("Unknown")
}

/// A response as produced by a protocol parser.
pub trait ParsedResponse {
    fn http_version(&self) -> HttpVersion;

    fn status_code(&self) -> u16;

    fn reason(&self) -> String;

    fn headers(&self) -> Headers;

    fn body(&self) -> Body;

    fn timestamp_start(&self) -> Option<f64> {
        None
    }

    fn timestamp_end(&self) -> Option<f64> {
        None
    }

    fn stream_id(&self) -> Option<StreamId> {
        None
    }
}

impl ParsedResponse for http::Response<Bytes> {
    fn http_version(&self) -> HttpVersion {
        self.version().into()
    }

    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }

    fn reason(&self) -> String {
        self.status().canonical_reason().unwrap_or_default().to_string()
    }

    fn headers(&self) -> Headers {
        Headers::from(http::Response::headers(self))
    }

    fn body(&self) -> Body {
        Body::Bytes(http::Response::body(self).clone())
    }

    fn stream_id(&self) -> Option<StreamId> {
        self.extensions().get::<StreamId>().copied()
    }
}

/// An intercepted HTTP response.
///
/// Like [`Request`](crate::Request), equality is by [`MessageId`].
#[derive(Debug, Clone)]
pub struct Response {
    id: MessageId,
    pub message: Message,
    pub status_code: u16,
    pub reason: String,
    pub is_replay: bool,
    /// Body is delivered incrementally rather than buffered.
    pub stream: bool,
    pub stream_id: Option<StreamId>,
}

impl Response {
    pub fn new(status_code: u16, reason: impl Into<String>, message: Message) -> Self {
        Self {
            id: MessageId::new(),
            message,
            status_code,
            reason: reason.into(),
            is_replay: false,
            stream: false,
            stream_id: None,
        }
    }

    pub fn wrap<P: ParsedResponse + ?Sized>(parsed: &P) -> Self {
        let mut message = Message::new(parsed.http_version(), parsed.headers(), parsed.body());
        message.timestamp_start = parsed.timestamp_start();
        message.timestamp_end = parsed.timestamp_end();

        let mut response = Response::new(parsed.status_code(), parsed.reason(), message);
        response.stream_id = parsed.stream_id();
        response
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// An independent response with the same content and a new identity.
    pub fn copy(&self) -> Self {
        Self {
            id: MessageId::new(),
            ..self.clone()
        }
    }

    /// Substitute `pattern` in headers and body.
    pub fn replace(&mut self, pattern: &Pattern, replacement: &str) -> usize {
        self.message.replace(pattern, replacement)
    }

    /// Make a captured response look fresh for replay.
    ///
    /// Every date in `Date`, `Expires` and `Last-Modified`, and every cookie
    /// `expires` attribute, moves forward by the time elapsed between
    /// `timestamp_start` and `now` (the current time when `None`). Header
    /// dates that do not parse are left alone; cookie expiries that do not
    /// parse are removed.
    pub fn refresh(&mut self, now: Option<f64>) {
        let now = now.unwrap_or_else(date::now);
        let delta = self
            .message
            .timestamp_start
            .map_or(0.0, |start| now - start);
        tracing::trace!(target: "httpflow", delta, "refreshing response");

        let headers = &mut self.message.headers;
        for name in REFRESH_HEADERS {
            let Some(current) = headers.get_first(name) else {
                continue;
            };
            match date::shift_http_date(current, delta) {
                Some(shifted) => headers.insert(*name, shifted),
                None => tracing::debug!(
                    target: "httpflow",
                    header = name,
                    value = current,
                    "leaving unparseable date untouched"
                ),
            }
        }

        for value in headers.values_mut("set-cookie") {
            *value = cookie::refresh_set_cookie(value, delta);
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Response::new(200, "OK", Message::default())
    }
}

impl PartialEq for Response {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Response {}

impl std::hash::Hash for Response {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl HttpMessage for Response {
    fn message(&self) -> &Message {
        &self.message
    }

    fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

impl StateObject for Response {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new(
            "http_version",
            FieldKind::Tuple,
            message::get_http_version::<Response>,
            message::set_http_version::<Response>,
        ),
        Field::new(
            "headers",
            FieldKind::Headers,
            message::get_headers::<Response>,
            message::set_headers::<Response>,
        ),
        Field::long(
            "body",
            FieldKind::Bytes,
            message::get_body::<Response>,
            message::set_body::<Response>,
        ),
        Field::new(
            "timestamp_start",
            FieldKind::Float,
            message::get_timestamp_start::<Response>,
            message::set_timestamp_start::<Response>,
        ),
        Field::new(
            "timestamp_end",
            FieldKind::Float,
            message::get_timestamp_end::<Response>,
            message::set_timestamp_end::<Response>,
        ),
        Field::new(
            "status_code",
            FieldKind::Int,
            |r, _| Value::from(r.status_code),
            |r, v| {
                r.status_code = state::to_u16("status_code", v)?;
                Ok(())
            },
        ),
        Field::new(
            "reason",
            FieldKind::Str,
            |r, _| Value::from(r.reason.as_str()),
            |r, v| {
                r.reason = state::to_opt_str("reason", v)?.unwrap_or_default();
                Ok(())
            },
        ),
    ];

    fn short_state(&self, state: &mut Map<String, Value>) {
        self.message.short_state(state);
    }
}
