//! HTTP request model.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StateError;
use crate::headers::Headers;
use crate::message::{self, Body, HttpMessage, HttpVersion, Message, MessageId, StreamId};
use crate::pattern::Pattern;
use crate::state::{self, Field, FieldKind, StateObject};

/// Request-target form (RFC 7230 §5.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpForm {
    /// `GET /index.html`, `OPTIONS *`
    #[default]
    Relative,
    /// `GET http://example.com:80/index.html`
    Absolute,
    /// `CONNECT example.com:443`
    Authority,
}

impl HttpForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpForm::Relative => "relative",
            HttpForm::Absolute => "absolute",
            HttpForm::Authority => "authority",
        }
    }
}

impl std::fmt::Display for HttpForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request as produced by a protocol parser, before it is wrapped into a
/// [`Request`].
pub trait ParsedRequest {
    fn form_in(&self) -> HttpForm;

    fn form_out(&self) -> Option<HttpForm> {
        None
    }

    fn method(&self) -> &str;

    fn scheme(&self) -> Option<&str>;

    fn host(&self) -> String;

    fn port(&self) -> u16;

    fn path(&self) -> Option<&str>;

    fn http_version(&self) -> HttpVersion;

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

/// Default port for `scheme`.
fn default_port(scheme: Option<&str>) -> u16 {
    match scheme {
        Some(s) if s.eq_ignore_ascii_case("https") => 443,
        _ => 80,
    }
}

impl ParsedRequest for http::Request<Bytes> {
    fn form_in(&self) -> HttpForm {
        if self.method() == http::Method::CONNECT {
            HttpForm::Authority
        } else if self.uri().scheme().is_some() {
            HttpForm::Absolute
        } else {
            HttpForm::Relative
        }
    }

    fn method(&self) -> &str {
        http::Request::method(self).as_str()
    }

    fn scheme(&self) -> Option<&str> {
        self.uri().scheme_str()
    }

    fn host(&self) -> String {
        if let Some(host) = self.uri().host() {
            return host.to_string();
        }
        self.headers()
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<http::uri::Authority>().ok())
            .map(|authority| authority.host().to_string())
            .unwrap_or_default()
    }

    fn port(&self) -> u16 {
        if let Some(port) = self.uri().port_u16() {
            return port;
        }
        let from_host = self
            .headers()
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<http::uri::Authority>().ok())
            .and_then(|authority| authority.port_u16());
        from_host.unwrap_or_else(|| default_port(self.uri().scheme_str()))
    }

    fn path(&self) -> Option<&str> {
        if ParsedRequest::form_in(self) == HttpForm::Authority {
            return None;
        }
        Some(self.uri().path_and_query().map_or("/", |pq| pq.as_str()))
    }

    fn http_version(&self) -> HttpVersion {
        self.version().into()
    }

    fn headers(&self) -> Headers {
        Headers::from(http::Request::headers(self))
    }

    fn body(&self) -> Body {
        Body::Bytes(http::Request::body(self).clone())
    }

    fn stream_id(&self) -> Option<StreamId> {
        self.extensions().get::<StreamId>().copied()
    }
}

/// An intercepted HTTP request.
///
/// Equality and hashing use [`MessageId`] only: a request stays the same map
/// key however its fields are rewritten, and a copy is a different request.
#[derive(Debug, Clone)]
pub struct Request {
    id: MessageId,
    pub message: Message,
    /// Form the request was received in.
    pub form_in: HttpForm,
    form_out: Option<HttpForm>,
    pub method: String,
    /// Unset for authority-form requests.
    pub scheme: Option<String>,
    pub host: String,
    pub port: u16,
    /// Unset for authority-form requests.
    pub path: Option<String>,
    pub is_replay: bool,
    /// Cookies were modified by a sticky cookie jar.
    pub sticky_cookie: bool,
    /// Credentials were added by sticky auth.
    pub sticky_auth: bool,
    pub stream_id: Option<StreamId>,
}

impl Request {
    pub fn new(
        form_in: HttpForm,
        method: impl Into<String>,
        scheme: Option<String>,
        host: impl Into<String>,
        port: u16,
        path: Option<String>,
        message: Message,
    ) -> Self {
        Self {
            id: MessageId::new(),
            message,
            form_in,
            form_out: None,
            method: method.into(),
            scheme,
            host: host.into(),
            port,
            path,
            is_replay: false,
            sticky_cookie: false,
            sticky_auth: false,
            stream_id: None,
        }
    }

    /// Adapt a parsed request.
    pub fn wrap<P: ParsedRequest + ?Sized>(parsed: &P) -> Self {
        let mut message = Message::new(parsed.http_version(), parsed.headers(), parsed.body());
        message.timestamp_start = parsed.timestamp_start();
        message.timestamp_end = parsed.timestamp_end();

        let mut request = Request::new(
            parsed.form_in(),
            parsed.method(),
            parsed.scheme().map(str::to_string),
            parsed.host(),
            parsed.port(),
            parsed.path().map(str::to_string),
            message,
        );
        request.form_out = parsed.form_out();
        request.stream_id = parsed.stream_id();
        request
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Form the request will be sent in. Defaults to [`form_in`](Self::form_in).
    pub fn form_out(&self) -> HttpForm {
        self.form_out.unwrap_or(self.form_in)
    }

    pub fn set_form_out(&mut self, form: HttpForm) {
        self.form_out = Some(form);
    }

    /// An independent request with the same content and a new identity.
    pub fn copy(&self) -> Self {
        Self {
            id: MessageId::new(),
            ..self.clone()
        }
    }

    /// Substitute `pattern` in headers, body and path.
    pub fn replace(&mut self, pattern: &Pattern, replacement: &str) -> usize {
        let mut count = self.message.replace(pattern, replacement);
        if let Some(path) = &mut self.path {
            let (replaced, n) = pattern.replace_str(path, replacement);
            if n > 0 {
                *path = replaced;
                count += n;
            }
        }
        count
    }
}

impl Default for Request {
    fn default() -> Self {
        Request::new(
            HttpForm::Relative,
            "GET",
            None,
            String::new(),
            0,
            None,
            Message::default(),
        )
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Request {}

impl std::hash::Hash for Request {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl HttpMessage for Request {
    fn message(&self) -> &Message {
        &self.message
    }

    fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

fn form_to_state(form: HttpForm) -> Value {
    Value::from(form.as_str())
}

fn form_from_state(field: &'static str, v: &Value) -> Result<Option<HttpForm>, StateError> {
    if v.is_null() {
        return Ok(None);
    }
    serde_json::from_value(v.clone())
        .map(Some)
        .map_err(|err| StateError::InvalidValue {
            field,
            reason: err.to_string(),
        })
}

fn opt_str(v: &Option<String>) -> Value {
    v.as_deref().map_or(Value::Null, Value::from)
}

impl StateObject for Request {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new(
            "http_version",
            FieldKind::Tuple,
            message::get_http_version::<Request>,
            message::set_http_version::<Request>,
        ),
        Field::new(
            "headers",
            FieldKind::Headers,
            message::get_headers::<Request>,
            message::set_headers::<Request>,
        ),
        Field::long(
            "body",
            FieldKind::Bytes,
            message::get_body::<Request>,
            message::set_body::<Request>,
        ),
        Field::new(
            "timestamp_start",
            FieldKind::Float,
            message::get_timestamp_start::<Request>,
            message::set_timestamp_start::<Request>,
        ),
        Field::new(
            "timestamp_end",
            FieldKind::Float,
            message::get_timestamp_end::<Request>,
            message::set_timestamp_end::<Request>,
        ),
        Field::new(
            "form_in",
            FieldKind::Str,
            |r, _| form_to_state(r.form_in),
            |r, v| {
                r.form_in = form_from_state("form_in", v)?
                    .ok_or(StateError::MissingField("form_in"))?;
                Ok(())
            },
        ),
        Field::new(
            "method",
            FieldKind::Str,
            |r, _| Value::from(r.method.as_str()),
            |r, v| {
                r.method = state::to_str("method", v)?;
                Ok(())
            },
        ),
        Field::new(
            "scheme",
            FieldKind::Str,
            |r, _| opt_str(&r.scheme),
            |r, v| {
                r.scheme = state::to_opt_str("scheme", v)?;
                Ok(())
            },
        ),
        Field::new(
            "host",
            FieldKind::Str,
            |r, _| Value::from(r.host.as_str()),
            |r, v| {
                r.host = state::to_str("host", v)?;
                Ok(())
            },
        ),
        Field::new(
            "port",
            FieldKind::Int,
            |r, _| Value::from(r.port),
            |r, v| {
                r.port = state::to_u16("port", v)?;
                Ok(())
            },
        ),
        Field::new(
            "path",
            FieldKind::Str,
            |r, _| opt_str(&r.path),
            |r, v| {
                r.path = state::to_opt_str("path", v)?;
                Ok(())
            },
        ),
        Field::new(
            "form_out",
            FieldKind::Str,
            |r, _| form_to_state(r.form_out()),
            |r, v| {
                r.form_out = form_from_state("form_out", v)?;
                Ok(())
            },
        ),
        Field::new(
            "is_replay",
            FieldKind::Bool,
            |r, _| Value::Bool(r.is_replay),
            |r, v| {
                r.is_replay = state::to_bool("is_replay", v)?;
                Ok(())
            },
        ),
    ];

    fn short_state(&self, state: &mut Map<String, Value>) {
        self.message.short_state(state);
    }
}
