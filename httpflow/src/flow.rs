//! The HTTP flow aggregate.

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::connection::{ClientConnection, ServerConnection};
use crate::date;
use crate::error::{FilterError, StateError};
use crate::filter::Filter;
use crate::pattern::Pattern;
use crate::request::Request;
use crate::response::Response;
use crate::state::{self, Field, FieldKind, StateMode, StateObject};

/// Flow type tag written to snapshots.
pub const FLOW_TYPE: &str = "http";

/// Message recorded on a killed flow.
pub const KILLED_MESSAGE: &str = "Connection killed";

/// An error that ended or interrupted a flow.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{msg}")]
pub struct FlowError {
    pub msg: String,
    /// Epoch seconds.
    pub timestamp: f64,
}

impl FlowError {
    /// An error stamped with the current time.
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            msg: msg.into(),
            timestamp: date::now(),
        }
    }
}

impl Default for FlowError {
    fn default() -> Self {
        Self {
            msg: String::new(),
            timestamp: 0.0,
        }
    }
}

impl StateObject for FlowError {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new(
            "msg",
            FieldKind::Str,
            |e, _| Value::from(e.msg.as_str()),
            |e, v| {
                e.msg = state::to_str("msg", v)?;
                Ok(())
            },
        ),
        Field::new(
            "timestamp",
            FieldKind::Float,
            |e, _| Value::from(e.timestamp),
            |e, v| {
                e.timestamp =
                    state::to_opt_f64("timestamp", v)?.ok_or(StateError::MissingField("timestamp"))?;
                Ok(())
            },
        ),
    ];
}

/// One client-to-origin HTTP transaction.
///
/// A flow owns its request, response and error. Connection records are
/// shared: [`copy`](Self::copy) duplicates the messages and keeps pointing at
/// the same connections. A flow may hold a response and an error at the same
/// time, e.g. when the response arrived but could not be delivered.
#[derive(Debug, Clone)]
pub struct HttpFlow {
    id: Uuid,
    pub client_conn: Option<Arc<ClientConnection>>,
    pub server_conn: Option<Arc<ServerConnection>>,
    pub request: Option<Request>,
    pub response: Option<Response>,
    pub error: Option<FlowError>,
    pub intercepted: bool,
    /// The client connection is still open.
    pub live: bool,
    backup: Option<Value>,
}

impl HttpFlow {
    pub fn new(client_conn: Arc<ClientConnection>, server_conn: Arc<ServerConnection>) -> Self {
        Self {
            client_conn: Some(client_conn),
            server_conn: Some(server_conn),
            ..Default::default()
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// An independent copy with a new id.
    ///
    /// Request and response are copied (and get new identities); the
    /// connections are shared. The copy is never live and has no backup.
    pub fn copy(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_conn: self.client_conn.clone(),
            server_conn: self.server_conn.clone(),
            request: self.request.as_ref().map(Request::copy),
            response: self.response.as_ref().map(Response::copy),
            error: self.error.clone(),
            intercepted: self.intercepted,
            live: false,
            backup: None,
        }
    }

    /// Whether this flow passes `filter`. No filter matches every flow.
    ///
    /// A filter expression that does not compile is an error, never a
    /// non-match.
    pub fn matches(&self, filter: Option<Filter<'_>>) -> Result<bool, FilterError> {
        match filter {
            None => Ok(true),
            Some(filter) => filter.evaluate(self),
        }
    }

    /// Substitute `pattern` in the request and, if present, the response.
    pub fn replace(&mut self, pattern: &Pattern, replacement: &str) -> usize {
        let mut count = 0;
        if let Some(request) = &mut self.request {
            count += request.replace(pattern, replacement);
        }
        if let Some(response) = &mut self.response {
            count += response.replace(pattern, replacement);
        }
        count
    }

    /// Remember the current state so it can be restored with
    /// [`revert`](Self::revert).
    pub fn backup(&mut self) {
        self.backup = Some(state::get_state(self, StateMode::Full));
    }

    /// Restore and discard the last backup. Does nothing without one.
    pub fn revert(&mut self) -> Result<(), StateError> {
        match self.backup.take() {
            Some(backup) => state::load_state(self, &backup),
            None => Ok(()),
        }
    }

    /// Whether the flow changed since the last backup.
    pub fn modified(&self) -> bool {
        self.backup
            .as_ref()
            .is_some_and(|backup| *backup != state::get_state(self, StateMode::Full))
    }

    pub fn intercept(&mut self) {
        self.intercepted = true;
    }

    pub fn resume(&mut self) {
        self.intercepted = false;
    }

    /// Record that the connection was killed and stop intercepting.
    pub fn kill(&mut self) {
        self.error = Some(FlowError::new(KILLED_MESSAGE));
        self.intercepted = false;
    }
}

impl Default for HttpFlow {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            client_conn: None,
            server_conn: None,
            request: None,
            response: None,
            error: None,
            intercepted: false,
            live: false,
            backup: None,
        }
    }
}

/// Restore a shared record.
///
/// A record whose state already equals `value` keeps its `Arc`, so flows
/// sharing it stay attached. Otherwise it is updated in place when nothing
/// else holds it and replaced by a private copy when something does.
fn load_shared<T: StateObject + Clone>(
    slot: &mut Option<Arc<T>>,
    value: &Value,
) -> Result<(), StateError> {
    if value.is_null() {
        *slot = None;
        return Ok(());
    }
    match slot {
        Some(shared) if state::get_state(&**shared, StateMode::Full) == *value => Ok(()),
        Some(shared) => state::load_state(Arc::make_mut(shared), value),
        None => {
            *slot = Some(Arc::new(state::from_state(value)?));
            Ok(())
        }
    }
}

impl StateObject for HttpFlow {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new(
            "id",
            FieldKind::Str,
            |f, _| Value::from(f.id.to_string()),
            |f, v| {
                let id = state::to_str("id", v)?;
                f.id = Uuid::parse_str(&id).map_err(|err| StateError::InvalidValue {
                    field: "id",
                    reason: err.to_string(),
                })?;
                Ok(())
            },
        ),
        Field::new(
            "type",
            FieldKind::Str,
            |_, _| Value::from(FLOW_TYPE),
            |_, v| {
                let found = state::to_str("type", v)?;
                if found != FLOW_TYPE {
                    return Err(StateError::KindMismatch {
                        expected: FLOW_TYPE,
                        found,
                    });
                }
                Ok(())
            },
        ),
        Field::new(
            "error",
            FieldKind::Nested,
            |f, mode| state::get_nested(f.error.as_ref(), mode),
            |f, v| state::load_nested(&mut f.error, v),
        ),
        Field::new(
            "client_conn",
            FieldKind::Nested,
            |f, mode| state::get_nested(f.client_conn.as_deref(), mode),
            |f, v| load_shared(&mut f.client_conn, v),
        ),
        Field::new(
            "server_conn",
            FieldKind::Nested,
            |f, mode| state::get_nested(f.server_conn.as_deref(), mode),
            |f, v| load_shared(&mut f.server_conn, v),
        ),
        Field::new(
            "request",
            FieldKind::Nested,
            |f, mode| state::get_nested(f.request.as_ref(), mode),
            |f, v| state::load_nested(&mut f.request, v),
        ),
        Field::new(
            "response",
            FieldKind::Nested,
            |f, mode| state::get_nested(f.response.as_ref(), mode),
            |f, v| state::load_nested(&mut f.response, v),
        ),
        Field::new(
            "intercepted",
            FieldKind::Bool,
            |f, _| Value::Bool(f.intercepted),
            |f, v| {
                f.intercepted = state::to_bool("intercepted", v)?;
                Ok(())
            },
        ),
    ];
}
