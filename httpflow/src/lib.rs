//! # httpflow
//!
//! An in-memory model of intercepted HTTP transactions.
//!
//! A [`HttpFlow`] aggregates a [`Request`], an optional [`Response`], an
//! optional [`FlowError`] and shared references to the connections it ran
//! over. On top of that model the crate provides:
//!
//! - **Encoding-transparent rewriting:** [`Message::replace`] and the
//!   [`Decoded`] scope guard decode a compressed body, let it be edited, and
//!   compress it again with the original `Content-Encoding`.
//! - **Replay refresh:** [`Response::refresh`] moves date headers and cookie
//!   expiries forward so a captured response looks fresh when replayed.
//! - **Snapshots:** [`state::get_state`] produces full or short
//!   `serde_json::Value` snapshots from static per-type schemas, and
//!   [`state::from_state`] restores full ones.
//!
//! Content codecs come from [`httpflow_core`]. Logging goes through
//! `tracing` under the `httpflow` target; no subscriber is installed.
//!
//! ## Modules
//!
//! - [`message`]: Body, message and the scoped decode guard
//! - [`request`] / [`response`]: Concrete message types and protocol adapters
//! - [`flow`]: The flow aggregate
//! - [`state`]: Snapshot and restore
//! - [`synth`]: Error page and `CONNECT` builders

pub mod config;
pub mod connection;
pub mod cookie;
pub mod date;
pub mod error;
pub mod filter;
pub mod flow;
pub mod headers;
pub mod message;
pub mod pattern;
pub mod request;
pub mod response;
pub mod state;
pub mod synth;

pub use httpflow_core;
pub use httpflow_core::{CodecError, CompressionLevel, ContentEncoding};

pub use config::FlowConfig;
pub use connection::{Address, ClientConnection, ServerConnection};
pub use error::{AddressError, Error, FilterError, Result, StateError};
pub use filter::{Filter, FilterCompiler, FlowPredicate};
pub use flow::{FlowError, HttpFlow};
pub use headers::Headers;
pub use message::{Body, Decoded, HttpMessage, HttpVersion, Message, MessageId, StreamId};
pub use pattern::Pattern;
pub use request::{HttpForm, ParsedRequest, Request};
pub use response::{ParsedResponse, Response};
pub use state::{StateMode, StateObject};

pub mod prelude {
    //! The types most callers need.
    pub use crate::flow::{FlowError, HttpFlow};
    pub use crate::headers::Headers;
    pub use crate::message::{Body, HttpMessage, HttpVersion, Message};
    pub use crate::pattern::Pattern;
    pub use crate::request::{HttpForm, Request};
    pub use crate::response::Response;
    pub use crate::state::{StateMode, StateObject, from_state, get_state, load_state};
    pub use crate::synth::{make_connect_request, make_connect_response, make_error_response};
    pub use httpflow_core::ContentEncoding;
}
