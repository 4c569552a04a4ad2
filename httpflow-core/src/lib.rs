//! Content coding for the httpflow message model.
//!
//! This crate provides the codec layer that `httpflow` messages use to make
//! body mutation transparent to `Content-Encoding`.
//!
//! ## Modules
//!
//! - [`codec`]: Codec trait and implementations
//! - [`encoding`]: Supported encodings, compression levels and dispatch
//! - [`error`]: Codec error type

mod codec;
mod encoding;
mod error;

pub use codec::*;
pub use encoding::*;
pub use error::*;
