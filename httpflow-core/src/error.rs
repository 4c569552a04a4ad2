//! Codec error types.

use std::io;

use crate::encoding::ContentEncoding;

/// Content coding errors.
///
/// A decompression failure is an expected outcome for malformed or
/// mislabelled bodies; callers report it and keep the original bytes.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Decompression failed.
    #[error("{encoding} decompression failed: {source}")]
    Decompression {
        encoding: ContentEncoding,
        #[source]
        source: io::Error,
    },

    /// Compression failed.
    #[error("{encoding} compression failed: {source}")]
    Compression {
        encoding: ContentEncoding,
        #[source]
        source: io::Error,
    },

    /// The name does not belong to the supported encoding set.
    #[error("unsupported content encoding: {0}")]
    Unsupported(String),
}

impl CodecError {
    /// The encoding involved, if the error came from a codec.
    pub fn encoding(&self) -> Option<ContentEncoding> {
        match self {
            CodecError::Decompression { encoding, .. } | CodecError::Compression { encoding, .. } => {
                Some(*encoding)
            }
            CodecError::Unsupported(_) => None,
        }
    }
}
