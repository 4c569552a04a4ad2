//! Whole-body codecs.
//!
//! Every codec here runs as a pull pipeline: the input slice is wrapped in a
//! streaming reader (an encoder or a decoder) and drained into a buffer. A
//! body is always held in memory in full, so there is no incremental API.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use bytes::Bytes;
use flate2::Compression;

use crate::encoding::ContentEncoding;

/// A content coding that transforms a complete body in one call.
pub trait Codec: Send + Sync + 'static {
    /// The encoding this codec produces and consumes.
    fn encoding(&self) -> ContentEncoding;

    /// Produce the coded form of `data`.
    fn encode(&self, data: &[u8]) -> io::Result<Bytes>;

    /// Recover the original bytes from coded `data`.
    fn decode(&self, data: &[u8]) -> io::Result<Bytes>;
}

/// A shareable, type-erased codec.
#[derive(Clone)]
pub struct SharedCodec(Arc<dyn Codec>);

impl SharedCodec {
    pub fn new(codec: impl Codec) -> Self {
        Self(Arc::new(codec))
    }
}

impl std::ops::Deref for SharedCodec {
    type Target = dyn Codec;

    fn deref(&self) -> &Self::Target {
        &*self.0
    }
}

impl fmt::Debug for SharedCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedCodec").field(&self.0.encoding()).finish()
    }
}

fn drain(mut reader: impl Read) -> io::Result<Bytes> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out.into())
}

/// Pass-through coding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Codec for Identity {
    fn encoding(&self) -> ContentEncoding {
        ContentEncoding::Identity
    }

    fn encode(&self, data: &[u8]) -> io::Result<Bytes> {
        Ok(Bytes::copy_from_slice(data))
    }

    fn decode(&self, data: &[u8]) -> io::Result<Bytes> {
        Ok(Bytes::copy_from_slice(data))
    }
}

/// Container around a DEFLATE stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlateFormat {
    /// RFC 1952 framing, sent as `gzip`.
    Gzip,
    /// RFC 1950 framing, sent as `deflate`.
    Zlib,
}

/// DEFLATE-based codecs backed by `flate2`.
///
/// The `deflate` token is ambiguous on the wire: most servers send a zlib
/// stream but some send bare DEFLATE data. Decoding tries zlib first and
/// falls back to the bare form; encoding always emits zlib.
#[derive(Debug, Clone, Copy)]
pub struct Flate {
    format: FlateFormat,
    level: u32,
}

impl Flate {
    pub const DEFAULT_LEVEL: u32 = 6;

    pub fn new(format: FlateFormat, level: u32) -> Self {
        Self {
            format,
            level: level.min(9),
        }
    }

    pub fn gzip() -> Self {
        Self::new(FlateFormat::Gzip, Self::DEFAULT_LEVEL)
    }

    pub fn zlib() -> Self {
        Self::new(FlateFormat::Zlib, Self::DEFAULT_LEVEL)
    }

    pub fn format(&self) -> FlateFormat {
        self.format
    }

    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Codec for Flate {
    fn encoding(&self) -> ContentEncoding {
        match self.format {
            FlateFormat::Gzip => ContentEncoding::Gzip,
            FlateFormat::Zlib => ContentEncoding::Deflate,
        }
    }

    fn encode(&self, data: &[u8]) -> io::Result<Bytes> {
        let level = Compression::new(self.level);
        match self.format {
            FlateFormat::Gzip => drain(flate2::read::GzEncoder::new(data, level)),
            FlateFormat::Zlib => drain(flate2::read::ZlibEncoder::new(data, level)),
        }
    }

    fn decode(&self, data: &[u8]) -> io::Result<Bytes> {
        match self.format {
            FlateFormat::Gzip => drain(flate2::read::GzDecoder::new(data)),
            FlateFormat::Zlib => drain(flate2::read::ZlibDecoder::new(data))
                .or_else(|_| drain(flate2::read::DeflateDecoder::new(data))),
        }
    }
}

/// Brotli coding (`br`).
#[cfg(feature = "compression-br")]
#[derive(Debug, Clone, Copy)]
pub struct Brotli {
    quality: u32,
}

#[cfg(feature = "compression-br")]
impl Brotli {
    pub const DEFAULT_QUALITY: u32 = 4;
    const BUFFER: usize = 4096;
    const WINDOW: u32 = 22;

    pub fn new(quality: u32) -> Self {
        Self {
            quality: quality.min(11),
        }
    }

    pub fn quality(&self) -> u32 {
        self.quality
    }
}

#[cfg(feature = "compression-br")]
impl Default for Brotli {
    fn default() -> Self {
        Self::new(Self::DEFAULT_QUALITY)
    }
}

#[cfg(feature = "compression-br")]
impl Codec for Brotli {
    fn encoding(&self) -> ContentEncoding {
        ContentEncoding::Brotli
    }

    fn encode(&self, data: &[u8]) -> io::Result<Bytes> {
        drain(brotli::CompressorReader::new(
            data,
            Self::BUFFER,
            self.quality,
            Self::WINDOW,
        ))
    }

    fn decode(&self, data: &[u8]) -> io::Result<Bytes> {
        drain(brotli::Decompressor::new(data, Self::BUFFER))
    }
}

/// Zstandard coding (`zstd`).
#[cfg(feature = "compression-zstd")]
#[derive(Debug, Clone, Copy)]
pub struct Zstd {
    level: i32,
}

#[cfg(feature = "compression-zstd")]
impl Zstd {
    pub const DEFAULT_LEVEL: i32 = 3;

    pub fn new(level: i32) -> Self {
        Self {
            level: level.clamp(1, 22),
        }
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

#[cfg(feature = "compression-zstd")]
impl Default for Zstd {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LEVEL)
    }
}

#[cfg(feature = "compression-zstd")]
impl Codec for Zstd {
    fn encoding(&self) -> ContentEncoding {
        ContentEncoding::Zstd
    }

    fn encode(&self, data: &[u8]) -> io::Result<Bytes> {
        zstd::stream::encode_all(data, self.level).map(Bytes::from)
    }

    fn decode(&self, data: &[u8]) -> io::Result<Bytes> {
        zstd::stream::decode_all(data).map(Bytes::from)
    }
}
