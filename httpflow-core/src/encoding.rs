//! The supported `Content-Encoding` tokens and whole-body dispatch.

use bytes::Bytes;

use crate::codec::{Flate, FlateFormat, Identity, SharedCodec};
use crate::error::CodecError;

#[cfg(feature = "compression-br")]
use crate::codec::Brotli;

#[cfg(feature = "compression-zstd")]
use crate::codec::Zstd;

/// A content coding this build knows how to apply and undo.
///
/// Header values outside this set are "unsupported": bodies labelled with
/// them are passed through untouched instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Deflate,
    #[cfg(feature = "compression-br")]
    Brotli,
    #[cfg(feature = "compression-zstd")]
    Zstd,
}

/// All encodings compiled into this build, in header-token order.
pub const ENCODINGS: &[ContentEncoding] = &[
    ContentEncoding::Identity,
    ContentEncoding::Gzip,
    ContentEncoding::Deflate,
    #[cfg(feature = "compression-br")]
    ContentEncoding::Brotli,
    #[cfg(feature = "compression-zstd")]
    ContentEncoding::Zstd,
];

impl ContentEncoding {
    /// Look up a header token, ignoring ASCII case and outer whitespace.
    pub fn from_name(value: &str) -> Option<Self> {
        let token = value.trim();
        ENCODINGS
            .iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(token))
            .copied()
    }

    /// The canonical header token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
            #[cfg(feature = "compression-br")]
            Self::Brotli => "br",
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => "zstd",
        }
    }

    /// Build the codec for this token, tuned to `level`.
    pub fn codec(&self, level: CompressionLevel) -> SharedCodec {
        match self {
            Self::Identity => SharedCodec::new(Identity),
            Self::Gzip => SharedCodec::new(Flate::new(FlateFormat::Gzip, level.flate())),
            Self::Deflate => SharedCodec::new(Flate::new(FlateFormat::Zlib, level.flate())),
            #[cfg(feature = "compression-br")]
            Self::Brotli => SharedCodec::new(Brotli::new(level.brotli())),
            #[cfg(feature = "compression-zstd")]
            Self::Zstd => SharedCodec::new(Zstd::new(level.zstd())),
        }
    }
}

impl std::fmt::Display for ContentEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentEncoding {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| CodecError::Unsupported(s.to_owned()))
    }
}

/// How hard an encoder should work.
///
/// `Precise` values are codec-specific and clamped into the codec's range:
/// 0..=9 for gzip and deflate, 0..=11 for brotli, 1..=22 for zstd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    Fastest,
    #[default]
    Default,
    Best,
    Precise(u32),
}

impl CompressionLevel {
    fn pick(self, fastest: u32, default: u32, best: u32, floor: u32) -> u32 {
        match self {
            Self::Fastest => fastest,
            Self::Default => default,
            Self::Best => best,
            Self::Precise(n) => n.clamp(floor, best),
        }
    }

    fn flate(self) -> u32 {
        self.pick(1, Flate::DEFAULT_LEVEL, 9, 0)
    }

    #[cfg(feature = "compression-br")]
    fn brotli(self) -> u32 {
        self.pick(0, Brotli::DEFAULT_QUALITY, 11, 0)
    }

    #[cfg(feature = "compression-zstd")]
    fn zstd(self) -> i32 {
        self.pick(1, Zstd::DEFAULT_LEVEL as u32, 22, 1) as i32
    }
}

/// Decode `data` that was content-coded with `encoding`.
///
/// Malformed input yields [`CodecError::Decompression`]; the input is never
/// modified, so callers can keep using the original bytes.
pub fn decode(encoding: ContentEncoding, data: &[u8]) -> Result<Bytes, CodecError> {
    encoding.codec(CompressionLevel::Default).decode(data).map_err(|source| {
        tracing::debug!(
            target: "httpflow_core",
            %encoding,
            len = data.len(),
            error = %source,
            "content decode failed"
        );
        CodecError::Decompression { encoding, source }
    })
}

/// Content-code `data` with `encoding` at the default level.
pub fn encode(encoding: ContentEncoding, data: &[u8]) -> Result<Bytes, CodecError> {
    encode_with_level(encoding, data, CompressionLevel::Default)
}

/// Content-code `data` with `encoding` at `level`.
///
/// Compressing into memory does not fail in practice for the built-in
/// codecs; the `Result` carries the codec's I/O error through regardless.
pub fn encode_with_level(
    encoding: ContentEncoding,
    data: &[u8],
    level: CompressionLevel,
) -> Result<Bytes, CodecError> {
    encoding
        .codec(level)
        .encode(data)
        .map_err(|source| CodecError::Compression { encoding, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("identity", Some(ContentEncoding::Identity))]
    #[case("gzip", Some(ContentEncoding::Gzip))]
    #[case(" GZIP ", Some(ContentEncoding::Gzip))]
    #[case("deflate", Some(ContentEncoding::Deflate))]
    #[case("lz4", None)]
    #[case("", None)]
    fn test_content_encoding_from_name(
        #[case] value: &str,
        #[case] expected: Option<ContentEncoding>,
    ) {
        assert_eq!(ContentEncoding::from_name(value), expected);
    }

    #[test]
    fn test_content_encoding_as_str_round_trips() {
        for encoding in ENCODINGS {
            assert_eq!(ContentEncoding::from_name(encoding.as_str()), Some(*encoding));
        }
    }

    #[test]
    fn test_content_encoding_from_str_unsupported() {
        let err = "compress".parse::<ContentEncoding>().unwrap_err();
        assert_eq!(err.to_string(), "unsupported content encoding: compress");
    }

    #[test]
    fn test_codec_reports_its_encoding() {
        for encoding in ENCODINGS {
            assert_eq!(encoding.codec(CompressionLevel::Best).encoding(), *encoding);
        }
    }

    #[rstest]
    #[case(CompressionLevel::Fastest, 1)]
    #[case(CompressionLevel::Default, 6)]
    #[case(CompressionLevel::Best, 9)]
    #[case(CompressionLevel::Precise(0), 0)]
    #[case(CompressionLevel::Precise(12), 9)]
    fn test_flate_level_mapping(#[case] level: CompressionLevel, #[case] expected: u32) {
        assert_eq!(level.flate(), expected);
    }

    #[test]
    fn test_decode_malformed_gzip_fails() {
        let err = decode(ContentEncoding::Gzip, b"definitely not gzip").unwrap_err();
        assert!(matches!(
            err,
            CodecError::Decompression {
                encoding: ContentEncoding::Gzip,
                ..
            }
        ));
    }

    #[test]
    fn test_encode_with_level_decodes_identically() {
        let data = vec![b'a'; 4096];
        let fast =
            encode_with_level(ContentEncoding::Gzip, &data, CompressionLevel::Fastest).unwrap();
        let best = encode_with_level(ContentEncoding::Gzip, &data, CompressionLevel::Best).unwrap();

        assert_eq!(&decode(ContentEncoding::Gzip, &fast).unwrap()[..], &data[..]);
        assert_eq!(&decode(ContentEncoding::Gzip, &best).unwrap()[..], &data[..]);
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            index in 0..ENCODINGS.len(),
            data in proptest::collection::vec(any::<u8>(), 0..2048),
        ) {
            let encoding = ENCODINGS[index];
            let encoded = encode(encoding, &data).unwrap();
            let decoded = decode(encoding, &encoded).unwrap();
            prop_assert_eq!(&decoded[..], &data[..]);
        }
    }
}
