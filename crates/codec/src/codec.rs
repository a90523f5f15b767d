//! The closed set of codecs the cache speaks.

use crate::error::{CodecError, CodecResult};
use crate::lzip;
use async_compression::Level;
use async_compression::tokio::bufread::{
    BrotliDecoder, BrotliEncoder, BzDecoder, BzEncoder, Lz4Decoder, Lz4Encoder, XzDecoder,
    XzEncoder, ZstdDecoder, ZstdEncoder,
};
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncRead};

/// Byte source handed to a codec.
pub type BoxedBufRead = Pin<Box<dyn AsyncBufRead + Send>>;

/// Transformed byte stream returned by a codec.
pub type BoxedReader = Pin<Box<dyn AsyncRead + Send>>;

type Transform = fn(BoxedBufRead) -> BoxedReader;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Codec {
    Brotli,
    Bzip2,
    Lzip,
    Lz4,
    Zstd,
    Xz,
}

struct Entry {
    codec: Codec,
    tag: &'static str,
    encode: Transform,
    decode: Transform,
}

static CODECS: [Entry; 6] = [
    Entry {
        codec: Codec::Brotli,
        tag: "br",
        encode: brotli_encode,
        decode: brotli_decode,
    },
    Entry {
        codec: Codec::Bzip2,
        tag: "bz2",
        encode: bzip2_encode,
        decode: bzip2_decode,
    },
    Entry {
        codec: Codec::Lzip,
        tag: "lzip",
        encode: lzip_encode,
        decode: lzip_decode,
    },
    Entry {
        codec: Codec::Lz4,
        tag: "lz4",
        encode: lz4_encode,
        decode: lz4_decode,
    },
    Entry {
        codec: Codec::Zstd,
        tag: "zst",
        encode: zstd_encode,
        decode: zstd_decode,
    },
    Entry {
        codec: Codec::Xz,
        tag: "xz",
        encode: xz_encode,
        decode: xz_decode,
    },
];

fn brotli_encode(input: BoxedBufRead) -> BoxedReader {
    Box::pin(BrotliEncoder::with_quality(input, Level::Default))
}

fn brotli_decode(input: BoxedBufRead) -> BoxedReader {
    Box::pin(BrotliDecoder::new(input))
}

fn bzip2_encode(input: BoxedBufRead) -> BoxedReader {
    Box::pin(BzEncoder::with_quality(input, Level::Default))
}

fn bzip2_decode(input: BoxedBufRead) -> BoxedReader {
    let mut decoder = BzDecoder::new(input);
    decoder.multiple_members(true);
    Box::pin(decoder)
}

fn lzip_encode(input: BoxedBufRead) -> BoxedReader {
    lzip::encoder(input)
}

fn lzip_decode(input: BoxedBufRead) -> BoxedReader {
    lzip::decoder(input)
}

fn lz4_encode(input: BoxedBufRead) -> BoxedReader {
    Box::pin(Lz4Encoder::with_quality(input, Level::Default))
}

fn lz4_decode(input: BoxedBufRead) -> BoxedReader {
    Box::pin(Lz4Decoder::new(input))
}

fn zstd_encode(input: BoxedBufRead) -> BoxedReader {
    Box::pin(ZstdEncoder::with_quality(input, Level::Default))
}

fn zstd_decode(input: BoxedBufRead) -> BoxedReader {
    let mut decoder = ZstdDecoder::new(input);
    decoder.multiple_members(true);
    Box::pin(decoder)
}

fn xz_encode(input: BoxedBufRead) -> BoxedReader {
    Box::pin(XzEncoder::with_quality(input, Level::Default))
}

fn xz_decode(input: BoxedBufRead) -> BoxedReader {
    let mut decoder = XzDecoder::new(input);
    decoder.multiple_members(true);
    Box::pin(decoder)
}

impl Codec {
    pub const ALL: [Codec; 6] = [
        Codec::Brotli,
        Codec::Bzip2,
        Codec::Lzip,
        Codec::Lz4,
        Codec::Zstd,
        Codec::Xz,
    ];

    fn entry(self) -> &'static Entry {
        // rows are in declaration order
        &CODECS[self as usize]
    }

    /// Look up a codec by its file extension tag. Surrounding whitespace is ignored.
    pub fn from_tag(tag: &str) -> CodecResult<Self> {
        let tag = tag.trim();
        CODECS
            .iter()
            .find(|e| e.tag == tag)
            .map(|e| e.codec)
            .ok_or_else(|| CodecError::UnsupportedCodec(tag.to_string()))
    }

    pub fn tag(self) -> &'static str {
        self.entry().tag
    }

    /// Compress `input` as it is read.
    ///
    /// The returned reader yields EOF only after the codec has flushed its trailer.
    pub fn encoder<R>(self, input: R) -> BoxedReader
    where
        R: AsyncBufRead + Send + 'static,
    {
        (self.entry().encode)(Box::pin(input))
    }

    /// Decompress `input` as it is read. Corrupt input surfaces as an I/O error.
    pub fn decoder<R>(self, input: R) -> BoxedReader
    where
        R: AsyncBufRead + Send + 'static,
    {
        (self.entry().decode)(Box::pin(input))
    }
}

impl FromStr for Codec {
    type Err = CodecError;

    fn from_str(s: &str) -> CodecResult<Self> {
        Self::from_tag(s)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
