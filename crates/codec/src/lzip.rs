//! lzip member framing over the LZMA codec.
//!
//! An lzip member is a 6-byte header (`LZIP`, version, coded dictionary size),
//! a raw LZMA stream with end marker, and a 20-byte trailer holding the CRC32
//! and size of the uncompressed data plus the size of the whole member.
//! The LZMA coding itself is delegated to the `.lzma` codec, whose 13-byte
//! header is translated to and from the lzip header.

use crate::codec::BoxedReader;
use crate::error::CodecError;
use async_compression::Level;
use async_compression::tokio::bufread::{LzmaDecoder, LzmaEncoder};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader, ReadBuf};
use tokio_util::io::StreamReader;

const MAGIC: &[u8; 4] = b"LZIP";
const VERSION: u8 = 1;
const HEADER_LEN: usize = 6;
const TRAILER_LEN: usize = 20;

/// lc=3, lp=0, pb=2: the only literal/position layout lzip allows.
const LZMA_PROPERTIES: u8 = 0x5D;
const LZMA_HEADER_LEN: usize = 13;

const MIN_DICT_BITS: u32 = 12;
const MAX_DICT_BITS: u32 = 29;

const CHUNK_SIZE: usize = 64 * 1024;

/// Encode a dictionary size as the smallest lzip code that covers it.
pub fn encode_dict_size(size: u32) -> u8 {
    let size = size.clamp(1 << MIN_DICT_BITS, 1 << MAX_DICT_BITS);
    let bits = (u32::BITS - (size - 1).leading_zeros()).clamp(MIN_DICT_BITS, MAX_DICT_BITS);
    let base = 1u32 << bits;
    let fraction = (1..=7u32)
        .rev()
        .find(|f| base - (base / 16) * f >= size)
        .unwrap_or(0);
    (bits as u8) | ((fraction as u8) << 5)
}

/// Decode the coded dictionary size byte of an lzip header.
pub fn decode_dict_size(coded: u8) -> Result<u32, CodecError> {
    let bits = u32::from(coded & 0x1F);
    if !(MIN_DICT_BITS..=MAX_DICT_BITS).contains(&bits) {
        return Err(CodecError::InvalidLzip(format!(
            "dictionary size 2^{bits} out of range"
        )));
    }
    let base = 1u32 << bits;
    Ok(base - (base / 16) * u32::from(coded >> 5))
}

/// Counts and checksums the bytes read through it.
struct Checksummed<R> {
    inner: R,
    crc: crc32fast::Hasher,
    size: u64,
}

impl<R> Checksummed<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            crc: crc32fast::Hasher::new(),
            size: 0,
        }
    }

    fn crc(&self) -> u32 {
        self.crc.clone().finalize()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for Checksummed<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        ready!(Pin::new(&mut self.inner).poll_read(cx, buf))?;
        let fresh = &buf.filled()[before..];
        self.crc.update(fresh);
        self.size += fresh.len() as u64;
        Poll::Ready(Ok(()))
    }
}

/// Translate the `.lzma` header written by the encoder into an lzip member header.
fn member_header(lzma_header: &[u8; LZMA_HEADER_LEN]) -> Result<Bytes, CodecError> {
    if lzma_header[0] != LZMA_PROPERTIES {
        return Err(CodecError::InvalidLzip(format!(
            "encoder produced LZMA properties {:#04x}",
            lzma_header[0]
        )));
    }
    let dict_size = u32::from_le_bytes([
        lzma_header[1],
        lzma_header[2],
        lzma_header[3],
        lzma_header[4],
    ]);

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(MAGIC);
    header.push(VERSION);
    header.push(encode_dict_size(dict_size));
    Ok(Bytes::from(header))
}

/// Build the `.lzma` header the LZMA decoder expects for an lzip member.
fn lzma_header(member_header: &[u8; HEADER_LEN]) -> Result<Vec<u8>, CodecError> {
    if &member_header[..4] != MAGIC {
        return Err(CodecError::InvalidLzip("bad magic".to_string()));
    }
    if member_header[4] != VERSION {
        return Err(CodecError::InvalidLzip(format!(
            "unsupported version {}",
            member_header[4]
        )));
    }
    let dict_size = decode_dict_size(member_header[5])?;

    // unknown uncompressed size; the stream ends at its end marker
    let mut header = Vec::with_capacity(LZMA_HEADER_LEN);
    header.push(LZMA_PROPERTIES);
    header.extend_from_slice(&dict_size.to_le_bytes());
    header.extend_from_slice(&[0xFF; 8]);
    Ok(header)
}

fn verify_trailer(
    trailer: &[u8; TRAILER_LEN],
    crc: u32,
    data_size: u64,
    member: u64,
) -> Result<(), CodecError> {
    let stored_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let mut size = [0u8; 8];
    size.copy_from_slice(&trailer[4..12]);
    let stored_data_size = u64::from_le_bytes(size);
    size.copy_from_slice(&trailer[12..20]);
    let stored_member_size = u64::from_le_bytes(size);

    if stored_crc != crc {
        return Err(CodecError::InvalidLzip(format!(
            "CRC mismatch in member {member}"
        )));
    }
    if stored_data_size != data_size {
        return Err(CodecError::InvalidLzip(format!(
            "member {member} declares {stored_data_size} bytes, decoded {data_size}"
        )));
    }
    if stored_member_size < (HEADER_LEN + TRAILER_LEN) as u64 {
        return Err(CodecError::InvalidLzip(format!(
            "member {member} size {stored_member_size} too small"
        )));
    }
    Ok(())
}

fn encode_stream<R>(input: R) -> impl Stream<Item = io::Result<Bytes>> + Send
where
    R: AsyncBufRead + Send + 'static,
{
    async_stream::try_stream! {
        let source = Checksummed::new(Box::pin(input));
        let mut lzma = Box::pin(LzmaEncoder::with_quality(BufReader::new(source), Level::Default));

        let mut header = [0u8; LZMA_HEADER_LEN];
        lzma.read_exact(&mut header).await?;
        yield member_header(&header)?;

        let mut member_size = HEADER_LEN as u64;
        loop {
            let mut chunk = BytesMut::with_capacity(CHUNK_SIZE);
            if lzma.read_buf(&mut chunk).await? == 0 {
                break;
            }
            member_size += chunk.len() as u64;
            yield chunk.freeze();
        }
        member_size += TRAILER_LEN as u64;

        let source = lzma.get_ref().get_ref();
        let mut trailer = Vec::with_capacity(TRAILER_LEN);
        trailer.extend_from_slice(&source.crc().to_le_bytes());
        trailer.extend_from_slice(&source.size.to_le_bytes());
        trailer.extend_from_slice(&member_size.to_le_bytes());
        yield Bytes::from(trailer);
    }
}

fn decode_stream<R>(input: R) -> impl Stream<Item = io::Result<Bytes>> + Send
where
    R: AsyncBufRead + Send + 'static,
{
    async_stream::try_stream! {
        let mut input = Box::pin(input);
        let mut members = 0u64;

        loop {
            if members > 0 && input.fill_buf().await?.is_empty() {
                break;
            }
            members += 1;

            let mut header = [0u8; HEADER_LEN];
            input.read_exact(&mut header).await?;
            let prefix = lzma_header(&header)?;

            let mut crc = crc32fast::Hasher::new();
            let mut data_size = 0u64;
            {
                let mut lzma =
                    Box::pin(LzmaDecoder::new(io::Cursor::new(prefix).chain(&mut input)));
                loop {
                    let mut chunk = BytesMut::with_capacity(CHUNK_SIZE);
                    if lzma.read_buf(&mut chunk).await? == 0 {
                        break;
                    }
                    crc.update(&chunk);
                    data_size += chunk.len() as u64;
                    yield chunk.freeze();
                }
            }

            let mut trailer = [0u8; TRAILER_LEN];
            input.read_exact(&mut trailer).await?;
            verify_trailer(&trailer, crc.finalize(), data_size, members)?;
        }
    }
}

/// Stream `input` out as a single lzip member.
pub fn encoder<R>(input: R) -> BoxedReader
where
    R: AsyncBufRead + Send + 'static,
{
    Box::pin(StreamReader::new(Box::pin(encode_stream(input))))
}

/// Decode a sequence of lzip members, verifying each trailer.
pub fn decoder<R>(input: R) -> BoxedReader
where
    R: AsyncBufRead + Send + 'static,
{
    Box::pin(StreamReader::new(Box::pin(decode_stream(input))))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn encode(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        encoder(io::Cursor::new(data.to_vec()))
            .read_to_end(&mut out)
            .await
            .unwrap();
        out
    }

    async fn decode(data: Vec<u8>) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        decoder(io::Cursor::new(data)).read_to_end(&mut out).await?;
        Ok(out)
    }

    #[test]
    fn test_dict_size_coding() {
        assert_eq!(decode_dict_size(encode_dict_size(1 << 23)).unwrap(), 1 << 23);
        assert_eq!(encode_dict_size(1 << 23), 23);
        // 12 MiB = 16 MiB - 4 * 1 MiB
        assert_eq!(decode_dict_size(0x98).unwrap(), 12 << 20);
        assert_eq!(encode_dict_size(12 << 20), 0x98);
        // never smaller than requested
        for size in [4096, 5000, 65_537, 3 << 20, 100_000_000] {
            assert!(decode_dict_size(encode_dict_size(size)).unwrap() >= size);
        }
        assert!(decode_dict_size(11).is_err());
        assert!(decode_dict_size(30).is_err());
    }

    #[tokio::test]
    async fn test_member_layout() {
        let data = b"hello lzip".repeat(100);
        let member = encode(&data).await;

        assert_eq!(&member[..4], MAGIC);
        assert_eq!(member[4], VERSION);
        assert!(decode_dict_size(member[5]).is_ok());

        let trailer = &member[member.len() - TRAILER_LEN..];
        let crc = u32::from_le_bytes(trailer[0..4].try_into().unwrap());
        let data_size = u64::from_le_bytes(trailer[4..12].try_into().unwrap());
        let member_size = u64::from_le_bytes(trailer[12..20].try_into().unwrap());

        assert_eq!(crc, crc32fast::hash(&data));
        assert_eq!(data_size, data.len() as u64);
        assert_eq!(member_size, member.len() as u64);
    }

    #[tokio::test]
    async fn test_concatenated_members() {
        let mut stream = encode(b"first member, ").await;
        stream.extend(encode(b"second member").await);

        assert_eq!(decode(stream).await.unwrap(), b"first member, second member");
    }

    #[tokio::test]
    async fn test_detects_corrupt_crc() {
        let mut member = encode(&b"payload".repeat(50)).await;
        let crc_at = member.len() - TRAILER_LEN;
        member[crc_at] ^= 0xFF;

        let err = decode(member).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("CRC mismatch"));
    }

    #[tokio::test]
    async fn test_rejects_bad_magic() {
        let mut member = encode(b"payload").await;
        member[0] = b'X';
        assert!(decode(member).await.is_err());
    }

    #[tokio::test]
    async fn test_truncated_member() {
        let member = encode(&b"payload".repeat(50)).await;
        let truncated = member[..member.len() - 5].to_vec();
        assert!(decode(truncated).await.is_err());
    }
}
