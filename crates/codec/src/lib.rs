//! Streaming compression codecs for NAR transfer.
//!
//! Each codec tag served by the cache maps to one [`Codec`] variant with an
//! encoder (download path) and a decoder (upload path). Both wrap an
//! [`AsyncBufRead`](tokio::io::AsyncBufRead) source and produce an
//! [`AsyncRead`](tokio::io::AsyncRead), so transfers run in bounded memory.

pub mod codec;
pub mod error;
pub mod lzip;

pub use codec::{BoxedReader, Codec};
pub use error::{CodecError, CodecResult};
