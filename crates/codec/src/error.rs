//! Codec error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported codec: {0:?}")]
    UnsupportedCodec(String),

    #[error("invalid lzip data: {0}")]
    InvalidLzip(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

impl From<CodecError> for std::io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other),
        }
    }
}
