//! Nix binary cache endpoints.
//!
//! Narinfo records are stored as `{hash}.narinfo`. NARs are stored
//! uncompressed as `{hash}.nar` and transcoded on the way in and out, so
//! one stored object serves every codec.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use meshix_codec::Codec;
use meshix_core::narinfo::{NARINFO_CONTENT_TYPE, NarInfo};
use tokio::io::AsyncReadExt;
use tokio_util::io::{ReaderStream, StreamReader};

/// Body of `/nix-cache-info`.
pub const NIX_CACHE_INFO: &str = "WantMassQuery: 1\nStoreDir: /nix/store\nPriority: 39\n";

pub const NIX_CACHE_INFO_CONTENT_TYPE: &str = "text/x-nix-cache-info";

pub const NAR_CONTENT_TYPE: &str = "application/x-nix-nar";

/// An object addressed under `/cache/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheObject {
    NarInfo { hash: String },
    Nar { hash: String, codec: Codec },
}

impl CacheObject {
    /// Parse the last path segment, e.g. `abc.narinfo` or `abc.nar.xz`.
    ///
    /// Malformed names are `NotFound`; a well-formed NAR name with an
    /// unknown codec tag is `UnsupportedCodec`.
    pub fn parse(file: &str) -> ApiResult<Self> {
        if let Some(hash) = file.strip_suffix(".narinfo") {
            return Ok(Self::NarInfo {
                hash: valid_hash(hash, file)?,
            });
        }
        if let Some((hash, tag)) = file.split_once(".nar.") {
            let hash = valid_hash(hash, file)?;
            let codec = Codec::from_tag(tag)?;
            return Ok(Self::Nar { hash, codec });
        }
        Err(ApiError::NotFound(file.to_string()))
    }

    pub fn hash(&self) -> &str {
        match self {
            Self::NarInfo { hash } | Self::Nar { hash, .. } => hash,
        }
    }

    /// Storage key the object lives under.
    pub fn storage_key(&self) -> String {
        match self {
            Self::NarInfo { hash } => format!("{hash}.narinfo"),
            Self::Nar { hash, .. } => format!("{hash}.nar"),
        }
    }
}

fn valid_hash(hash: &str, file: &str) -> ApiResult<String> {
    if hash.is_empty() || !hash.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(ApiError::NotFound(file.to_string()));
    }
    Ok(hash.to_string())
}

/// Only NARs live under `/cache/nar/`.
fn parse_nar_alias(file: &str) -> ApiResult<CacheObject> {
    match CacheObject::parse(file)? {
        nar @ CacheObject::Nar { .. } => Ok(nar),
        CacheObject::NarInfo { .. } => Err(ApiError::NotFound(file.to_string())),
    }
}

/// GET /cache/nix-cache-info
pub async fn get_nix_cache_info() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, NIX_CACHE_INFO_CONTENT_TYPE)],
        NIX_CACHE_INFO,
    )
}

/// GET /cache/{file}
pub async fn get_object(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<Response> {
    match CacheObject::parse(&file)? {
        CacheObject::NarInfo { hash } => get_narinfo(&state, &hash).await,
        CacheObject::Nar { hash, codec } => get_nar(&state, &hash, codec).await,
    }
}

/// HEAD /cache/{file}
pub async fn head_object(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<Response> {
    head(&state, CacheObject::parse(&file)?).await
}

/// PUT /cache/{file}
pub async fn put_object(
    State(state): State<AppState>,
    Path(file): Path<String>,
    body: Body,
) -> ApiResult<StatusCode> {
    match CacheObject::parse(&file)? {
        CacheObject::NarInfo { hash } => {
            let text = axum::body::to_bytes(body, NARINFO_BODY_LIMIT)
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed to read narinfo: {e}")))?;
            put_narinfo(&state, &hash, text).await
        }
        CacheObject::Nar { hash, codec } => put_nar(&state, &hash, codec, body).await,
    }
}

/// GET /cache/nar/{file}
pub async fn get_nar_alias(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<Response> {
    match parse_nar_alias(&file)? {
        CacheObject::Nar { hash, codec } => get_nar(&state, &hash, codec).await,
        CacheObject::NarInfo { .. } => Err(ApiError::NotFound(file)),
    }
}

/// HEAD /cache/nar/{file}
pub async fn head_nar_alias(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> ApiResult<Response> {
    head(&state, parse_nar_alias(&file)?).await
}

/// PUT /cache/nar/{file}
pub async fn put_nar_alias(
    State(state): State<AppState>,
    Path(file): Path<String>,
    body: Body,
) -> ApiResult<StatusCode> {
    match parse_nar_alias(&file)? {
        CacheObject::Nar { hash, codec } => put_nar(&state, &hash, codec, body).await,
        CacheObject::NarInfo { .. } => Err(ApiError::NotFound(file)),
    }
}

/// Narinfo records are a few KiB; anything near this is not a narinfo.
const NARINFO_BODY_LIMIT: usize = 1024 * 1024;

async fn head(state: &AppState, object: CacheObject) -> ApiResult<Response> {
    let meta = state
        .storage
        .stat(state.bucket(), &object.storage_key())
        .await?;

    // a NAR's stored size says nothing about its encoded length
    let response = match object {
        CacheObject::NarInfo { .. } => (
            StatusCode::OK,
            [
                (CONTENT_TYPE, NARINFO_CONTENT_TYPE.to_string()),
                (CONTENT_LENGTH, meta.size.to_string()),
            ],
        )
            .into_response(),
        CacheObject::Nar { .. } => {
            (StatusCode::OK, [(CONTENT_TYPE, NAR_CONTENT_TYPE)]).into_response()
        }
    };
    Ok(response)
}

async fn get_narinfo(state: &AppState, hash: &str) -> ApiResult<Response> {
    let key = format!("{hash}.narinfo");
    let meta = state.storage.stat(state.bucket(), &key).await?;
    let stream = state.storage.get(state.bucket(), &key).await?;
    tracing::debug!(hash = %hash, size = meta.size, "serving narinfo");

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, NARINFO_CONTENT_TYPE.to_string()),
            (CONTENT_LENGTH, meta.size.to_string()),
        ],
        Body::from_stream(stream.map_err(std::io::Error::other)),
    )
        .into_response())
}

/// Stream the stored NAR through `codec`'s encoder.
async fn get_nar(state: &AppState, hash: &str, codec: Codec) -> ApiResult<Response> {
    let key = format!("{hash}.nar");
    let stream = state.storage.get(state.bucket(), &key).await?;
    tracing::debug!(hash = %hash, codec = %codec, "serving nar");

    let encoded = codec.encoder(StreamReader::new(stream.map_err(std::io::Error::other)));

    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, NAR_CONTENT_TYPE)],
        Body::from_stream(ReaderStream::new(encoded)),
    )
        .into_response())
}

/// Parse, sign with the cache key, then store.
async fn put_narinfo(state: &AppState, hash: &str, body: Bytes) -> ApiResult<StatusCode> {
    let text = std::str::from_utf8(&body)
        .map_err(|_| ApiError::BadRequest("narinfo is not valid UTF-8".to_string()))?;
    let mut narinfo = NarInfo::parse(text)?;

    let path_hash = narinfo.store_path.hash().as_str();
    if path_hash != hash {
        return Err(ApiError::BadRequest(format!(
            "narinfo for {path_hash} uploaded as {hash}.narinfo"
        )));
    }

    state.signer.sign(&mut narinfo);

    let signed = narinfo.to_narinfo_text();
    state
        .storage
        .put_bytes(state.bucket(), &format!("{hash}.narinfo"), Bytes::from(signed))
        .await?;

    tracing::info!(
        hash = %hash,
        store_path = %narinfo.store_path,
        signatures = narinfo.signatures.len(),
        "narinfo stored"
    );
    Ok(StatusCode::OK)
}

/// Decode the whole body, then store it as the uncompressed NAR.
async fn put_nar(state: &AppState, hash: &str, codec: Codec, body: Body) -> ApiResult<StatusCode> {
    let reader = StreamReader::new(body.into_data_stream().map_err(std::io::Error::other));
    let mut decoder = codec.decoder(reader);

    let mut nar = Vec::new();
    decoder
        .read_to_end(&mut nar)
        .await
        .map_err(|e| ApiError::BadRequest(format!("failed to decode {codec} body: {e}")))?;

    let size = nar.len();
    state
        .storage
        .put_bytes(state.bucket(), &format!("{hash}.nar"), Bytes::from(nar))
        .await?;

    tracing::info!(hash = %hash, codec = %codec, size, "nar stored");
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshix_codec::CodecError;

    const HASH: &str = "0c6kzph7l0dcbfmjap64f0czdafn3b7x";

    #[test]
    fn parse_narinfo_name() {
        let object = CacheObject::parse(&format!("{HASH}.narinfo")).unwrap();
        assert_eq!(
            object,
            CacheObject::NarInfo {
                hash: HASH.to_string()
            }
        );
        assert_eq!(object.storage_key(), format!("{HASH}.narinfo"));
    }

    #[test]
    fn parse_nar_name_stores_uncompressed() {
        let object = CacheObject::parse(&format!("{HASH}.nar.zst")).unwrap();
        assert_eq!(
            object,
            CacheObject::Nar {
                hash: HASH.to_string(),
                codec: Codec::Zstd
            }
        );
        assert_eq!(object.storage_key(), format!("{HASH}.nar"));
    }

    #[test]
    fn unknown_codec_is_unsupported() {
        let err = CacheObject::parse(&format!("{HASH}.nar.gz")).unwrap_err();
        assert!(matches!(
            err,
            ApiError::Codec(CodecError::UnsupportedCodec(ref tag)) if tag == "gz"
        ));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn malformed_names_are_not_found() {
        for file in [
            ".narinfo",
            "abc.txt",
            "abc.nar",
            "ab-c.narinfo",
            "ab.c.narinfo",
            ".nar.xz",
            "abc%2F.nar.xz",
        ] {
            let err = CacheObject::parse(file).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::NOT_FOUND, "{file}");
        }
    }

    #[test]
    fn nar_alias_rejects_narinfo() {
        assert!(parse_nar_alias(&format!("{HASH}.nar.xz")).is_ok());
        assert!(matches!(
            parse_nar_alias(&format!("{HASH}.narinfo")),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn cache_info_body() {
        assert_eq!(
            NIX_CACHE_INFO,
            "WantMassQuery: 1\nStoreDir: /nix/store\nPriority: 39\n"
        );
    }
}
