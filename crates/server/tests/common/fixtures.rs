//! Test fixtures for generating test data.

use bytes::Bytes;
use meshix_core::hash::{ContentHash, NarHash};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for generating unique store path hashes.
static STORE_PATH_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate deterministic test data based on a seed.
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        // Simple LCG for deterministic data
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// Generate a valid Nix store path hash (32 chars, nix-base32).
#[allow(dead_code)]
pub fn random_store_path_hash() -> String {
    let counter = STORE_PATH_COUNTER.fetch_add(1, Ordering::Relaxed);
    let data = seeded_bytes(counter, 20);
    nix_base32::to_nix_base32(&data)
}

/// Generate a test store path, returning `(hash, full path)`.
#[allow(dead_code)]
pub fn test_store_path(name: &str) -> (String, String) {
    let hash = random_store_path_hash();
    let path = format!("/nix/store/{hash}-{name}");
    (hash, path)
}

/// NAR-looking test data: the archive magic followed by deterministic bytes.
#[allow(dead_code)]
pub fn test_nar_data(size: usize) -> Bytes {
    let mut data = Vec::with_capacity(size);
    data.extend_from_slice(b"\x0d\x00\x00\x00\x00\x00\x00\x00nix-archive-1");
    data.extend_from_slice(&seeded_bytes(size as u64, size.saturating_sub(data.len())));
    data.truncate(size);
    Bytes::from(data)
}

/// An unsigned narinfo describing `nar`, as `nix copy` would upload it.
#[allow(dead_code)]
pub fn narinfo_text(store_path: &str, hash: &str, nar: &[u8]) -> String {
    let nar_hash = NarHash::from_content_hash(ContentHash::compute(nar));
    let dep = format!("{}-glibc-2.40", random_store_path_hash());
    format!(
        "StorePath: {store_path}\n\
         URL: nar/{hash}.nar.xz\n\
         Compression: xz\n\
         NarHash: {}\n\
         NarSize: {}\n\
         References: {dep}\n\
         Deriver: {}-hello.drv\n",
        nar_hash.to_nix_string(),
        nar.len(),
        random_store_path_hash(),
    )
}
