//! Chunk splitting and reassembly
//!
//! Encrypted payloads are cut into bounded chunks before upload. Each chunk
//! is content-addressed by the first six bytes of the SHA-256 hash of its
//! ciphertext. Six bytes is a narrow collision domain: it is only meant to
//! be unique within one archive, not across the whole service.

use crate::crypto::ContentHash;
use crate::error::{Result, VaultError};
use crate::BLOB_ID_LENGTH;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Content-derived blob identifier
///
/// Format on the wire: standard base64 of `sha256(chunk)[0..6]`
/// Example: `q1Fg7xYm`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId([u8; BLOB_ID_LENGTH]);

impl BlobId {
    /// Create a new BlobId from raw bytes
    pub fn from_bytes(bytes: [u8; BLOB_ID_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Compute the BlobId of a ciphertext chunk (content-addressing)
    pub fn from_data(data: &[u8]) -> Self {
        let hash = ContentHash::compute(data);
        let mut id = [0u8; BLOB_ID_LENGTH];
        id.copy_from_slice(&hash.as_bytes()[..BLOB_ID_LENGTH]);
        Self(id)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; BLOB_ID_LENGTH] {
        &self.0
    }

    /// Convert to base64 string (wire format)
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }

    /// Parse from base64 string
    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(s)
            .map_err(|e| VaultError::InvalidBlobId(e.to_string()))?;

        if bytes.len() != BLOB_ID_LENGTH {
            return Err(VaultError::InvalidBlobId(format!(
                "Invalid length: expected {}, got {}",
                BLOB_ID_LENGTH,
                bytes.len()
            )));
        }

        let mut arr = [0u8; BLOB_ID_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobId({})", self.to_base64())
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

impl Serialize for BlobId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for BlobId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// A slice of an encrypted payload, ready for upload
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Position within the payload (for ordered reconstruction)
    pub index: u32,

    /// Content-addressed identifier
    pub id: BlobId,

    /// Ciphertext bytes
    pub data: Bytes,
}

impl Chunk {
    /// Create a chunk, computing its identifier
    pub fn new(data: impl Into<Bytes>, index: u32) -> Self {
        let data: Bytes = data.into();
        let id = BlobId::from_data(&data);
        Self { index, id, data }
    }

    /// Verify the chunk's integrity by recomputing its identifier
    pub fn verify(&self) -> bool {
        BlobId::from_data(&self.data) == self.id
    }

    /// Get the chunk size
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Split a ciphertext into chunks of at most `max_chunk_size` bytes
///
/// Only the last chunk may be shorter. An empty ciphertext yields no chunks.
pub fn split(ciphertext: &Bytes, max_chunk_size: usize) -> Result<Vec<Chunk>> {
    if max_chunk_size == 0 {
        return Err(VaultError::Configuration(
            "max chunk size must be positive".to_string(),
        ));
    }

    let chunks = (0..ciphertext.len())
        .step_by(max_chunk_size)
        .enumerate()
        .map(|(index, start)| {
            let end = (start + max_chunk_size).min(ciphertext.len());
            Chunk::new(ciphertext.slice(start..end), index as u32)
        })
        .collect();

    Ok(chunks)
}

/// Reassemble fetched chunks in manifest order
///
/// Fetches may complete in any order; the manifest alone decides placement.
/// A manifest entry without a fetched chunk contributes zero bytes at its
/// position. The resulting ciphertext is then truncated and will most
/// likely fail to decrypt or decrypt to the wrong content.
/// Use [`reassemble_strict`] to surface the gap as an error instead.
pub fn reassemble(manifest: &[BlobId], fetched: &HashMap<BlobId, Bytes>) -> Bytes {
    let total_size: usize = manifest
        .iter()
        .filter_map(|id| fetched.get(id))
        .map(|data| data.len())
        .sum();

    let mut result = BytesMut::with_capacity(total_size);
    for (position, id) in manifest.iter().enumerate() {
        match fetched.get(id) {
            Some(data) => result.extend_from_slice(data),
            None => warn!(
                blob_id = %id,
                position,
                "Manifest entry has no fetched chunk, substituting empty bytes"
            ),
        }
    }

    result.freeze()
}

/// Reassemble fetched chunks in manifest order, failing on the first gap
pub fn reassemble_strict(manifest: &[BlobId], fetched: &HashMap<BlobId, Bytes>) -> Result<Bytes> {
    if let Some((position, id)) = manifest
        .iter()
        .enumerate()
        .find(|(_, id)| !fetched.contains_key(id))
    {
        return Err(VaultError::MissingChunk {
            blob_id: id.to_base64(),
            position,
        });
    }

    Ok(reassemble(manifest, fetched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const M: usize = 1024;

    fn payload(size: usize) -> Bytes {
        (0..size).map(|i| (i % 251) as u8).collect::<Vec<_>>().into()
    }

    fn fetched_map(chunks: &[Chunk]) -> HashMap<BlobId, Bytes> {
        chunks.iter().map(|c| (c.id, c.data.clone())).collect()
    }

    #[test]
    fn test_blob_id_roundtrip() {
        let id = BlobId::from_data(b"hello world");

        let encoded = id.to_base64();
        assert_eq!(encoded.len(), 8);
        assert_eq!(BlobId::from_base64(&encoded).unwrap(), id);
    }

    #[test]
    fn test_blob_id_is_truncated_sha256() {
        let id = BlobId::from_data(b"abc");
        assert_eq!(id.as_bytes(), &[0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01]);
        assert_eq!(id.to_base64(), "ungWv48B");
    }

    #[test]
    fn test_blob_id_deterministic() {
        let data = payload(5000);
        let ids: Vec<BlobId> = (0..10).map(|_| BlobId::from_data(&data)).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_blob_id_invalid_length() {
        let result = BlobId::from_base64("AAAA");
        assert!(matches!(result, Err(VaultError::InvalidBlobId(_))));
    }

    #[test]
    fn test_blob_id_serde() {
        let id = BlobId::from_data(b"chunk");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_base64()));
        let back: BlobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_split_boundary_sizes() {
        for (size, expected_chunks) in [(0, 0), (M - 1, 1), (M, 1), (M + 1, 2), (2 * M, 2)] {
            let data = payload(size);
            let chunks = split(&data, M).unwrap();
            assert_eq!(chunks.len(), expected_chunks, "size {}", size);
            assert!(chunks.iter().all(|c| c.size() <= M && c.verify()));

            let manifest: Vec<BlobId> = chunks.iter().map(|c| c.id).collect();
            let reassembled = reassemble(&manifest, &fetched_map(&chunks));
            assert_eq!(reassembled, data, "size {}", size);
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let data = payload(3 * M + 17);
        let a = split(&data, M).unwrap();
        let b = split(&data, M).unwrap();
        let ids_a: Vec<BlobId> = a.iter().map(|c| c.id).collect();
        let ids_b: Vec<BlobId> = b.iter().map(|c| c.id).collect();
        assert_eq!(ids_a, ids_b);
        assert_eq!(a.last().unwrap().size(), 17);
    }

    #[test]
    fn test_split_rejects_zero_size() {
        assert!(matches!(
            split(&payload(10), 0),
            Err(VaultError::Configuration(_))
        ));
    }

    #[test]
    fn test_out_of_order_reassembly() {
        let data = payload(3 * M);
        let chunks = split(&data, M).unwrap();
        let manifest: Vec<BlobId> = chunks.iter().map(|c| c.id).collect();

        // Arrival order [3, 1, 2]
        let mut fetched = HashMap::new();
        for i in [2usize, 0, 1] {
            fetched.insert(chunks[i].id, chunks[i].data.clone());
        }

        let in_order = reassemble(&manifest, &fetched_map(&chunks));
        assert_eq!(reassemble(&manifest, &fetched), in_order);
        assert_eq!(in_order, data);
    }

    #[test]
    fn test_missing_chunk_becomes_empty() {
        let data = payload(3 * M);
        let chunks = split(&data, M).unwrap();
        let manifest: Vec<BlobId> = chunks.iter().map(|c| c.id).collect();

        let mut fetched = fetched_map(&chunks);
        fetched.remove(&chunks[1].id);

        let result = reassemble(&manifest, &fetched);
        let mut expected = chunks[0].data.to_vec();
        expected.extend_from_slice(&chunks[2].data);
        assert_eq!(result.as_ref(), expected.as_slice());

        // Same input, same placeholder
        assert_eq!(reassemble(&manifest, &fetched), result);
    }

    #[test]
    fn test_strict_reassembly_reports_gap() {
        let data = payload(3 * M);
        let chunks = split(&data, M).unwrap();
        let manifest: Vec<BlobId> = chunks.iter().map(|c| c.id).collect();

        let mut fetched = fetched_map(&chunks);
        fetched.remove(&chunks[1].id);

        let err = reassemble_strict(&manifest, &fetched).unwrap_err();
        assert!(matches!(err, VaultError::MissingChunk { position: 1, .. }));

        let full = reassemble_strict(&manifest, &fetched_map(&chunks)).unwrap();
        assert_eq!(full, data);
    }

    #[test]
    fn test_repeated_manifest_entry() {
        // Identical chunks share an id; both positions resolve to the same bytes
        let data = Bytes::from(vec![5u8; 2 * M]);
        let chunks = split(&data, M).unwrap();
        assert_eq!(chunks[0].id, chunks[1].id);

        let manifest: Vec<BlobId> = chunks.iter().map(|c| c.id).collect();
        assert_eq!(reassemble(&manifest, &fetched_map(&chunks)), data);
    }

    proptest! {
        #[test]
        fn prop_split_then_reassemble(
            data in proptest::collection::vec(any::<u8>(), 0..8192),
            max in 1usize..2048,
        ) {
            let data = Bytes::from(data);
            let chunks = split(&data, max).unwrap();
            prop_assert!(chunks.iter().all(|c| c.size() <= max));
            let manifest: Vec<BlobId> = chunks.iter().map(|c| c.id).collect();
            prop_assert_eq!(reassemble(&manifest, &fetched_map(&chunks)), data);
        }
    }
}
