//! Immutable serialized values and partition hashing.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use bytes::Bytes;

/// Seed used for every partition hash.
pub const PARTITION_HASH_SEED: u32 = 0x01000193;

/// Size of the `[type_id][length]` header that precedes a payload on the wire.
pub const DATA_HEADER_SIZE: usize = 8;

/// An already-serialized value tagged with the id of the encoding that produced it.
///
/// `Data` is immutable and cheap to clone; the payload is shared. The partition
/// hash is derived from the payload bytes alone and is cached after the first
/// call, so two values with identical payloads always land on the same
/// partition even if their type ids differ.
#[derive(Clone)]
pub struct Data {
    type_id: i32,
    payload: Bytes,
    partition_hash: OnceLock<i32>,
}

impl Data {
    /// Wraps `payload` without validating it; decoding is deferred to the serializer.
    pub fn from_bytes(type_id: i32, payload: impl Into<Bytes>) -> Self {
        Self {
            type_id,
            payload: payload.into(),
            partition_hash: OnceLock::new(),
        }
    }

    /// Returns the id of the encoding used for the payload.
    pub fn type_id(&self) -> i32 {
        self.type_id
    }

    /// Returns the shared payload.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns the payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the value and returns its payload.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Returns the payload length.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Returns true if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Returns the number of bytes this value occupies in `[type_id][length][payload]` framing.
    pub fn wire_size(&self) -> usize {
        DATA_HEADER_SIZE + self.payload.len()
    }

    /// Returns the partition hash of the payload; an empty payload hashes to 0.
    pub fn partition_hash(&self) -> i32 {
        *self
            .partition_hash
            .get_or_init(|| compute_partition_hash(&self.payload))
    }

    /// Returns the partition this value belongs to out of `partition_count`.
    pub fn partition_id(&self, partition_count: i32) -> i32 {
        hash_to_index(self.partition_hash(), partition_count)
    }
}

impl PartialEq for Data {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.payload == other.payload
    }
}

impl Eq for Data {}

impl Hash for Data {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.payload.hash(state);
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("type_id", &self.type_id)
            .field("len", &self.payload.len())
            .field("partition_hash", &self.partition_hash.get())
            .finish()
    }
}

/// Computes the partition hash of raw payload bytes.
pub fn compute_partition_hash(payload: &[u8]) -> i32 {
    if payload.is_empty() {
        return 0;
    }
    murmur_hash3_x86_32(payload, PARTITION_HASH_SEED)
}

/// Maps a hash onto `0..count`.
///
/// `i32::MIN` has no positive counterpart and maps to 0. A non-positive count yields 0.
pub fn hash_to_index(hash: i32, count: i32) -> i32 {
    if count <= 0 || hash == i32::MIN {
        return 0;
    }
    hash.abs() % count
}

/// MurmurHash3 x86 32-bit.
pub fn murmur_hash3_x86_32(data: &[u8], seed: u32) -> i32 {
    const C1: u32 = 0xcc9e2d51;
    const C2: u32 = 0x1b873593;

    let mut h1 = seed;
    let mut blocks = data.chunks_exact(4);

    for block in &mut blocks {
        let k1 = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h1 ^= mix_k1(k1, C1, C2);
        h1 = h1.rotate_left(13);
        h1 = h1.wrapping_mul(5).wrapping_add(0xe6546b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let k1 = tail
            .iter()
            .enumerate()
            .fold(0u32, |k, (i, &b)| k ^ (u32::from(b) << (8 * i)));
        h1 ^= mix_k1(k1, C1, C2);
    }

    h1 ^= data.len() as u32;
    fmix32(h1) as i32
}

#[inline]
fn mix_k1(k1: u32, c1: u32, c2: u32) -> u32 {
    k1.wrapping_mul(c1).rotate_left(15).wrapping_mul(c2)
}

#[inline]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}
