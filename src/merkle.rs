//! Merkle Streamer: O(log n) streaming hash-tree over extracted output
//! (spec §4.9).
//!
//! Maintains a bounded stack of 32 slots (one per tree level), each holding
//! at most one SHA-256 digest. Pushing a leaf into an occupied level
//! combines the two digests and carries the result up, exactly the way a
//! binary counter carries on increment — memory stays at 32 × 32 bytes
//! regardless of the number of leaves ingested.
use sha2::{Digest, Sha256};

pub const MAX_LEVELS: usize = 32;
pub const LEAF_CHUNK_SIZE: usize = 4096;

pub type Digest32 = [u8; 32];

fn combine(held: &Digest32, new: &Digest32) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(held);
    hasher.update(new);
    hasher.finalize().into()
}

#[derive(Debug, Clone)]
pub struct MerkleRoot {
    pub root: Digest32,
    pub depth: usize,
    pub leaf_count: u64,
}

impl MerkleRoot {
    pub fn root_hex(&self) -> String {
        hex_encode(&self.root)
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(s, "{b:02x}").expect("writing to a String never fails");
    }
    s
}

/// Streaming Merkle tree builder. See module docs.
#[derive(Debug, Clone)]
pub struct MerkleStreamer {
    slots: [Option<Digest32>; MAX_LEVELS],
    leaf_count: u64,
    /// Leftover bytes below [LEAF_CHUNK_SIZE] waiting for more input.
    pending: Vec<u8>,
}

impl Default for MerkleStreamer {
    fn default() -> Self {
        Self::new()
    }
}

impl MerkleStreamer {
    pub fn new() -> MerkleStreamer {
        MerkleStreamer {
            slots: [None; MAX_LEVELS],
            leaf_count: 0,
            pending: Vec::with_capacity(LEAF_CHUNK_SIZE),
        }
    }

    /// Feed an arbitrary-length chunk of the byte stream. Internally
    /// buffers up to one leaf's worth of bytes (4 KB) between calls.
    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let need = LEAF_CHUNK_SIZE - self.pending.len();
            let take = need.min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.pending.len() == LEAF_CHUNK_SIZE {
                self.push_leaf_bytes(&self.pending.clone());
                self.pending.clear();
            }
        }
    }

    fn push_leaf_bytes(&mut self, chunk: &[u8]) {
        let mut hasher = Sha256::new();
        hasher.update(chunk);
        let digest: Digest32 = hasher.finalize().into();
        self.push_leaf_digest(digest);
    }

    fn push_leaf_digest(&mut self, digest: Digest32) {
        self.leaf_count += 1;
        self.push_at(0, digest);
    }

    fn push_at(&mut self, level: usize, hash: Digest32) {
        assert!(level < MAX_LEVELS, "merkle tree exceeded 32 levels");
        match self.slots[level].take() {
            Some(held) => {
                let combined = combine(&held, &hash);
                self.push_at(level + 1, combined);
            }
            None => {
                self.slots[level] = Some(hash);
            }
        }
    }

    /// Finalise the tree, consuming any buffered partial leaf. Walks the
    /// slots bottom-up, combining each occupied slot with the running
    /// accumulator.
    pub fn finalize(mut self) -> MerkleRoot {
        if !self.pending.is_empty() {
            let chunk = std::mem::take(&mut self.pending);
            self.push_leaf_bytes(&chunk);
        }

        if self.leaf_count == 0 {
            return MerkleRoot {
                root: [0u8; 32],
                depth: 0,
                leaf_count: 0,
            };
        }

        let mut acc: Option<Digest32> = None;
        let mut depth = 0;
        // Highest occupied level holds the oldest, largest subtree and must
        // sit leftmost in the combined root; walk from the top down.
        for level in (0..MAX_LEVELS).rev() {
            if let Some(slot) = self.slots[level] {
                depth = depth.max(level + 1);
                acc = Some(match acc {
                    None => slot,
                    Some(right) => combine(&slot, &right),
                });
            }
        }

        MerkleRoot {
            root: acc.expect("leaf_count > 0 implies at least one occupied slot"),
            depth,
            leaf_count: self.leaf_count,
        }
    }
}

/// Non-streaming reference implementation (O(n) memory), following the
/// same recursive definition used by RFC 6962's Merkle Tree Hash: split at
/// the largest power of two strictly less than the slice length, hash the
/// two halves, and combine. Used to validate [MerkleStreamer] in tests
/// (spec property P6).
pub fn reference_root(leaves: &[Digest32]) -> Digest32 {
    match leaves.len() {
        0 => [0u8; 32],
        1 => leaves[0],
        n => {
            let k = largest_power_of_two_below(n);
            let left = reference_root(&leaves[..k]);
            let right = reference_root(&leaves[k..]);
            combine(&left, &right)
        }
    }
}

fn largest_power_of_two_below(n: usize) -> usize {
    let mut k = 1;
    while k * 2 < n {
        k *= 2;
    }
    k
}
