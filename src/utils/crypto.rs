// src/utils/crypto.rs
//! Content addressing compatible with IPFS (UnixFS v1, CIDv0).
//!
//! Verification compares identifiers computed here against identifiers issued
//! by the pinning provider, so the scheme must match the provider's `add`
//! defaults exactly:
//!
//! - fixed-size chunker, 256 KiB
//! - dag-pb leaves wrapping a UnixFS `File` message (no raw leaves)
//! - balanced layout with at most 174 links per node
//! - sha2-256 multihash, base58btc, CID version 0 (`Qm...`)
//!
//! # Security
//! sha2-256 gives collision resistance: producing a second document with the
//! same identifier requires a sha2-256 collision on the root block.

use crate::models::credential::ContentIdentifier;
use sha2::{Digest, Sha256};

/// Chunk size used by `ipfs add` (`size-262144`).
pub const DEFAULT_CHUNK_SIZE: usize = 262_144;

/// Maximum links per node in the balanced layout.
pub const DEFAULT_MAX_LINKS: usize = 174;

/// Multihash code for sha2-256.
const SHA2_256_CODE: u8 = 0x12;
/// Digest length of sha2-256.
const SHA2_256_LEN: u8 = 0x20;
/// UnixFS `DataType.File`.
const UNIXFS_FILE: u64 = 2;

/// Computes content identifiers for document bytes.
///
/// Pure and deterministic; holds only the layout parameters, which must agree
/// with the storage provider's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentAddresser {
    chunk_size: usize,
    max_links: usize,
}

impl Default for ContentAddresser {
    fn default() -> Self {
        ContentAddresser {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_links: DEFAULT_MAX_LINKS,
        }
    }
}

impl ContentAddresser {
    /// Creates an addresser with custom layout parameters.
    ///
    /// `chunk_size` is raised to at least 1 and `max_links` to at least 2, the
    /// smallest values for which the layout terminates.
    pub fn new(chunk_size: usize, max_links: usize) -> Self {
        ContentAddresser {
            chunk_size: chunk_size.max(1),
            max_links: max_links.max(2),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn max_links(&self) -> usize {
        self.max_links
    }

    /// Content identifier of `bytes`.
    pub fn digest(&self, bytes: &[u8]) -> ContentIdentifier {
        let root = self.build_root(bytes);
        ContentIdentifier::new(bs58::encode(root.multihash()).into_string())
    }

    /// Builds the DAG bottom-up. Grouping each level into runs of `max_links`
    /// yields the same tree as the balanced builder filling full subtrees
    /// left to right.
    pub(crate) fn build_root(&self, bytes: &[u8]) -> DagNode {
        let mut level: Vec<DagNode> = bytes.chunks(self.chunk_size).map(DagNode::leaf).collect();

        while level.len() > 1 {
            level = level.chunks(self.max_links).map(DagNode::parent).collect();
        }

        match level.pop() {
            Some(root) => root,
            None => DagNode::leaf(&[]),
        }
    }
}

/// Content identifier of `bytes` with the provider's default layout.
pub fn digest(bytes: &[u8]) -> ContentIdentifier {
    ContentAddresser::default().digest(bytes)
}

/// An encoded dag-pb block plus the sizes its parent needs.
#[derive(Debug, Clone)]
pub(crate) struct DagNode {
    /// Encoded dag-pb block
    pub(crate) block: Vec<u8>,
    /// Number of file bytes under this node
    pub(crate) file_size: u64,
    /// Encoded size of this block plus all blocks below it
    pub(crate) cumulative_size: u64,
}

impl DagNode {
    fn leaf(chunk: &[u8]) -> Self {
        let data = (!chunk.is_empty()).then_some(chunk);
        let unixfs = encode_unixfs_file(data, chunk.len() as u64, &[]);
        let block = encode_pb_node(&[], &unixfs);
        DagNode {
            cumulative_size: block.len() as u64,
            file_size: chunk.len() as u64,
            block,
        }
    }

    fn parent(children: &[DagNode]) -> Self {
        let block_sizes: Vec<u64> = children.iter().map(|c| c.file_size).collect();
        let file_size = block_sizes.iter().sum();
        let unixfs = encode_unixfs_file(None, file_size, &block_sizes);
        let links: Vec<PbLink> = children
            .iter()
            .map(|child| PbLink {
                hash: child.multihash(),
                tsize: child.cumulative_size,
            })
            .collect();
        let block = encode_pb_node(&links, &unixfs);
        let below: u64 = children.iter().map(|c| c.cumulative_size).sum();
        DagNode {
            cumulative_size: block.len() as u64 + below,
            file_size,
            block,
        }
    }

    /// sha2-256 multihash of the encoded block.
    pub(crate) fn multihash(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + SHA2_256_LEN as usize);
        out.push(SHA2_256_CODE);
        out.push(SHA2_256_LEN);
        out.extend_from_slice(&Sha256::digest(&self.block));
        out
    }
}

struct PbLink {
    hash: Vec<u8>,
    tsize: u64,
}

/// UnixFS `Data` message: Type=1, Data=2, filesize=3, blocksizes=4 (unpacked).
fn encode_unixfs_file(data: Option<&[u8]>, file_size: u64, block_sizes: &[u64]) -> Vec<u8> {
    let mut out = Vec::new();
    put_key(&mut out, 1, WIRE_VARINT);
    put_varint(&mut out, UNIXFS_FILE);
    if let Some(data) = data {
        put_bytes_field(&mut out, 2, data);
    }
    put_key(&mut out, 3, WIRE_VARINT);
    put_varint(&mut out, file_size);
    for size in block_sizes {
        put_key(&mut out, 4, WIRE_VARINT);
        put_varint(&mut out, *size);
    }
    out
}

/// dag-pb `PBNode`: Links (field 2) are written before Data (field 1).
/// Each `PBLink` carries Hash=1, Name=2 (always present, empty), Tsize=3.
fn encode_pb_node(links: &[PbLink], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for link in links {
        let mut encoded = Vec::with_capacity(link.hash.len() + 8);
        put_bytes_field(&mut encoded, 1, &link.hash);
        put_bytes_field(&mut encoded, 2, &[]);
        put_key(&mut encoded, 3, WIRE_VARINT);
        put_varint(&mut encoded, link.tsize);
        put_bytes_field(&mut out, 2, &encoded);
    }
    put_bytes_field(&mut out, 1, data);
    out
}

const WIRE_VARINT: u8 = 0;
const WIRE_LEN: u8 = 2;

fn put_key(out: &mut Vec<u8>, field: u8, wire_type: u8) {
    out.push((field << 3) | wire_type);
}

fn put_bytes_field(out: &mut Vec<u8>, field: u8, bytes: &[u8]) {
    put_key(out, field, WIRE_LEN);
    put_varint(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}
