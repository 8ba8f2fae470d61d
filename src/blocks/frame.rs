//! Block frame codec
//!
//! Physical layout of one block, in ascending store offset:
//!
//! ```text
//! +------------------+
//! | Body             | (body_len bytes)
//! +------------------+
//! | Header           | (header_len bytes)
//! +------------------+  <- anchor
//! | Header Length    | (u32 BE)
//! | Body Length      | (u32 BE)
//! | Block Type       | (u32 BE)
//! | Checksum         | (u16 BE)
//! | Checksum (copy)  | (u16 BE)
//! | Sentinel         | (0x23 0x21, "#!")
//! +------------------+  <- frame end
//! ```
//!
//! The 18 bytes after the anchor are the preamble. Both checksum fields cover
//! the first 12 preamble bytes. The sentinel is the only thing a backward scan
//! searches for; the checksums reject coincidental sentinels.

use super::checksum::compute_checksum;
use super::errors::{BlockError, BlockResult};

/// Preamble size in bytes.
pub const PREAMBLE_LEN: usize = 18;

/// Fixed bytes closing every preamble.
pub const SENTINEL: [u8; 2] = [0x23, 0x21];

/// Number of preamble bytes covered by the checksum fields.
const CHECKED_LEN: usize = 12;

/// Decoded preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    pub header_len: u32,
    pub body_len: u32,
    pub block_type: u32,
    pub checksum_primary: u16,
    pub checksum_secondary: u16,
    pub sentinel: [u8; 2],
}

impl Preamble {
    /// Builds the preamble for a block about to be written.
    ///
    /// Lengths are taken as `u64` so oversize values can be rejected before
    /// any buffer of that size exists.
    pub fn new(block_type: u32, header_len: u64, body_len: u64) -> BlockResult<Self> {
        let header_len = u32::try_from(header_len).map_err(|_| {
            BlockError::invalid_argument(format!(
                "Block header size {} exceeds maximum {}",
                header_len,
                u32::MAX
            ))
        })?;
        let body_len = u32::try_from(body_len).map_err(|_| {
            BlockError::invalid_argument(format!(
                "Block body size {} exceeds maximum {}",
                body_len,
                u32::MAX
            ))
        })?;

        let mut preamble = Self {
            header_len,
            body_len,
            block_type,
            checksum_primary: 0,
            checksum_secondary: 0,
            sentinel: SENTINEL,
        };
        let checksum = compute_checksum(&preamble.checked_bytes());
        preamble.checksum_primary = checksum;
        preamble.checksum_secondary = checksum;
        Ok(preamble)
    }

    /// Decodes 18 preamble bytes. Pure; call [`Preamble::verify`] before
    /// trusting the lengths.
    pub fn decode(bytes: &[u8; PREAMBLE_LEN]) -> Self {
        let be_u32 = |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let be_u16 = |at: usize| u16::from_be_bytes([bytes[at], bytes[at + 1]]);
        Self {
            header_len: be_u32(0),
            body_len: be_u32(4),
            block_type: be_u32(8),
            checksum_primary: be_u16(12),
            checksum_secondary: be_u16(14),
            sentinel: [bytes[16], bytes[17]],
        }
    }

    /// Serializes the preamble.
    pub fn to_bytes(&self) -> [u8; PREAMBLE_LEN] {
        let mut out = [0u8; PREAMBLE_LEN];
        out[..CHECKED_LEN].copy_from_slice(&self.checked_bytes());
        out[12..14].copy_from_slice(&self.checksum_primary.to_be_bytes());
        out[14..16].copy_from_slice(&self.checksum_secondary.to_be_bytes());
        out[16..18].copy_from_slice(&self.sentinel);
        out
    }

    /// Integrity check.
    ///
    /// Both checksum fields must equal the checksum recomputed over the
    /// length and type fields, and the sentinel must be intact.
    pub fn verify(&self) -> bool {
        let computed = compute_checksum(&self.checked_bytes());
        self.sentinel == SENTINEL
            && self.checksum_primary == computed
            && self.checksum_secondary == computed
    }

    /// Total frame size: body + header + preamble.
    pub fn frame_len(&self) -> u64 {
        PREAMBLE_LEN as u64 + self.header_len as u64 + self.body_len as u64
    }

    fn checked_bytes(&self) -> [u8; CHECKED_LEN] {
        let mut out = [0u8; CHECKED_LEN];
        out[0..4].copy_from_slice(&self.header_len.to_be_bytes());
        out[4..8].copy_from_slice(&self.body_len.to_be_bytes());
        out[8..12].copy_from_slice(&self.block_type.to_be_bytes());
        out
    }
}

/// Encodes one block as `body ++ header ++ preamble`.
///
/// The returned length is the exact byte count the caller will append.
pub fn encode(block_type: u32, header: &[u8], body: &[u8]) -> BlockResult<Vec<u8>> {
    let preamble = Preamble::new(block_type, header.len() as u64, body.len() as u64)?;

    let mut frame = Vec::with_capacity(body.len() + header.len() + PREAMBLE_LEN);
    frame.extend_from_slice(body);
    frame.extend_from_slice(header);
    frame.extend_from_slice(&preamble.to_bytes());
    Ok(frame)
}
