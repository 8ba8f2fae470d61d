//! CRC16 checksum computation for block preambles
//!
//! The preamble carries two 16-bit checksum fields, each computed over the
//! 12 length/type bytes in front of them.
//!
//! Uses CRC-16/ARC (polynomial 0x8005, reflected, zero init).

use crc::{Crc, CRC_16_ARC};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Computes a CRC16 checksum over the provided data.
///
/// This function is deterministic: the same input always produces the same output.
pub fn compute_checksum(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Verifies that the computed checksum matches the expected checksum.
pub fn verify_checksum(data: &[u8], expected: u16) -> bool {
    compute_checksum(data) == expected
}
