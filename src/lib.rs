//! blocklog - An append-only block store recovered by backward scanning
//!
//! Records are framed with a checksummed preamble, found again by scanning
//! from the tail, and compacted by appending merged records plus skip
//! markers.

pub mod blocks;
pub mod config;
pub mod observability;
pub mod store;
