// SPDX-License-Identifier: CC0-1.0

//! Blockdata constants.
//!
//! This module holds the protocol constants that bound the sizes this
//! library is willing to work with.

/// The maximum allowed weight for a block, see BIP 141 (network rule).
pub const MAX_BLOCK_WEIGHT: u32 = 4_000_000;
/// The minimum transaction weight for a valid serialized transaction.
pub const MIN_TRANSACTION_WEIGHT: u32 = WITNESS_SCALE_FACTOR as u32 * 60;
/// The factor that non-witness serialization data is multiplied by during
/// weight calculation.
pub const WITNESS_SCALE_FACTOR: usize = 4;
