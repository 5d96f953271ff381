// SPDX-License-Identifier: CC0-1.0

//! Cryptography.
//!
//! Cryptography related functionality: keys, signature containers and
//! signature hash computation.

pub mod ecdsa;
pub mod key;
pub mod sighash;
