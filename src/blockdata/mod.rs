// SPDX-License-Identifier: CC0-1.0

//! Bitcoin block data.
//!
//! This module defines transactions, scripts and witnesses together with
//! their canonical consensus encodings. These are the value types the
//! commitment engines ([`crate::merkle_tree`], [`crate::crypto::sighash`],
//! [`crate::taproot`]) are defined over.

pub mod constants;
pub mod script;
pub mod transaction;
pub mod witness;
