// SPDX-License-Identifier: CC0-1.0

//! Bitcoin hash types.
//!
//! This module defines the double-SHA-256 newtypes used to identify
//! transactions and merkle tree nodes.
//!
//! Note that the user-facing hex display of these types is byte-reversed
//! relative to the internally computed digest, following the long-standing
//! Bitcoin convention. The reversal happens purely at the presentation
//! boundary; consensus encoding always uses the computed byte order.

use crate::hashes::{hash_newtype, sha256d};
use crate::internal_macros::impl_hashencode;

hash_newtype! {
    /// A bitcoin transaction hash/transaction ID.
    ///
    /// The double-SHA-256 of the legacy (witness-stripped) transaction
    /// serialization.
    pub struct Txid(sha256d::Hash);

    /// A bitcoin witness transaction ID.
    ///
    /// The double-SHA-256 of the full (witness-including) transaction
    /// serialization.
    pub struct Wtxid(sha256d::Hash);

    /// A hash of the merkle tree branch or root for transactions.
    pub struct TxMerkleNode(sha256d::Hash);

    /// A hash corresponding to the merkle tree root for witness data.
    pub struct WitnessMerkleNode(sha256d::Hash);
}

impl_hashencode!(Txid);
impl_hashencode!(Wtxid);
impl_hashencode!(TxMerkleNode);
impl_hashencode!(WitnessMerkleNode);
