// SPDX-License-Identifier: CC0-1.0

//! # Rust Bitcoin Commitments Library
//!
//! This library implements the commitment layer of the Bitcoin protocol: the
//! bit-exact digests that bind transactions to blocks (merkle roots and
//! partial merkle tree proofs), bind signatures to the transaction data they
//! authorize (legacy and segwit v0 signature hashes), and bind taproot
//! output keys to their alternative spending scripts (BIP341 commitment
//! trees).
//!
//! Everything here is a pure function of its inputs. There is no I/O, no
//! shared state, and no retry semantics: a malformed input fails the same
//! way every time, and failures are always surfaced as typed results rather
//! than silently wrong digests.
//!
//! The crate also carries the canonical consensus encoding the engines are
//! defined over ([`consensus::encode`]) together with lean transaction,
//! script and witness value types ([`blockdata`]). Script execution, peer
//! networking and wallet logic are explicitly out of scope.
//!
//! ## Examples
//!
//! Proving that a transaction is part of a block:
//!
//! ```
//! use bitcoin_commitments::{PartialMerkleTree, Txid};
//!
//! let txids: Vec<Txid> = [
//!     "c06fbab289f723c6261d3030ddb6be121f7d2508d77862bb1e484f5cd7f92b25",
//!     "5a4ebf66822b0b2d56bd9dc64ece0bc38ee7844a23ff1d7320a88c5fdb2ad3e2",
//! ]
//! .iter()
//! .map(|hex| hex.parse::<Txid>().unwrap())
//! .collect();
//!
//! // Prove inclusion of the second transaction.
//! let matches = vec![false, true];
//! let tree = PartialMerkleTree::from_txids(&txids, &matches);
//!
//! let mut matched = vec![];
//! let mut indexes = vec![];
//! let root = tree.extract_matches(&mut matched, &mut indexes).unwrap();
//! assert_eq!(matched, vec![txids[1]]);
//! assert_eq!(indexes, vec![1]);
//! # let _ = root;
//! ```

// Coding conventions.
#![warn(missing_docs)]
// More readable than clippy's format.
#![allow(clippy::manual_range_contains)]

/// Rust implementation of the cryptographic hash functions used by Bitcoin.
pub extern crate hashes;

/// Rust wrapper library for Pieter Wuille's libsecp256k1. Implements ECDSA
/// and BIP340 signatures for the SECG elliptic curve group secp256k1 and
/// related utilities.
pub extern crate secp256k1;

mod internal_macros;

pub mod blockdata;
pub mod consensus;
pub mod crypto;
pub mod hash_types;
pub mod merkle_tree;
pub mod taproot;

#[rustfmt::skip]                // Keep public re-exports separate.
#[doc(inline)]
pub use crate::{
    blockdata::script::{Script, ScriptBuf},
    blockdata::transaction::{OutPoint, Sequence, Transaction, TxIn, TxOut},
    blockdata::witness::Witness,
    consensus::encode::VarInt,
    crypto::key::{TapTweak, TweakedPublicKey, UntweakedPublicKey, XOnlyPublicKey},
    crypto::sighash::{EcdsaSighashType, LegacySighash, SegwitV0Sighash, SighashCache},
    hash_types::{Txid, TxMerkleNode, WitnessMerkleNode, Wtxid},
    merkle_tree::{MerkleProofError, PartialMerkleTree},
    taproot::{ControlBlock, LeafVersion, TapTree, TaprootSpendInfo, TaprootWitness},
};
