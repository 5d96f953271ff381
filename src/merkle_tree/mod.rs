// SPDX-License-Identifier: CC0-1.0

//! Bitcoin merkle tree functions.
//!
//! # Examples
//!
//! ```
//! # use bitcoin_commitments::{merkle_tree, Txid, TxMerkleNode};
//! # use bitcoin_commitments::hashes::Hash;
//! # let tx1 = Txid::all_zeros();  // Dummy hash values.
//! # let tx2 = Txid::all_zeros();
//! let tx_hashes = vec![tx1, tx2]; // All the hashes we wish to merkelize.
//! let root: Option<TxMerkleNode> =
//!     merkle_tree::calculate_root(tx_hashes.into_iter().map(|t| t.to_raw_hash()))
//!         .map(|h| h.into());
//! ```

mod block;

use core::cmp::min;
use core::iter;
use std::io::Write;

use crate::consensus::encode::Encodable;
use crate::hashes::Hash;

pub use self::block::{MerkleProofError, PartialMerkleTree};

/// Calculates the merkle root of a list of *hashes*, inline (in place) in
/// `hashes`.
///
/// In most cases, you'll want to use [`calculate_root`] instead. Please note,
/// calling this function trashes the data in `hashes` (i.e. the `hashes` is
/// left in an undefined state at conclusion of this method and should not be
/// used again afterwards).
///
/// # Returns
///
/// - `None` if `hashes` is empty. The merkle root of an empty tree of hashes
///   is undefined.
/// - `Some(hash)` if `hashes` contains one element. A single hash is by
///   definition the merkle root.
/// - `Some(merkle_root)` if length of `hashes` is greater than one.
pub fn calculate_root_inline<T>(hashes: &mut [T]) -> Option<T>
where
    T: Hash + Encodable,
    <T as Hash>::Engine: Write,
{
    match hashes.len() {
        0 => None,
        1 => Some(hashes[0]),
        _ => Some(merkle_root_r(hashes)),
    }
}

/// Calculates the merkle root of an iterator of *hashes*.
///
/// When the number of nodes at any level is odd, the last node is paired with
/// a copy of itself. This duplication rule is consensus: it makes certain
/// distinct leaf lists (a list ending `..., x, y` and one ending
/// `..., x, y, x, y`) commit to the same root. This function deliberately
/// reproduces the ambiguity; callers that accept untrusted leaf lists must
/// guard against duplicate trailing leaves themselves.
///
/// # Returns
///
/// - `None` if `hashes` is empty. The merkle root of an empty tree of hashes
///   is undefined.
/// - `Some(hash)` if `hashes` contains one element. A single hash is by
///   definition the merkle root.
/// - `Some(merkle_root)` if length of `hashes` is greater than one.
pub fn calculate_root<T, I>(mut hashes: I) -> Option<T>
where
    T: Hash + Encodable,
    <T as Hash>::Engine: Write,
    I: Iterator<Item = T>,
{
    let first = hashes.next()?;
    let second = match hashes.next() {
        Some(second) => second,
        None => return Some(first),
    };

    let mut hashes = iter::once(first).chain(iter::once(second)).chain(hashes);

    // We need a local copy to pass to `merkle_root_r`. It's more efficient to
    // do the first loop of processing as we make the copy instead of copying
    // the whole iterator.
    let (min, max) = hashes.size_hint();
    let mut alloc = Vec::with_capacity(max.unwrap_or(min) / 2 + 1);

    while let Some(hash1) = hashes.next() {
        // If the size is odd, use the last element twice.
        let hash2 = hashes.next().unwrap_or(hash1);
        let mut encoder = T::engine();
        hash1.consensus_encode(&mut encoder).expect("in-memory writers don't error");
        hash2.consensus_encode(&mut encoder).expect("in-memory writers don't error");
        alloc.push(T::from_engine(encoder));
    }

    Some(merkle_root_r(&mut alloc))
}

// `hashes` must contain at least one hash.
fn merkle_root_r<T>(hashes: &mut [T]) -> T
where
    T: Hash + Encodable,
    <T as Hash>::Engine: Write,
{
    if hashes.len() == 1 {
        return hashes[0];
    }

    for idx in 0..((hashes.len() + 1) / 2) {
        let idx1 = 2 * idx;
        let idx2 = min(idx1 + 1, hashes.len() - 1);
        let mut encoder = T::engine();
        hashes[idx1].consensus_encode(&mut encoder).expect("in-memory writers don't error");
        hashes[idx2].consensus_encode(&mut encoder).expect("in-memory writers don't error");
        hashes[idx] = T::from_engine(encoder);
    }
    let half_len = hashes.len() / 2 + hashes.len() % 2;

    merkle_root_r(&mut hashes[0..half_len])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash_types::{TxMerkleNode, Txid};
    use crate::hashes::{sha256d, Hash};

    fn dummy_txids(n: usize) -> Vec<Txid> {
        (1..=n).map(|i| format!("{:064x}", i).parse::<Txid>().unwrap()).collect()
    }

    fn root_of(txids: &[Txid]) -> Option<TxMerkleNode> {
        calculate_root(txids.iter().map(|t| t.to_raw_hash())).map(TxMerkleNode::from)
    }

    #[test]
    fn root_of_empty_list_is_undefined() {
        assert_eq!(calculate_root::<sha256d::Hash, _>(core::iter::empty()), None);
        assert_eq!(calculate_root_inline::<sha256d::Hash>(&mut []), None);
    }

    #[test]
    fn root_of_single_hash_is_the_hash() {
        let txids = dummy_txids(1);
        let root = root_of(&txids).unwrap();
        assert_eq!(root.to_byte_array(), txids[0].to_byte_array());
    }

    #[test]
    fn both_root_functions_return_the_same_result() {
        for n in [2usize, 3, 5, 8, 15].iter().copied() {
            let txids = dummy_txids(n);
            let from_iter = root_of(&txids).unwrap();
            let mut raw: Vec<sha256d::Hash> = txids.iter().map(|t| t.to_raw_hash()).collect();
            let inline = calculate_root_inline(&mut raw).unwrap();
            assert_eq!(from_iter.to_byte_array(), inline.to_byte_array());
        }
    }

    #[test]
    fn duplicate_trailing_leaves_share_a_root() {
        // The odd-node duplication rule makes these two distinct transaction
        // lists commit to the same root; upper layers must reject such
        // blocks themselves.
        let three = dummy_txids(3);
        let mut four = three.clone();
        four.push(three[2]);
        assert_eq!(root_of(&three), root_of(&four));
    }
}
