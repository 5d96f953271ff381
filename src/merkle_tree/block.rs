// SPDX-License-Identifier: CC0-1.0
//
// The algorithm is a translation of Bitcoin Core's merkleblock.h and
// merkleblock.cpp.
// Copyright (c) 2009-2010 Satoshi Nakamoto
// Copyright (c) 2009-2018 The Bitcoin Core developers
// SPDX-License-Identifier: MIT

//! Partial merkle trees.
//!
//! Support proofs that transaction(s) belong to a block without transmitting
//! the whole block: the prover reveals only the tree nodes needed to
//! recompute the merkle root from the claimed transactions.

use core::fmt;
use std::io::{self, Write};

use self::MerkleProofError::*;
use crate::blockdata::constants::{MAX_BLOCK_WEIGHT, MIN_TRANSACTION_WEIGHT};
use crate::consensus::encode::{self, Decodable, Encodable};
use crate::hash_types::{TxMerkleNode, Txid};
use crate::hashes::Hash;

/// Data structure that represents a partial merkle tree.
///
/// It represents a subset of the txid's of a known block, in a way that
/// allows recovery of the list of txid's and the merkle root, in an
/// authenticated way.
///
/// The encoding works as follows: we traverse the tree in depth-first order,
/// storing a bit for each traversed node, signifying whether the node is the
/// parent of at least one matched leaf txid (or a matched txid itself). In
/// case we are at the leaf level, or this bit is 0, its merkle node hash is
/// stored, and its children are not explored further. Otherwise, no hash is
/// stored, but we recurse into both (or the only) child branch. During
/// decoding, the same depth-first traversal is performed, consuming bits and
/// hashes as they were written during encoding.
///
/// The serialization is fixed and provides a hard guarantee about the
/// encoded size:
///
///   SIZE <= 10 + ceil(32.25*N)
///
/// Where N represents the number of leaf nodes of the partial tree. N itself
/// is bounded by:
///
///   N <= total_transactions
///   N <= 1 + matched_transactions*tree_height
///
/// The serialization format:
///  - uint32     total_transactions (4 bytes)
///  - varint     number of hashes   (1-3 bytes)
///  - uint256[]  hashes in depth-first order (<= 32*N bytes)
///  - varint     number of bytes of flag bits (1-3 bytes)
///  - byte[]     flag bits, packed per 8 in a byte, least significant bit
///    first (<= 2*N-1 bits)
///
/// The size constraints follow from this.
///
/// Note that the odd-node duplication rule of the block merkle tree carries
/// into proofs: extraction does **not** reject a proof whose left and right
/// subtree hashes coincide, so the known root ambiguity for transaction
/// lists with duplicated trailing entries survives here too. Callers
/// validating untrusted blocks must reject such transaction lists at a layer
/// above this one.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct PartialMerkleTree {
    /// The total number of transactions in the block.
    num_transactions: u32,
    /// node-is-parent-of-matched-txid bits.
    bits: Vec<bool>,
    /// Transaction ids and internal hashes.
    hashes: Vec<TxMerkleNode>,
}

impl PartialMerkleTree {
    /// Returns the total number of transactions in the block.
    pub fn num_transactions(&self) -> u32 { self.num_transactions }

    /// Returns the node-is-parent-of-matched-txid bits of the partial merkle
    /// tree.
    pub fn bits(&self) -> &Vec<bool> { &self.bits }

    /// Returns the transaction ids and internal hashes of the partial merkle
    /// tree.
    pub fn hashes(&self) -> &Vec<TxMerkleNode> { &self.hashes }

    /// Constructs a partial merkle tree.
    ///
    /// The `txids` are the transaction hashes of the block and `matches` is
    /// the contains flags wherever a tx hash should be included in the
    /// proof.
    ///
    /// # Panics
    ///
    /// Panics when `txids` is empty or when `matches` has a different
    /// length; both are caller contract violations, not input validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use bitcoin_commitments::{PartialMerkleTree, Txid};
    ///
    /// // Block 80000.
    /// let txids: Vec<Txid> = [
    ///     "c06fbab289f723c6261d3030ddb6be121f7d2508d77862bb1e484f5cd7f92b25",
    ///     "5a4ebf66822b0b2d56bd9dc64ece0bc38ee7844a23ff1d7320a88c5fdb2ad3e2",
    /// ]
    /// .iter()
    /// .map(|hex| hex.parse::<Txid>().unwrap())
    /// .collect();
    ///
    /// // Select the second transaction.
    /// let matches = vec![false, true];
    /// let tree = PartialMerkleTree::from_txids(&txids, &matches);
    /// assert!(tree.extract_matches(&mut vec![], &mut vec![]).is_ok());
    /// ```
    pub fn from_txids(txids: &[Txid], matches: &[bool]) -> Self {
        // We can never have zero txs in a merkle block, we always need the
        // coinbase tx.
        assert_ne!(txids.len(), 0);
        assert_eq!(txids.len(), matches.len());

        let mut pmt = PartialMerkleTree {
            num_transactions: txids.len() as u32,
            bits: Vec::with_capacity(txids.len()),
            hashes: vec![],
        };
        // calculate height of tree
        let mut height = 0;
        while pmt.calc_tree_width(height) > 1 {
            height += 1;
        }
        // traverse the partial tree
        pmt.traverse_and_build(height, 0, txids, matches);
        pmt
    }

    /// Extracts the matching txid's represented by this partial merkle tree
    /// and their respective indices within the partial tree.
    ///
    /// Returns the merkle root on success. The validation rules are checked
    /// in a fixed order and the first failure wins; see
    /// [`MerkleProofError`] for the individual conditions.
    pub fn extract_matches(
        &self,
        matches: &mut Vec<Txid>,
        indexes: &mut Vec<u32>,
    ) -> Result<TxMerkleNode, MerkleProofError> {
        matches.clear();
        indexes.clear();
        // An empty set will not work
        if self.num_transactions == 0 {
            return Err(NoTransactions);
        };
        // Check for excessively high numbers of transactions: a block weight
        // cannot hold more than this many minimal transactions.
        if self.num_transactions > MAX_BLOCK_WEIGHT / MIN_TRANSACTION_WEIGHT {
            return Err(TooManyTransactions);
        }
        // There can never be more hashes provided than one for every txid.
        if self.hashes.len() as u32 > self.num_transactions {
            return Err(TooManyHashes);
        };
        // There must be at least one bit per node in the partial tree, and
        // at least one node per hash.
        if self.bits.len() < self.hashes.len() {
            return Err(NotEnoughBits);
        };
        // calculate height of tree
        let mut height = 0;
        while self.calc_tree_width(height) > 1 {
            height += 1;
        }
        // traverse the partial tree
        let mut bits_used = 0u32;
        let mut hash_used = 0u32;
        let hash_merkle_root =
            self.traverse_and_extract(height, 0, &mut bits_used, &mut hash_used, matches, indexes)?;
        // Verify that all bits were consumed (except for the padding caused
        // by serializing it as a byte sequence).
        if (bits_used + 7) / 8 != (self.bits.len() as u32 + 7) / 8 {
            return Err(NotAllBitsConsumed);
        }
        // Verify that all hashes were consumed.
        if hash_used != self.hashes.len() as u32 {
            return Err(NotAllHashesConsumed);
        }
        Ok(hash_merkle_root)
    }

    /// Helper function to efficiently calculate the number of nodes at given
    /// height in the merkle tree.
    #[inline]
    fn calc_tree_width(&self, height: u32) -> u32 {
        (self.num_transactions + (1 << height) - 1) >> height
    }

    /// Calculates the hash of a node in the merkle tree (at leaf level: the
    /// txid's themselves).
    fn calc_hash(&self, height: u32, pos: u32, txids: &[Txid]) -> TxMerkleNode {
        if height == 0 {
            // Hash at height 0 is the txid itself
            TxMerkleNode::from_byte_array(txids[pos as usize].to_byte_array())
        } else {
            // Calculate left hash
            let left = self.calc_hash(height - 1, pos * 2, txids);
            // Calculate right hash if not beyond the end of the array - copy
            // left hash otherwise
            let right = if pos * 2 + 1 < self.calc_tree_width(height - 1) {
                self.calc_hash(height - 1, pos * 2 + 1, txids)
            } else {
                left
            };
            // Combine subhashes
            PartialMerkleTree::parent_hash(left, right)
        }
    }

    /// Recursive function that traverses tree nodes, storing the data as
    /// bits and hashes.
    fn traverse_and_build(&mut self, height: u32, pos: u32, txids: &[Txid], matches: &[bool]) {
        // Determine whether this node is the parent of at least one matched
        // txid.
        let mut parent_of_match = false;
        let mut p = pos << height;
        while p < (pos + 1) << height && p < self.num_transactions {
            parent_of_match |= matches[p as usize];
            p += 1;
        }
        // Store as flag bit
        self.bits.push(parent_of_match);

        if height == 0 || !parent_of_match {
            // If at height 0, or nothing interesting below, store hash and
            // stop.
            let hash = self.calc_hash(height, pos, txids);
            self.hashes.push(hash);
        } else {
            // Otherwise, don't store any hash, but descend into the
            // subtrees. The right child only exists if the level is wide
            // enough.
            self.traverse_and_build(height - 1, pos * 2, txids, matches);
            if pos * 2 + 1 < self.calc_tree_width(height - 1) {
                self.traverse_and_build(height - 1, pos * 2 + 1, txids, matches);
            }
        }
    }

    /// Recursive function that traverses tree nodes, consuming the bits and
    /// hashes produced by `traverse_and_build`. It returns the hash of the
    /// respective node and pushes matched leaves with their indices.
    fn traverse_and_extract(
        &self,
        height: u32,
        pos: u32,
        bits_used: &mut u32,
        hash_used: &mut u32,
        matches: &mut Vec<Txid>,
        indexes: &mut Vec<u32>,
    ) -> Result<TxMerkleNode, MerkleProofError> {
        if *bits_used as usize >= self.bits.len() {
            return Err(BitsArrayOverflow);
        }
        let parent_of_match = self.bits[*bits_used as usize];
        *bits_used += 1;
        if height == 0 || !parent_of_match {
            // If at height 0, or nothing interesting below, use stored hash
            // and do not descend.
            if *hash_used as usize >= self.hashes.len() {
                return Err(HashesArrayOverflow);
            }
            let hash = self.hashes[*hash_used as usize];
            *hash_used += 1;
            if height == 0 && parent_of_match {
                // in case of height 0, we have a matched txid
                matches.push(Txid::from_byte_array(hash.to_byte_array()));
                indexes.push(pos);
            }
            Ok(hash)
        } else {
            // otherwise, descend into the subtrees to extract matched txids
            // and hashes
            let left = self.traverse_and_extract(
                height - 1,
                pos * 2,
                bits_used,
                hash_used,
                matches,
                indexes,
            )?;
            let right = if pos * 2 + 1 < self.calc_tree_width(height - 1) {
                self.traverse_and_extract(
                    height - 1,
                    pos * 2 + 1,
                    bits_used,
                    hash_used,
                    matches,
                    indexes,
                )?
            } else {
                // The right subtree does not exist; duplicate the left hash,
                // mirroring root construction.
                left
            };
            // and combine them before returning
            Ok(PartialMerkleTree::parent_hash(left, right))
        }
    }

    /// Helper method to produce SHA256D(left + right).
    fn parent_hash(left: TxMerkleNode, right: TxMerkleNode) -> TxMerkleNode {
        let mut encoder = TxMerkleNode::engine();
        left.consensus_encode(&mut encoder).expect("engines don't error");
        right.consensus_encode(&mut encoder).expect("engines don't error");
        TxMerkleNode::from_engine(encoder)
    }
}

impl Encodable for PartialMerkleTree {
    fn consensus_encode<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let ret = self.num_transactions.consensus_encode(w)? + self.hashes.consensus_encode(w)?;
        let mut bytes: Vec<u8> = vec![0; (self.bits.len() + 7) / 8];
        for p in 0..self.bits.len() {
            bytes[p / 8] |= (self.bits[p] as u8) << (p % 8) as u8;
        }
        Ok(ret + bytes.consensus_encode(w)?)
    }
}

impl Decodable for PartialMerkleTree {
    fn consensus_decode<R: io::Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        let num_transactions: u32 = Decodable::consensus_decode(r)?;
        let hashes: Vec<TxMerkleNode> = Decodable::consensus_decode(r)?;

        let bytes: Vec<u8> = Decodable::consensus_decode(r)?;
        let mut bits: Vec<bool> = vec![false; bytes.len() * 8];

        for (p, bit) in bits.iter_mut().enumerate() {
            *bit = (bytes[p / 8] & (1 << (p % 8) as u8)) != 0;
        }
        Ok(PartialMerkleTree { num_transactions, hashes, bits })
    }
}

/// An error when verifying a transaction inclusion proof.
#[derive(Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum MerkleProofError {
    /// Partial merkle tree contains no transactions.
    NoTransactions,
    /// There are too many transactions.
    TooManyTransactions,
    /// Proof contains more hashes than transactions.
    TooManyHashes,
    /// Proof contains less bits than hashes.
    NotEnoughBits,
    /// Not all bits were consumed.
    NotAllBitsConsumed,
    /// Not all hashes were consumed.
    NotAllHashesConsumed,
    /// Overflowed the bits array.
    BitsArrayOverflow,
    /// Overflowed the hashes array.
    HashesArrayOverflow,
}

impl fmt::Display for MerkleProofError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            NoTransactions => write!(f, "transaction count cannot be zero"),
            TooManyTransactions => write!(f, "too many transactions"),
            TooManyHashes => write!(f, "proof contains more hashes than transactions"),
            NotEnoughBits => write!(f, "proof contains less bits than hashes"),
            NotAllBitsConsumed => write!(f, "not all bits were consumed"),
            NotAllHashesConsumed => write!(f, "not all hashes were consumed"),
            BitsArrayOverflow => write!(f, "overflowed the bits array"),
            HashesArrayOverflow => write!(f, "overflowed the hashes array"),
        }
    }
}

impl std::error::Error for MerkleProofError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            NoTransactions | TooManyTransactions | TooManyHashes | NotEnoughBits
            | NotAllBitsConsumed | NotAllHashesConsumed | BitsArrayOverflow
            | HashesArrayOverflow => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::encode::{deserialize, serialize};
    use crate::merkle_tree;

    fn dummy_txids(n: usize) -> Vec<Txid> {
        (1..=n).map(|i| format!("{:064x}", i).parse::<Txid>().unwrap()).collect()
    }

    fn block_root(txids: &[Txid]) -> TxMerkleNode {
        merkle_tree::calculate_root(txids.iter().map(|t| t.to_raw_hash()))
            .map(TxMerkleNode::from)
            .expect("non-empty txid list")
    }

    /// Deterministic inclusion pattern: every `step`-th transaction, offset
    /// by `phase`.
    fn inclusion_pattern(tx_count: usize, step: usize, phase: usize) -> Vec<bool> {
        (0..tx_count).map(|i| i % step == phase % step).collect()
    }

    fn pmt_test(tx_count: usize) {
        let tx_ids = dummy_txids(tx_count);
        let merkle_root_1 = block_root(&tx_ids);

        // Tree height, for the size guarantee check below.
        let mut height = 0;
        while (tx_count + (1 << height) - 1) >> height > 1 {
            height += 1;
        }

        for &(step, phase) in
            [(1, 0), (2, 0), (2, 1), (3, 2), (7, 3), (tx_count.max(2), tx_count / 2)].iter()
        {
            let matches = inclusion_pattern(tx_count, step, phase);
            let match_txid1: Vec<Txid> = tx_ids
                .iter()
                .zip(matches.iter())
                .filter(|(_, m)| **m)
                .map(|(t, _)| *t)
                .collect();

            // Build the partial merkle tree
            let pmt1 = PartialMerkleTree::from_txids(&tx_ids, &matches);
            let serialized = serialize(&pmt1);

            // Verify PartialMerkleTree's size guarantees
            let n = core::cmp::min(tx_count, 1 + match_txid1.len() * (height + 1));
            assert!(serialized.len() <= 10 + (258 * n + 7) / 8);

            // Deserialize into a tester copy. Note the two are not `==`:
            // the decoded bit vector is padded to whole bytes.
            let pmt2: PartialMerkleTree =
                deserialize(&serialized).expect("could not deserialize own data");

            // Extract merkle root and matched txids from copy
            let mut match_txid2: Vec<Txid> = vec![];
            let mut indexes = vec![];
            let merkle_root_2 = pmt2
                .extract_matches(&mut match_txid2, &mut indexes)
                .expect("could not extract matches");

            // Check that it has the same merkle root as the original, and a
            // valid one
            assert_eq!(merkle_root_1, merkle_root_2);
            assert_ne!(merkle_root_2, TxMerkleNode::all_zeros());

            // check that it contains the matched transactions (in the same
            // order!)
            assert_eq!(match_txid1, match_txid2);
            // check that the indexes match the transaction positions
            let expect_indexes: Vec<u32> = matches
                .iter()
                .enumerate()
                .filter(|(_, m)| **m)
                .map(|(i, _)| i as u32)
                .collect();
            assert_eq!(indexes, expect_indexes);

            // check that byte flips in the hashes change the recovered root
            let mut pmt3 = pmt1.clone();
            let mut damaged = pmt3.hashes[0].to_byte_array();
            damaged[0] ^= 1;
            pmt3.hashes[0] = TxMerkleNode::from_byte_array(damaged);
            let merkle_root_3 = pmt3
                .extract_matches(&mut vec![], &mut vec![])
                .expect("structure is still sound");
            assert_ne!(merkle_root_3, merkle_root_1);
        }
    }

    #[test]
    fn pmt_tests() {
        for &n in [1usize, 4, 7, 17, 56, 100, 127, 256].iter() {
            pmt_test(n);
        }
    }

    #[test]
    fn tree_width_at_tree_height_is_one() {
        for n in 1u32..=70 {
            let pmt = PartialMerkleTree {
                num_transactions: n,
                bits: vec![],
                hashes: vec![],
            };
            let mut height = 0;
            while pmt.calc_tree_width(height) > 1 {
                height += 1;
            }
            assert_eq!(pmt.calc_tree_width(height), 1);
            // And the level below the root (when it exists) is wider.
            if n > 1 {
                assert!(pmt.calc_tree_width(height - 1) > 1);
            }
        }
    }

    #[test]
    fn pmt_duplicate_trailing_txids_not_rejected() {
        // The duplication ambiguity must survive proof extraction; the
        // guard against it belongs to block validation, not to this engine.
        let txids = dummy_txids(3);
        let mut padded = txids.clone();
        padded.push(txids[2]);

        let pmt = PartialMerkleTree::from_txids(&padded, &[false, false, true, true]);
        let root = pmt.extract_matches(&mut vec![], &mut vec![]).expect("no duplicate guard here");
        assert_eq!(root, block_root(&txids));
    }

    #[test]
    fn pmt_rejects_zero_transactions() {
        let pmt = PartialMerkleTree { num_transactions: 0, bits: vec![], hashes: vec![] };
        assert_eq!(pmt.extract_matches(&mut vec![], &mut vec![]), Err(NoTransactions));
    }

    #[test]
    fn pmt_rejects_absurd_transaction_count() {
        let txids = dummy_txids(1);
        let mut pmt = PartialMerkleTree::from_txids(&txids, &[true]);
        pmt.num_transactions = MAX_BLOCK_WEIGHT / MIN_TRANSACTION_WEIGHT + 1;
        assert_eq!(pmt.extract_matches(&mut vec![], &mut vec![]), Err(TooManyTransactions));
    }

    #[test]
    fn pmt_rejects_more_hashes_than_transactions() {
        let txids = dummy_txids(1);
        let mut pmt = PartialMerkleTree::from_txids(&txids, &[true]);
        let extra = pmt.hashes[0];
        pmt.hashes.push(extra);
        pmt.bits.push(false);
        assert_eq!(pmt.extract_matches(&mut vec![], &mut vec![]), Err(TooManyHashes));
    }

    #[test]
    fn pmt_rejects_fewer_bits_than_hashes() {
        let txids = dummy_txids(4);
        // Only the first txid matches: bits = [1, 1, 1, 0, 0], hashes = 3.
        let mut pmt = PartialMerkleTree::from_txids(&txids, &[true, false, false, false]);
        assert_eq!(pmt.hashes.len(), 3);
        pmt.bits.truncate(2);
        assert_eq!(pmt.extract_matches(&mut vec![], &mut vec![]), Err(NotEnoughBits));
    }

    #[test]
    fn pmt_rejects_short_bit_stream() {
        let txids = dummy_txids(4);
        let mut pmt = PartialMerkleTree::from_txids(&txids, &[true, false, false, false]);
        // Keep as many bits as hashes so the up-front check passes, but make
        // the traversal run out mid-tree.
        pmt.bits.truncate(3);
        assert_eq!(pmt.extract_matches(&mut vec![], &mut vec![]), Err(BitsArrayOverflow));
    }

    #[test]
    fn pmt_rejects_missing_hash() {
        let txids = dummy_txids(4);
        let mut pmt = PartialMerkleTree::from_txids(&txids, &[true, false, false, false]);
        pmt.hashes.pop();
        // Up-front counts still satisfied (2 hashes <= 4 txs, 5 bits >= 2
        // hashes); the traversal hits the missing hash.
        assert_eq!(pmt.extract_matches(&mut vec![], &mut vec![]), Err(HashesArrayOverflow));
    }

    #[test]
    fn pmt_rejects_unused_hash() {
        let txids = dummy_txids(4);
        let mut pmt = PartialMerkleTree::from_txids(&txids, &[true, false, false, false]);
        // One extra hash, with a padding bit that stays inside the same
        // flag byte so the bit-consumption check still passes.
        let extra = pmt.hashes[0];
        pmt.hashes.push(extra);
        pmt.bits.push(false);
        assert_eq!(pmt.extract_matches(&mut vec![], &mut vec![]), Err(NotAllHashesConsumed));
    }

    #[test]
    fn pmt_rejects_trailing_garbage_bits() {
        let txids = dummy_txids(4);
        let mut pmt = PartialMerkleTree::from_txids(&txids, &[true, false, false, false]);
        // A full extra byte of unused flag bits must be rejected.
        pmt.bits.extend(core::iter::repeat(false).take(8));
        assert_eq!(pmt.extract_matches(&mut vec![], &mut vec![]), Err(NotAllBitsConsumed));
    }

    #[test]
    fn pmt_wire_format_is_lsb_first() {
        let txids = dummy_txids(2);
        let pmt = PartialMerkleTree::from_txids(&txids, &[true, false]);
        // bits: root=1, leaf0=1, leaf1=0 -> packed byte 0b0000_0011.
        let ser = serialize(&pmt);
        // u32 count, varint(2), two hashes, varint(1), flag byte.
        assert_eq!(ser.len(), 4 + 1 + 64 + 1 + 1);
        assert_eq!(ser[0..4], [2, 0, 0, 0]);
        assert_eq!(*ser.last().unwrap(), 0b0000_0011);
    }
}
