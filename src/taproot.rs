// SPDX-License-Identifier: CC0-1.0

//! Bitcoin Taproot.
//!
//! This module provides support for taproot tagged hashes, the script
//! commitment tree binding a taproot output key to its alternative spending
//! scripts, and verification of script-path witness data against that
//! commitment. No script execution happens here; a spend that passes
//! [`ControlBlock::verify_taproot_commitment`] still needs its leaf script
//! run by an interpreter.

use core::fmt;
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use secp256k1::{Scalar, Secp256k1, Verification};

use crate::blockdata::script::{Script, ScriptBuf};
use crate::blockdata::witness::Witness;
use crate::consensus::Encodable;
use crate::crypto::key::{TapTweak, TweakedPublicKey, UntweakedPublicKey, XOnlyPublicKey};
use crate::hashes::{sha256t_hash_newtype, Hash, HashEngine};

/// The SHA-256 midstate value for the TapLeaf hash.
const MIDSTATE_TAPLEAF: [u8; 32] = [
    156, 224, 228, 230, 124, 17, 108, 57, 56, 179, 202, 242, 195, 15, 80, 137, 211, 243, 147, 108,
    71, 99, 110, 96, 125, 179, 62, 234, 221, 198, 240, 201,
];
// 9ce0e4e67c116c3938b3caf2c30f5089d3f3936c47636e607db33eeaddc6f0c9

/// The SHA-256 midstate value for the TapBranch hash.
const MIDSTATE_TAPBRANCH: [u8; 32] = [
    35, 168, 101, 169, 184, 164, 13, 167, 151, 124, 30, 4, 196, 158, 36, 111, 181, 190, 19, 118,
    157, 36, 201, 183, 181, 131, 181, 212, 168, 210, 38, 210,
];
// 23a865a9b8a40da7977c1e04c49e246fb5be13769d24c9b7b583b5d4a8d226d2

/// The SHA-256 midstate value for the TapTweak hash.
const MIDSTATE_TAPTWEAK: [u8; 32] = [
    209, 41, 162, 243, 112, 28, 101, 93, 101, 131, 182, 195, 185, 65, 151, 39, 149, 244, 226, 50,
    148, 253, 84, 244, 162, 174, 141, 133, 71, 202, 89, 11,
];
// d129a2f3701c655d6583b6c3b941972795f4e23294fd54f4a2ae8d8547ca590b

// Taproot test vectors from BIP-341 state the hashes without any reversing
#[rustfmt::skip]
sha256t_hash_newtype!(TapLeafHash, TapLeafTag, MIDSTATE_TAPLEAF, 64,
    doc="Taproot-tagged hash with tag \"TapLeaf\".

This is used for computing tapscript script spend hash.", forward
);
#[rustfmt::skip]
sha256t_hash_newtype!(TapNodeHash, TapBranchTag, MIDSTATE_TAPBRANCH, 64,
    doc="Tagged hash used in taproot trees; see BIP-340 for tagging rules", forward
);
#[rustfmt::skip]
sha256t_hash_newtype!(TapTweakHash, TapTweakTag, MIDSTATE_TAPTWEAK, 64,
    doc="Taproot-tagged hash with tag \"TapTweak\".

This hash type is used while computing the tweaked public key", forward
);

impl TapTweakHash {
    /// Creates a new BIP341 [`TapTweakHash`] from key and tweak. Produces
    /// `H_taptweak(P||R)` where `P` is the internal key and `R` is the
    /// merkle root.
    pub fn from_key_and_tweak(
        internal_key: UntweakedPublicKey,
        merkle_root: Option<TapNodeHash>,
    ) -> TapTweakHash {
        let mut eng = TapTweakHash::engine();
        // always hash the key
        eng.input(&internal_key.serialize());
        if let Some(h) = merkle_root {
            eng.input(h.as_ref());
        } else {
            // nothing to hash
        }
        TapTweakHash::from_engine(eng)
    }

    /// Converts a `TapTweakHash` into a `Scalar` ready for use with key
    /// tweaking API.
    pub fn to_scalar(self) -> Scalar {
        // This is statistically extremely unlikely to panic.
        Scalar::from_be_bytes(self.to_byte_array()).expect("hash value greater than curve order")
    }
}

impl TapLeafHash {
    /// Computes the leaf hash from components: the leaf version byte
    /// followed by the compact-size-prefixed script.
    pub fn from_script(script: &Script, ver: LeafVersion) -> TapLeafHash {
        let mut eng = TapLeafHash::engine();
        ver.to_consensus().consensus_encode(&mut eng).expect("engines don't error");
        script.consensus_encode(&mut eng).expect("engines don't error");
        TapLeafHash::from_engine(eng)
    }
}

impl From<TapLeafHash> for TapNodeHash {
    fn from(leaf: TapLeafHash) -> TapNodeHash { TapNodeHash::from_byte_array(leaf.to_byte_array()) }
}

impl TapNodeHash {
    /// Computes branch hash given two hashes of the nodes underneath it.
    ///
    /// The two child hashes are sorted byte-wise before hashing, making the
    /// branch commitment independent of the order its children are given
    /// in.
    pub fn from_node_hashes(a: TapNodeHash, b: TapNodeHash) -> TapNodeHash {
        let mut eng = TapNodeHash::engine();
        if a < b {
            eng.input(a.as_ref());
            eng.input(b.as_ref());
        } else {
            eng.input(b.as_ref());
            eng.input(a.as_ref());
        };
        TapNodeHash::from_engine(eng)
    }

    /// Assumes the given 32 byte array as hidden [`TapNodeHash`].
    ///
    /// Similar to `TapNodeHash::from_byte_array`, but explicitly conveys
    /// that the hash is constructed from a hidden node. This also has better
    /// ergonomics because it does not require the caller to import the Hash
    /// trait.
    pub fn assume_hidden(hash: [u8; 32]) -> TapNodeHash { TapNodeHash::from_byte_array(hash) }

    /// Computes the [`TapNodeHash`] from a script and a leaf version.
    pub fn from_script(script: &Script, ver: LeafVersion) -> TapNodeHash {
        TapNodeHash::from(TapLeafHash::from_script(script, ver))
    }
}

/// Maximum depth of a taproot tree script spend path.
pub const TAPROOT_CONTROL_MAX_NODE_COUNT: usize = 128;
/// Size of a taproot control node.
pub const TAPROOT_CONTROL_NODE_SIZE: usize = 32;
/// Tapleaf mask for getting the leaf version from first byte of control
/// block.
pub const TAPROOT_LEAF_MASK: u8 = 0xfe;
/// Tapscript leaf version.
pub const TAPROOT_LEAF_TAPSCRIPT: u8 = 0xc0;
/// Taproot annex prefix.
pub const TAPROOT_ANNEX_PREFIX: u8 = 0x50;
/// Tapscript control base size.
pub const TAPROOT_CONTROL_BASE_SIZE: usize = 33;
/// Tapscript control max size.
pub const TAPROOT_CONTROL_MAX_SIZE: usize =
    TAPROOT_CONTROL_BASE_SIZE + TAPROOT_CONTROL_NODE_SIZE * TAPROOT_CONTROL_MAX_NODE_COUNT;

// type alias for versioned tap script corresponding merkle proof
type ScriptMerkleProofMap = BTreeMap<(ScriptBuf, LeafVersion), BTreeSet<TaprootMerkleBranch>>;

/// The taproot commitment tree, a binary tree of spending scripts.
///
/// Branch commitments are invariant under swapping the two children
/// (children are hash-sorted before combining), leaves commit to a script
/// and its version, and a [`TapTree::Hidden`] node stands in for a pruned
/// subtree of which only the node hash is known (e.g. when working from a
/// merkle proof instead of the full tree).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TapTree {
    /// A pair of subtrees.
    Branch(Box<TapTree>, Box<TapTree>),
    /// A script leaf with its version.
    Leaf(ScriptBuf, LeafVersion),
    /// A pruned subtree known only by its node hash.
    Hidden(TapNodeHash),
}

impl TapTree {
    /// Creates a leaf with the default tapscript leaf version.
    pub fn leaf(script: ScriptBuf) -> TapTree { TapTree::Leaf(script, LeafVersion::TapScript) }

    /// Creates a leaf with the given leaf version.
    pub fn leaf_with_ver(script: ScriptBuf, ver: LeafVersion) -> TapTree {
        TapTree::Leaf(script, ver)
    }

    /// Creates a branch over two subtrees.
    pub fn branch(left: TapTree, right: TapTree) -> TapTree {
        TapTree::Branch(Box::new(left), Box::new(right))
    }

    /// Computes the commitment hash of this (sub)tree.
    pub fn node_hash(&self) -> TapNodeHash {
        match self {
            TapTree::Branch(left, right) =>
                TapNodeHash::from_node_hashes(left.node_hash(), right.node_hash()),
            TapTree::Leaf(script, ver) => TapNodeHash::from_script(script, *ver),
            TapTree::Hidden(hash) => *hash,
        }
    }

    /// Returns whether the tree contains any hidden (pruned) nodes.
    pub fn has_hidden_nodes(&self) -> bool {
        match self {
            TapTree::Branch(left, right) => left.has_hidden_nodes() || right.has_hidden_nodes(),
            TapTree::Leaf(..) => false,
            TapTree::Hidden(_) => true,
        }
    }

    /// Returns every known script leaf together with its merkle proof, in
    /// depth-first order. Hidden subtrees contribute no leaves (their hash
    /// still participates in the siblings of other leaves).
    ///
    /// # Errors
    ///
    /// [`TaprootError::InvalidMerkleTreeDepth`] if any leaf sits deeper than
    /// [`TAPROOT_CONTROL_MAX_NODE_COUNT`] levels.
    pub fn script_leaves(&self) -> Result<Vec<ScriptLeaf>, TaprootError> {
        let mut leaves = Vec::new();
        let mut path = Vec::new();
        self.append_leaves(&mut path, &mut leaves)?;
        Ok(leaves)
    }

    fn append_leaves(
        &self,
        path: &mut Vec<TapNodeHash>,
        leaves: &mut Vec<ScriptLeaf>,
    ) -> Result<(), TaprootError> {
        match self {
            TapTree::Branch(left, right) => {
                if path.len() >= TAPROOT_CONTROL_MAX_NODE_COUNT {
                    return Err(TaprootError::InvalidMerkleTreeDepth(path.len() + 1));
                }
                path.push(right.node_hash());
                left.append_leaves(path, leaves)?;
                path.pop();
                path.push(left.node_hash());
                right.append_leaves(path, leaves)?;
                path.pop();
            }
            TapTree::Leaf(script, ver) => {
                // The control block lists siblings leaf to root; the path
                // was collected root to leaf.
                let mut branch = path.clone();
                branch.reverse();
                leaves.push(ScriptLeaf {
                    script: script.clone(),
                    version: *ver,
                    merkle_branch: TaprootMerkleBranch(branch),
                });
            }
            TapTree::Hidden(_) => {}
        }
        Ok(())
    }
}

/// A script leaf of a taproot commitment tree together with the sibling
/// hashes proving its inclusion under the tree root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScriptLeaf {
    /// The script.
    pub script: ScriptBuf,
    /// The version of the script leaf.
    pub version: LeafVersion,
    /// The merkle proof (hashing partners) to get this leaf, ordered leaf to
    /// root.
    pub merkle_branch: TaprootMerkleBranch,
}

impl ScriptLeaf {
    /// Computes the leaf hash for this leaf.
    pub fn leaf_hash(&self) -> TapLeafHash { TapLeafHash::from_script(&self.script, self.version) }
}

/// Represents taproot spending information.
///
/// Taproot output corresponds to a combination of a single public key
/// condition (known as the internal key), and zero or more general
/// conditions encoded in scripts organized in the form of a binary tree.
///
/// Taproot can be spent by either:
/// - Spending using the key path i.e., with secret key corresponding to the
///   tweaked `output_key`.
/// - By satisfying any of the scripts in the script spend path. Each script
///   can be satisfied by providing a witness stack consisting of the
///   script's inputs, plus the script itself and the control block.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaprootSpendInfo {
    /// The BIP341 internal key.
    internal_key: UntweakedPublicKey,
    /// The merkle root of the script tree (None if there are no scripts).
    merkle_root: Option<TapNodeHash>,
    /// The parity of the final output pubkey as per BIP 341.
    output_key_parity: secp256k1::Parity,
    /// The tweaked output key.
    output_key: TweakedPublicKey,
    /// Map from (script, leaf_version) to (sets of) [`TaprootMerkleBranch`].
    /// More than one control block for a given script is only possible if it
    /// appears in multiple branches of the tree. In all cases, keeping one
    /// should be enough for spending funds, but we keep all of the paths so
    /// that a full tree can be constructed again from spending data if
    /// required.
    script_map: ScriptMerkleProofMap,
}

impl TaprootSpendInfo {
    /// Creates a new key spend with `internal_key` and `merkle_root`.
    /// Provide [`None`] for the `merkle_root` if there is no script path.
    ///
    /// *Note*: As per BIP341
    ///
    /// When the merkle root is [`None`], the output key commits to an
    /// unspendable script path instead of having no script path. This is
    /// achieved by computing the output key point as
    /// `Q = P + int(hashTapTweak(bytes(P)))G`.
    ///
    /// Refer to BIP 341 footnote ('Why should the output key always have a
    /// taproot commitment, even if there is no script path?') for more
    /// details.
    pub fn new_key_spend<C: Verification>(
        secp: &Secp256k1<C>,
        internal_key: UntweakedPublicKey,
        merkle_root: Option<TapNodeHash>,
    ) -> Self {
        let (output_key, parity) = internal_key.tap_tweak(secp, merkle_root);
        Self {
            internal_key,
            merkle_root,
            output_key_parity: parity,
            output_key,
            script_map: BTreeMap::new(),
        }
    }

    /// Computes the [`TaprootSpendInfo`] from `internal_key` and `tree`.
    ///
    /// Hidden subtrees are committed to but naturally yield no spendable
    /// script entries.
    pub fn from_tree<C: Verification>(
        secp: &Secp256k1<C>,
        internal_key: UntweakedPublicKey,
        tree: &TapTree,
    ) -> Result<TaprootSpendInfo, TaprootError> {
        let leaves = tree.script_leaves()?;
        // Create as if it is a key spend path with the tree's merkle root.
        let mut info = TaprootSpendInfo::new_key_spend(secp, internal_key, Some(tree.node_hash()));
        for leaf in leaves {
            let set = info
                .script_map
                .entry((leaf.script, leaf.version))
                .or_insert_with(BTreeSet::new);
            set.insert(leaf.merkle_branch);
        }
        Ok(info)
    }

    /// Returns the `TapTweakHash` for this [`TaprootSpendInfo`] i.e., the
    /// tweak using `internal_key` and `merkle_root`.
    pub fn tap_tweak(&self) -> TapTweakHash {
        TapTweakHash::from_key_and_tweak(self.internal_key, self.merkle_root)
    }

    /// Returns the internal key for this [`TaprootSpendInfo`].
    pub fn internal_key(&self) -> UntweakedPublicKey { self.internal_key }

    /// Returns the merkle root for this [`TaprootSpendInfo`].
    pub fn merkle_root(&self) -> Option<TapNodeHash> { self.merkle_root }

    /// Returns the output key (the key used in script pubkey) for this
    /// [`TaprootSpendInfo`].
    pub fn output_key(&self) -> TweakedPublicKey { self.output_key }

    /// Returns the parity of the output key. See also
    /// [`TaprootSpendInfo::output_key`].
    pub fn output_key_parity(&self) -> secp256k1::Parity { self.output_key_parity }

    /// Returns the internal script map.
    pub fn as_script_map(&self) -> &ScriptMerkleProofMap { &self.script_map }

    /// Constructs a [`ControlBlock`] for particular script with the given
    /// version.
    ///
    /// # Returns
    ///
    /// - If there are multiple control blocks possible, returns the shortest
    ///   one.
    /// - If the script is not contained in the [`TaprootSpendInfo`], returns
    ///   `None`.
    pub fn control_block(&self, script_ver: &(ScriptBuf, LeafVersion)) -> Option<ControlBlock> {
        let merkle_branch_set = self.script_map.get(script_ver)?;
        // Choose the smallest one amongst the multiple script maps
        let smallest = merkle_branch_set
            .iter()
            .min_by(|x, y| x.0.len().cmp(&y.0.len()))
            .expect("invariant: script map key must contain non-empty set value");
        Some(ControlBlock {
            internal_key: self.internal_key,
            output_key_parity: self.output_key_parity,
            leaf_version: script_ver.1,
            merkle_branch: smallest.clone(),
        })
    }
}

impl From<TaprootSpendInfo> for TapTweakHash {
    fn from(spend_info: TaprootSpendInfo) -> TapTweakHash { spend_info.tap_tweak() }
}

impl From<&TaprootSpendInfo> for TapTweakHash {
    fn from(spend_info: &TaprootSpendInfo) -> TapTweakHash { spend_info.tap_tweak() }
}

/// The merkle proof for inclusion of a tree in a taptree hash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TaprootMerkleBranch(Vec<TapNodeHash>);

impl TaprootMerkleBranch {
    /// Returns a reference to the inner vector of hashes.
    pub fn as_inner(&self) -> &[TapNodeHash] { &self.0 }

    /// Returns the number of nodes in this merkle proof.
    pub fn len(&self) -> usize { self.0.len() }

    /// Checks if this merkle proof is empty.
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Decodes bytes from control block.
    ///
    /// This reads the branch as encoded in the control block: the
    /// concatenated 32B byte chunks - one for each hash.
    ///
    /// # Errors
    ///
    /// The function returns an error if the number of bytes is not an
    /// integer multiple of 32 or if the number of hashes exceeds 128.
    pub fn decode(sl: &[u8]) -> Result<Self, TaprootError> {
        if sl.len() % TAPROOT_CONTROL_NODE_SIZE != 0 {
            Err(TaprootError::InvalidMerkleBranchSize(sl.len()))
        } else if sl.len() > TAPROOT_CONTROL_NODE_SIZE * TAPROOT_CONTROL_MAX_NODE_COUNT {
            Err(TaprootError::InvalidMerkleTreeDepth(sl.len() / TAPROOT_CONTROL_NODE_SIZE))
        } else {
            let inner = sl
                .chunks_exact(TAPROOT_CONTROL_NODE_SIZE)
                .map(|chunk| {
                    TapNodeHash::from_slice(chunk)
                        .expect("chunks_exact always returns the correct size")
                })
                .collect();

            Ok(TaprootMerkleBranch(inner))
        }
    }

    /// Creates a merkle proof from list of hashes.
    ///
    /// # Errors
    ///
    /// If the proof length is more than [`TAPROOT_CONTROL_MAX_NODE_COUNT`]
    /// (128).
    fn from_collection<T: AsRef<[TapNodeHash]> + Into<Vec<TapNodeHash>>>(
        collection: T,
    ) -> Result<Self, TaprootError> {
        if collection.as_ref().len() > TAPROOT_CONTROL_MAX_NODE_COUNT {
            Err(TaprootError::InvalidMerkleTreeDepth(collection.as_ref().len()))
        } else {
            Ok(TaprootMerkleBranch(collection.into()))
        }
    }

    /// Serializes to a writer.
    ///
    /// # Returns
    ///
    /// The number of bytes written to the writer.
    pub fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize> {
        for hash in self.0.iter() {
            writer.write_all(hash.as_ref())?;
        }
        Ok(self.0.len() * TAPROOT_CONTROL_NODE_SIZE)
    }

    /// Serializes `self` as bytes.
    pub fn serialize(&self) -> Vec<u8> {
        self.0.iter().flat_map(|e| e.as_byte_array()).copied().collect::<Vec<u8>>()
    }

    /// Returns the inner list of hashes.
    pub fn into_inner(self) -> Vec<TapNodeHash> { self.0 }
}

impl core::convert::TryFrom<Vec<TapNodeHash>> for TaprootMerkleBranch {
    type Error = TaprootError;

    fn try_from(v: Vec<TapNodeHash>) -> Result<Self, Self::Error> {
        TaprootMerkleBranch::from_collection(v)
    }
}

impl From<TaprootMerkleBranch> for Vec<TapNodeHash> {
    fn from(branch: TaprootMerkleBranch) -> Self { branch.0 }
}

/// Control block data structure used in Tapscript satisfaction.
///
/// The control block is the last witness element of a script path spend
/// (after removing the optional annex): the leaf-version-plus-parity byte,
/// the 32-byte internal key, and zero or more 32-byte sibling hashes
/// forming the merkle inclusion proof of the leaf, ordered leaf to root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ControlBlock {
    /// The tapleaf version.
    pub leaf_version: LeafVersion,
    /// The parity of the output key (NOT THE INTERNAL KEY WHICH IS ALWAYS
    /// XONLY).
    pub output_key_parity: secp256k1::Parity,
    /// The internal key.
    pub internal_key: UntweakedPublicKey,
    /// The merkle proof of a script associated with this leaf.
    pub merkle_branch: TaprootMerkleBranch,
}

impl ControlBlock {
    /// Decodes bytes representing a `ControlBlock`.
    ///
    /// This is an extra witness element that provides the proof that taproot
    /// script pubkey is correctly computed with some specified leaf hash.
    /// This is the last element in taproot witness when spending an output
    /// via script path.
    ///
    /// # Errors
    ///
    /// - [`TaprootError::InvalidControlBlockSize`] if `sl` is not of size
    ///   1 + 32 + 32N for any N >= 0.
    /// - [`TaprootError::InvalidTaprootLeafVersion`] if the leaf version
    ///   bits of the first byte do not form a valid leaf version.
    /// - [`TaprootError::InvalidInternalKey`] if internal key is invalid
    ///   (the first 32 bytes after the parity byte).
    /// - [`TaprootError::InvalidMerkleTreeDepth`] if the merkle tree is too
    ///   deep (more than 128 levels).
    pub fn decode(sl: &[u8]) -> Result<ControlBlock, TaprootError> {
        if sl.len() < TAPROOT_CONTROL_BASE_SIZE
            || (sl.len() - TAPROOT_CONTROL_BASE_SIZE) % TAPROOT_CONTROL_NODE_SIZE != 0
        {
            return Err(TaprootError::InvalidControlBlockSize(sl.len()));
        }
        let output_key_parity = secp256k1::Parity::from_i32((sl[0] & 1) as i32)
            .map_err(TaprootError::InvalidParity)?;
        let leaf_version = LeafVersion::from_consensus(sl[0] & TAPROOT_LEAF_MASK)?;
        let internal_key = UntweakedPublicKey::from_slice(&sl[1..TAPROOT_CONTROL_BASE_SIZE])
            .map_err(TaprootError::InvalidInternalKey)?;
        let merkle_branch = TaprootMerkleBranch::decode(&sl[TAPROOT_CONTROL_BASE_SIZE..])?;
        Ok(ControlBlock { leaf_version, output_key_parity, internal_key, merkle_branch })
    }

    /// Returns the size of control block. Faster and more efficient than
    /// calling `Self::serialize().len()`. Can be handy for fee estimation.
    pub fn size(&self) -> usize {
        TAPROOT_CONTROL_BASE_SIZE + TAPROOT_CONTROL_NODE_SIZE * self.merkle_branch.as_inner().len()
    }

    /// Serializes to a writer.
    ///
    /// # Returns
    ///
    /// The number of bytes written to the writer.
    pub fn encode<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<usize> {
        let first_byte: u8 =
            i32::from(self.output_key_parity) as u8 | self.leaf_version.to_consensus();
        writer.write_all(&[first_byte])?;
        writer.write_all(&self.internal_key.serialize())?;
        self.merkle_branch.encode(writer)?;
        Ok(self.size())
    }

    /// Serializes the control block.
    ///
    /// This would be required when using [`ControlBlock`] as a witness
    /// element while spending an output via script path. This serialization
    /// does not include the varint prefix that would be applied when
    /// encoding this element as a witness.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.size());
        self.encode(&mut buf).expect("writers don't error");
        buf
    }

    /// Verifies that a control block is correct proof for a given output key
    /// and script.
    ///
    /// Only checks that script is contained inside the taptree described by
    /// output key. Full verification must also execute the script with
    /// witness data.
    ///
    /// The check recomputes the merkle root by folding the leaf hash with
    /// each sibling hash in proof order, recomputes the tweak from the
    /// claimed internal key and that root, and then requires that adding the
    /// tweak to the internal key yields exactly `output_key` *with* the
    /// parity recorded in this control block.
    pub fn verify_taproot_commitment<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        output_key: XOnlyPublicKey,
        script: &Script,
    ) -> bool {
        // compute the script hash
        // Initially the curr_hash is the leaf hash
        let mut curr_hash = TapNodeHash::from_script(script, self.leaf_version);
        // Verify the proof
        for elem in self.merkle_branch.as_inner() {
            // Recalculate the curr hash as parent hash
            curr_hash = TapNodeHash::from_node_hashes(curr_hash, *elem);
        }
        // compute the taptweak
        let tweak =
            TapTweakHash::from_key_and_tweak(self.internal_key, Some(curr_hash)).to_scalar();
        self.internal_key.tweak_add_check(secp, &output_key, self.output_key_parity, tweak)
    }
}

/// Inner type representing future (non-tapscript) leaf versions. See
/// [`LeafVersion::Future`].
///
/// NB: NO PUBLIC CONSTRUCTOR! The only way to construct this is by
/// converting `u8` to [`LeafVersion`] and then extracting it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct FutureLeafVersion(u8);

impl FutureLeafVersion {
    pub(self) fn from_consensus(version: u8) -> Result<FutureLeafVersion, TaprootError> {
        match version {
            TAPROOT_LEAF_TAPSCRIPT => unreachable!(
                "FutureLeafVersion::from_consensus should be never called for 0xC0 value"
            ),
            TAPROOT_ANNEX_PREFIX =>
                Err(TaprootError::InvalidTaprootLeafVersion(TAPROOT_ANNEX_PREFIX)),
            odd if odd & 0xFE != odd => Err(TaprootError::InvalidTaprootLeafVersion(odd)),
            even => Ok(FutureLeafVersion(even)),
        }
    }

    /// Returns the consensus representation of this [`FutureLeafVersion`].
    #[inline]
    pub fn to_consensus(self) -> u8 { self.0 }
}

impl fmt::Display for FutureLeafVersion {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { fmt::Display::fmt(&self.0, f) }
}

/// The leaf version for tapleafs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LeafVersion {
    /// BIP-342 tapscript.
    TapScript,

    /// Future leaf version.
    Future(FutureLeafVersion),
}

impl LeafVersion {
    /// Creates a [`LeafVersion`] from consensus byte representation.
    ///
    /// # Errors
    ///
    /// - If the last bit of the `version` is odd.
    /// - If the `version` is 0x50 ([`TAPROOT_ANNEX_PREFIX`]).
    pub fn from_consensus(version: u8) -> Result<Self, TaprootError> {
        match version {
            TAPROOT_LEAF_TAPSCRIPT => Ok(LeafVersion::TapScript),
            TAPROOT_ANNEX_PREFIX =>
                Err(TaprootError::InvalidTaprootLeafVersion(TAPROOT_ANNEX_PREFIX)),
            future => FutureLeafVersion::from_consensus(future).map(LeafVersion::Future),
        }
    }

    /// Returns the consensus representation of this [`LeafVersion`].
    pub fn to_consensus(self) -> u8 {
        match self {
            LeafVersion::TapScript => TAPROOT_LEAF_TAPSCRIPT,
            LeafVersion::Future(version) => version.to_consensus(),
        }
    }
}

impl fmt::Display for LeafVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self, f.alternate()) {
            (LeafVersion::TapScript, true) => f.write_str("tapscript"),
            (LeafVersion::TapScript, false) => fmt::Display::fmt(&TAPROOT_LEAF_TAPSCRIPT, f),
            (LeafVersion::Future(version), true) =>
                write!(f, "future_script_{:#02x}", version.0),
            (LeafVersion::Future(version), false) => fmt::Display::fmt(version, f),
        }
    }
}

/// A taproot input witness, classified from the tail of the witness stack.
///
/// Per BIP341: after removing an optional trailing annex (an element whose
/// first byte is 0x50, only considered when at least two elements remain), a
/// single remaining element is a key path spend; otherwise the last two
/// elements are the control block and the leaf script, and everything before
/// them is the script's initial stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaprootWitness {
    /// Key path spend.
    KeySpend {
        /// The signature-like payload for the tweaked output key.
        signature: Vec<u8>,
        /// The annex, including its 0x50 prefix byte, if present.
        annex: Option<Vec<u8>>,
    },
    /// Script path spend with its control data.
    ScriptSpend(ScriptPathData),
}

impl TaprootWitness {
    /// Classifies a witness stack as a taproot spend.
    ///
    /// Returns `None` when the stack cannot be interpreted as either spend
    /// form: it is empty, the control block does not decode (bad size,
    /// invalid x-only internal key, proof tail not a multiple of 32, bad
    /// leaf version), or the leaf script has malformed pushes.
    pub fn from_witness(witness: &Witness) -> Option<TaprootWitness> {
        let mut elements = witness.to_vec();
        let mut annex = None;
        if elements.len() >= 2
            && elements.last().map_or(false, |e| e.first() == Some(&TAPROOT_ANNEX_PREFIX))
        {
            annex = elements.pop();
        }
        match elements.len() {
            0 => None,
            1 => Some(TaprootWitness::KeySpend {
                signature: elements.pop().expect("length checked above"),
                annex,
            }),
            _ => {
                let control_block =
                    ControlBlock::decode(&elements.pop().expect("length checked above")).ok()?;
                let script = ScriptBuf::from(elements.pop().expect("length checked above"));
                if !script.is_well_formed() {
                    return None;
                }
                Some(TaprootWitness::ScriptSpend(ScriptPathData {
                    stack: elements,
                    script,
                    control_block,
                    annex,
                }))
            }
        }
    }
}

/// Witness data for a taproot script path spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptPathData {
    /// Initial stack fed to the leaf script.
    pub stack: Vec<Vec<u8>>,
    /// The leaf script being satisfied.
    pub script: ScriptBuf,
    /// Control block proving the leaf's commitment in the output key.
    pub control_block: ControlBlock,
    /// The annex, including its 0x50 prefix byte, if present.
    pub annex: Option<Vec<u8>>,
}

impl ScriptPathData {
    /// Returns the leaf version claimed by the control block.
    pub fn leaf_version(&self) -> LeafVersion { self.control_block.leaf_version }

    /// Computes the hash of the leaf being spent.
    pub fn leaf_hash(&self) -> TapLeafHash {
        TapLeafHash::from_script(&self.script, self.control_block.leaf_version)
    }

    /// Verifies this script path data against the spent output key.
    ///
    /// See [`ControlBlock::verify_taproot_commitment`]; both the x-only key
    /// and its parity bit must be reproduced. Script execution is not
    /// performed.
    pub fn verify_commitment<C: Verification>(
        &self,
        secp: &Secp256k1<C>,
        output_key: XOnlyPublicKey,
    ) -> bool {
        self.control_block.verify_taproot_commitment(secp, output_key, &self.script)
    }
}

/// Detailed error type for taproot utilities.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TaprootError {
    /// Proof size must be a multiple of 32.
    InvalidMerkleBranchSize(usize),
    /// Merkle tree depth must not be more than 128.
    InvalidMerkleTreeDepth(usize),
    /// The last bit of tapleaf version must be zero.
    InvalidTaprootLeafVersion(u8),
    /// Invalid control block size.
    InvalidControlBlockSize(usize),
    /// Invalid taproot internal key.
    InvalidInternalKey(secp256k1::Error),
    /// Invalid parity for internal key.
    InvalidParity(secp256k1::InvalidParityValue),
}

impl fmt::Display for TaprootError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TaprootError::InvalidMerkleBranchSize(sz) => write!(
                f,
                "merkle branch size({}) must be a multiple of {}",
                sz, TAPROOT_CONTROL_NODE_SIZE
            ),
            TaprootError::InvalidMerkleTreeDepth(d) => write!(
                f,
                "merkle tree depth({}) must be less than {}",
                d, TAPROOT_CONTROL_MAX_NODE_COUNT
            ),
            TaprootError::InvalidTaprootLeafVersion(v) => {
                write!(f, "leaf version({}) must have the least significant bit 0", v)
            }
            TaprootError::InvalidControlBlockSize(sz) => write!(
                f,
                "control block size({}) must be of the form 33 + 32*m where 0 <= m <= {}",
                sz, TAPROOT_CONTROL_MAX_NODE_COUNT
            ),
            TaprootError::InvalidInternalKey(ref e) => {
                write!(f, "invalid internal x-only key: {}", e)
            }
            TaprootError::InvalidParity(_) => write!(f, "invalid parity value for internal key"),
        }
    }
}

impl std::error::Error for TaprootError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use self::TaprootError::*;

        match self {
            InvalidInternalKey(e) => Some(e),
            InvalidParity(e) => Some(e),
            InvalidMerkleBranchSize(_)
            | InvalidMerkleTreeDepth(_)
            | InvalidTaprootLeafVersion(_)
            | InvalidControlBlockSize(_) => None,
        }
    }
}
