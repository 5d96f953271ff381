// SPDX-License-Identifier: CC0-1.0

//! Signature hash implementation (used in transaction signing).
//!
//! Efficient implementation of the algorithm to compute the message to be
//! signed according to
//! [Bip143](https://github.com/bitcoin/bips/blob/99701f68a88ce33b2d0838eb84e115cef505b4c2/bip-0143.mediawiki)
//! and legacy (before Bip143).
//!
//! Computing signature hashes is required to sign a transaction and this
//! module is designed to handle its complexity efficiently. Computing these
//! hashes is as simple as creating [`SighashCache`] and calling its methods.
//!
//! Both algorithms carry consensus quirks that must be reproduced
//! bit-for-bit rather than fixed: an out-of-range `SIGHASH_SINGLE` in the
//! legacy algorithm hashes to a constant, and an undefined base flag value
//! behaves like `SIGHASH_ALL`.

use core::borrow::{Borrow, BorrowMut};
use core::{fmt, str};
use std::io::{self, Write};

use crate::blockdata::script::{Script, ScriptBuf};
use crate::blockdata::transaction::{Sequence, Transaction, TxIn, TxOut};
use crate::blockdata::witness::Witness;
use crate::consensus::Encodable;
use crate::hashes::{hash_newtype, sha256d, Hash};
use crate::internal_macros::impl_hashencode;

/// Used for signature hash for invalid use of SIGHASH_SINGLE.
#[rustfmt::skip]
pub(crate) const UINT256_ONE: [u8; 32] = [
    1, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0
];

hash_newtype! {
    /// Hash of a transaction according to the legacy signature algorithm.
    #[hash_newtype(forward)]
    pub struct LegacySighash(sha256d::Hash);

    /// Hash of a transaction according to the segwit version 0 signature
    /// algorithm.
    #[hash_newtype(forward)]
    pub struct SegwitV0Sighash(sha256d::Hash);
}

impl_hashencode!(LegacySighash);
impl_hashencode!(SegwitV0Sighash);

macro_rules! impl_thirty_two_byte_hash {
    ($ty:ident) => {
        impl secp256k1::ThirtyTwoByteHash for $ty {
            fn into_32(self) -> [u8; 32] { self.to_byte_array() }
        }
    };
}

impl_thirty_two_byte_hash!(LegacySighash);
impl_thirty_two_byte_hash!(SegwitV0Sighash);

/// Hashtype of an input's signature, encoded in the last byte of the
/// signature.
///
/// Fixed values so they can be cast as integer types for encoding.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum EcdsaSighashType {
    /// 0x1: Sign all outputs.
    All = 0x01,
    /// 0x2: Sign no outputs --- anyone can choose the destination.
    None = 0x02,
    /// 0x3: Sign the output whose index matches this input's index. If none
    /// exists, sign the hash
    /// `0000000000000000000000000000000000000000000000000000000000000001`.
    /// (This rule is probably an unintentional C++ism, but it's consensus so
    /// we have to follow it.)
    Single = 0x03,
    /// 0x81: Sign all outputs but only this input.
    AllPlusAnyoneCanPay = 0x81,
    /// 0x82: Sign no outputs and only this input.
    NonePlusAnyoneCanPay = 0x82,
    /// 0x83: Sign one output and only this input (see `Single` for what
    /// "one output" means).
    SinglePlusAnyoneCanPay = 0x83,
}

impl fmt::Display for EcdsaSighashType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use EcdsaSighashType::*;

        let s = match self {
            All => "SIGHASH_ALL",
            None => "SIGHASH_NONE",
            Single => "SIGHASH_SINGLE",
            AllPlusAnyoneCanPay => "SIGHASH_ALL|SIGHASH_ANYONECANPAY",
            NonePlusAnyoneCanPay => "SIGHASH_NONE|SIGHASH_ANYONECANPAY",
            SinglePlusAnyoneCanPay => "SIGHASH_SINGLE|SIGHASH_ANYONECANPAY",
        };
        f.write_str(s)
    }
}

impl str::FromStr for EcdsaSighashType {
    type Err = SighashTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use EcdsaSighashType::*;

        match s {
            "SIGHASH_ALL" => Ok(All),
            "SIGHASH_NONE" => Ok(None),
            "SIGHASH_SINGLE" => Ok(Single),
            "SIGHASH_ALL|SIGHASH_ANYONECANPAY" => Ok(AllPlusAnyoneCanPay),
            "SIGHASH_NONE|SIGHASH_ANYONECANPAY" => Ok(NonePlusAnyoneCanPay),
            "SIGHASH_SINGLE|SIGHASH_ANYONECANPAY" => Ok(SinglePlusAnyoneCanPay),
            _ => Err(SighashTypeParseError { unrecognized: s.to_owned() }),
        }
    }
}

impl EcdsaSighashType {
    /// Splits the sighash flag into the "real" sighash flag and the
    /// ANYONECANPAY boolean.
    pub(crate) fn split_anyonecanpay_flag(self) -> (EcdsaSighashType, bool) {
        use EcdsaSighashType::*;

        match self {
            All => (All, false),
            None => (None, false),
            Single => (Single, false),
            AllPlusAnyoneCanPay => (All, true),
            NonePlusAnyoneCanPay => (None, true),
            SinglePlusAnyoneCanPay => (Single, true),
        }
    }

    /// Creates a [`EcdsaSighashType`] from a raw `u32`.
    ///
    /// **Note**: this replicates consensus behaviour, for current
    /// standardness rules correctness you probably want
    /// [`Self::from_standard`].
    ///
    /// This might cause unexpected behavior because it does not roundtrip.
    /// That is, `EcdsaSighashType::from_consensus(n) as u32 != n` for
    /// non-standard values of `n`. While verifying signatures, the user
    /// should retain the `n` and use it to compute the signature hash
    /// message.
    pub fn from_consensus(n: u32) -> EcdsaSighashType {
        use EcdsaSighashType::*;

        // In Bitcoin Core, the SignatureHash function will mask the (int32)
        // value with 0x1f to (apparently) deactivate ACP when checking for
        // SINGLE and NONE bits. We however want to be matching also against
        // ACP-masked ALL, SINGLE, and NONE. So here we re-activate ACP.
        let mask = 0x1f | 0x80;
        match n & mask {
            // "real" sighashes
            0x01 => All,
            0x02 => None,
            0x03 => Single,
            0x81 => AllPlusAnyoneCanPay,
            0x82 => NonePlusAnyoneCanPay,
            0x83 => SinglePlusAnyoneCanPay,
            // catchalls
            x if x & 0x80 == 0x80 => AllPlusAnyoneCanPay,
            _ => All,
        }
    }

    /// Creates a [`EcdsaSighashType`] from a raw `u32`.
    ///
    /// # Errors
    ///
    /// If `n` is not one of the six standard byte values.
    pub fn from_standard(n: u32) -> Result<EcdsaSighashType, NonStandardSighashType> {
        use EcdsaSighashType::*;

        match n {
            0x01 => Ok(All),
            0x02 => Ok(None),
            0x03 => Ok(Single),
            0x81 => Ok(AllPlusAnyoneCanPay),
            0x82 => Ok(NonePlusAnyoneCanPay),
            0x83 => Ok(SinglePlusAnyoneCanPay),
            non_standard => Err(NonStandardSighashType(non_standard)),
        }
    }

    /// Returns whether the base hash mode of `n` is undefined.
    ///
    /// The base mode is the low five bits; exactly `ALL` (0x01), `NONE`
    /// (0x02) and `SINGLE` (0x03) are defined. The `ANYONECANPAY` bit
    /// (0x80) is independent and never affects the answer.
    ///
    /// An undefined base mode is *not* an error while hashing, where
    /// consensus treats it like `ALL` (see [`Self::from_consensus`]), but
    /// signature decoding rejects it.
    pub fn is_unknown(n: u32) -> bool { !matches!(n & 0x1f, 0x01 | 0x02 | 0x03) }

    /// Converts [`EcdsaSighashType`] to a `u32` sighash flag.
    ///
    /// The returned value is guaranteed to be a valid according to
    /// standardness rules.
    pub fn to_u32(self) -> u32 { self as u32 }
}

/// This type is consensus valid but an input including it would prevent the
/// transaction from being relayed on today's Bitcoin network.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonStandardSighashType(pub u32);

impl fmt::Display for NonStandardSighashType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "non-standard sighash type {}", self.0)
    }
}

impl std::error::Error for NonStandardSighashType {}

/// Error returned for failure during parsing one of the sighash types.
///
/// This is currently returned for unrecognized sighash strings.
#[derive(Debug, Clone)]
pub struct SighashTypeParseError {
    /// The unrecognized string we attempted to parse.
    pub unrecognized: String,
}

impl fmt::Display for SighashTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unrecognized SIGHASH string '{}'", self.unrecognized)
    }
}

impl std::error::Error for SighashTypeParseError {}

/// Possible errors in computing the signature message.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Could happen only by using `*_encode_signing_*` methods with custom
    /// writers, engine writers like the ones used in methods
    /// `*_signature_hash` do not error.
    Io(io::ErrorKind),

    /// Requested index is greater or equal than the number of inputs in the
    /// transaction.
    IndexOutOfInputsBounds {
        /// Requested index.
        index: usize,
        /// Number of transaction inputs.
        inputs_size: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            Io(error_kind) => write!(f, "writer errored: {:?}", error_kind),
            IndexOutOfInputsBounds { index, inputs_size } => write!(
                f,
                "requested index ({}) is greater or equal than the number of transaction inputs ({})",
                index, inputs_size
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;

        match self {
            Io(_) | IndexOutOfInputsBounds { .. } => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self { Error::Io(e.kind()) }
}

/// Result of [`SighashCache::legacy_encode_signing_data_to`].
///
/// This type forces the caller to handle the SIGHASH_SINGLE bug case.
///
/// If the sighash single bug occurs, no data was written to the writer; the
/// correct message to sign is the constant "one array" instead of anything
/// derived from the transaction.
#[must_use]
pub enum EncodeSigningDataResult<E> {
    /// Input data is an instance of `SIGHASH_SINGLE` bug.
    SighashSingleBug,
    /// Operation performed normally.
    WriteResult(Result<(), E>),
}

impl<E> EncodeSigningDataResult<E> {
    /// Checks for the `SIGHASH_SINGLE` bug, or errors of the writer.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bitcoin_commitments::hashes::{sha256d, Hash};
    /// use bitcoin_commitments::{Script, SighashCache, Transaction, TxIn, TxOut};
    ///
    /// // Two inputs, one output: SIGHASH_SINGLE on the second input has no
    /// // corresponding output.
    /// let tx = Transaction {
    ///     version: 1,
    ///     lock_time: 0,
    ///     input: vec![TxIn::default(), TxIn::default()],
    ///     output: vec![TxOut::default()],
    /// };
    /// let cache = SighashCache::new(&tx);
    /// let mut writer = sha256d::Hash::engine();
    /// if cache
    ///     .legacy_encode_signing_data_to(&mut writer, 1, Script::empty(), 0x03)
    ///     .is_sighash_single_bug()
    ///     .expect("engines don't error")
    /// {
    ///     // use the hash of the constant "one array"
    /// }
    /// ```
    pub fn is_sighash_single_bug(self) -> Result<bool, E> {
        match self {
            EncodeSigningDataResult::SighashSingleBug => Ok(true),
            EncodeSigningDataResult::WriteResult(Ok(())) => Ok(false),
            EncodeSigningDataResult::WriteResult(Err(e)) => Err(e),
        }
    }
}

/// Efficiently calculates signature hash messages for legacy and segwit
/// inputs.
#[derive(Debug)]
pub struct SighashCache<T: Borrow<Transaction>> {
    /// Access to transaction required for transaction introspection.
    /// Moreover, type `T: Borrow<Transaction>` allows us to use borrowed and
    /// mutable borrowed types, the latter in particular is necessary for
    /// [`SighashCache::witness_mut`].
    tx: T,

    /// Cache for segwit v0 inputs; computed the first time a segwit digest
    /// is requested and reused for every input thereafter.
    segwit_cache: Option<SegwitCache>,
}

/// Values cached for segwit inputs.
#[derive(Debug)]
struct SegwitCache {
    prevouts: sha256d::Hash,
    sequences: sha256d::Hash,
    /// In theory `outputs` could be an `Option` since `SIGHASH_NONE` and
    /// `SIGHASH_SINGLE` do not need it, but since `SIGHASH_ALL` is by far
    /// the most used variant we don't bother.
    outputs: sha256d::Hash,
}

impl<R: Borrow<Transaction>> SighashCache<R> {
    /// Constructs a new `SighashCache` from an unsigned transaction.
    ///
    /// The sighash components are computed in a lazy manner when required.
    /// For the generated sighashes to be valid, no fields in the transaction
    /// may change except for script_sig and witness.
    pub fn new(tx: R) -> Self { SighashCache { tx, segwit_cache: None } }

    /// Returns the reference to the cached transaction.
    pub fn transaction(&self) -> &Transaction { self.tx.borrow() }

    /// Destroys the cache and recovers the stored transaction.
    pub fn into_transaction(self) -> R { self.tx }

    /// Encodes the BIP143 signing data for any flag type into a given
    /// object implementing the [`std::io::Write`] trait.
    ///
    /// `script_code` is the script placed in the signed data; for P2WPKH it
    /// is the implied P2PKH script, for P2WSH the witness script (possibly
    /// truncated at the last executed `OP_CODESEPARATOR`, which only script
    /// execution can determine, so it is the caller's input here).
    pub fn segwit_encode_signing_data_to<W: Write>(
        &mut self,
        mut writer: W,
        input_index: usize,
        script_code: &Script,
        value: u64,
        sighash_type: EcdsaSighashType,
    ) -> Result<(), Error> {
        let zero_hash = sha256d::Hash::all_zeros();

        let (sighash, anyone_can_pay) = sighash_type.split_anyonecanpay_flag();

        self.tx.borrow().version.consensus_encode(&mut writer)?;

        if !anyone_can_pay {
            self.segwit_cache().prevouts.consensus_encode(&mut writer)?;
        } else {
            zero_hash.consensus_encode(&mut writer)?;
        }

        if !anyone_can_pay
            && sighash != EcdsaSighashType::Single
            && sighash != EcdsaSighashType::None
        {
            self.segwit_cache().sequences.consensus_encode(&mut writer)?;
        } else {
            zero_hash.consensus_encode(&mut writer)?;
        }

        {
            let txin =
                &self.tx.borrow().input.get(input_index).ok_or(Error::IndexOutOfInputsBounds {
                    index: input_index,
                    inputs_size: self.tx.borrow().input.len(),
                })?;

            txin.previous_output.consensus_encode(&mut writer)?;
            script_code.consensus_encode(&mut writer)?;
            value.consensus_encode(&mut writer)?;
            txin.sequence.consensus_encode(&mut writer)?;
        }

        if sighash != EcdsaSighashType::Single && sighash != EcdsaSighashType::None {
            self.segwit_cache().outputs.consensus_encode(&mut writer)?;
        } else if sighash == EcdsaSighashType::Single
            && input_index < self.tx.borrow().output.len()
        {
            let mut single_enc = sha256d::Hash::engine();
            self.tx.borrow().output[input_index].consensus_encode(&mut single_enc)?;
            sha256d::Hash::from_engine(single_enc).consensus_encode(&mut writer)?;
        } else {
            zero_hash.consensus_encode(&mut writer)?;
        }

        self.tx.borrow().lock_time.consensus_encode(&mut writer)?;
        sighash_type.to_u32().consensus_encode(&mut writer)?;
        Ok(())
    }

    /// Computes the BIP143 sighash for any flag type.
    pub fn segwit_signature_hash(
        &mut self,
        input_index: usize,
        script_code: &Script,
        value: u64,
        sighash_type: EcdsaSighashType,
    ) -> Result<SegwitV0Sighash, Error> {
        let mut enc = SegwitV0Sighash::engine();
        self.segwit_encode_signing_data_to(&mut enc, input_index, script_code, value, sighash_type)?;
        Ok(SegwitV0Sighash::from_engine(enc))
    }

    /// Encodes the legacy signing data from which a signature hash for a
    /// given input index with a given sighash flag can be computed.
    ///
    /// To actually produce a scriptSig, this hash needs to be run through an
    /// ECDSA signer, the [`EcdsaSighashType`] appended to the resulting sig,
    /// and a script written around this, but this is the general (and hard)
    /// part.
    ///
    /// The `sighash_type` supports an arbitrary `u32` value, instead of just
    /// [`EcdsaSighashType`], because internally 4 bytes are being hashed,
    /// even though only the lowest byte is appended to signature in a
    /// transaction. An undefined base mode hashes like `ALL`.
    ///
    /// Any `OP_CODESEPARATOR`s in `script_pubkey` are stripped before the
    /// script is substituted into the signed inputs.
    ///
    /// # Returns
    ///
    /// This function can't handle the `SIGHASH_SINGLE` bug internally, so it
    /// returns [`EncodeSigningDataResult`] that must be handled by the
    /// caller (see [`EncodeSigningDataResult::is_sighash_single_bug`]).
    pub fn legacy_encode_signing_data_to<W: Write>(
        &self,
        writer: W,
        input_index: usize,
        script_pubkey: &Script,
        sighash_type: u32,
    ) -> EncodeSigningDataResult<Error> {
        if input_index >= self.tx.borrow().input.len() {
            return EncodeSigningDataResult::WriteResult(Err(Error::IndexOutOfInputsBounds {
                index: input_index,
                inputs_size: self.tx.borrow().input.len(),
            }));
        }

        if is_invalid_use_of_sighash_single(
            sighash_type,
            input_index,
            self.tx.borrow().output.len(),
        ) {
            // We cannot correctly handle the SIGHASH_SINGLE bug here because
            // usage of this function will result in the data written to the
            // writer being hashed, however the correct handling of the
            // SIGHASH_SINGLE bug is to return the 'one array' - either
            // implement this behaviour manually or use `legacy_signature_hash()`.
            return EncodeSigningDataResult::SighashSingleBug;
        }

        fn encode_signing_data_to_inner<W: Write>(
            self_: &Transaction,
            mut writer: W,
            input_index: usize,
            script_pubkey: &Script,
            sighash_type: u32,
        ) -> Result<(), io::Error> {
            let (sighash, anyone_can_pay) =
                EcdsaSighashType::from_consensus(sighash_type).split_anyonecanpay_flag();

            // The spent script is substituted with its OP_CODESEPARATORs
            // removed.
            let script_code = script_pubkey.without_code_separators();

            // Build tx to sign
            let mut tx = Transaction {
                version: self_.version,
                lock_time: self_.lock_time,
                input: vec![],
                output: vec![],
            };
            // Add all inputs necessary..
            if anyone_can_pay {
                tx.input = vec![TxIn {
                    previous_output: self_.input[input_index].previous_output,
                    script_sig: script_code,
                    sequence: self_.input[input_index].sequence,
                    witness: Witness::default(),
                }];
            } else {
                tx.input = Vec::with_capacity(self_.input.len());
                for (n, input) in self_.input.iter().enumerate() {
                    tx.input.push(TxIn {
                        previous_output: input.previous_output,
                        script_sig: if n == input_index {
                            script_code.clone()
                        } else {
                            ScriptBuf::new()
                        },
                        sequence: if n != input_index
                            && (sighash == EcdsaSighashType::Single
                                || sighash == EcdsaSighashType::None)
                        {
                            Sequence::ZERO
                        } else {
                            input.sequence
                        },
                        witness: Witness::default(),
                    });
                }
            }
            // ..then all outputs
            tx.output = match sighash {
                EcdsaSighashType::All => self_.output.clone(),
                EcdsaSighashType::Single => {
                    let output_iter = self_
                        .output
                        .iter()
                        .take(input_index + 1) // sign all outputs up to and including this one, but erase
                        .enumerate() // all of them except for this one
                        .map(|(n, out)| if n == input_index { out.clone() } else { TxOut::default() });
                    output_iter.collect()
                }
                EcdsaSighashType::None => vec![],
                _ => unreachable!("split_anyonecanpay_flag only returns base types"),
            };
            // hash the result
            tx.consensus_encode(&mut writer)?;
            sighash_type.to_le_bytes().consensus_encode(&mut writer)?;
            Ok(())
        }

        EncodeSigningDataResult::WriteResult(
            encode_signing_data_to_inner(
                self.tx.borrow(),
                writer,
                input_index,
                script_pubkey,
                sighash_type,
            )
            .map_err(|e| Error::Io(e.kind())),
        )
    }

    /// Computes a legacy signature hash for a given input index with a given
    /// sighash flag.
    ///
    /// To actually produce a scriptSig, this hash needs to be run through an
    /// ECDSA signer, the [`EcdsaSighashType`] appended to the resulting sig,
    /// and a script written around this, but this is the general (and hard)
    /// part.
    ///
    /// The `sighash_type` supports an arbitrary `u32` value, instead of just
    /// [`EcdsaSighashType`], because internally 4 bytes are being hashed,
    /// even though only the lowest byte is appended to signature in a
    /// transaction.
    ///
    /// This function correctly handles the sighash single bug by returning
    /// the 'one array'. The sighash single bug becomes exploitable when one
    /// tries to sign a transaction with `SIGHASH_SINGLE` and there is not a
    /// corresponding output with the same index as the input.
    pub fn legacy_signature_hash(
        &self,
        input_index: usize,
        script_pubkey: &Script,
        sighash_type: u32,
    ) -> Result<LegacySighash, Error> {
        let mut enc = LegacySighash::engine();
        if self
            .legacy_encode_signing_data_to(&mut enc, input_index, script_pubkey, sighash_type)
            .is_sighash_single_bug()?
        {
            Ok(LegacySighash::from_byte_array(UINT256_ONE))
        } else {
            Ok(LegacySighash::from_engine(enc))
        }
    }

    fn segwit_cache(&mut self) -> &SegwitCache {
        let tx = self.tx.borrow();
        self.segwit_cache.get_or_insert_with(|| {
            let mut enc_prevouts = sha256d::Hash::engine();
            let mut enc_sequences = sha256d::Hash::engine();
            let mut enc_outputs = sha256d::Hash::engine();
            for txin in tx.input.iter() {
                txin.previous_output.consensus_encode(&mut enc_prevouts).expect("engines don't error");
                txin.sequence.consensus_encode(&mut enc_sequences).expect("engines don't error");
            }
            for txout in tx.output.iter() {
                txout.consensus_encode(&mut enc_outputs).expect("engines don't error");
            }
            SegwitCache {
                prevouts: sha256d::Hash::from_engine(enc_prevouts),
                sequences: sha256d::Hash::from_engine(enc_sequences),
                outputs: sha256d::Hash::from_engine(enc_outputs),
            }
        })
    }
}

impl<R: BorrowMut<Transaction>> SighashCache<R> {
    /// When the `SighashCache` is initialized with a mutable reference to a
    /// transaction instead of a regular reference, this method is available
    /// to allow modification to the witnesses.
    ///
    /// This allows in-line signing such as
    ///
    /// ```
    /// use bitcoin_commitments::{EcdsaSighashType, Script, SighashCache, Transaction};
    ///
    /// let mut tx_to_sign =
    ///     Transaction { version: 2, lock_time: 0, input: Vec::new(), output: Vec::new() };
    /// let input_count = tx_to_sign.input.len();
    ///
    /// let mut sig_hasher = SighashCache::new(&mut tx_to_sign);
    /// for inp in 0..input_count {
    ///     let prevout_script = Script::empty();
    ///     let _sighash = sig_hasher.segwit_signature_hash(
    ///         inp,
    ///         prevout_script,
    ///         42,
    ///         EcdsaSighashType::All,
    ///     );
    ///     // ... sign the sighash
    ///     sig_hasher.witness_mut(inp).unwrap().push(&Vec::new());
    /// }
    /// ```
    pub fn witness_mut(&mut self, input_index: usize) -> Option<&mut Witness> {
        self.tx.borrow_mut().input.get_mut(input_index).map(|i| &mut i.witness)
    }
}

fn is_invalid_use_of_sighash_single(sighash: u32, input_index: usize, output_len: usize) -> bool {
    let ty = EcdsaSighashType::from_consensus(sighash);
    ty == EcdsaSighashType::Single && input_index >= output_len
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::deserialize;
    use crate::internal_macros::hex;

    fn dummy_tx(inputs: usize, outputs: usize) -> Transaction {
        Transaction {
            version: 1,
            lock_time: 0,
            input: (0..inputs)
                .map(|i| TxIn {
                    sequence: Sequence(0xFFFFFF00 | i as u32),
                    ..Default::default()
                })
                .collect(),
            output: (0..outputs)
                .map(|i| TxOut { value: 1000 * i as u64, script_pubkey: ScriptBuf::new() })
                .collect(),
        }
    }

    #[test]
    fn sighash_single_bug() {
        const SIGHASH_SINGLE: u32 = 3;

        // We need a tx with more inputs than outputs.
        let tx = dummy_tx(2, 1);
        let script = ScriptBuf::new();
        let cache = SighashCache::new(&tx);

        let got = cache.legacy_signature_hash(1, &script, SIGHASH_SINGLE).expect("sighash");
        let want = LegacySighash::from_byte_array(UINT256_ONE);

        assert_eq!(got, want);

        // The in-range case must not short-circuit.
        let got = cache.legacy_signature_hash(0, &script, SIGHASH_SINGLE).expect("sighash");
        assert_ne!(got, want);
    }

    #[test]
    fn legacy_sighash_index_bounds() {
        let tx = dummy_tx(1, 1);
        let cache = SighashCache::new(&tx);
        assert_eq!(
            cache.legacy_signature_hash(1, Script::empty(), 0x01),
            Err(Error::IndexOutOfInputsBounds { index: 1, inputs_size: 1 })
        );

        let mut cache = SighashCache::new(&tx);
        assert_eq!(
            cache.segwit_signature_hash(1, Script::empty(), 0, EcdsaSighashType::All),
            Err(Error::IndexOutOfInputsBounds { index: 1, inputs_size: 1 })
        );
    }

    #[test]
    fn legacy_sighash_strips_code_separators() {
        let tx = dummy_tx(1, 1);
        let cache = SighashCache::new(&tx);

        let with_sep = ScriptBuf::from(vec![0x51, 0xab, 0x51]);
        let without_sep = ScriptBuf::from(vec![0x51, 0x51]);

        let a = cache.legacy_signature_hash(0, &with_sep, 0x01).unwrap();
        let b = cache.legacy_signature_hash(0, &without_sep, 0x01).unwrap();
        assert_eq!(a, b);

        // Stripping only touches bare opcodes, not pushed data.
        let pushed_sep = ScriptBuf::from(vec![0x01, 0xab]);
        let c = cache.legacy_signature_hash(0, &pushed_sep, 0x01).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn legacy_none_does_not_commit_to_other_sequences() {
        let mut tx = dummy_tx(2, 1);
        let script = ScriptBuf::new();

        let base_none =
            SighashCache::new(&tx).legacy_signature_hash(0, &script, 0x02).unwrap();
        let base_all = SighashCache::new(&tx).legacy_signature_hash(0, &script, 0x01).unwrap();

        tx.input[1].sequence = Sequence::ZERO;
        let changed_none =
            SighashCache::new(&tx).legacy_signature_hash(0, &script, 0x02).unwrap();
        let changed_all =
            SighashCache::new(&tx).legacy_signature_hash(0, &script, 0x01).unwrap();

        // NONE blanks the other input's sequence, ALL commits to it.
        assert_eq!(base_none, changed_none);
        assert_ne!(base_all, changed_all);
    }

    #[test]
    fn legacy_anyonecanpay_commits_to_single_input() {
        let mut tx = dummy_tx(2, 1);
        let script = ScriptBuf::new();

        let base =
            SighashCache::new(&tx).legacy_signature_hash(0, &script, 0x81).unwrap();
        tx.input[1].previous_output.vout = 42;
        let changed =
            SighashCache::new(&tx).legacy_signature_hash(0, &script, 0x81).unwrap();
        assert_eq!(base, changed);
    }

    #[test]
    fn unknown_base_mode_hashes_like_all() {
        let tx = dummy_tx(1, 1);
        let cache = SighashCache::new(&tx);
        let script = ScriptBuf::new();

        // 0x04 is undefined; the modified transaction must be built as for
        // ALL. The digests still differ because the flag word itself is
        // hashed, so compare through the constructed signing data instead.
        let mut data_all = Vec::new();
        let mut data_unknown = Vec::new();
        cache
            .legacy_encode_signing_data_to(&mut data_all, 0, &script, 0x01)
            .is_sighash_single_bug()
            .unwrap();
        cache
            .legacy_encode_signing_data_to(&mut data_unknown, 0, &script, 0x04)
            .is_sighash_single_bug()
            .unwrap();
        // Identical except for the trailing 4-byte flag word.
        let n = data_all.len();
        assert_eq!(data_all[..n - 4], data_unknown[..n - 4]);
        assert_eq!(data_unknown[n - 4..], [0x04, 0, 0, 0]);
    }

    #[test]
    fn segwit_anyonecanpay_does_not_commit_to_other_inputs() {
        let mut tx = dummy_tx(2, 2);
        let script = ScriptBuf::new();

        let base = SighashCache::new(&tx)
            .segwit_signature_hash(0, &script, 5000, EcdsaSighashType::AllPlusAnyoneCanPay)
            .unwrap();
        tx.input[1].previous_output.vout = 7;
        let changed = SighashCache::new(&tx)
            .segwit_signature_hash(0, &script, 5000, EcdsaSighashType::AllPlusAnyoneCanPay)
            .unwrap();
        assert_eq!(base, changed);

        let base_all = SighashCache::new(&tx)
            .segwit_signature_hash(0, &script, 5000, EcdsaSighashType::All)
            .unwrap();
        tx.input[1].previous_output.vout = 8;
        let changed_all = SighashCache::new(&tx)
            .segwit_signature_hash(0, &script, 5000, EcdsaSighashType::All)
            .unwrap();
        assert_ne!(base_all, changed_all);
    }

    #[test]
    fn segwit_single_out_of_range_hashes_zero_outputs() {
        // Unlike legacy, segwit SINGLE with no corresponding output commits
        // to 32 zero bytes, not to the constant-one digest.
        let tx = dummy_tx(2, 1);
        let script = ScriptBuf::new();

        let mut data = Vec::new();
        SighashCache::new(&tx)
            .segwit_encode_signing_data_to(&mut data, 1, &script, 0, EcdsaSighashType::Single)
            .unwrap();
        // hashOutputs is the fourth-from-last field: [..] hashOutputs (32) ||
        // lock_time (4) || sighash (4).
        let n = data.len();
        assert_eq!(data[n - 40..n - 8], [0u8; 32]);
    }

    #[test]
    fn bip143_p2wpkh_sighash() {
        // BIP143 native P2WPKH example.
        let tx: Transaction = deserialize(&hex!(
            "0100000002fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f00\
             00000000eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90e\
             c68a0100000000ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a78\
             3a76ac7a6d5988ac9093510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa\
             815988ac11000000"
        ))
        .unwrap();

        let mut cache = SighashCache::new(&tx);
        let script_code =
            ScriptBuf::from(hex!("76a9141d0f172a0ecb48aee1be1f2687d2963ae33f71a188ac"));
        let value = 600_000_000;
        let sighash =
            cache.segwit_signature_hash(1, &script_code, value, EcdsaSighashType::All).unwrap();
        assert_eq!(
            sighash.to_string(),
            "c37af31116d1b27caf68aae9e3ac82f1477929014d5b917657d0eb49478cb670"
        );

        // The intermediate hashes from the BIP, via the cache.
        let cache_ref = cache.segwit_cache();
        assert_eq!(
            cache_ref.prevouts.to_byte_array(),
            hex!("96b827c8483d4e9b96712b6713a7b68d6e8003a781feba36c31143470b4efd37")[..]
        );
        assert_eq!(
            cache_ref.sequences.to_byte_array(),
            hex!("52b0a642eea2fb7ae638c36f6252b6750293dbe574a806984b8e4d8548339a3b")[..]
        );
        assert_eq!(
            cache_ref.outputs.to_byte_array(),
            hex!("863ef3e1a92afbfdb97f31ad0fc7683ee943e9abcf2501590ff8f6551f47e5e5")[..]
        );
    }

    #[test]
    fn sighash_type_flags() {
        use EcdsaSighashType::*;

        // from_consensus maps unknown base modes to ALL and respects the
        // ANYONECANPAY bit.
        assert_eq!(EcdsaSighashType::from_consensus(0x01), All);
        assert_eq!(EcdsaSighashType::from_consensus(0x02), None);
        assert_eq!(EcdsaSighashType::from_consensus(0x03), Single);
        assert_eq!(EcdsaSighashType::from_consensus(0x81), AllPlusAnyoneCanPay);
        assert_eq!(EcdsaSighashType::from_consensus(0x82), NonePlusAnyoneCanPay);
        assert_eq!(EcdsaSighashType::from_consensus(0x83), SinglePlusAnyoneCanPay);
        assert_eq!(EcdsaSighashType::from_consensus(0x00), All);
        assert_eq!(EcdsaSighashType::from_consensus(0x04), All);
        assert_eq!(EcdsaSighashType::from_consensus(0x80), AllPlusAnyoneCanPay);
        // Bits 5 and 6 are ignored by the mask.
        assert_eq!(EcdsaSighashType::from_consensus(0x21), All);
        assert_eq!(EcdsaSighashType::from_consensus(0x43), Single);

        // from_standard accepts exactly the six standard values.
        assert!(EcdsaSighashType::from_standard(0x01).is_ok());
        assert!(EcdsaSighashType::from_standard(0x83).is_ok());
        assert_eq!(
            EcdsaSighashType::from_standard(0x04),
            Err(NonStandardSighashType(0x04))
        );
        assert_eq!(
            EcdsaSighashType::from_standard(0x21),
            Err(NonStandardSighashType(0x21))
        );
    }

    #[test]
    fn sighash_unknown_truth_table() {
        for base in 0u32..=0x1f {
            let defined = base == 0x01 || base == 0x02 || base == 0x03;
            // Independent of the ANYONECANPAY bit.
            assert_eq!(EcdsaSighashType::is_unknown(base), !defined, "base {:#x}", base);
            assert_eq!(
                EcdsaSighashType::is_unknown(base | 0x80),
                !defined,
                "base {:#x} with ACP",
                base
            );
        }
    }

    #[test]
    fn sighash_type_string_roundtrip() {
        use core::str::FromStr;

        for ty in [
            EcdsaSighashType::All,
            EcdsaSighashType::None,
            EcdsaSighashType::Single,
            EcdsaSighashType::AllPlusAnyoneCanPay,
            EcdsaSighashType::NonePlusAnyoneCanPay,
            EcdsaSighashType::SinglePlusAnyoneCanPay,
        ]
        .iter()
        .copied()
        {
            assert_eq!(EcdsaSighashType::from_str(&ty.to_string()).unwrap(), ty);
        }
        assert!(EcdsaSighashType::from_str("SIGHASH_BOGUS").is_err());
    }
}
