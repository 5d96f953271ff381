// SPDX-License-Identifier: CC0-1.0

//! Bitcoin transactions.
//!
//! A transaction describes a transfer of money. It consumes previously
//! created transaction outputs as its inputs and creates new outputs. This
//! module carries the value types and both canonical serializations (legacy
//! and BIP144 segwit); the signature hash algorithms defined over them live
//! in [`crate::crypto::sighash`].

use core::fmt;
use std::io::{self, Write};

use crate::blockdata::script::ScriptBuf;
use crate::blockdata::witness::Witness;
use crate::consensus::encode::{self, Decodable, Encodable};
use crate::hash_types::{Txid, Wtxid};
use crate::hashes::Hash;
use crate::internal_macros::impl_consensus_encoding;

/// Marker preceding the segwit flag byte in the BIP144 serialization. Reuses
/// the "empty input list" slot, which cannot occur in a valid legacy
/// transaction.
const SEGWIT_MARKER: u8 = 0x00;
/// Flag carried after the marker in the BIP144 serialization.
const SEGWIT_FLAG: u8 = 0x01;

/// A reference to a transaction output.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct OutPoint {
    /// The referenced transaction's txid.
    pub txid: Txid,
    /// The index of the referenced output in its transaction's vout.
    pub vout: u32,
}

impl OutPoint {
    /// Creates a new [`OutPoint`].
    #[inline]
    pub fn new(txid: Txid, vout: u32) -> OutPoint { OutPoint { txid, vout } }

    /// Creates a "null" `OutPoint`, the prevout used by coinbase inputs.
    #[inline]
    pub fn null() -> OutPoint { OutPoint { txid: Txid::all_zeros(), vout: u32::MAX } }

    /// Checks if an `OutPoint` is "null".
    #[inline]
    pub fn is_null(&self) -> bool { *self == OutPoint::null() }
}

impl Default for OutPoint {
    fn default() -> Self { OutPoint::null() }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

impl_consensus_encoding!(OutPoint, txid, vout);

/// Bitcoin transaction input sequence number.
///
/// The sequence field is used for relative-timelock signaling (BIP68) and
/// replace-by-fee signaling; here it only matters as signed data: the legacy
/// `NONE`/`SINGLE` sighash modes force other inputs' sequences to
/// [`Sequence::ZERO`] so their timelocks are not committed to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Sequence(pub u32);

impl Sequence {
    /// The zero sequence number.
    pub const ZERO: Self = Sequence(0);
    /// The maximum allowable sequence number, which disables both absolute
    /// and relative locktime semantics.
    pub const MAX: Self = Sequence(0xFFFFFFFF);

    /// Returns the inner 32-bit integer.
    #[inline]
    pub fn to_consensus_u32(self) -> u32 { self.0 }
}

impl Default for Sequence {
    /// The default is `MAX` so transactions are by default final.
    fn default() -> Self { Sequence::MAX }
}

impl From<u32> for Sequence {
    fn from(n: u32) -> Self { Sequence(n) }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { fmt::Display::fmt(&self.0, f) }
}

impl Encodable for Sequence {
    #[inline]
    fn consensus_encode<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        self.0.consensus_encode(w)
    }
}

impl Decodable for Sequence {
    #[inline]
    fn consensus_decode<R: io::Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        Decodable::consensus_decode(r).map(Sequence)
    }
}

/// Bitcoin transaction input.
///
/// The witness is not part of the input's own consensus encoding; it is
/// framed separately by the containing [`Transaction`]'s segwit
/// serialization.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct TxIn {
    /// The reference to the previous output that is being used as an input.
    pub previous_output: OutPoint,
    /// The script which pushes values on the stack which will cause the
    /// referenced output's script to be accepted.
    pub script_sig: ScriptBuf,
    /// The sequence number.
    pub sequence: Sequence,
    /// Witness data: an array of byte-arrays. Only present for inputs
    /// spending segwit outputs.
    pub witness: Witness,
}

impl Default for TxIn {
    fn default() -> TxIn {
        TxIn {
            previous_output: OutPoint::default(),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::default(),
        }
    }
}

impl Encodable for TxIn {
    fn consensus_encode<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let mut len = 0;
        len += self.previous_output.consensus_encode(w)?;
        len += self.script_sig.consensus_encode(w)?;
        len += self.sequence.consensus_encode(w)?;
        Ok(len)
    }
}

impl Decodable for TxIn {
    fn consensus_decode<R: io::Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        Ok(TxIn {
            previous_output: Decodable::consensus_decode(r)?,
            script_sig: Decodable::consensus_decode(r)?,
            sequence: Decodable::consensus_decode(r)?,
            witness: Witness::default(),
        })
    }
}

/// Bitcoin transaction output.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct TxOut {
    /// The value of the output, in satoshis.
    pub value: u64,
    /// The script which must be satisfied for the output to be spent.
    pub script_pubkey: ScriptBuf,
}

impl Default for TxOut {
    /// The "null" TxOut: value `0xFFFFFFFFFFFFFFFF` (the serialization of
    /// `-1`) and an empty script. This is the placeholder consensus
    /// substitutes for outputs erased by `SIGHASH_SINGLE`.
    fn default() -> TxOut { TxOut { value: u64::MAX, script_pubkey: ScriptBuf::new() } }
}

impl_consensus_encoding!(TxOut, value, script_pubkey);

/// A Bitcoin transaction, which describes an authenticated movement of coins.
///
/// ### Serialization notes
///
/// If any inputs have nonempty witnesses, the entire transaction is
/// serialized in the post-BIP141 segwit format which includes a list of
/// witnesses. If all inputs have empty witnesses, the transaction is
/// serialized in the pre-BIP141 format.
///
/// There is one major exception to this: to avoid deserialization ambiguity,
/// if the transaction has no inputs, it is serialized in the BIP141 style.
/// (This is the reason the segwit marker reuses the "0 inputs" slot.) Be
/// aware that this differs from the transaction format in PSBT.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct Transaction {
    /// The protocol version, is currently expected to be 1 or 2 (BIP 68).
    pub version: i32,
    /// Block height or timestamp before which the transaction may not be
    /// included in a block.
    pub lock_time: u32,
    /// List of transaction inputs.
    pub input: Vec<TxIn>,
    /// List of transaction outputs.
    pub output: Vec<TxOut>,
}

impl Transaction {
    /// Computes the [`Txid`].
    ///
    /// Hashes the transaction **excluding** the segwit data (i.e. the
    /// marker, flag bytes, and the witness fields themselves). For
    /// non-segwit transactions which do not have any segwit data, this will
    /// be equal to [`Transaction::wtxid()`].
    pub fn txid(&self) -> Txid {
        let mut enc = Txid::engine();
        self.version.consensus_encode(&mut enc).expect("engines don't error");
        self.input.consensus_encode(&mut enc).expect("engines don't error");
        self.output.consensus_encode(&mut enc).expect("engines don't error");
        self.lock_time.consensus_encode(&mut enc).expect("engines don't error");
        Txid::from_engine(enc)
    }

    /// Computes the segwit version of the transaction id.
    ///
    /// Hashes the transaction **including** all segwit data (i.e. the
    /// marker, flag bytes, and the witness fields themselves). For
    /// non-segwit transactions which do not have any segwit data, this will
    /// be equal to [`Transaction::txid()`].
    pub fn wtxid(&self) -> Wtxid {
        let mut enc = Wtxid::engine();
        self.consensus_encode(&mut enc).expect("engines don't error");
        Wtxid::from_engine(enc)
    }

    /// Returns whether this transaction serializes in the segwit format,
    /// i.e. whether any input carries witness data.
    fn uses_segwit_serialization(&self) -> bool {
        self.input.iter().any(|input| !input.witness.is_empty())
    }
}

impl Encodable for Transaction {
    fn consensus_encode<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let mut len = 0;
        len += self.version.consensus_encode(w)?;

        // Legacy transaction serialization format only includes inputs and
        // outputs.
        if !self.uses_segwit_serialization() {
            len += self.input.consensus_encode(w)?;
            len += self.output.consensus_encode(w)?;
        } else {
            // BIP-141 (segwit) transaction serialization also includes
            // marker, flag, and witness data.
            len += SEGWIT_MARKER.consensus_encode(w)?;
            len += SEGWIT_FLAG.consensus_encode(w)?;
            len += self.input.consensus_encode(w)?;
            len += self.output.consensus_encode(w)?;
            for input in &self.input {
                len += input.witness.consensus_encode(w)?;
            }
        }
        len += self.lock_time.consensus_encode(w)?;
        Ok(len)
    }
}

impl Decodable for Transaction {
    fn consensus_decode<R: io::Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        let version = i32::consensus_decode(r)?;
        let input = Vec::<TxIn>::consensus_decode(r)?;
        // segwit
        if input.is_empty() {
            let segwit_flag = u8::consensus_decode(r)?;
            match segwit_flag {
                // BIP144 input witnesses
                1 => {
                    let mut input = Vec::<TxIn>::consensus_decode(r)?;
                    let output = Vec::<TxOut>::consensus_decode(r)?;
                    for txin in input.iter_mut() {
                        txin.witness = Decodable::consensus_decode(r)?;
                    }
                    if !input.is_empty() && input.iter().all(|input| input.witness.is_empty()) {
                        Err(encode::Error::ParseFailed("witness flag set but no witnesses present"))
                    } else {
                        Ok(Transaction {
                            version,
                            input,
                            output,
                            lock_time: Decodable::consensus_decode(r)?,
                        })
                    }
                }
                // We don't support anything else
                x => Err(encode::Error::UnsupportedSegwitFlag(x)),
            }
        // non-segwit
        } else {
            Ok(Transaction {
                version,
                input,
                output: Decodable::consensus_decode(r)?,
                lock_time: Decodable::consensus_decode(r)?,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{deserialize, serialize};
    use crate::hashes::{sha256d, Hash};
    use crate::internal_macros::hex;

    #[test]
    fn legacy_transaction_codec() {
        // The unsigned transaction from the BIP143 native P2WPKH example.
        let tx_bytes = hex!(
            "0100000002fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad969f00\
             00000000eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90e\
             c68a0100000000ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a78\
             3a76ac7a6d5988ac9093510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa\
             815988ac11000000"
        );
        let tx: Transaction = deserialize(&tx_bytes).unwrap();

        assert_eq!(tx.version, 1);
        assert_eq!(tx.lock_time, 17);
        assert_eq!(tx.input.len(), 2);
        assert_eq!(tx.output.len(), 2);
        assert_eq!(tx.input[0].sequence, Sequence(0xFFFFFFEE));
        assert_eq!(tx.input[1].previous_output.vout, 1);
        assert_eq!(tx.output[0].value, 112340000);

        // Without witnesses txid and wtxid coincide, and both are the double
        // SHA256 of the legacy serialization.
        assert_eq!(serialize(&tx), tx_bytes);
        assert_eq!(tx.txid().to_raw_hash(), sha256d::Hash::hash(&tx_bytes));
        assert_eq!(tx.txid().to_byte_array(), tx.wtxid().to_byte_array());
    }

    #[test]
    fn segwit_transaction_codec() {
        // The signed transaction from the BIP143 native P2WPKH example.
        let tx_bytes = hex!(
            "01000000000102fff7f7881a8099afa6940d42d1e7f6362bec38171ea3edf433541db4e4ad96\
             9f00000000494830450221008b9d1dc26ba6a9cb62127b02742fa9d754cd3bebf337f7a55d11\
             4c8e5cdd30be022040529b194ba3f9281a99f2b1c0a19c0489bc22ede944ccf4ecbab4cc618e\
             f3ed01eeffffffef51e1b804cc89d182d279655c3aa89e815b1b309fe287d9b2b55d57b90ec6\
             8a0100000000ffffffff02202cb206000000001976a9148280b37df378db99f66f85c95a783a\
             76ac7a6d5988ac9093510d000000001976a9143bde42dbee7e4dbe6a21b2d50ce2f0167faa81\
             5988ac000247304402203609e17b84f6a7d30c80bfa610b5b4542f32a8a0d5447a12fb1366d7\
             f01cc44a0220573a954c4518331561406f90300e8f3358f51928d43c212a8caed02de67eebee\
             0121025476c2e83188368da1ff3e292e7acafcdb3566bb0ad253f62fc70f07aeee635711000000"
        );
        let tx: Transaction = deserialize(&tx_bytes).unwrap();

        assert_eq!(tx.input.len(), 2);
        assert!(tx.input[0].witness.is_empty());
        assert_eq!(tx.input[1].witness.len(), 2);
        assert_eq!(serialize(&tx), tx_bytes);

        // The wtxid covers the witness bytes, the txid does not.
        assert_eq!(tx.wtxid().to_raw_hash(), sha256d::Hash::hash(&tx_bytes));
        assert_ne!(tx.txid().to_byte_array(), tx.wtxid().to_byte_array());

        // Stripping witnesses must reproduce the unsigned-style encoding and
        // leave the txid unchanged.
        let mut stripped = tx.clone();
        for input in stripped.input.iter_mut() {
            input.witness = Witness::default();
        }
        assert_eq!(stripped.txid(), tx.txid());
        assert_eq!(stripped.txid().to_raw_hash(), sha256d::Hash::hash(&serialize(&stripped)));
    }

    #[test]
    fn segwit_flag_rejected() {
        // Marker 0x00 followed by an unknown flag byte.
        let tx_bytes = hex!("010000000002");
        assert!(matches!(
            deserialize::<Transaction>(&tx_bytes),
            Err(crate::consensus::Error::UnsupportedSegwitFlag(2))
        ));
    }
}
