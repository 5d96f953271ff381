// SPDX-License-Identifier: CC0-1.0

//! ECDSA Bitcoin signatures.
//!
//! This module provides ECDSA signatures used by Bitcoin that can be
//! roundtrip (de)serialized.
//!
//! A Bitcoin transaction signature is a DER-encoded ECDSA signature with one
//! appended byte holding the low eight bits of the sighash flags. An empty
//! byte string is not a signature: it is the placeholder scripts use for a
//! missing signature, and this module makes it unrepresentable rather than
//! encodable (decoding it fails with [`Error::EmptySignature`]).

use core::str::FromStr;
use core::{fmt, iter};
use std::io::{self, Write};

use crate::crypto::sighash::EcdsaSighashType;
use crate::hashes::hex::FromHex;

const MAX_SIG_LEN: usize = 73;

/// An ECDSA signature with the corresponding hash type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    /// The underlying ECDSA Signature.
    pub sig: secp256k1::ecdsa::Signature,
    /// The corresponding hash type.
    pub hash_ty: EcdsaSighashType,
}

impl Signature {
    /// Constructs an ECDSA Bitcoin signature for [`EcdsaSighashType::All`].
    pub fn sighash_all(sig: secp256k1::ecdsa::Signature) -> Signature {
        Signature { sig, hash_ty: EcdsaSighashType::All }
    }

    /// Deserializes from slice.
    ///
    /// The decode failures are distinguished: an empty slice, undecodable
    /// signature bytes, and a final flag byte whose base hash mode is
    /// undefined (tested with the low five bits masked, so the
    /// `ANYONECANPAY` bit and the unused bits 5/6 do not make a flag
    /// unknown). A known flag byte with unused bits set is accepted and
    /// normalized through [`EcdsaSighashType::from_consensus`].
    pub fn from_slice(sl: &[u8]) -> Result<Self, Error> {
        let (hash_ty, sig) = sl.split_last().ok_or(Error::EmptySignature)?;
        let hash_ty = *hash_ty as u32;
        if EcdsaSighashType::is_unknown(hash_ty) {
            return Err(Error::UnknownSighashType(hash_ty));
        }
        let hash_ty = EcdsaSighashType::from_consensus(hash_ty);
        let sig = secp256k1::ecdsa::Signature::from_der(sig).map_err(Error::Secp256k1)?;
        Ok(Signature { sig, hash_ty })
    }

    /// Serializes an ECDSA signature (inner secp256k1 signature in DER
    /// format) with the sighash flag byte appended.
    ///
    /// This does **not** perform extra heap allocation.
    pub fn serialize(&self) -> SerializedSignature {
        let mut buf = [0u8; MAX_SIG_LEN];
        let signature = self.sig.serialize_der();
        buf[..signature.len()].copy_from_slice(&signature);
        buf[signature.len()] = self.hash_ty as u8;
        SerializedSignature { data: buf, len: signature.len() + 1 }
    }

    /// Serializes an ECDSA signature (inner secp256k1 signature in DER
    /// format) with the sighash flag byte appended, into a `Vec`.
    ///
    /// Note: this performs an extra heap allocation, you might prefer the
    /// [`serialize`](Self::serialize) method instead.
    pub fn to_vec(self) -> Vec<u8> {
        self.sig
            .serialize_der()
            .iter()
            .copied()
            .chain(iter::once(self.hash_ty as u8))
            .collect()
    }

    /// Serializes an ECDSA signature (inner secp256k1 signature in DER
    /// format) to a `writer`.
    #[inline]
    pub fn serialize_to_writer<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), io::Error> {
        let sig = self.serialize();
        sig.write_to(writer)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for byte in self.sig.serialize_der().iter() {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "{:02x}", self.hash_ty as u8)
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = Vec::from_hex(s).map_err(Error::Hex)?;
        Signature::from_slice(&bytes)
    }
}

/// Holds signature serialized in-line (not in `Vec`).
///
/// This avoids allocation and allows proving maximum size of the signature
/// (73 bytes). The type can be used largely as a byte slice.
#[derive(Copy, Clone)]
pub struct SerializedSignature {
    data: [u8; MAX_SIG_LEN],
    len: usize,
}

impl SerializedSignature {
    /// Returns an iterator over bytes of the signature.
    #[inline]
    pub fn iter(&self) -> core::slice::Iter<'_, u8> { self.into_iter() }

    /// Writes this serialized signature to a `writer`.
    #[inline]
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> Result<(), io::Error> {
        writer.write_all(self)
    }
}

impl core::ops::Deref for SerializedSignature {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target { &self.data[..self.len] }
}

impl AsRef<[u8]> for SerializedSignature {
    #[inline]
    fn as_ref(&self) -> &[u8] { self }
}

impl core::borrow::Borrow<[u8]> for SerializedSignature {
    #[inline]
    fn borrow(&self) -> &[u8] { self }
}

impl fmt::Debug for SerializedSignature {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { fmt::Display::fmt(self, f) }
}

impl fmt::Display for SerializedSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for byte in self.iter() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl PartialEq for SerializedSignature {
    #[inline]
    fn eq(&self, other: &SerializedSignature) -> bool { **self == **other }
}

impl Eq for SerializedSignature {}

impl core::hash::Hash for SerializedSignature {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) { core::hash::Hash::hash(&**self, state) }
}

impl<'a> IntoIterator for &'a SerializedSignature {
    type IntoIter = core::slice::Iter<'a, u8>;
    type Item = &'a u8;

    #[inline]
    fn into_iter(self) -> Self::IntoIter { (*self).iter() }
}

/// An ECDSA signature-related error.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Hex decoding error.
    Hex(crate::hashes::hex::Error),
    /// Base flag mode in the appended byte is undefined.
    UnknownSighashType(u32),
    /// Signature was empty.
    EmptySignature,
    /// A secp256k1 error.
    Secp256k1(secp256k1::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match *self {
            Hex(ref e) => write!(f, "signature hex decoding error: {}", e),
            UnknownSighashType(hash_ty) => write!(f, "unknown hash type: {:#x}", hash_ty),
            EmptySignature => write!(f, "cannot decode an empty signature"),
            Secp256k1(ref e) => write!(f, "invalid DER signature: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        use Error::*;

        match *self {
            Hex(ref e) => Some(e),
            Secp256k1(ref e) => Some(e),
            UnknownSighashType(_) | EmptySignature => None,
        }
    }
}

impl From<secp256k1::Error> for Error {
    fn from(e: secp256k1::Error) -> Self { Error::Secp256k1(e) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal_macros::hex;

    const SIG_HEX: &str = "3046022100839c1fbc5304de944f697c9f4b1d01d1faeba32d751c0f7acb21ac8a0f436a72022100e89bd46bb3a5a62adc679f659b7ce876d83ee297c7a5587b2011c4fcc72eab45";

    #[test]
    fn signature_roundtrip_all() {
        let mut ser = hex!(SIG_HEX);
        ser.push(0x01);

        let sig = Signature::from_slice(&ser).unwrap();
        assert_eq!(sig.hash_ty, EcdsaSighashType::All);
        assert_eq!(&sig.serialize()[..], &ser[..]);
        assert_eq!(sig.to_vec(), ser);
        assert_eq!(sig.to_string(), format!("{}01", SIG_HEX));

        let mut buf = vec![];
        sig.serialize_to_writer(&mut buf).expect("write failed");
        assert_eq!(buf, ser);

        // String roundtrip.
        assert_eq!(Signature::from_str(&sig.to_string()).unwrap(), sig);
    }

    #[test]
    fn signature_decode_failures_are_distinguished() {
        // Empty input.
        assert_eq!(Signature::from_slice(&[]), Err(Error::EmptySignature));

        // Unknown hash type: base mode 0x04 is undefined, with or without
        // the ANYONECANPAY bit.
        let mut ser = hex!(SIG_HEX);
        ser.push(0x04);
        assert_eq!(Signature::from_slice(&ser), Err(Error::UnknownSighashType(0x04)));
        *ser.last_mut().unwrap() = 0x84;
        assert_eq!(Signature::from_slice(&ser), Err(Error::UnknownSighashType(0x84)));

        // Undecodable signature bytes.
        assert!(matches!(
            Signature::from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x01]),
            Err(Error::Secp256k1(_))
        ));
    }

    #[test]
    fn signature_nonstandard_known_flag_normalizes() {
        // 0x21 has a defined base mode (ALL) with an unused bit set; decode
        // accepts it and normalizes the stored type.
        let mut ser = hex!(SIG_HEX);
        ser.push(0x21);
        let sig = Signature::from_slice(&ser).unwrap();
        assert_eq!(sig.hash_ty, EcdsaSighashType::All);
        assert_eq!(*sig.serialize().last().unwrap(), 0x01);
    }
}
