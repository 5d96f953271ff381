// SPDX-License-Identifier: CC0-1.0

//! Witness data for transaction inputs.
//!
//! The witness is an ordered stack of byte strings attached to a segwit
//! input. On the wire it is framed as a compact-size element count followed
//! by each element with its own compact-size length prefix.

use core::fmt;
use core::ops::Index;
use std::io::{self, Write};

use crate::consensus::encode::{self, consensus_encode_with_size, Decodable, Encodable, VarInt};
use crate::crypto::ecdsa;

/// The witness stack of a transaction input.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Witness {
    content: Vec<Vec<u8>>,
}

impl Witness {
    /// Creates a new empty witness.
    #[inline]
    pub fn new() -> Self { Witness::default() }

    /// Creates a witness from a list of stack elements.
    pub fn from_slice<T: AsRef<[u8]>>(slice: &[T]) -> Self {
        Witness { content: slice.iter().map(|e| e.as_ref().to_vec()).collect() }
    }

    /// Returns the number of elements on the witness stack.
    #[inline]
    pub fn len(&self) -> usize { self.content.len() }

    /// Returns whether the witness stack is empty.
    #[inline]
    pub fn is_empty(&self) -> bool { self.content.is_empty() }

    /// Pushes a new element on the witness stack.
    pub fn push<T: AsRef<[u8]>>(&mut self, new_element: T) {
        self.content.push(new_element.as_ref().to_vec());
    }

    /// Pushes an ECDSA signature with its sighash flag byte appended, the
    /// form signatures appear in within witnesses.
    pub fn push_ecdsa_signature(&mut self, signature: &ecdsa::Signature) {
        self.push(signature.serialize());
    }

    /// Returns the witness element at the given index, if any.
    #[inline]
    pub fn nth(&self, index: usize) -> Option<&[u8]> {
        self.content.get(index).map(|e| &e[..])
    }

    /// Returns the last element on the stack, if any.
    #[inline]
    pub fn last(&self) -> Option<&[u8]> { self.nth(self.len().checked_sub(1)?) }

    /// Returns the second-to-last element on the stack, if any.
    #[inline]
    pub fn second_to_last(&self) -> Option<&[u8]> { self.nth(self.len().checked_sub(2)?) }

    /// Returns the third-to-last element on the stack, if any.
    #[inline]
    pub fn third_to_last(&self) -> Option<&[u8]> { self.nth(self.len().checked_sub(3)?) }

    /// Returns an iterator over the stack elements, bottom first.
    #[inline]
    pub fn iter(&self) -> Iter {
        Iter(self.content.iter())
    }

    /// Returns the stack elements as a vector of byte vectors.
    pub fn to_vec(&self) -> Vec<Vec<u8>> { self.content.clone() }

    /// Clears the witness stack.
    #[inline]
    pub fn clear(&mut self) { self.content.clear(); }
}

/// An iterator over a witness stack, bottom first.
pub struct Iter<'a>(core::slice::Iter<'a, Vec<u8>>);

impl<'a> Iterator for Iter<'a> {
    type Item = &'a [u8];

    #[inline]
    fn next(&mut self) -> Option<Self::Item> { self.0.next().map(|e| &e[..]) }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) { self.0.size_hint() }
}

impl<'a> ExactSizeIterator for Iter<'a> {}

impl<'a> IntoIterator for &'a Witness {
    type IntoIter = Iter<'a>;
    type Item = &'a [u8];

    #[inline]
    fn into_iter(self) -> Self::IntoIter { self.iter() }
}

impl From<Vec<Vec<u8>>> for Witness {
    #[inline]
    fn from(content: Vec<Vec<u8>>) -> Self { Witness { content } }
}

impl Index<usize> for Witness {
    type Output = [u8];

    fn index(&self, index: usize) -> &Self::Output { self.nth(index).expect("out of bounds") }
}

impl fmt::Debug for Witness {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Witness[")?;
        for (i, elem) in self.content.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            for byte in elem.iter() {
                write!(f, "{:02x}", byte)?;
            }
        }
        f.write_str("]")
    }
}

impl Encodable for Witness {
    fn consensus_encode<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        let mut len = VarInt(self.content.len() as u64).consensus_encode(w)?;
        for elem in self.content.iter() {
            len += consensus_encode_with_size(elem, w)?;
        }
        Ok(len)
    }
}

impl Decodable for Witness {
    fn consensus_decode<R: io::Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        let content: Vec<Vec<u8>> = Decodable::consensus_decode(r)?;
        Ok(Witness { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{deserialize, serialize};
    use crate::internal_macros::hex;

    #[test]
    fn witness_tail_accessors() {
        let mut witness = Witness::new();
        assert!(witness.is_empty());
        assert_eq!(witness.last(), None);
        assert_eq!(witness.second_to_last(), None);

        witness.push(hex!("00"));
        witness.push(hex!("0102"));
        witness.push(hex!("030405"));

        assert_eq!(witness.len(), 3);
        assert_eq!(witness.last(), Some(&[0x03, 0x04, 0x05][..]));
        assert_eq!(witness.second_to_last(), Some(&[0x01, 0x02][..]));
        assert_eq!(witness.third_to_last(), Some(&[0x00][..]));
        assert_eq!(witness.nth(1), Some(&[0x01, 0x02][..]));
        assert_eq!(&witness[0], &[0x00][..]);
    }

    #[test]
    fn witness_roundtrip() {
        // BIP143 P2WPKH witness: signature then pubkey.
        let ser = hex!(
            "0247304402203609e17b84f6a7d30c80bfa610b5b4542f32a8a0d5447a12fb1366d7f01cc44a\
             0220573a954c4518331561406f90300e8f3358f51928d43c212a8caed02de67eebee0121\
             025476c2e83188368da1ff3e292e7acafcdb3566bb0ad253f62fc70f07aeee6357"
        );
        let witness: Witness = deserialize(&ser).unwrap();
        assert_eq!(witness.len(), 2);
        assert_eq!(witness.last().map(|e| e.len()), Some(33));
        assert_eq!(serialize(&witness), ser);
    }
}
