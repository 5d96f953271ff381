// SPDX-License-Identifier: CC0-1.0

//! Internal macros.
//!
//! Macros meant to be used inside the library only.

/// Implements consensus (de)serialization for a struct as the concatenation
/// of its fields, in declaration order.
macro_rules! impl_consensus_encoding {
    ($thing:ident, $($field:ident),+) => (
        impl $crate::consensus::Encodable for $thing {
            #[inline]
            fn consensus_encode<W: std::io::Write + ?Sized>(
                &self,
                w: &mut W,
            ) -> Result<usize, std::io::Error> {
                let mut len = 0;
                $(len += self.$field.consensus_encode(w)?;)+
                Ok(len)
            }
        }

        impl $crate::consensus::Decodable for $thing {
            #[inline]
            fn consensus_decode<R: std::io::Read + ?Sized>(
                r: &mut R,
            ) -> Result<$thing, $crate::consensus::encode::Error> {
                Ok($thing {
                    $($field: $crate::consensus::Decodable::consensus_decode(r)?),+
                })
            }
        }
    );
}
pub(crate) use impl_consensus_encoding;

/// Implements consensus (de)serialization for a hash newtype as its raw
/// 32 bytes, in the internally-computed byte order.
macro_rules! impl_hashencode {
    ($hashtype:ident) => {
        impl $crate::consensus::Encodable for $hashtype {
            #[inline]
            fn consensus_encode<W: std::io::Write + ?Sized>(
                &self,
                w: &mut W,
            ) -> Result<usize, std::io::Error> {
                use $crate::hashes::Hash as _;
                self.as_byte_array().consensus_encode(w)
            }
        }

        impl $crate::consensus::Decodable for $hashtype {
            #[inline]
            fn consensus_decode<R: std::io::Read + ?Sized>(
                r: &mut R,
            ) -> Result<Self, $crate::consensus::encode::Error> {
                use $crate::hashes::Hash as _;
                Ok(Self::from_byte_array(
                    <<$hashtype as $crate::hashes::Hash>::Bytes>::consensus_decode(r)?,
                ))
            }
        }
    };
}
pub(crate) use impl_hashencode;

/// Parses a hex literal into a `Vec<u8>`, panicking on bad input. Test code only.
#[cfg(test)]
macro_rules! hex {
    ($hex:expr) => {{
        use $crate::hashes::hex::FromHex;
        Vec::<u8>::from_hex($hex).unwrap()
    }};
}
#[cfg(test)]
pub(crate) use hex;
