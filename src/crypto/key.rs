// SPDX-License-Identifier: CC0-1.0

//! Bitcoin keys.
//!
//! This module provides the x-only key types used by taproot outputs and
//! the tweaking operation that commits an internal key to a script tree.

use secp256k1::{Parity, Secp256k1, Verification};

pub use secp256k1::XOnlyPublicKey;

use crate::taproot::{TapNodeHash, TapTweakHash};

/// Untweaked BIP-340 x-coordinate-only public key.
pub type UntweakedPublicKey = XOnlyPublicKey;

/// Tweaked BIP-340 x-coordinate-only public key.
///
/// The type-level split from [`UntweakedPublicKey`] prevents accidentally
/// using an internal key where an output key is required and vice versa.
#[derive(Copy, Clone, PartialEq, Eq, Debug, PartialOrd, Ord, Hash)]
pub struct TweakedPublicKey(XOnlyPublicKey);

impl TweakedPublicKey {
    /// Creates a new [`TweakedPublicKey`] from a [`XOnlyPublicKey`]. No
    /// tweak is applied, consider calling [`TapTweak::tap_tweak`] on an
    /// [`UntweakedPublicKey`] instead of using this constructor.
    ///
    /// This method is dangerous and can lead to loss of funds if used
    /// incorrectly. Specifically, in multi-party protocols a peer can
    /// provide a value that allows them to steal.
    #[inline]
    pub fn dangerous_assume_tweaked(key: XOnlyPublicKey) -> TweakedPublicKey {
        TweakedPublicKey(key)
    }

    /// Returns the underlying public key.
    #[inline]
    pub fn to_inner(self) -> XOnlyPublicKey { self.0 }

    /// Serializes the key as a byte-encoded x coordinate value (32 bytes).
    #[inline]
    pub fn serialize(&self) -> [u8; 32] { self.0.serialize() }
}

impl From<TweakedPublicKey> for XOnlyPublicKey {
    #[inline]
    fn from(pair: TweakedPublicKey) -> Self { pair.0 }
}

/// A trait for tweaking BIP340 key types (x-only public keys).
pub trait TapTweak {
    /// Tweaked key type with optional auxiliary information.
    type TweakedAux;
    /// Tweaked key type.
    type TweakedKey;

    /// Tweaks an untweaked key with the optional script tree merkle root.
    ///
    /// This is done by using the equation Q = P + H(P|c)G, where
    ///  * Q is the tweaked public key
    ///  * P is the internal public key
    ///  * H is the hash function
    ///  * c is the commitment data
    ///  * G is the generator point
    ///
    /// # Returns
    ///
    /// The tweaked key and its parity.
    fn tap_tweak<C: Verification>(
        self,
        secp: &Secp256k1<C>,
        merkle_root: Option<TapNodeHash>,
    ) -> Self::TweakedAux;

    /// Directly converts an untweaked key to a tweaked one.
    ///
    /// This method is dangerous and can lead to loss of funds if used
    /// incorrectly. Specifically, in multi-party protocols a peer can
    /// provide a value that allows them to steal.
    fn dangerous_assume_tweaked(self) -> Self::TweakedKey;
}

impl TapTweak for UntweakedPublicKey {
    type TweakedAux = (TweakedPublicKey, Parity);
    type TweakedKey = TweakedPublicKey;

    /// Tweaks an untweaked public key with the optional script tree merkle
    /// root.
    ///
    /// A failing tweak (a tweak scalar at or beyond the curve order, or a
    /// point at infinity) indicates a malformed key and is statistically
    /// unreachable for honestly derived hashes, so it is treated as fatal
    /// rather than recoverable.
    ///
    /// # Returns
    ///
    /// The tweaked key and its parity.
    fn tap_tweak<C: Verification>(
        self,
        secp: &Secp256k1<C>,
        merkle_root: Option<TapNodeHash>,
    ) -> (TweakedPublicKey, Parity) {
        let tweak = TapTweakHash::from_key_and_tweak(self, merkle_root).to_scalar();
        let (output_key, parity) = self.add_tweak(secp, &tweak).expect("tap tweak failed");

        debug_assert!(self.tweak_add_check(secp, &output_key, parity, tweak));
        (TweakedPublicKey(output_key), parity)
    }

    fn dangerous_assume_tweaked(self) -> TweakedPublicKey { TweakedPublicKey(self) }
}

#[cfg(test)]
mod tests {
    use core::str::FromStr;

    use secp256k1::Secp256k1;

    use super::*;

    #[test]
    fn tap_tweak_roundtrips_with_check() {
        let secp = Secp256k1::verification_only();
        // The BIP341 wallet test vectors' first internal key.
        let internal_key = UntweakedPublicKey::from_str(
            "d6889cb081036e0faefa3a35157ad71086b123b2b144b649798b494c300a961d",
        )
        .unwrap();

        let (output_key, parity) = internal_key.tap_tweak(&secp, None);
        let tweak = TapTweakHash::from_key_and_tweak(internal_key, None).to_scalar();
        assert!(internal_key.tweak_add_check(&secp, &output_key.to_inner(), parity, tweak));
        assert_ne!(output_key.serialize(), internal_key.serialize());
    }
}
