// SPDX-License-Identifier: CC0-1.0

//! Bitcoin scripts.
//!
//! This module provides the raw script types. A script here is an opaque
//! byte string as far as consensus encoding is concerned (length-prefixed
//! raw opcode/data bytes); the only structural knowledge this library needs
//! is how push opcodes frame their data, which is enough to strip
//! `OP_CODESEPARATOR`s for the legacy signature hash and to check that a
//! taproot leaf script is well formed. Script *execution* is out of scope.

use core::fmt;
use core::ops::Deref;
use std::borrow::Borrow;
use std::io::{self, Write};

use crate::consensus::encode::{self, consensus_encode_with_size, Decodable, Encodable};
use crate::hashes::hex::FromHex;

/// Push the next byte as the number of bytes of data to push.
pub(crate) const OP_PUSHDATA1: u8 = 0x4c;
/// Push the next two bytes (LE) as the number of bytes of data to push.
pub(crate) const OP_PUSHDATA2: u8 = 0x4d;
/// Push the next four bytes (LE) as the number of bytes of data to push.
pub(crate) const OP_PUSHDATA4: u8 = 0x4e;
/// Marks the signature-hash boundary in legacy script evaluation.
pub const OP_CODESEPARATOR: u8 = 0xab;

/// Bitcoin script slice.
///
/// This is the borrowed counterpart of [`ScriptBuf`], like `str` is for
/// `String`.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Script([u8]);

/// An owned, growable script.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScriptBuf(Vec<u8>);

impl Script {
    /// Treat byte slice as `Script`.
    #[inline]
    pub fn from_bytes(bytes: &[u8]) -> &Script {
        // SAFETY: copied from `std`; as repr(transparent) the layout of
        // Script and [u8] is the same.
        unsafe { &*(bytes as *const [u8] as *const Script) }
    }

    /// Creates a new empty script.
    #[inline]
    pub fn empty() -> &'static Script { Script::from_bytes(&[]) }

    /// Returns the script data as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] { &self.0 }

    /// Returns a copy of the script data.
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> { self.0.to_vec() }

    /// Returns the length in bytes of the script.
    #[inline]
    pub fn len(&self) -> usize { self.0.len() }

    /// Returns whether the script is the empty script.
    #[inline]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Iterates over the script instructions.
    ///
    /// Each returned item is either a data push or a single non-push opcode;
    /// a push running past the end of the script yields an error item and
    /// ends the iteration.
    #[inline]
    pub fn instructions(&self) -> Instructions {
        Instructions { data: &self.0 }
    }

    /// Returns whether every data push in the script is complete.
    ///
    /// Scripts are opaque bytes at the consensus layer so truncated pushes
    /// are representable; contexts that need a structurally decodable script
    /// (e.g. taproot leaf scripts pulled out of a witness stack) use this.
    pub fn is_well_formed(&self) -> bool {
        self.instructions().all(|inst| inst.is_ok())
    }

    /// Returns a copy of the script with every `OP_CODESEPARATOR` removed.
    ///
    /// Data pushes are copied verbatim, so a `0xab` byte inside pushed data
    /// is not touched. If the script ends in a truncated push the malformed
    /// tail is copied unchanged.
    ///
    /// The legacy signature hash substitutes the spent output's script in
    /// this stripped form.
    pub fn without_code_separators(&self) -> ScriptBuf {
        let bytes = &self.0;
        let mut ret = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            let op = bytes[i];
            let size = match op {
                0x01..=0x4b => 1 + op as usize,
                OP_PUSHDATA1 if i + 1 < bytes.len() => 2 + bytes[i + 1] as usize,
                OP_PUSHDATA2 if i + 2 < bytes.len() =>
                    3 + u16::from_le_bytes([bytes[i + 1], bytes[i + 2]]) as usize,
                OP_PUSHDATA4 if i + 4 < bytes.len() =>
                    5 + u32::from_le_bytes([
                        bytes[i + 1],
                        bytes[i + 2],
                        bytes[i + 3],
                        bytes[i + 4],
                    ]) as usize,
                OP_PUSHDATA1 | OP_PUSHDATA2 | OP_PUSHDATA4 => {
                    // Truncated push header, keep the tail as-is.
                    ret.extend_from_slice(&bytes[i..]);
                    break;
                }
                _ => 1,
            };
            if i + size > bytes.len() {
                // Truncated push data, keep the tail as-is.
                ret.extend_from_slice(&bytes[i..]);
                break;
            }
            if op != OP_CODESEPARATOR {
                ret.extend_from_slice(&bytes[i..i + size]);
            }
            i += size;
        }
        ScriptBuf(ret)
    }
}

impl ScriptBuf {
    /// Creates a new empty script.
    #[inline]
    pub fn new() -> Self { ScriptBuf(Vec::new()) }

    /// Creates a `ScriptBuf` from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, crate::hashes::hex::Error> {
        let v = Vec::from_hex(s)?;
        Ok(ScriptBuf(v))
    }

    /// Returns a reference to unsized script.
    #[inline]
    pub fn as_script(&self) -> &Script { Script::from_bytes(&self.0) }

    /// Converts the script into a byte vector.
    #[inline]
    pub fn into_bytes(self) -> Vec<u8> { self.0 }
}

impl Deref for ScriptBuf {
    type Target = Script;

    #[inline]
    fn deref(&self) -> &Self::Target { self.as_script() }
}

impl Borrow<Script> for ScriptBuf {
    #[inline]
    fn borrow(&self) -> &Script { self.as_script() }
}

impl ToOwned for Script {
    type Owned = ScriptBuf;

    #[inline]
    fn to_owned(&self) -> Self::Owned { ScriptBuf(self.0.to_vec()) }
}

impl AsRef<Script> for Script {
    #[inline]
    fn as_ref(&self) -> &Script { self }
}

impl AsRef<Script> for ScriptBuf {
    #[inline]
    fn as_ref(&self) -> &Script { self.as_script() }
}

impl AsRef<[u8]> for Script {
    #[inline]
    fn as_ref(&self) -> &[u8] { &self.0 }
}

impl From<Vec<u8>> for ScriptBuf {
    #[inline]
    fn from(v: Vec<u8>) -> Self { ScriptBuf(v) }
}

impl From<&Script> for ScriptBuf {
    #[inline]
    fn from(s: &Script) -> Self { s.to_owned() }
}

impl From<ScriptBuf> for Vec<u8> {
    #[inline]
    fn from(s: ScriptBuf) -> Self { s.0 }
}

impl fmt::LowerHex for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Script({:x})", self)
    }
}

impl fmt::Debug for ScriptBuf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self.as_script(), f)
    }
}

impl fmt::LowerHex for ScriptBuf {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::LowerHex::fmt(self.as_script(), f)
    }
}

impl Encodable for Script {
    #[inline]
    fn consensus_encode<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        consensus_encode_with_size(&self.0, w)
    }
}

impl Encodable for ScriptBuf {
    #[inline]
    fn consensus_encode<W: Write + ?Sized>(&self, w: &mut W) -> Result<usize, io::Error> {
        self.as_script().consensus_encode(w)
    }
}

impl Decodable for ScriptBuf {
    #[inline]
    fn consensus_decode<R: io::Read + ?Sized>(r: &mut R) -> Result<Self, encode::Error> {
        Ok(ScriptBuf(Decodable::consensus_decode(r)?))
    }
}

/// A script instruction: a data push, or any other single opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// Push of zero or more bytes onto the stack.
    PushBytes(&'a [u8]),
    /// Some non-push opcode.
    Op(u8),
}

/// Ways that a script might fail to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum Error {
    /// A push operation ran off the end of the script.
    EarlyEndOfScript,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::EarlyEndOfScript => f.write_str("unexpected end of script"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::EarlyEndOfScript => None,
        }
    }
}

/// Iterator over a script returning parsed opcodes.
pub struct Instructions<'a> {
    data: &'a [u8],
}

impl<'a> Instructions<'a> {
    /// Takes a push of `len` bytes from the script, or poisons the iterator.
    fn take_push(&mut self, header: usize, len: usize) -> Option<Result<Instruction<'a>, Error>> {
        if self.data.len() < header + len {
            self.data = &[];
            return Some(Err(Error::EarlyEndOfScript));
        }
        let push = &self.data[header..header + len];
        self.data = &self.data[header + len..];
        Some(Ok(Instruction::PushBytes(push)))
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let &op = self.data.first()?;
        match op {
            0x01..=0x4b => self.take_push(1, op as usize),
            OP_PUSHDATA1 => {
                if self.data.len() < 2 {
                    self.data = &[];
                    return Some(Err(Error::EarlyEndOfScript));
                }
                let len = self.data[1] as usize;
                self.take_push(2, len)
            }
            OP_PUSHDATA2 => {
                if self.data.len() < 3 {
                    self.data = &[];
                    return Some(Err(Error::EarlyEndOfScript));
                }
                let len = u16::from_le_bytes([self.data[1], self.data[2]]) as usize;
                self.take_push(3, len)
            }
            OP_PUSHDATA4 => {
                if self.data.len() < 5 {
                    self.data = &[];
                    return Some(Err(Error::EarlyEndOfScript));
                }
                let len = u32::from_le_bytes([
                    self.data[1],
                    self.data[2],
                    self.data[3],
                    self.data[4],
                ]) as usize;
                self.take_push(5, len)
            }
            _ => {
                self.data = &self.data[1..];
                Some(Ok(Instruction::Op(op)))
            }
        }
    }
}
