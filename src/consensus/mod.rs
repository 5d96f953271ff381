// SPDX-License-Identifier: CC0-1.0

//! Bitcoin consensus.
//!
//! This module defines structures, functions, and traits that are needed to
//! conform to Bitcoin consensus serialization.

pub mod encode;

pub use self::encode::{
    deserialize, deserialize_partial, serialize, Decodable, Encodable, Error, VarInt,
};
