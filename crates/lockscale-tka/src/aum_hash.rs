//! AUM digests - the links of the TKA hash chain.

use std::fmt;
use std::str::FromStr;

use blake2::{Blake2s256, Digest};
use minicbor::encode::Write;
use minicbor::{Decode, Decoder, Encode, Encoder, decode, encode};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::Error;

/// length of an AUM hash in bytes (BLAKE2s-256).
pub const AUM_HASH_LEN: usize = 32;

/// identifies an AUM in the TKA log.
///
/// an AUM hash is the BLAKE2s-256 digest of the AUM's canonical encoding.
/// every non-genesis AUM names its parent by this hash, which is what makes
/// the log a chain: agreeing on a head means agreeing on the whole history
/// behind it.
///
/// displays and JSON-serializes as lowercase hex, and parses back from it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AumHash([u8; AUM_HASH_LEN]);

impl AumHash {
    /// digest `data` into the hash that identifies it in the chain.
    ///
    /// fixed to BLAKE2s-256 with no personalization; the digest is part of
    /// the wire contract.
    pub fn of(data: &[u8]) -> Self {
        Self(Blake2s256::digest(data).into())
    }

    /// read a hash back from a 32-byte slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        let bytes: [u8; AUM_HASH_LEN] =
            slice.try_into().map_err(|_| Error::InvalidHashLength {
                expected: AUM_HASH_LEN,
                actual: slice.len(),
            })?;
        Ok(Self(bytes))
    }

    /// returns the hash as a byte slice.
    pub fn as_bytes(&self) -> &[u8; AUM_HASH_LEN] {
        &self.0
    }
}

impl From<[u8; AUM_HASH_LEN]> for AumHash {
    fn from(bytes: [u8; AUM_HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for AumHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for AumHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // full hashes drown log lines; the first few bytes identify a head
        // well enough for debugging
        write!(f, "AumHash({}..)", hex::encode(&self.0[..4]))
    }
}

impl FromStr for AumHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; AUM_HASH_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for AumHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AumHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

impl<C> Encode<C> for AumHash {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.bytes(&self.0)?;
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for AumHash {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, decode::Error> {
        AumHash::from_slice(d.bytes()?)
            .map_err(|_| decode::Error::message("aum hash must be 32 bytes"))
    }
}
