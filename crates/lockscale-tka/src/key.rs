//! trusted authority keys and their identities.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use minicbor::encode::Write;
use minicbor::{Decode, Decoder, Encode, Encoder, decode, encode};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::lock_key::LOCK_PUBLIC_KEY_LEN;
use crate::{Error, cbor};

/// largest voting weight a single key may carry.
pub const MAX_KEY_VOTES: u32 = 4096;

/// cap on the combined size of a key's metadata keys and values.
const MAX_META_BYTES: usize = 512;

/// length of a key ID in bytes (the full ed25519 public key).
pub const KEY_ID_LEN: usize = 32;

/// stable identity of an authority key.
///
/// a key's ID is its raw public key material rather than a derived
/// fingerprint, so equality on IDs is equality on keys. serializes as hex
/// in JSON.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct KeyId([u8; KEY_ID_LEN]);

impl KeyId {
    /// read a key ID back from a 32-byte slice.
    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        let bytes: [u8; KEY_ID_LEN] = slice.try_into().map_err(|_| Error::InvalidKeyLength {
            expected: KEY_ID_LEN,
            actual: slice.len(),
        })?;
        Ok(Self(bytes))
    }

    /// returns the key ID as a byte slice.
    pub fn as_bytes(&self) -> &[u8; KEY_ID_LEN] {
        &self.0
    }

    /// short prefix for log lines.
    pub fn short_string(&self) -> String {
        format!("{:02x}{:02x}..", self.0[0], self.0[1])
    }
}

impl From<[u8; KEY_ID_LEN]> for KeyId {
    fn from(bytes: [u8; KEY_ID_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", self.short_string())
    }
}

impl FromStr for KeyId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; KEY_ID_LEN];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for KeyId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for KeyId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

impl<C> Encode<C> for KeyId {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.bytes(&self.0)?;
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for KeyId {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, decode::Error> {
        KeyId::from_slice(d.bytes()?)
            .map_err(|_| decode::Error::message("key id must be 32 bytes"))
    }
}

/// type of cryptographic key.
///
/// currently only ed25519 is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum KeyKind {
    /// ed25519 signing key.
    Ed25519 = 1,
}

impl TryFrom<u8> for KeyKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(KeyKind::Ed25519),
            _ => Err(Error::InvalidKey(format!("unknown key kind {value}"))),
        }
    }
}

impl<C> Encode<C> for KeyKind {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.u8(*self as u8)?;
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for KeyKind {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, decode::Error> {
        let value = d.u8()?;
        KeyKind::try_from(value)
            .map_err(|_| decode::Error::message(format!("unknown key kind {value}")))
    }
}

/// a trusted signing key in the TKA.
///
/// canonically CBOR-encoded with integer map keys: `1=kind`, `2=votes`,
/// `3=public`, `12=meta`. absent `meta` is omitted from the encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    /// the type of key.
    pub kind: KeyKind,

    /// voting weight for quorum decisions.
    pub votes: u32,

    /// the raw public key bytes (32 bytes for ed25519).
    pub public: Vec<u8>,

    /// optional metadata (e.g., purpose, created_by).
    pub meta: Option<BTreeMap<String, String>>,
}

impl Key {
    /// encode to canonical CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, Error> {
        cbor::to_vec(self)
    }

    /// decode from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, Error> {
        cbor::from_slice(bytes)
    }

    /// get the key ID (the public key bytes as KeyId).
    pub fn id(&self) -> Result<KeyId, Error> {
        KeyId::from_slice(&self.public)
    }

    /// validate the well-formedness of this key record.
    ///
    /// checks the public-material shape, the vote weight, and the metadata
    /// mapping. a key must pass before it enters a state, and again after
    /// an update overlays votes or metadata.
    pub fn static_validate(&self) -> Result<(), Error> {
        match self.kind {
            KeyKind::Ed25519 => {}
        }
        if self.public.len() != LOCK_PUBLIC_KEY_LEN {
            return Err(Error::InvalidKey(format!(
                "public key must be {} bytes, got {}",
                LOCK_PUBLIC_KEY_LEN,
                self.public.len()
            )));
        }
        if self.votes > MAX_KEY_VOTES {
            return Err(Error::InvalidKey(format!(
                "excessive key weight: {} > {}",
                self.votes, MAX_KEY_VOTES
            )));
        }
        if let Some(meta) = &self.meta {
            let mut total = 0usize;
            for (key, value) in meta {
                if key.is_empty() {
                    return Err(Error::InvalidKey("empty meta key".into()));
                }
                total += key.len() + value.len();
            }
            if total > MAX_META_BYTES {
                return Err(Error::InvalidKey(format!(
                    "key metadata too large: {total} bytes > {MAX_META_BYTES}"
                )));
            }
        }
        Ok(())
    }
}

impl<C> Encode<C> for Key {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        let len = 3 + self.meta.is_some() as u64;
        e.map(len)?;
        e.u8(1)?;
        self.kind.encode(e, ctx)?;
        e.u8(2)?.u32(self.votes)?;
        e.u8(3)?.bytes(&self.public)?;
        if let Some(meta) = &self.meta {
            e.u8(12)?;
            cbor::encode_meta(e, meta)?;
        }
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for Key {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        let len = cbor::map_header(d)?;
        let mut seen = cbor::FieldSet::default();
        let mut kind = None;
        let mut votes = None;
        let mut public = None;
        let mut meta = None;
        for _ in 0..len {
            let tag = d.u32()?;
            seen.insert(tag)?;
            match tag {
                1 => kind = Some(KeyKind::decode(d, ctx)?),
                2 => votes = Some(d.u32()?),
                3 => public = Some(d.bytes()?.to_vec()),
                12 => meta = Some(cbor::decode_meta(d)?),
                t => return Err(decode::Error::message(format!("unknown key field {t}"))),
            }
        }
        Ok(Key {
            kind: kind.ok_or_else(|| decode::Error::message("missing key field 1 (kind)"))?,
            votes: votes.ok_or_else(|| decode::Error::message("missing key field 2 (votes)"))?,
            public: public
                .ok_or_else(|| decode::Error::message("missing key field 3 (public)"))?,
            meta,
        })
    }
}
