//! opaque CBOR-encoded AUMs for wire transmission.

use base64::prelude::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{Aum, Error};

/// opaque CBOR-encoded AUM (Authority Update Message).
///
/// this wraps the raw bytes of a canonically-encoded AUM. serializes as
/// base64 in JSON for wire transmission.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct MarshaledAum(Vec<u8>);

impl MarshaledAum {
    /// encode an AUM into its marshaled form.
    pub fn encode(aum: &Aum) -> Result<Self, Error> {
        Ok(Self(aum.to_cbor()?))
    }

    /// decode the wrapped bytes back into an AUM.
    pub fn decode(&self) -> Result<Aum, Error> {
        Aum::from_cbor(&self.0)
    }

    /// returns the raw CBOR bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// returns true if the AUM is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for MarshaledAum {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for MarshaledAum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MarshaledAum({} bytes)", self.0.len())
    }
}

impl Serialize for MarshaledAum {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64_STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for MarshaledAum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = BASE64_STANDARD.decode(&s).map_err(de::Error::custom)?;
        Ok(Self(bytes))
    }
}
