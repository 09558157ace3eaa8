//! tailnet-lock keypairs (ed25519).
//!
//! an authority key is an ed25519 keypair: the public half becomes a
//! trusted [`Key`] record (and doubles as the [`KeyId`]), the private half
//! signs AUMs. the state machine itself never verifies signatures -
//! `sign_aum` serves the authoring side and `verify_aum` the out-of-band
//! layer that feeds verified AUMs into the transition engine.

use std::fmt;
use std::str::FromStr;

use ed25519_consensus::{Signature, SigningKey, VerificationKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::aum::{Aum, AumSignature};
use crate::key::{Key, KeyKind};
use crate::{Error, KeyId};

/// length of ed25519 public key in bytes.
pub const LOCK_PUBLIC_KEY_LEN: usize = 32;

/// length of ed25519 private key seed in bytes.
pub const LOCK_PRIVATE_KEY_LEN: usize = 32;

/// length of an ed25519 signature in bytes.
pub const LOCK_SIGNATURE_LEN: usize = 64;

/// public half of an authority keypair.
///
/// holds bytes already validated as an ed25519 curve point. JSON form is
/// `"lockpub:<hex>"`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LockPublicKey([u8; LOCK_PUBLIC_KEY_LEN]);

impl LockPublicKey {
    /// read a public key from raw bytes, checking the curve point.
    pub fn from_slice(slice: &[u8]) -> Result<Self, Error> {
        let bytes: [u8; LOCK_PUBLIC_KEY_LEN] =
            slice.try_into().map_err(|_| Error::InvalidKeyLength {
                expected: LOCK_PUBLIC_KEY_LEN,
                actual: slice.len(),
            })?;
        VerificationKey::try_from(bytes)
            .map_err(|_| Error::InvalidKey("not an ed25519 curve point".into()))?;
        Ok(Self(bytes))
    }

    /// the raw curve-point bytes.
    pub fn as_bytes(&self) -> &[u8; LOCK_PUBLIC_KEY_LEN] {
        &self.0
    }

    /// the key ID this public key is trusted under.
    pub fn key_id(&self) -> KeyId {
        KeyId::from(self.0)
    }

    /// build a trusted key record carrying this public key.
    pub fn to_key(&self, votes: u32) -> Key {
        Key {
            kind: KeyKind::Ed25519,
            votes,
            public: self.0.to_vec(),
            meta: None,
        }
    }

    /// check a signature record against an AUM.
    ///
    /// the record must name this key, and its signature must verify over
    /// the AUM's hash.
    pub fn verify_aum(&self, aum: &Aum, sig: &AumSignature) -> Result<(), Error> {
        if sig.key_id.as_slice() != self.key_id().as_bytes().as_slice() {
            return Err(Error::InvalidSignature);
        }
        let signature =
            Signature::try_from(sig.signature.as_slice()).map_err(|_| Error::InvalidSignature)?;
        let key = VerificationKey::try_from(self.0).map_err(|_| Error::InvalidSignature)?;
        let hash = aum.hash()?;
        key.verify(&signature, hash.as_bytes())
            .map_err(|_| Error::InvalidSignature)
    }
}

impl fmt::Display for LockPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lockpub:{}", hex::encode(self.0))
    }
}

impl fmt::Debug for LockPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockPublicKey({})", self.key_id().short_string())
    }
}

impl FromStr for LockPublicKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex_str = s
            .strip_prefix("lockpub:")
            .ok_or_else(|| Error::InvalidKey("missing lockpub: prefix".into()))?;
        let mut bytes = [0u8; LOCK_PUBLIC_KEY_LEN];
        hex::decode_to_slice(hex_str, &mut bytes)?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for LockPublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LockPublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

/// private half of an authority keypair.
///
/// zeroized on drop; never printed, serialized, or compared.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct LockPrivateKey {
    #[zeroize(skip)] // SigningKey zeroizes itself on drop
    key: SigningKey,
}

impl LockPrivateKey {
    /// generate a fresh keypair from the system RNG.
    pub fn generate() -> Self {
        Self::from_seed(rand::random())
    }

    /// rebuild a keypair from a stored 32-byte seed.
    pub fn from_seed(seed: [u8; LOCK_PRIVATE_KEY_LEN]) -> Self {
        Self {
            key: SigningKey::from(seed),
        }
    }

    /// the seed bytes, for persistence. sensitive key material.
    pub fn to_seed(&self) -> [u8; LOCK_PRIVATE_KEY_LEN] {
        let mut seed = [0u8; LOCK_PRIVATE_KEY_LEN];
        seed.copy_from_slice(self.key.as_ref());
        seed
    }

    /// the public half of this keypair.
    pub fn public_key(&self) -> LockPublicKey {
        LockPublicKey(self.key.verification_key().into())
    }

    /// the key ID this keypair is trusted under.
    pub fn key_id(&self) -> KeyId {
        self.public_key().key_id()
    }

    /// sign an AUM, producing a signature record over its hash.
    pub fn sign_aum(&self, aum: &Aum) -> Result<AumSignature, Error> {
        let hash = aum.hash()?;
        Ok(AumSignature {
            key_id: self.key_id().as_bytes().to_vec(),
            signature: self.key.sign(hash.as_bytes()).to_bytes().to_vec(),
        })
    }
}

impl fmt::Debug for LockPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // identify the keypair without leaking material
        write!(f, "LockPrivateKey({})", self.key_id().short_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aum::AumKind;
    use crate::AumHash;

    fn noop_aum() -> Aum {
        Aum::new(AumKind::NoOp, Some(AumHash::of(b"parent")))
    }

    #[test]
    fn from_seed_is_deterministic() {
        let a = LockPrivateKey::from_seed([0x17; 32]);
        let b = LockPrivateKey::from_seed([0x17; 32]);
        assert_eq!(a.public_key(), b.public_key());
        assert_ne!(
            a.public_key(),
            LockPrivateKey::from_seed([0x18; 32]).public_key()
        );
    }

    #[test]
    fn seed_roundtrip_preserves_identity() {
        let original = LockPrivateKey::generate();
        let restored = LockPrivateKey::from_seed(original.to_seed());
        assert_eq!(original.key_id(), restored.key_id());
    }

    #[test]
    fn public_key_bytes_roundtrip() {
        let public = LockPrivateKey::generate().public_key();
        let restored = LockPublicKey::from_slice(public.as_bytes()).expect("from_slice failed");
        assert_eq!(restored, public);
    }

    #[test]
    fn from_slice_rejects_bad_material() {
        // wrong length
        assert!(LockPublicKey::from_slice(&[0u8; 16]).is_err());
        // right length, not a curve point
        assert!(matches!(
            LockPublicKey::from_slice(&[0xab; 32]),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn display_parse_roundtrip() {
        let public = LockPrivateKey::generate().public_key();
        let text = public.to_string();
        assert!(text.starts_with("lockpub:"));
        let parsed: LockPublicKey = text.parse().expect("parse failed");
        assert_eq!(parsed, public);
    }

    #[test]
    fn parse_requires_prefix() {
        let public = LockPrivateKey::generate().public_key();
        let bare_hex = hex::encode(public.as_bytes());
        assert!(bare_hex.parse::<LockPublicKey>().is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let public = LockPrivateKey::generate().public_key();
        let json = serde_json::to_string(&public).expect("serialize failed");
        assert_eq!(json, format!("\"{public}\""));
        let parsed: LockPublicKey = serde_json::from_str(&json).expect("deserialize failed");
        assert_eq!(parsed, public);
    }

    #[test]
    fn key_id_matches_public_material() {
        let private = LockPrivateKey::generate();
        let public = private.public_key();
        assert_eq!(private.key_id(), public.key_id());
        assert_eq!(public.key_id().as_bytes(), public.as_bytes());
    }

    #[test]
    fn to_key_builds_valid_record() {
        let public = LockPrivateKey::generate().public_key();
        let key = public.to_key(3);
        key.static_validate().expect("record should validate");
        assert_eq!(key.votes, 3);
        assert_eq!(key.id().expect("key id failed"), public.key_id());
    }

    #[test]
    fn sign_and_verify_aum() {
        let private = LockPrivateKey::generate();
        let aum = noop_aum();
        let sig = private.sign_aum(&aum).expect("sign failed");

        assert_eq!(sig.key_id, private.key_id().as_bytes().to_vec());
        assert_eq!(sig.signature.len(), LOCK_SIGNATURE_LEN);
        private
            .public_key()
            .verify_aum(&aum, &sig)
            .expect("verify failed");
    }

    #[test]
    fn verify_aum_rejects_tampered_aum() {
        let private = LockPrivateKey::generate();
        let aum = noop_aum();
        let sig = private.sign_aum(&aum).expect("sign failed");

        let mut tampered = aum.clone();
        tampered.prev_aum_hash = Some(AumHash::of(b"other parent"));
        assert!(matches!(
            private.public_key().verify_aum(&tampered, &sig),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn verify_aum_rejects_foreign_signer() {
        let signer = LockPrivateKey::generate();
        let other = LockPrivateKey::generate();
        let aum = noop_aum();
        let sig = signer.sign_aum(&aum).expect("sign failed");

        // the record names the signer, not `other`
        assert!(matches!(
            other.public_key().verify_aum(&aum, &sig),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn verify_aum_rejects_forged_record() {
        let private = LockPrivateKey::generate();
        let aum = noop_aum();
        let mut sig = private.sign_aum(&aum).expect("sign failed");
        sig.signature[0] ^= 0xff;

        assert!(matches!(
            private.public_key().verify_aum(&aum, &sig),
            Err(Error::InvalidSignature)
        ));
    }

    #[test]
    fn debug_does_not_leak_material() {
        let private = LockPrivateKey::from_seed([0x42; 32]);
        let debug = format!("{private:?}");
        assert!(debug.starts_with("LockPrivateKey("));
        assert!(!debug.contains(&hex::encode(private.to_seed())));
    }
}
