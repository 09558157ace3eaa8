//! TKA state and the transition engine that advances it.

use minicbor::encode::Write;
use minicbor::{Decode, Decoder, Encode, Encoder, decode, encode};
use subtle::ConstantTimeEq;

use crate::aum::{Aum, AumKind};
use crate::disablement::{VERIFIER_LEN, disablement_kdf};
use crate::{AumHash, Error, Key, KeyId, cbor};

/// most disablement secrets a checkpoint may carry.
pub const MAX_DISABLEMENT_SECRETS: usize = 32;

/// most trusted keys a checkpoint may carry.
pub const MAX_KEYS: usize = 512;

/// most banned node keys a checkpoint may carry.
pub const MAX_DENYLIST_ENTRIES: usize = 64;

/// tailnet key authority state at an instant in time.
///
/// a state is an immutable value: applying an AUM produces a fresh state
/// and never touches its input. every sequence field is optional so the
/// codec can keep an absent sequence distinct from an empty one - the two
/// encode differently and therefore hash differently.
///
/// canonically CBOR-encoded with integer map keys: `1=last_aum_hash`,
/// `2=disablement_secrets`, `3=keys`, `4=banned_node_keys`. these tags are
/// frozen; they are part of the wire contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    /// hash of the last AUM that led to this state.
    ///
    /// `None` only for the pre-genesis state.
    pub last_aum_hash: Option<AumHash>,

    /// KDF-derived verifiers which can disable the authority in the event
    /// of a consensus-breaking bug.
    pub disablement_secrets: Option<Vec<Vec<u8>>>,

    /// the public keys currently trusted by the authority.
    pub keys: Option<Vec<Key>>,

    /// denylisted node keys. signatures over these keys are not considered
    /// authorized.
    pub banned_node_keys: Option<Vec<Vec<u8>>>,
}

impl State {
    /// encode to canonical CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, Error> {
        cbor::to_vec(self)
    }

    /// decode from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, Error> {
        cbor::from_slice(bytes)
    }

    /// returns the trusted key with the specified key ID.
    pub fn get_key(&self, key_id: &KeyId) -> Result<&Key, Error> {
        self.keys
            .iter()
            .flatten()
            .find(|key| key.id().map_or(false, |id| id == *key_id))
            .ok_or(Error::NoSuchKey)
    }

    /// returns true for a valid disablement secret.
    ///
    /// derives the verifier from `secret` and compares it against each
    /// stored verifier in constant time.
    pub fn check_disablement(&self, secret: &[u8]) -> bool {
        let derived = disablement_kdf(secret);
        self.disablement_secrets
            .iter()
            .flatten()
            .any(|candidate| bool::from(derived.as_slice().ct_eq(candidate.as_slice())))
    }

    /// returns true if an AUM can chain to (be applied to) this state.
    ///
    /// either the update's parent hash matches the last applied AUM, or
    /// the state knows no parent (it is brand new).
    fn parent_matches(&self, update: &Aum) -> bool {
        match &self.last_aum_hash {
            None => true,
            Some(last) => update.prev_aum_hash.as_ref() == Some(last),
        }
    }

    /// like `clone`, except `last_aum_hash` is set from the given update.
    fn clone_for_update(&self, update: &Aum) -> Result<State, Error> {
        let mut out = self.clone();
        out.last_aum_hash = Some(update.hash()?);
        Ok(out)
    }

    /// computes a new state based on the update provided.
    ///
    /// the update MUST be verified: well-formed per [`Aum::static_validate`]
    /// and signature-checked by the caller. on success the new state's
    /// `last_aum_hash` equals the update's hash; on error `self` is
    /// untouched.
    pub fn apply_verified_aum(&self, update: &Aum) -> Result<State, Error> {
        if !self.parent_matches(update) {
            return Err(Error::ParentMismatch);
        }

        match update.message_kind {
            AumKind::NoOp => self.clone_for_update(update),

            AumKind::Checkpoint => {
                // the checkpoint replaces the current state wholesale
                let state = update.state.as_ref().ok_or(Error::MissingField("state"))?;
                state.clone_for_update(update)
            }

            AumKind::AddKey => {
                let key = update.key.as_ref().ok_or(Error::MissingField("key"))?;
                if self.get_key(&key.id()?).is_ok() {
                    return Err(Error::DuplicateKey);
                }
                let mut out = self.clone_for_update(update)?;
                out.keys.get_or_insert_with(Vec::new).push(key.clone());
                Ok(out)
            }

            AumKind::UpdateKey => {
                let key_id = update.key_id.as_ref().ok_or(Error::MissingField("key_id"))?;
                let mut updated = self.get_key(key_id)?.clone();
                if let Some(votes) = update.votes {
                    updated.votes = votes;
                }
                if let Some(meta) = &update.meta {
                    updated.meta = Some(meta.clone());
                }
                updated.static_validate()?;
                let mut out = self.clone_for_update(update)?;
                for key in out.keys.iter_mut().flatten() {
                    if key.id().map_or(false, |id| id == *key_id) {
                        *key = updated.clone();
                    }
                }
                Ok(out)
            }

            AumKind::RemoveKey => {
                let key_id = update.key_id.as_ref().ok_or(Error::MissingField("key_id"))?;
                let keys = self.keys.as_deref().unwrap_or_default();
                let index = keys
                    .iter()
                    .position(|key| key.id().map_or(false, |id| id == *key_id))
                    .ok_or(Error::NoSuchKey)?;
                let mut out = self.clone_for_update(update)?;
                if let Some(keys) = &mut out.keys {
                    keys.remove(index);
                }
                Ok(out)
            }

            AumKind::AddDenylistNodeKey => {
                let node_key = update
                    .node_key
                    .as_ref()
                    .ok_or(Error::MissingField("node_key"))?;
                if self
                    .banned_node_keys
                    .iter()
                    .flatten()
                    .any(|banned| banned == node_key)
                {
                    return Err(Error::DuplicateEntry);
                }
                let mut out = self.clone_for_update(update)?;
                out.banned_node_keys
                    .get_or_insert_with(Vec::new)
                    .push(node_key.clone());
                Ok(out)
            }

            AumKind::RemoveDenylistNodeKey => {
                let node_key = update
                    .node_key
                    .as_ref()
                    .ok_or(Error::MissingField("node_key"))?;
                let banned = self.banned_node_keys.as_deref().unwrap_or_default();
                let index = banned
                    .iter()
                    .position(|candidate| candidate == node_key)
                    .ok_or(Error::NoSuchEntry)?;
                let mut out = self.clone_for_update(update)?;
                if let Some(banned) = &mut out.banned_node_keys {
                    banned.remove(index);
                }
                Ok(out)
            }
        }
    }

    /// validates that the state is well-formed for inclusion in a
    /// checkpoint AUM.
    ///
    /// the caps bound resource use; they exist to reject insanely large
    /// checkpoints, not to be generous.
    pub fn static_validate_checkpoint(&self) -> Result<(), Error> {
        if self.last_aum_hash.is_some() {
            return Err(Error::MalformedCheckpoint(
                "cannot specify a parent aum".into(),
            ));
        }

        let secrets = self.disablement_secrets.as_deref().unwrap_or_default();
        if secrets.is_empty() {
            return Err(Error::MalformedCheckpoint(
                "at least one disablement secret required".into(),
            ));
        }
        if secrets.len() > MAX_DISABLEMENT_SECRETS {
            return Err(Error::MalformedCheckpoint(format!(
                "too many disablement secrets ({}, max {})",
                secrets.len(),
                MAX_DISABLEMENT_SECRETS
            )));
        }
        for (i, secret) in secrets.iter().enumerate() {
            if secret.len() != VERIFIER_LEN {
                return Err(Error::MalformedCheckpoint(format!(
                    "disablement[{i}]: invalid length (got {}, want {})",
                    secret.len(),
                    VERIFIER_LEN
                )));
            }
            for (j, other) in secrets.iter().enumerate().skip(i + 1) {
                if secret == other {
                    return Err(Error::MalformedCheckpoint(format!(
                        "disablement[{j}]: duplicates disablement[{i}]"
                    )));
                }
            }
        }

        let keys = self.keys.as_deref().unwrap_or_default();
        if keys.is_empty() {
            return Err(Error::MalformedCheckpoint(
                "at least one key is required".into(),
            ));
        }
        if keys.len() > MAX_KEYS {
            return Err(Error::MalformedCheckpoint(format!(
                "too many keys ({}, max {})",
                keys.len(),
                MAX_KEYS
            )));
        }
        for (i, key) in keys.iter().enumerate() {
            key.static_validate()
                .map_err(|e| Error::MalformedCheckpoint(format!("key[{i}]: {e}")))?;
            let id = key
                .id()
                .map_err(|e| Error::MalformedCheckpoint(format!("key[{i}]: {e}")))?;
            for (j, other) in keys.iter().enumerate().skip(i + 1) {
                if other.id().map_or(false, |other_id| other_id == id) {
                    return Err(Error::MalformedCheckpoint(format!(
                        "key[{j}]: duplicates key[{i}]"
                    )));
                }
            }
        }

        let banned = self.banned_node_keys.as_deref().unwrap_or_default();
        if banned.len() > MAX_DENYLIST_ENTRIES {
            return Err(Error::MalformedCheckpoint(format!(
                "too many node-key denylist entries ({}, max {})",
                banned.len(),
                MAX_DENYLIST_ENTRIES
            )));
        }
        for (i, node_key) in banned.iter().enumerate() {
            for (j, other) in banned.iter().enumerate().skip(i + 1) {
                if node_key == other {
                    return Err(Error::MalformedCheckpoint(format!(
                        "node-key entry {j} duplicates entry {i}"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl<C> Encode<C> for State {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        let len = self.last_aum_hash.is_some() as u64
            + self.disablement_secrets.is_some() as u64
            + self.keys.is_some() as u64
            + self.banned_node_keys.is_some() as u64;
        e.map(len)?;
        if let Some(hash) = &self.last_aum_hash {
            e.u8(1)?;
            hash.encode(e, ctx)?;
        }
        if let Some(secrets) = &self.disablement_secrets {
            e.u8(2)?;
            cbor::encode_byte_seq(e, secrets)?;
        }
        if let Some(keys) = &self.keys {
            e.u8(3)?.array(keys.len() as u64)?;
            for key in keys {
                key.encode(e, ctx)?;
            }
        }
        if let Some(banned) = &self.banned_node_keys {
            e.u8(4)?;
            cbor::encode_byte_seq(e, banned)?;
        }
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for State {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        let len = cbor::map_header(d)?;
        let mut seen = cbor::FieldSet::default();
        let mut out = State::default();
        for _ in 0..len {
            let tag = d.u32()?;
            seen.insert(tag)?;
            match tag {
                1 => out.last_aum_hash = Some(AumHash::decode(d, ctx)?),
                2 => out.disablement_secrets = Some(cbor::decode_byte_seq(d)?),
                3 => {
                    let n = cbor::array_header(d)?;
                    let mut keys = Vec::new();
                    for _ in 0..n {
                        keys.push(Key::decode(d, ctx)?);
                    }
                    out.keys = Some(keys);
                }
                4 => out.banned_node_keys = Some(cbor::decode_byte_seq(d)?),
                t => return Err(decode::Error::message(format!("unknown state field {t}"))),
            }
        }
        Ok(out)
    }
}
