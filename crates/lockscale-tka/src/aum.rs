//! authority update message (AUM) for the TKA log.

use std::collections::BTreeMap;

use minicbor::encode::Write;
use minicbor::{Decode, Decoder, Encode, Encoder, decode, encode};

use crate::{AumHash, Error, Key, KeyId, State, cbor};

/// type of AUM operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AumKind {
    /// add a new trusted key.
    AddKey = 1,
    /// remove a trusted key.
    RemoveKey = 2,
    /// no-op, advances the chain head only.
    NoOp = 3,
    /// update key metadata/votes.
    UpdateKey = 4,
    /// full state checkpoint.
    Checkpoint = 5,
    /// ban a node key.
    AddDenylistNodeKey = 6,
    /// unban a node key.
    RemoveDenylistNodeKey = 7,
}

impl TryFrom<u8> for AumKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AumKind::AddKey),
            2 => Ok(AumKind::RemoveKey),
            3 => Ok(AumKind::NoOp),
            4 => Ok(AumKind::UpdateKey),
            5 => Ok(AumKind::Checkpoint),
            6 => Ok(AumKind::AddDenylistNodeKey),
            7 => Ok(AumKind::RemoveDenylistNodeKey),
            _ => Err(Error::UnhandledMessageKind(value)),
        }
    }
}

impl<C> Encode<C> for AumKind {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.u8(*self as u8)?;
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for AumKind {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, decode::Error> {
        let value = d.u8()?;
        AumKind::try_from(value)
            .map_err(|_| decode::Error::message(format!("unhandled message kind {value}")))
    }
}

/// signature on an AUM by a trusted key.
///
/// the core round-trips signatures opaquely; verifying them is the job of
/// the layer that feeds AUMs into the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AumSignature {
    /// the key ID that signed this AUM.
    pub key_id: Vec<u8>,

    /// the ed25519 signature.
    pub signature: Vec<u8>,
}

impl AumSignature {
    /// encode to canonical CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, Error> {
        cbor::to_vec(self)
    }

    /// decode from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, Error> {
        cbor::from_slice(bytes)
    }
}

impl<C> Encode<C> for AumSignature {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.map(2)?;
        e.u8(1)?.bytes(&self.key_id)?;
        e.u8(2)?.bytes(&self.signature)?;
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for AumSignature {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, decode::Error> {
        let len = cbor::map_header(d)?;
        let mut seen = cbor::FieldSet::default();
        let mut key_id = None;
        let mut signature = None;
        for _ in 0..len {
            let tag = d.u32()?;
            seen.insert(tag)?;
            match tag {
                1 => key_id = Some(d.bytes()?.to_vec()),
                2 => signature = Some(d.bytes()?.to_vec()),
                t => {
                    return Err(decode::Error::message(format!(
                        "unknown signature field {t}"
                    )));
                }
            }
        }
        Ok(AumSignature {
            key_id: key_id
                .ok_or_else(|| decode::Error::message("missing signature field 1 (key_id)"))?,
            signature: signature
                .ok_or_else(|| decode::Error::message("missing signature field 2 (signature)"))?,
        })
    }
}

/// authority update message - an entry in the TKA append-only log.
///
/// canonically CBOR-encoded with integer map keys: `1=message_kind`,
/// `2=prev_aum_hash`, `3=key`, `4=key_id`, `5=state`, `6=votes`, `7=meta`,
/// `8=node_key`, `23=signatures`. absent fields (and an empty signature
/// list) are omitted from the encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aum {
    /// the type of operation.
    pub message_kind: AumKind,

    /// hash of the previous AUM (None for genesis).
    pub prev_aum_hash: Option<AumHash>,

    /// key to add (for AddKey).
    pub key: Option<Key>,

    /// key ID to remove/update (for RemoveKey/UpdateKey).
    pub key_id: Option<KeyId>,

    /// full state checkpoint (for Checkpoint).
    pub state: Option<State>,

    /// new vote count (for UpdateKey).
    pub votes: Option<u32>,

    /// new metadata (for UpdateKey).
    pub meta: Option<BTreeMap<String, String>>,

    /// node key to ban/unban (for the denylist kinds).
    pub node_key: Option<Vec<u8>>,

    /// signatures from trusted keys. not covered by [`Aum::hash`].
    pub signatures: Vec<AumSignature>,
}

impl Aum {
    /// a bare AUM of the given kind with every optional field absent.
    pub fn new(message_kind: AumKind, prev_aum_hash: Option<AumHash>) -> Self {
        Self {
            message_kind,
            prev_aum_hash,
            key: None,
            key_id: None,
            state: None,
            votes: None,
            meta: None,
            node_key: None,
            signatures: Vec::new(),
        }
    }

    /// encode to canonical CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, Error> {
        cbor::to_vec(self)
    }

    /// decode from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, Error> {
        cbor::from_slice(bytes)
    }

    /// compute the hash of this AUM (without signatures).
    ///
    /// the chain commits to message content only, so re-signing an AUM
    /// never changes its identity.
    pub fn hash(&self) -> Result<AumHash, Error> {
        let mut unsigned = self.clone();
        unsigned.signatures = Vec::new();

        Ok(AumHash::of(&unsigned.to_cbor()?))
    }

    /// validate the well-formedness of this AUM.
    ///
    /// each message kind must carry exactly the fields it needs: required
    /// fields present, fields belonging to other kinds absent. embedded
    /// keys and checkpoint states are validated recursively.
    pub fn static_validate(&self) -> Result<(), Error> {
        if let Some(key) = &self.key {
            key.static_validate()?;
        }
        if let Some(state) = &self.state {
            state.static_validate_checkpoint()?;
        }
        if let Some(node_key) = &self.node_key {
            if node_key.is_empty() {
                return Err(Error::MalformedAum("empty node key"));
            }
        }

        let (needs_key, needs_key_id, needs_state, needs_node_key) = match self.message_kind {
            AumKind::AddKey => (true, false, false, false),
            AumKind::RemoveKey | AumKind::UpdateKey => (false, true, false, false),
            AumKind::Checkpoint => (false, false, true, false),
            AumKind::AddDenylistNodeKey | AumKind::RemoveDenylistNodeKey => {
                (false, false, false, true)
            }
            AumKind::NoOp => (false, false, false, false),
        };

        if needs_key && self.key.is_none() {
            return Err(Error::MissingField("key"));
        }
        if needs_key_id && self.key_id.is_none() {
            return Err(Error::MissingField("key_id"));
        }
        if needs_state && self.state.is_none() {
            return Err(Error::MissingField("state"));
        }
        if needs_node_key && self.node_key.is_none() {
            return Err(Error::MissingField("node_key"));
        }

        if !needs_key && self.key.is_some() {
            return Err(Error::MalformedAum("key not valid for this message kind"));
        }
        if !needs_key_id && self.key_id.is_some() {
            return Err(Error::MalformedAum("key_id not valid for this message kind"));
        }
        if !needs_state && self.state.is_some() {
            return Err(Error::MalformedAum("state not valid for this message kind"));
        }
        if !needs_node_key && self.node_key.is_some() {
            return Err(Error::MalformedAum(
                "node_key not valid for this message kind",
            ));
        }
        if self.message_kind != AumKind::UpdateKey && (self.votes.is_some() || self.meta.is_some())
        {
            return Err(Error::MalformedAum(
                "votes/meta not valid for this message kind",
            ));
        }
        Ok(())
    }
}

impl<C> Encode<C> for Aum {
    fn encode<W: Write>(
        &self,
        e: &mut Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        let len = 1
            + self.prev_aum_hash.is_some() as u64
            + self.key.is_some() as u64
            + self.key_id.is_some() as u64
            + self.state.is_some() as u64
            + self.votes.is_some() as u64
            + self.meta.is_some() as u64
            + self.node_key.is_some() as u64
            + !self.signatures.is_empty() as u64;
        e.map(len)?;
        e.u8(1)?;
        self.message_kind.encode(e, ctx)?;
        if let Some(prev) = &self.prev_aum_hash {
            e.u8(2)?;
            prev.encode(e, ctx)?;
        }
        if let Some(key) = &self.key {
            e.u8(3)?;
            key.encode(e, ctx)?;
        }
        if let Some(key_id) = &self.key_id {
            e.u8(4)?;
            key_id.encode(e, ctx)?;
        }
        if let Some(state) = &self.state {
            e.u8(5)?;
            state.encode(e, ctx)?;
        }
        if let Some(votes) = self.votes {
            e.u8(6)?.u32(votes)?;
        }
        if let Some(meta) = &self.meta {
            e.u8(7)?;
            cbor::encode_meta(e, meta)?;
        }
        if let Some(node_key) = &self.node_key {
            e.u8(8)?.bytes(node_key)?;
        }
        if !self.signatures.is_empty() {
            e.u8(23)?.array(self.signatures.len() as u64)?;
            for signature in &self.signatures {
                signature.encode(e, ctx)?;
            }
        }
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for Aum {
    fn decode(d: &mut Decoder<'b>, ctx: &mut C) -> Result<Self, decode::Error> {
        let len = cbor::map_header(d)?;
        let mut seen = cbor::FieldSet::default();
        let mut message_kind = None;
        let mut aum = Aum::new(AumKind::NoOp, None);
        for _ in 0..len {
            let tag = d.u32()?;
            seen.insert(tag)?;
            match tag {
                1 => message_kind = Some(AumKind::decode(d, ctx)?),
                2 => aum.prev_aum_hash = Some(AumHash::decode(d, ctx)?),
                3 => aum.key = Some(Key::decode(d, ctx)?),
                4 => aum.key_id = Some(KeyId::decode(d, ctx)?),
                5 => aum.state = Some(State::decode(d, ctx)?),
                6 => aum.votes = Some(d.u32()?),
                7 => aum.meta = Some(cbor::decode_meta(d)?),
                8 => aum.node_key = Some(d.bytes()?.to_vec()),
                23 => {
                    let n = cbor::array_header(d)?;
                    let mut signatures = Vec::new();
                    for _ in 0..n {
                        signatures.push(AumSignature::decode(d, ctx)?);
                    }
                    aum.signatures = signatures;
                }
                t => return Err(decode::Error::message(format!("unknown aum field {t}"))),
            }
        }
        aum.message_kind = message_kind
            .ok_or_else(|| decode::Error::message("missing aum field 1 (message_kind)"))?;
        Ok(aum)
    }
}
