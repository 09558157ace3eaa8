//! TKA authority - the driver that replays the append-only log.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::aum::{Aum, AumKind};
use crate::{AumHash, Error, Key, KeyId, State};

/// tailnet key authority, advanced by folding AUMs over a genesis
/// checkpoint.
///
/// the authority holds the full ordered state (sequence order participates
/// in the canonical hash). it statically validates each AUM before applying
/// it; signature verification is the caller's job, done before an AUM gets
/// anywhere near here.
#[derive(Debug, Clone)]
pub struct Authority {
    state: State,
}

impl Authority {
    /// create an authority from a genesis checkpoint AUM.
    ///
    /// the genesis AUM must be a parentless checkpoint whose state passes
    /// static validation.
    pub fn bootstrap(genesis: &Aum) -> Result<Self, Error> {
        if genesis.message_kind != AumKind::Checkpoint {
            return Err(Error::Bootstrap("genesis aum must be a checkpoint"));
        }
        if genesis.prev_aum_hash.is_some() {
            return Err(Error::Bootstrap("genesis aum cannot name a parent"));
        }
        genesis.static_validate()?;
        let state = State::default().apply_verified_aum(genesis)?;
        debug!(head = ?state.last_aum_hash, "authority bootstrapped");
        Ok(Self { state })
    }

    /// create an authority by replaying an ordered AUM stream from a
    /// genesis checkpoint.
    pub fn replay(genesis: &Aum, updates: &[Aum]) -> Result<Self, Error> {
        let mut authority = Self::bootstrap(genesis)?;
        authority.apply_updates(updates)?;
        Ok(authority)
    }

    /// the current head of the AUM chain.
    pub fn head(&self) -> Option<AumHash> {
        self.state.last_aum_hash
    }

    /// the current authority state.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// check if a key is trusted.
    pub fn has_key(&self, key_id: &KeyId) -> bool {
        self.state.get_key(key_id).is_ok()
    }

    /// apply a single verified AUM, advancing the head.
    pub fn apply(&mut self, aum: &Aum) -> Result<(), Error> {
        aum.static_validate()?;
        self.state = self.state.apply_verified_aum(aum)?;
        if let Some(head) = &self.state.last_aum_hash {
            debug!(kind = ?aum.message_kind, head = %head, "applied aum");
        }
        Ok(())
    }

    /// apply an ordered sequence of verified AUMs.
    ///
    /// any failure aborts the fold and reports the offending index; the
    /// authority keeps the state from the last successful update.
    pub fn apply_updates(&mut self, updates: &[Aum]) -> Result<(), Error> {
        for (index, aum) in updates.iter().enumerate() {
            if let Err(source) = self.apply(aum) {
                warn!(index, error = %source, "replay aborted");
                return Err(Error::Replay {
                    index,
                    source: Box::new(source),
                });
            }
        }
        Ok(())
    }

    /// create a NoOp AUM chained to the current head (unsigned).
    pub fn create_noop_aum(&self) -> Aum {
        Aum::new(AumKind::NoOp, self.head())
    }

    /// create a checkpoint AUM chained to the current head (unsigned).
    pub fn create_checkpoint_aum(&self, state: State) -> Aum {
        let mut aum = Aum::new(AumKind::Checkpoint, self.head());
        aum.state = Some(state);
        aum
    }

    /// create an AddKey AUM chained to the current head (unsigned).
    pub fn create_add_key_aum(&self, key: Key) -> Aum {
        let mut aum = Aum::new(AumKind::AddKey, self.head());
        aum.key = Some(key);
        aum
    }

    /// create an UpdateKey AUM chained to the current head (unsigned).
    ///
    /// absent `votes`/`meta` leave the corresponding key field untouched.
    pub fn create_update_key_aum(
        &self,
        key_id: KeyId,
        votes: Option<u32>,
        meta: Option<BTreeMap<String, String>>,
    ) -> Aum {
        let mut aum = Aum::new(AumKind::UpdateKey, self.head());
        aum.key_id = Some(key_id);
        aum.votes = votes;
        aum.meta = meta;
        aum
    }

    /// create a RemoveKey AUM chained to the current head (unsigned).
    pub fn create_remove_key_aum(&self, key_id: KeyId) -> Aum {
        let mut aum = Aum::new(AumKind::RemoveKey, self.head());
        aum.key_id = Some(key_id);
        aum
    }

    /// create an AddDenylistNodeKey AUM chained to the current head
    /// (unsigned).
    pub fn create_add_denylist_node_key_aum(&self, node_key: Vec<u8>) -> Aum {
        let mut aum = Aum::new(AumKind::AddDenylistNodeKey, self.head());
        aum.node_key = Some(node_key);
        aum
    }

    /// create a RemoveDenylistNodeKey AUM chained to the current head
    /// (unsigned).
    pub fn create_remove_denylist_node_key_aum(&self, node_key: Vec<u8>) -> Aum {
        let mut aum = Aum::new(AumKind::RemoveDenylistNodeKey, self.head());
        aum.node_key = Some(node_key);
        aum
    }
}
