//! end-to-end tests for the TKA chain: genesis, key churn, denylist, and
//! replay.

use std::collections::BTreeMap;

use lockscale_tka::{
    Aum, AumKind, Authority, Error, Key, KeyId, KeyKind, State, disablement_kdf,
};

fn test_key(fill: u8) -> Key {
    Key {
        kind: KeyKind::Ed25519,
        votes: 1,
        public: vec![fill; 32],
        meta: None,
    }
}

/// build a genesis checkpoint with one key and one disablement verifier
/// derived from "hunter2".
fn genesis_aum() -> Aum {
    let mut genesis = Aum::new(AumKind::Checkpoint, None);
    genesis.state = Some(State {
        last_aum_hash: None,
        disablement_secrets: Some(vec![disablement_kdf(b"hunter2").to_vec()]),
        keys: Some(vec![test_key(0x01)]),
        banned_node_keys: None,
    });
    genesis
}

/// genesis + NoOp: the head advances and the checkpoint contents carry over.
#[test]
fn test_genesis_and_noop() {
    let genesis = genesis_aum();
    let mut authority = Authority::bootstrap(&genesis).expect("genesis bootstrap failed");
    assert_eq!(authority.head(), Some(genesis.hash().expect("hash failed")));

    let noop = authority.create_noop_aum();
    authority.apply(&noop).expect("noop apply failed");

    assert_eq!(authority.head(), Some(noop.hash().expect("hash failed")));
    assert_eq!(authority.state().keys.as_ref().expect("keys absent").len(), 1);
    assert!(authority.state().check_disablement(b"hunter2"));
    assert!(!authority.state().check_disablement(b"other"));
}

/// adding a key succeeds once and duplicates on the second attempt.
#[test]
fn test_add_key_then_duplicate() {
    let mut authority = Authority::bootstrap(&genesis_aum()).expect("genesis bootstrap failed");

    let add = authority.create_add_key_aum(test_key(0x02));
    authority.apply(&add).expect("add key failed");
    let keys = authority.state().keys.as_ref().expect("keys absent");
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].public, vec![0x01; 32]);
    assert_eq!(keys[1].public, vec![0x02; 32]);

    // again, chained to the new head
    let add_again = authority.create_add_key_aum(test_key(0x02));
    assert!(matches!(
        authority.apply(&add_again),
        Err(Error::DuplicateKey)
    ));
}

/// updating votes changes only the targeted key; an out-of-range update is
/// rejected.
#[test]
fn test_update_key_votes() {
    let mut authority = Authority::bootstrap(&genesis_aum()).expect("genesis bootstrap failed");
    let add = authority.create_add_key_aum(test_key(0x02));
    authority.apply(&add).expect("add key failed");

    let key_id = test_key(0x01).id().expect("key id failed");
    let update = authority.create_update_key_aum(key_id, Some(5), None);
    authority.apply(&update).expect("update key failed");

    let keys = authority.state().keys.as_ref().expect("keys absent");
    assert_eq!(keys[0].votes, 5);
    assert_eq!(keys[1].votes, 1);
    assert_eq!(authority.head(), Some(update.hash().expect("hash failed")));

    // implausibly large weight fails key validation
    let too_many = authority.create_update_key_aum(key_id, Some(50_000), None);
    assert!(matches!(
        authority.apply(&too_many),
        Err(Error::InvalidKey(_))
    ));
}

/// updating meta replaces the mapping; leaving it absent keeps it.
#[test]
fn test_update_key_meta() {
    let mut authority = Authority::bootstrap(&genesis_aum()).expect("genesis bootstrap failed");
    let key_id = test_key(0x01).id().expect("key id failed");

    let mut meta = BTreeMap::new();
    meta.insert("purpose".to_string(), "root".to_string());
    let update = authority.create_update_key_aum(key_id, None, Some(meta.clone()));
    authority.apply(&update).expect("update meta failed");
    assert_eq!(
        authority.state().keys.as_ref().expect("keys absent")[0].meta,
        Some(meta.clone())
    );

    // votes-only update leaves meta alone
    let update = authority.create_update_key_aum(key_id, Some(2), None);
    authority.apply(&update).expect("update votes failed");
    assert_eq!(
        authority.state().keys.as_ref().expect("keys absent")[0].meta,
        Some(meta)
    );
}

/// removing an unknown key errors and leaves the state untouched.
#[test]
fn test_remove_key_missing() {
    let mut authority = Authority::bootstrap(&genesis_aum()).expect("genesis bootstrap failed");
    let before = authority.state().to_cbor().expect("encode failed");

    let remove = authority.create_remove_key_aum(KeyId::from([0x99; 32]));
    assert!(matches!(authority.apply(&remove), Err(Error::NoSuchKey)));

    assert_eq!(authority.state().to_cbor().expect("encode failed"), before);
}

/// denylist add/remove round-trip with duplicate and missing entries.
#[test]
fn test_denylist_roundtrip() {
    let mut authority = Authority::bootstrap(&genesis_aum()).expect("genesis bootstrap failed");
    let node_key = vec![0xee; 34];

    let add = authority.create_add_denylist_node_key_aum(node_key.clone());
    authority.apply(&add).expect("denylist add failed");
    assert_eq!(
        authority.state().banned_node_keys.as_ref().expect("denylist absent"),
        &vec![node_key.clone()]
    );

    let add_again = authority.create_add_denylist_node_key_aum(node_key.clone());
    assert!(matches!(
        authority.apply(&add_again),
        Err(Error::DuplicateEntry)
    ));

    let remove = authority.create_remove_denylist_node_key_aum(node_key.clone());
    authority.apply(&remove).expect("denylist remove failed");
    assert!(
        authority
            .state()
            .banned_node_keys
            .as_ref()
            .expect("denylist absent")
            .is_empty()
    );

    let remove_again = authority.create_remove_denylist_node_key_aum(node_key);
    assert!(matches!(
        authority.apply(&remove_again),
        Err(Error::NoSuchEntry)
    ));
}

/// an AUM chained to a stale parent is rejected.
#[test]
fn test_parent_mismatch() {
    let genesis = genesis_aum();
    let mut authority = Authority::bootstrap(&genesis).expect("genesis bootstrap failed");

    let noop = authority.create_noop_aum();
    authority.apply(&noop).expect("noop apply failed");

    // still chained to genesis
    let stale = Aum::new(AumKind::NoOp, Some(genesis.hash().expect("hash failed")));
    assert!(matches!(authority.apply(&stale), Err(Error::ParentMismatch)));
}

/// replaying the same stream twice converges on the same head and on
/// byte-identical state.
#[test]
fn test_replay_is_deterministic() {
    let genesis = genesis_aum();
    let mut authority = Authority::bootstrap(&genesis).expect("genesis bootstrap failed");

    let add = authority.create_add_key_aum(test_key(0x02));
    authority.apply(&add).expect("add key failed");
    let ban = authority.create_add_denylist_node_key_aum(vec![0xee; 34]);
    authority.apply(&ban).expect("denylist add failed");
    let update =
        authority.create_update_key_aum(test_key(0x02).id().expect("key id failed"), Some(3), None);
    authority.apply(&update).expect("update key failed");

    let stream = [add, ban, update];
    let first = Authority::replay(&genesis, &stream).expect("first replay failed");
    let second = Authority::replay(&genesis, &stream).expect("second replay failed");

    assert_eq!(first.head(), second.head());
    assert_eq!(first.head(), authority.head());
    assert_eq!(
        first.state().to_cbor().expect("encode failed"),
        second.state().to_cbor().expect("encode failed")
    );
}

/// a mid-stream failure reports the offending index and underlying error.
#[test]
fn test_replay_aborts_with_index() {
    let genesis = genesis_aum();
    let mut authority = Authority::bootstrap(&genesis).expect("genesis bootstrap failed");

    let noop = authority.create_noop_aum();
    authority.apply(&noop).expect("noop apply failed");
    let add = authority.create_add_key_aum(test_key(0x02));
    authority.apply(&add).expect("add key failed");

    // reordered stream: the add's parent no longer matches
    let result = Authority::replay(&genesis, &[add, noop]);
    match result {
        Err(Error::Replay { index, source }) => {
            assert_eq!(index, 0);
            assert!(matches!(*source, Error::ParentMismatch));
        }
        other => panic!("expected replay abort, got {other:?}"),
    }
}

/// a non-genesis checkpoint re-roots the chain contents while the head
/// keeps advancing.
#[test]
fn test_mid_chain_checkpoint() {
    let mut authority = Authority::bootstrap(&genesis_aum()).expect("genesis bootstrap failed");

    let replacement = State {
        last_aum_hash: None,
        disablement_secrets: Some(vec![disablement_kdf(b"rotated").to_vec()]),
        keys: Some(vec![test_key(0x07)]),
        banned_node_keys: None,
    };
    let checkpoint = authority.create_checkpoint_aum(replacement);
    authority.apply(&checkpoint).expect("checkpoint apply failed");

    assert_eq!(
        authority.head(),
        Some(checkpoint.hash().expect("hash failed"))
    );
    assert!(authority.has_key(&test_key(0x07).id().expect("key id failed")));
    assert!(!authority.has_key(&test_key(0x01).id().expect("key id failed")));
    assert!(authority.state().check_disablement(b"rotated"));
    assert!(!authority.state().check_disablement(b"hunter2"));
}
