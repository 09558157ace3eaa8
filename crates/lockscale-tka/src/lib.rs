//! tailnet key authority (TKA) state machine for lockscale.
//!
//! this crate implements the trust root of a tailnet as a deterministic,
//! append-only, hash-chained log of authority update messages (AUMs):
//! - canonical CBOR encoding of AUMs and states (the encoding defines the
//!   blake2s hash chain, so it is strict and deterministic)
//! - the transition engine that folds verified AUMs over an immutable state
//! - static validation bounding checkpoint resource use
//! - the argon2id-keyed disablement escape hatch
//!
//! the core consumes *already-verified* AUMs: transport, persistence, and
//! signature verification live outside this crate.

pub mod aum;
pub mod aum_hash;
pub mod authority;
mod cbor;
pub mod disablement;
pub mod error;
pub mod key;
pub mod lock_key;
pub mod marshaled;
pub mod state;

pub use aum::{Aum, AumKind, AumSignature};
pub use aum_hash::AumHash;
pub use authority::Authority;
pub use disablement::{DisablementSecret, disablement_kdf};
pub use error::Error;
pub use key::{Key, KeyId, KeyKind};
pub use lock_key::{LockPrivateKey, LockPublicKey};
pub use marshaled::MarshaledAum;
pub use state::State;

/// result type for TKA operations.
pub type Result<T> = std::result::Result<T, Error>;
