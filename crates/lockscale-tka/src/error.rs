//! error types for TKA operations.

use thiserror::Error;

/// errors that can occur during TKA operations.
#[derive(Debug, Error)]
pub enum Error {
    /// invalid key length.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// the length the type requires.
        expected: usize,
        /// the length that was supplied.
        actual: usize,
    },

    /// invalid hash length.
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidHashLength {
        /// the length the type requires.
        expected: usize,
        /// the length that was supplied.
        actual: usize,
    },

    /// invalid hex encoding.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// cbor encoding/decoding error (malformed or non-canonical input).
    #[error("cbor error: {0}")]
    Cbor(String),

    /// signature verification failed.
    #[error("signature verification failed")]
    InvalidSignature,

    /// an AUM named a parent that is not the current head of the chain.
    #[error("parent aum hash does not match the current head")]
    ParentMismatch,

    /// a field required by the message kind is absent.
    #[error("missing required aum field: {0}")]
    MissingField(&'static str),

    /// a key with the same key ID is already trusted.
    #[error("key already exists")]
    DuplicateKey,

    /// the key referenced by a key ID does not exist.
    #[error("key not found")]
    NoSuchKey,

    /// the node key is already on the denylist.
    #[error("entry already exists")]
    DuplicateEntry,

    /// the node key is not on the denylist.
    #[error("no such entry")]
    NoSuchEntry,

    /// a key record failed static validation.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// a checkpoint state failed static validation.
    #[error("malformed checkpoint: {0}")]
    MalformedCheckpoint(String),

    /// an AUM carries fields that do not belong to its message kind.
    #[error("malformed aum: {0}")]
    MalformedAum(&'static str),

    /// the message kind value is not recognised.
    #[error("unhandled message kind: {0}")]
    UnhandledMessageKind(u8),

    /// the genesis AUM cannot start an authority.
    #[error("bootstrap: {0}")]
    Bootstrap(&'static str),

    /// replay aborted at the given update index.
    #[error("aum at index {index}: {source}")]
    Replay {
        /// zero-based index of the offending update.
        index: usize,
        /// the underlying transition error.
        source: Box<Error>,
    },
}
