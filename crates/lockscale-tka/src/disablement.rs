//! disablement secrets for the TKA escape hatch.
//!
//! a disablement secret is a pre-image whose KDF-derived verifier is stored
//! in the state. presenting the pre-image authorizes disabling the
//! authority. the KDF parameters are part of the wire contract: changing
//! them is a hard fork.

use argon2::{Algorithm, Argon2, Params, Version};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// length of a raw disablement secret in bytes.
pub const DISABLEMENT_SECRET_LEN: usize = 32;

/// length of a KDF-derived disablement verifier in bytes.
pub const VERIFIER_LEN: usize = 32;

/// fixed salt for the disablement KDF.
pub const DISABLEMENT_SALT: &[u8] = b"tailscale network-lock disablement salt";

/// derive the 32-byte disablement verifier for a secret.
///
/// argon2id with time=4, memory=16 MiB, threads=4. the KDF takes tens of
/// milliseconds at these parameters; keep it off latency-sensitive paths.
pub fn disablement_kdf(secret: &[u8]) -> [u8; VERIFIER_LEN] {
    let params =
        Params::new(16 * 1024, 4, 4, Some(VERIFIER_LEN)).expect("fixed argon2 parameters are valid");
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut out = [0u8; VERIFIER_LEN];
    argon
        .hash_password_into(secret, DISABLEMENT_SALT, &mut out)
        .expect("fixed argon2 parameters admit any secret length");
    out
}

/// a secret used to disable the tailnet key authority in an emergency.
///
/// the raw secret is never stored - only its KDF-derived verifier goes into
/// a state. zeroized on drop for security.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DisablementSecret {
    secret: [u8; DISABLEMENT_SECRET_LEN],
}

impl DisablementSecret {
    /// generate a new random disablement secret.
    pub fn generate() -> Self {
        Self {
            secret: rand::random(),
        }
    }

    /// the KDF-derived verifier for this secret.
    ///
    /// this is what goes into a checkpoint state, not the raw secret.
    pub fn verifier(&self) -> [u8; VERIFIER_LEN] {
        disablement_kdf(&self.secret)
    }

    /// verify that this secret matches a stored verifier.
    pub fn verify(&self, stored: &[u8]) -> bool {
        bool::from(self.verifier().as_slice().ct_eq(stored))
    }
}

impl From<[u8; DISABLEMENT_SECRET_LEN]> for DisablementSecret {
    fn from(secret: [u8; DISABLEMENT_SECRET_LEN]) -> Self {
        Self { secret }
    }
}
