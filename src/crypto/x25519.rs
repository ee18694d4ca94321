//! X25519 Diffie-Hellman and the HKDF-based `deriveKeys` contract
//! (Component B). Adapted from the key-exchange primitives used
//! throughout this codebase's predecessor, generalized with the
//! weak-public-key rejection and the `(rootKey, chainKey)` split the
//! ratchet's session initialization relies on.

use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

#[derive(Error, Debug)]
pub enum X25519Error {
    #[error("invalid key length")]
    InvalidKeyLength,
    #[error("weak or malformed public key")]
    WeakPublicKey,
    #[error("key derivation failed")]
    KeyDerivationFailed,
}

pub type Result<T> = std::result::Result<T, X25519Error>;

/// An X25519 keypair. The secret is zeroized on drop.
pub struct X25519KeyPair {
    pub secret: StaticSecret,
    pub public: [u8; 32],
}

impl Drop for X25519KeyPair {
    fn drop(&mut self) {
        self.public.zeroize();
    }
}

pub fn generate_keypair() -> X25519KeyPair {
    let secret = StaticSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret).to_bytes();
    X25519KeyPair { secret, public }
}

/// Reject the all-zero key, the all-0xFF key, and anything not exactly 32
/// bytes. This does not attempt full small-subgroup validation (X25519
/// clamps on use), only the cheap, named rejections the spec calls out.
pub fn validate_public_key(pk: &[u8]) -> Result<()> {
    if pk.len() != 32 {
        return Err(X25519Error::InvalidKeyLength);
    }
    if pk.iter().all(|&b| b == 0x00) || pk.iter().all(|&b| b == 0xFF) {
        return Err(X25519Error::WeakPublicKey);
    }
    Ok(())
}

pub fn compute_shared_secret(secret: &StaticSecret, their_public: &[u8]) -> Result<[u8; 32]> {
    validate_public_key(their_public)?;
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(their_public);
    let public = PublicKey::from(bytes);
    Ok(secret.diffie_hellman(&public).to_bytes())
}

/// Derived root/chain key pair (§4.B `deriveKeys`).
pub struct DerivedKeys {
    pub root_key: [u8; 32],
    pub chain_key: [u8; 32],
}

/// `deriveKeys(baseKey, context) -> {rootKey, chainKey}` via HKDF-SHA-256,
/// domain-separated by `context`.
pub fn derive_keys(base_key: &[u8], context: &[u8]) -> Result<DerivedKeys> {
    if base_key.is_empty() {
        return Err(X25519Error::KeyDerivationFailed);
    }
    let hk = Hkdf::<Sha256>::new(None, base_key);
    let mut okm = [0u8; 64];
    hk.expand(context, &mut okm)
        .map_err(|_| X25519Error::KeyDerivationFailed)?;
    let mut root_key = [0u8; 32];
    let mut chain_key = [0u8; 32];
    root_key.copy_from_slice(&okm[..32]);
    chain_key.copy_from_slice(&okm[32..]);
    okm.zeroize();
    Ok(DerivedKeys {
        root_key,
        chain_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_secret_agreement() {
        let alice = generate_keypair();
        let bob = generate_keypair();

        let alice_shared = compute_shared_secret(&alice.secret, &bob.public).unwrap();
        let bob_shared = compute_shared_secret(&bob.secret, &alice.public).unwrap();

        assert_eq!(alice_shared, bob_shared);
    }

    #[test]
    fn test_rejects_all_zero_key() {
        let zero = [0u8; 32];
        assert!(matches!(
            validate_public_key(&zero),
            Err(X25519Error::WeakPublicKey)
        ));
    }

    #[test]
    fn test_rejects_all_ff_key() {
        let ff = [0xFFu8; 32];
        assert!(matches!(
            validate_public_key(&ff),
            Err(X25519Error::WeakPublicKey)
        ));
    }

    #[test]
    fn test_rejects_wrong_length() {
        let short = [1u8; 16];
        assert!(matches!(
            validate_public_key(&short),
            Err(X25519Error::InvalidKeyLength)
        ));
    }

    #[test]
    fn test_derive_keys_deterministic_and_domain_separated() {
        let base = [7u8; 32];
        let a = derive_keys(&base, b"ctx-a").unwrap();
        let b = derive_keys(&base, b"ctx-a").unwrap();
        let c = derive_keys(&base, b"ctx-b").unwrap();
        assert_eq!(a.root_key, b.root_key);
        assert_eq!(a.chain_key, b.chain_key);
        assert_ne!(a.root_key, c.root_key);
    }
}
