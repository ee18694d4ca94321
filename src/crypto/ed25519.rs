//! Ed25519 signatures, used only for the Multi-Device mode's classical
//! "device signing pair" (§4.G `MultiDevicePair`) — not a spec-mandated
//! primitive, kept as the classical identity key separate from the
//! Dilithium-3 transcript signature used in the PQC hybrid handshake.
//! Adapted directly from this codebase's own Ed25519 binding.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroize;

#[derive(Error, Debug)]
pub enum Ed25519Error {
    #[error("invalid key length")]
    InvalidKeyLength,
    #[error("invalid signature")]
    InvalidSignature,
}

pub type Result<T> = std::result::Result<T, Ed25519Error>;

pub struct Ed25519KeyPair {
    pub public: [u8; 32],
    pub secret: [u8; 32],
}

impl Drop for Ed25519KeyPair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

pub fn generate_keypair() -> Ed25519KeyPair {
    let signing_key = SigningKey::generate(&mut OsRng);
    Ed25519KeyPair {
        public: signing_key.verifying_key().to_bytes(),
        secret: signing_key.to_bytes(),
    }
}

pub fn sign(secret: &[u8; 32], data: &[u8]) -> [u8; 64] {
    SigningKey::from_bytes(secret).sign(data).to_bytes()
}

pub fn verify(public: &[u8], data: &[u8], signature: &[u8]) -> Result<bool> {
    if public.len() != 32 {
        return Err(Ed25519Error::InvalidKeyLength);
    }
    if signature.len() != 64 {
        return Err(Ed25519Error::InvalidSignature);
    }
    let mut pub_bytes = [0u8; 32];
    pub_bytes.copy_from_slice(public);
    let mut sig_bytes = [0u8; 64];
    sig_bytes.copy_from_slice(signature);

    let verifying_key =
        VerifyingKey::from_bytes(&pub_bytes).map_err(|_| Ed25519Error::InvalidKeyLength)?;
    let sig = Signature::from_bytes(&sig_bytes);
    Ok(verifying_key.verify(data, &sig).is_ok())
}
