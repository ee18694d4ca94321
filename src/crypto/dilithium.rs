//! Dilithium-3 signatures (Component B).
//!
//! Backed by `pqcrypto-dilithium`; the predecessor codebase has no
//! signature primitive at this size class at all, so this module has no
//! direct prior version in the codebase — it follows the same
//! `generate/sign/verify` shape as the existing Ed25519 binding.

use crate::constants::{DILITHIUM3_PUBLIC_KEY_LEN, DILITHIUM3_SECRET_KEY_LEN, DILITHIUM3_SIGNATURE_LEN};
use pqcrypto_dilithium::dilithium3;
use pqcrypto_traits::sign::{
    DetachedSignature as _, PublicKey as _, SecretKey as _,
};
use thiserror::Error;
use zeroize::Zeroize;

#[derive(Error, Debug)]
pub enum DilithiumError {
    #[error("invalid key length")]
    InvalidKeyLength,
    #[error("invalid signature length")]
    InvalidSignatureLength,
    #[error("signing failed")]
    SigningFailed,
}

pub type Result<T> = std::result::Result<T, DilithiumError>;

pub struct DilithiumKeyPair {
    pub public: Vec<u8>,
    pub secret: Vec<u8>,
}

impl Drop for DilithiumKeyPair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

pub fn generate_keypair() -> DilithiumKeyPair {
    let (pk, sk) = dilithium3::keypair();
    DilithiumKeyPair {
        public: pk.as_bytes().to_vec(),
        secret: sk.as_bytes().to_vec(),
    }
}

/// `sign(sk, message) -> sig(3293 B)`. Empty messages are valid.
pub fn sign(sk: &[u8], message: &[u8]) -> Result<[u8; DILITHIUM3_SIGNATURE_LEN]> {
    if sk.len() != DILITHIUM3_SECRET_KEY_LEN {
        return Err(DilithiumError::InvalidKeyLength);
    }
    let secret_key = dilithium3::SecretKey::from_bytes(sk).map_err(|_| DilithiumError::SigningFailed)?;
    let sig = dilithium3::detached_sign(message, &secret_key);
    let bytes = sig.as_bytes();
    if bytes.len() != DILITHIUM3_SIGNATURE_LEN {
        return Err(DilithiumError::SigningFailed);
    }
    let mut out = [0u8; DILITHIUM3_SIGNATURE_LEN];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// `verify(pk, message, sig) -> bool`.
pub fn verify(pk: &[u8], message: &[u8], sig: &[u8]) -> Result<bool> {
    if pk.len() != DILITHIUM3_PUBLIC_KEY_LEN {
        return Err(DilithiumError::InvalidKeyLength);
    }
    if sig.len() != DILITHIUM3_SIGNATURE_LEN {
        return Err(DilithiumError::InvalidSignatureLength);
    }
    let public_key =
        dilithium3::PublicKey::from_bytes(pk).map_err(|_| DilithiumError::InvalidKeyLength)?;
    let signature = dilithium3::DetachedSignature::from_bytes(sig)
        .map_err(|_| DilithiumError::InvalidSignatureLength)?;
    Ok(dilithium3::verify_detached_signature(&signature, message, &public_key).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sizes() {
        let kp = generate_keypair();
        assert_eq!(kp.public.len(), DILITHIUM3_PUBLIC_KEY_LEN);
        assert_eq!(kp.secret.len(), DILITHIUM3_SECRET_KEY_LEN);
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let kp = generate_keypair();
        let message = b"ratchet transcript bytes";
        let sig = sign(&kp.secret, message).unwrap();
        assert_eq!(sig.len(), DILITHIUM3_SIGNATURE_LEN);
        assert!(verify(&kp.public, message, &sig).unwrap());
    }

    #[test]
    fn test_empty_message_valid() {
        let kp = generate_keypair();
        let sig = sign(&kp.secret, b"").unwrap();
        assert!(verify(&kp.public, b"", &sig).unwrap());
    }

    #[test]
    fn test_verify_rejects_tampered_message() {
        let kp = generate_keypair();
        let sig = sign(&kp.secret, b"original").unwrap();
        assert!(!verify(&kp.public, b"tampered", &sig).unwrap());
    }

    #[test]
    fn test_rejects_wrong_length_keys() {
        assert!(matches!(
            sign(&[0u8; 4], b"x"),
            Err(DilithiumError::InvalidKeyLength)
        ));
        assert!(matches!(
            verify(&[0u8; 4], b"x", &[0u8; DILITHIUM3_SIGNATURE_LEN]),
            Err(DilithiumError::InvalidKeyLength)
        ));
    }
}
