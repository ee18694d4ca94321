//! Kyber-768 key encapsulation (Component B).
//!
//! Backed by `pqcrypto-kyber`, which exposes the exact 1184/2400/1088/32
//! byte sizes this crate's predecessor's Kyber-1024 binding did not match.

use crate::constants::{
    KYBER768_CIPHERTEXT_LEN, KYBER768_PUBLIC_KEY_LEN, KYBER768_SECRET_KEY_LEN,
    KYBER768_SHARED_SECRET_LEN,
};
use pqcrypto_kyber::kyber768;
use pqcrypto_traits::kem::{
    Ciphertext as _, PublicKey as _, SecretKey as _, SharedSecret as _,
};
use thiserror::Error;
use zeroize::Zeroize;

#[derive(Error, Debug)]
pub enum KyberError {
    #[error("invalid key length")]
    InvalidKeyLength,
    #[error("invalid ciphertext length")]
    InvalidCiphertextLength,
    #[error("all-zero public key rejected")]
    WeakPublicKey,
    #[error("encapsulation failed")]
    EncapsulationFailed,
    #[error("decapsulation failed")]
    DecapsulationFailed,
}

pub type Result<T> = std::result::Result<T, KyberError>;

pub struct KyberKeyPair {
    pub public: Vec<u8>,
    pub secret: Vec<u8>,
}

impl Drop for KyberKeyPair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

pub fn generate_keypair() -> KyberKeyPair {
    let (pk, sk) = kyber768::keypair();
    KyberKeyPair {
        public: pk.as_bytes().to_vec(),
        secret: sk.as_bytes().to_vec(),
    }
}

fn validate_public_key(pk: &[u8]) -> Result<()> {
    if pk.len() != KYBER768_PUBLIC_KEY_LEN {
        return Err(KyberError::InvalidKeyLength);
    }
    if pk.iter().all(|&b| b == 0) {
        return Err(KyberError::WeakPublicKey);
    }
    Ok(())
}

/// `encapsulate(pk) -> (ciphertext, sharedSecret)`.
pub fn encapsulate(pk: &[u8]) -> Result<(Vec<u8>, [u8; KYBER768_SHARED_SECRET_LEN])> {
    validate_public_key(pk)?;
    let public_key =
        kyber768::PublicKey::from_bytes(pk).map_err(|_| KyberError::EncapsulationFailed)?;
    let (shared_secret, ciphertext) = kyber768::encapsulate(&public_key);
    let mut ss = [0u8; KYBER768_SHARED_SECRET_LEN];
    ss.copy_from_slice(shared_secret.as_bytes());
    Ok((ciphertext.as_bytes().to_vec(), ss))
}

/// `decapsulate(ct, sk) -> sharedSecret`.
pub fn decapsulate(ct: &[u8], sk: &[u8]) -> Result<[u8; KYBER768_SHARED_SECRET_LEN]> {
    if ct.len() != KYBER768_CIPHERTEXT_LEN {
        return Err(KyberError::InvalidCiphertextLength);
    }
    if sk.len() != KYBER768_SECRET_KEY_LEN {
        return Err(KyberError::InvalidKeyLength);
    }
    let secret_key =
        kyber768::SecretKey::from_bytes(sk).map_err(|_| KyberError::DecapsulationFailed)?;
    let ciphertext =
        kyber768::Ciphertext::from_bytes(ct).map_err(|_| KyberError::DecapsulationFailed)?;
    let shared_secret = kyber768::decapsulate(&ciphertext, &secret_key);
    let mut ss = [0u8; KYBER768_SHARED_SECRET_LEN];
    ss.copy_from_slice(shared_secret.as_bytes());
    Ok(ss)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_sizes() {
        let kp = generate_keypair();
        assert_eq!(kp.public.len(), KYBER768_PUBLIC_KEY_LEN);
        assert_eq!(kp.secret.len(), KYBER768_SECRET_KEY_LEN);
    }

    #[test]
    fn test_encapsulate_decapsulate_agree() {
        let kp = generate_keypair();
        let (ct, ss_sender) = encapsulate(&kp.public).unwrap();
        assert_eq!(ct.len(), KYBER768_CIPHERTEXT_LEN);
        let ss_receiver = decapsulate(&ct, &kp.secret).unwrap();
        assert_eq!(ss_sender, ss_receiver);
    }

    #[test]
    fn test_rejects_all_zero_public_key() {
        let zero = vec![0u8; KYBER768_PUBLIC_KEY_LEN];
        assert!(matches!(
            encapsulate(&zero),
            Err(KyberError::WeakPublicKey)
        ));
    }

    #[test]
    fn test_rejects_wrong_length_inputs() {
        assert!(matches!(
            encapsulate(&[0u8; 10]),
            Err(KyberError::InvalidKeyLength)
        ));
        assert!(matches!(
            decapsulate(&[0u8; 10], &[0u8; KYBER768_SECRET_KEY_LEN]),
            Err(KyberError::InvalidCiphertextLength)
        ));
    }
}
