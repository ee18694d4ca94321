//! ChaCha20-Poly1305-IETF AEAD layer (Component B).
//!
//! Adapted from this codebase's XChaCha20Poly1305 encryption layer, narrowed
//! to the plain 12-byte-nonce IETF variant the spec fixes sizes around.
//! Ciphertext and tag are returned separately rather than concatenated, so
//! the Message Framer (Component D) controls wire layout.

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305, Key, Nonce, Tag,
};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum AeadError {
    #[error("invalid key length")]
    InvalidKeyLength,
    #[error("invalid nonce length")]
    InvalidNonceLength,
    #[error("authentication failed")]
    AuthFailure,
}

pub type Result<T> = std::result::Result<T, AeadError>;

/// Generate a fresh random 12-byte nonce (invariant I1: fresh per encryption).
pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// `encrypt(key, nonce, aad, plaintext) -> (ciphertext, tag)`.
pub fn encrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_LEN])> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(nonce), aad, &mut buffer)
        .map_err(|_| AeadError::AuthFailure)?;
    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_slice());
    Ok((buffer, tag_bytes))
}

/// `decrypt(key, nonce, aad, ciphertext, tag) -> plaintext | AuthFailure`.
pub fn decrypt(
    key: &[u8; KEY_LEN],
    nonce: &[u8; NONCE_LEN],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8; TAG_LEN],
) -> Result<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(Nonce::from_slice(nonce), aad, &mut buffer, Tag::from_slice(tag))
        .map_err(|_| AeadError::AuthFailure)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = [1u8; KEY_LEN];
        let nonce = generate_nonce();
        let aad = b"associated data";
        let plaintext = b"hello ratchet world";

        let (ciphertext, tag) = encrypt(&key, &nonce, aad, plaintext).unwrap();
        let decrypted = decrypt(&key, &nonce, aad, &ciphertext, &tag).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_tamper_ciphertext_fails() {
        let key = [2u8; KEY_LEN];
        let nonce = generate_nonce();
        let aad = b"aad";
        let (mut ciphertext, tag) = encrypt(&key, &nonce, aad, b"message").unwrap();
        ciphertext[0] ^= 0xFF;
        assert!(decrypt(&key, &nonce, aad, &ciphertext, &tag).is_err());
    }

    #[test]
    fn test_tamper_tag_fails() {
        let key = [3u8; KEY_LEN];
        let nonce = generate_nonce();
        let aad = b"aad";
        let (ciphertext, mut tag) = encrypt(&key, &nonce, aad, b"message").unwrap();
        tag[0] ^= 0xFF;
        assert!(decrypt(&key, &nonce, aad, &ciphertext, &tag).is_err());
    }

    #[test]
    fn test_tamper_nonce_fails() {
        let key = [4u8; KEY_LEN];
        let nonce = generate_nonce();
        let aad = b"aad";
        let (ciphertext, tag) = encrypt(&key, &nonce, aad, b"message").unwrap();
        let mut wrong_nonce = nonce;
        wrong_nonce[0] ^= 0xFF;
        assert!(decrypt(&key, &wrong_nonce, aad, &ciphertext, &tag).is_err());
    }

    #[test]
    fn test_tamper_aad_fails() {
        let key = [5u8; KEY_LEN];
        let nonce = generate_nonce();
        let (ciphertext, tag) = encrypt(&key, &nonce, b"aad-one", b"message").unwrap();
        assert!(decrypt(&key, &nonce, b"aad-two", &ciphertext, &tag).is_err());
    }
}
