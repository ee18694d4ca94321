//! Hybrid KEM+signature key exchange for the PQC/Multi-Device upgrade
//! path (§4.G `performKeyExchange`, §9 "PQC XOR stub" resolution).
//!
//! The source's PQC path XORed a per-message random key against the
//! plaintext and discarded the key — undecryptable placeholder code, not
//! a protocol. This module replaces it: the Kyber-derived shared secret
//! and the X25519 shared secret are combined via HKDF into a single
//! 32-byte `finalSharedSecret`, which seeds the *same* Double Ratchet
//! Engine used by PFS (see DESIGN.md — this keeps one wire envelope
//! format for all three modes instead of threading a KEM ciphertext
//! field through every ratchet step).

use crate::crypto::{dilithium, kyber, x25519};
use hkdf::Hkdf;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroize;

#[derive(Error, Debug)]
pub enum HybridError {
    #[error("X25519 stage failed: {0}")]
    Classical(#[from] x25519::X25519Error),
    #[error("Kyber stage failed: {0}")]
    PostQuantum(#[from] kyber::KyberError),
    #[error("Dilithium stage failed: {0}")]
    Signature(#[from] dilithium::DilithiumError),
    #[error("transcript signature verification failed")]
    TranscriptMismatch,
}

pub type Result<T> = std::result::Result<T, HybridError>;

pub struct LocalHybridKeys<'a> {
    pub x25519_secret: &'a x25519_dalek::StaticSecret,
    pub dilithium_secret: &'a [u8],
}

pub struct RemoteCombinedPublicKey<'a> {
    pub x25519_public: &'a [u8; 32],
    pub kyber_public: &'a [u8],
}

pub struct HybridHandshake {
    pub kyber_ciphertext: Vec<u8>,
    pub transcript_signature: [u8; crate::constants::DILITHIUM3_SIGNATURE_LEN],
    pub final_shared_secret: [u8; 32],
}

fn combine(classical: &[u8; 32], post_quantum: &[u8; 32]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, &[classical.as_slice(), post_quantum.as_slice()].concat());
    let mut okm = [0u8; 32];
    hk.expand(b"HybridKex", &mut okm).expect("32-byte okm always fits HKDF-SHA-256 output");
    okm
}

/// Initiator side: `performKeyExchange(localKeys, remoteCombinedPk)`.
pub fn perform_key_exchange(
    local: &LocalHybridKeys,
    remote: &RemoteCombinedPublicKey,
) -> Result<HybridHandshake> {
    let classical_shared = x25519::compute_shared_secret(local.x25519_secret, remote.x25519_public)?;
    let (kyber_ciphertext, kyber_shared) = kyber::encapsulate(remote.kyber_public)?;

    let mut final_shared_secret = combine(&classical_shared, &kyber_shared);

    let mut transcript = Vec::with_capacity(64 + kyber_ciphertext.len());
    transcript.extend_from_slice(&classical_shared);
    transcript.extend_from_slice(&kyber_shared);
    transcript.extend_from_slice(&kyber_ciphertext);
    let transcript_signature = dilithium::sign(local.dilithium_secret, &transcript)?;

    let handshake = HybridHandshake {
        kyber_ciphertext,
        transcript_signature,
        final_shared_secret,
    };
    final_shared_secret.zeroize();
    Ok(handshake)
}

/// Responder side: decapsulate, recompute the combined secret, and verify
/// the initiator's transcript signature. Rejects on any mismatch.
pub fn verify_and_complete_key_exchange(
    our_x25519_secret: &x25519_dalek::StaticSecret,
    our_kyber_secret: &[u8],
    their_x25519_public: &[u8; 32],
    their_dilithium_public: &[u8],
    kyber_ciphertext: &[u8],
    transcript_signature: &[u8],
) -> Result<[u8; 32]> {
    let classical_shared = x25519::compute_shared_secret(our_x25519_secret, their_x25519_public)?;
    let kyber_shared = kyber::decapsulate(kyber_ciphertext, our_kyber_secret)?;

    let mut transcript = Vec::with_capacity(64 + kyber_ciphertext.len());
    transcript.extend_from_slice(&classical_shared);
    transcript.extend_from_slice(&kyber_shared);
    transcript.extend_from_slice(kyber_ciphertext);

    if !dilithium::verify(their_dilithium_public, &transcript, transcript_signature)? {
        return Err(HybridError::TranscriptMismatch);
    }

    Ok(combine(&classical_shared, &kyber_shared))
}
