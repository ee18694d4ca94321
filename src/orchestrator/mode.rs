//! Tagged key-material variant (§9 redesign flag): replaces the source's
//! dynamic `CryptoKey | Uint8Array | {...}` key storage shape.

use crate::crypto::{dilithium::DilithiumKeyPair, ed25519::Ed25519KeyPair, kyber::KyberKeyPair, x25519::X25519KeyPair};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

pub use crate::framer::EncryptionMode;

/// Per-mode key material held in memory. `Drop` zeroizes everything
/// reachable (I5); storage tags mirror §4.G's `generateUserKeys`.
pub enum KeyMaterial {
    X25519Pair(X25519KeyPair),
    PqcPair {
        kyber: KyberKeyPair,
        dilithium: DilithiumKeyPair,
    },
    MultiDevicePair {
        device: Ed25519KeyPair,
        conversation: X25519KeyPair,
    },
    /// Retained only for decrypt-side interop with the legacy
    /// "conversation-PFS" degenerate mode (§9); never emitted by
    /// `generateUserKeys` for new sessions.
    LegacyConversation { blob: [u8; 32] },
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        if let KeyMaterial::LegacyConversation { blob } = self {
            blob.zeroize();
        }
        // the X25519/Pqc/MultiDevice variants zeroize their own fields on
        // drop already (see crypto::x25519/kyber/dilithium/ed25519)
    }
}

impl KeyMaterial {
    pub fn storage_tag(&self) -> &'static str {
        match self {
            KeyMaterial::X25519Pair(_) => "x25519-pfs",
            KeyMaterial::PqcPair { .. } => "pqc-hybrid",
            KeyMaterial::MultiDevicePair { .. } => "multi-device",
            KeyMaterial::LegacyConversation { .. } => "legacy-conversation",
        }
    }
}

/// Serializable blob stored under the application's ordinary key-value
/// store, matching the storage tags above.
#[derive(Serialize, Deserialize)]
pub struct StoredX25519Pair {
    pub secret: [u8; 32],
    pub public: [u8; 32],
}

#[derive(Serialize, Deserialize)]
pub struct StoredPqcPair {
    pub kyber_public: Vec<u8>,
    pub kyber_secret: Vec<u8>,
    pub dilithium_public: Vec<u8>,
    pub dilithium_secret: Vec<u8>,
}

#[derive(Serialize, Deserialize)]
pub struct StoredMultiDevicePair {
    pub device_secret: [u8; 32],
    pub device_public: [u8; 32],
    pub conversation_secret: [u8; 32],
    pub conversation_public: [u8; 32],
}

#[derive(Serialize, Deserialize)]
pub struct StoredLegacyConversation {
    pub blob: [u8; 32],
}
