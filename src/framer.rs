//! Message Framer (Component D): associated-data construction and the
//! base64 envelope wire shape. Grounded on this codebase's own manual
//! big-endian wire-format packing, generalized to the fixed AAD layout:
//!
//! ```text
//! len(senderId) :: senderId :: u32 messageNumber :: u32 chainLength ::
//! u64 timestamp :: u32 len(ephemeralPk) :: ephemeralPk
//! ```

use crate::crypto::encoding;
use serde::{Deserialize, Serialize};

/// Build the associated data bound into every AEAD call. Bit-exact across
/// implementations: any deviation in field order or width breaks
/// interoperable AEAD verification.
pub fn build_associated_data(
    sender_id: &str,
    message_number: u32,
    chain_length: u32,
    timestamp_ms: u64,
    ephemeral_pk: &[u8],
) -> Vec<u8> {
    let sender_bytes = sender_id.as_bytes();
    let mut aad = Vec::with_capacity(4 + sender_bytes.len() + 4 + 4 + 8 + 4 + ephemeral_pk.len());
    aad.extend_from_slice(&(sender_bytes.len() as u32).to_be_bytes());
    aad.extend_from_slice(sender_bytes);
    aad.extend_from_slice(&message_number.to_be_bytes());
    aad.extend_from_slice(&chain_length.to_be_bytes());
    aad.extend_from_slice(&timestamp_ms.to_be_bytes());
    aad.extend_from_slice(&(ephemeral_pk.len() as u32).to_be_bytes());
    aad.extend_from_slice(ephemeral_pk);
    aad
}

/// The three encryption modes the Adaptive Orchestrator dispatches by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionMode {
    #[serde(rename = "PFS")]
    Pfs,
    #[serde(rename = "PQC")]
    Pqc,
    #[serde(rename = "MULTI_DEVICE")]
    MultiDevice,
}

impl EncryptionMode {
    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "PFS" => Some(Self::Pfs),
            "PQC" => Some(Self::Pqc),
            "MULTI_DEVICE" => Some(Self::MultiDevice),
            _ => None,
        }
    }

    pub fn to_string(self) -> &'static str {
        match self {
            Self::Pfs => "PFS",
            Self::Pqc => "PQC",
            Self::MultiDevice => "MULTI_DEVICE",
        }
    }
}

/// Envelope metadata (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvelopeMetadata {
    pub mode: EncryptionMode,
    #[serde(rename = "ephemeralPublicKey")]
    pub ephemeral_public_key: String,
    #[serde(rename = "messageNumber")]
    pub message_number: u32,
    #[serde(rename = "chainLength")]
    pub chain_length: u32,
    #[serde(rename = "previousChainLength")]
    pub previous_chain_length: u32,
    pub timestamp: u64,
    #[serde(rename = "associatedDataB64")]
    pub associated_data_b64: String,
}

/// The on-wire encrypted envelope (§6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    #[serde(rename = "encryptedText")]
    pub encrypted_text: String,
    pub iv: String,
    pub tag: String,
    #[serde(rename = "keyId")]
    pub key_id: String,
    pub metadata: EnvelopeMetadata,
}

impl EncryptedEnvelope {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn ciphertext_bytes(&self) -> std::result::Result<Vec<u8>, crate::crypto::encoding::EncodingError> {
        encoding::decode(&self.encrypted_text)
    }

    pub fn nonce_bytes(&self) -> std::result::Result<Vec<u8>, crate::crypto::encoding::EncodingError> {
        encoding::decode(&self.iv)
    }

    pub fn tag_bytes(&self) -> std::result::Result<Vec<u8>, crate::crypto::encoding::EncodingError> {
        encoding::decode(&self.tag)
    }

    pub fn ephemeral_public_key_bytes(
        &self,
    ) -> std::result::Result<Vec<u8>, crate::crypto::encoding::EncodingError> {
        encoding::decode(&self.metadata.ephemeral_public_key)
    }

    pub fn associated_data_bytes(
        &self,
    ) -> std::result::Result<Vec<u8>, crate::crypto::encoding::EncodingError> {
        encoding::decode(&self.metadata.associated_data_b64)
    }
}
