//! Ratchet session state (§3 `RatchetSession`). Grounded on this
//! codebase's own `PQDoubleRatchet` fields and its `export_state`/
//! `import_state` persistence pair, generalized to the spec's exact field
//! set and bounded, aggregate-accounted skipped-key store (§9: MAX_SKIP is
//! a security knob — accounted across all receiving chains, not per-chain).

use crate::constants::MAX_SKIP;
use crate::crypto::x25519::X25519KeyPair;
use crate::error::RatchetError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use x25519_dalek::StaticSecret;
use zeroize::Zeroize;

/// Identifies a remote ratchet public key for skipped-key lookup without a
/// back-pointer into the session (§9: arena model, no cyclic references).
pub type EphemeralKeyId = [u8; 32];

/// A precomputed message key for a not-yet-arrived message, bounded by
/// MAX_SKIP in aggregate across all receiving chains of one session.
pub struct SkippedKeyStore {
    keys: HashMap<(EphemeralKeyId, u32), [u8; 32]>,
    order: VecDeque<(EphemeralKeyId, u32)>,
}

impl SkippedKeyStore {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Reject up front if adding `count` more keys would exceed MAX_SKIP
    /// in a single operation (I3: fail closed, state unchanged).
    pub fn check_budget(&self, count: u32) -> Result<(), RatchetError> {
        if count > MAX_SKIP {
            return Err(RatchetError::TooManySkipped(count));
        }
        Ok(())
    }

    /// Insert a skipped key, evicting the oldest entry FIFO if the cache
    /// would otherwise exceed MAX_SKIP (I2).
    pub fn insert(&mut self, ephemeral_id: EphemeralKeyId, message_number: u32, key: [u8; 32]) {
        let entry_key = (ephemeral_id, message_number);
        if !self.keys.contains_key(&entry_key) {
            self.order.push_back(entry_key);
        }
        self.keys.insert(entry_key, key);
        while self.order.len() as u32 > MAX_SKIP {
            if let Some(evicted) = self.order.pop_front() {
                self.keys.remove(&evicted);
            }
        }
    }

    /// Remove and return a skipped key if present (consumed exactly once).
    pub fn take(&mut self, ephemeral_id: &EphemeralKeyId, message_number: u32) -> Option<[u8; 32]> {
        let entry_key = (*ephemeral_id, message_number);
        let key = self.keys.remove(&entry_key);
        if key.is_some() {
            self.order.retain(|k| k != &entry_key);
        }
        key
    }
}

impl Drop for SkippedKeyStore {
    fn drop(&mut self) {
        for (_, key) in self.keys.iter_mut() {
            key.zeroize();
        }
    }
}

/// One cryptographic conversation's ratchet state, keyed externally by
/// `(conversationId, userId)`. Mutated only through the Engine's atomic
/// operations (I4).
pub struct RatchetSession {
    pub root_key: [u8; 32],
    pub sending_chain_key: [u8; 32],
    pub sending_message_number: u32,
    pub sending_chain_length: u32,
    pub receiving_chain_key: Option<[u8; 32]>,
    pub receiving_message_number: u32,
    pub receiving_chain_length: u32,
    pub self_ratchet_keypair: X25519KeyPair,
    pub remote_ratchet_public_key: Option<[u8; 32]>,
    pub previous_sending_chain_length: u32,
    pub previous_receiving_chain_length: u32,
    pub skipped_keys: SkippedKeyStore,
    pub initiator: bool,
    pub last_updated: u64,
    /// Sends since the last DH-ratchet step, for the periodic-rekey policy.
    pub sends_since_ratchet: u32,
}

impl Drop for RatchetSession {
    fn drop(&mut self) {
        self.root_key.zeroize();
        self.sending_chain_key.zeroize();
        if let Some(ref mut k) = self.receiving_chain_key {
            k.zeroize();
        }
    }
}

/// A serializable snapshot of a session, for persistence across process
/// restarts through the Orchestrator's secure/ordinary storage boundary.
#[derive(Serialize, Deserialize)]
pub struct RatchetSessionSnapshot {
    pub root_key: [u8; 32],
    pub sending_chain_key: [u8; 32],
    pub sending_message_number: u32,
    pub sending_chain_length: u32,
    pub receiving_chain_key: Option<[u8; 32]>,
    pub receiving_message_number: u32,
    pub receiving_chain_length: u32,
    pub self_ratchet_secret: [u8; 32],
    pub self_ratchet_public: [u8; 32],
    pub remote_ratchet_public_key: Option<[u8; 32]>,
    pub previous_sending_chain_length: u32,
    pub previous_receiving_chain_length: u32,
    pub initiator: bool,
    pub last_updated: u64,
    pub sends_since_ratchet: u32,
}

impl RatchetSession {
    /// Export a persistable snapshot. The skipped-key cache is
    /// intentionally not persisted: losing in-flight skipped keys across a
    /// restart only costs the ability to decrypt messages skipped before
    /// the restart, which is an acceptable degradation for a security
    /// knob, not a correctness requirement.
    pub fn export(&self) -> RatchetSessionSnapshot {
        RatchetSessionSnapshot {
            root_key: self.root_key,
            sending_chain_key: self.sending_chain_key,
            sending_message_number: self.sending_message_number,
            sending_chain_length: self.sending_chain_length,
            receiving_chain_key: self.receiving_chain_key,
            receiving_message_number: self.receiving_message_number,
            receiving_chain_length: self.receiving_chain_length,
            self_ratchet_secret: self.self_ratchet_keypair.secret.to_bytes(),
            self_ratchet_public: self.self_ratchet_keypair.public,
            remote_ratchet_public_key: self.remote_ratchet_public_key,
            previous_sending_chain_length: self.previous_sending_chain_length,
            previous_receiving_chain_length: self.previous_receiving_chain_length,
            initiator: self.initiator,
            last_updated: self.last_updated,
            sends_since_ratchet: self.sends_since_ratchet,
        }
    }

    pub fn import(mut snapshot: RatchetSessionSnapshot) -> Self {
        let secret = StaticSecret::from(snapshot.self_ratchet_secret);
        let keypair = X25519KeyPair {
            secret,
            public: snapshot.self_ratchet_public,
        };
        snapshot.self_ratchet_secret.zeroize();
        Self {
            root_key: snapshot.root_key,
            sending_chain_key: snapshot.sending_chain_key,
            sending_message_number: snapshot.sending_message_number,
            sending_chain_length: snapshot.sending_chain_length,
            receiving_chain_key: snapshot.receiving_chain_key,
            receiving_message_number: snapshot.receiving_message_number,
            receiving_chain_length: snapshot.receiving_chain_length,
            self_ratchet_keypair: keypair,
            remote_ratchet_public_key: snapshot.remote_ratchet_public_key,
            previous_sending_chain_length: snapshot.previous_sending_chain_length,
            previous_receiving_chain_length: snapshot.previous_receiving_chain_length,
            skipped_keys: SkippedKeyStore::new(),
            initiator: snapshot.initiator,
            last_updated: snapshot.last_updated,
            sends_since_ratchet: snapshot.sends_since_ratchet,
        }
    }
}
