//! Double Ratchet Engine (Component E). Grounded on this codebase's own
//! `PQDoubleRatchet::init_alice`/`init_bob`/`encrypt`/`decrypt`, rewritten
//! to the spec's exact state machine, KDF byte conventions (Component C),
//! and AAD layout (Component D). The session map is the arena §9 calls
//! for: `SessionId -> Arc<Mutex<RatchetSession>>` owning state directly,
//! with skipped keys referencing ephemeral-key bytes rather than back-
//! pointers into the session.

use super::session::{RatchetSession, SkippedKeyStore};
use crate::constants::RATCHET_STEP_INTERVAL;
use crate::crypto::{aead, chain, x25519};
use crate::error::RatchetError;
use crate::framer::{build_associated_data, EncryptedEnvelope, EncryptionMode, EnvelopeMetadata};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex as AsyncMutex;

fn session_key(conversation_id: &str, user_id: &str) -> String {
    format!("{conversation_id}:{user_id}")
}

fn now_ms(clock: &dyn Fn() -> u64) -> u64 {
    clock()
}

/// Owns all live ratchet sessions for one client instance. Per-session
/// locking satisfies I4 (atomic mutation) without serializing unrelated
/// sessions against each other (§5: no cross-session ordering guarantee).
pub struct RatchetEngine {
    sessions: StdMutex<HashMap<String, Arc<AsyncMutex<RatchetSession>>>>,
    clock: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl RatchetEngine {
    pub fn new(clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        Self {
            sessions: StdMutex::new(HashMap::new()),
            clock: Box::new(clock),
        }
    }

    fn now(&self) -> u64 {
        now_ms(&self.clock)
    }

    fn session_handle(&self, conversation_id: &str, user_id: &str) -> Option<Arc<AsyncMutex<RatchetSession>>> {
        let key = session_key(conversation_id, user_id);
        self.sessions.lock().unwrap().get(&key).cloned()
    }

    /// `initializeRatchet(conversationId, userId, sharedSecret, isInitiator, remoteEphemeralPk?)`.
    pub fn initialize_ratchet(
        &self,
        conversation_id: &str,
        user_id: &str,
        shared_secret: &[u8],
        is_initiator: bool,
        remote_ephemeral_pk: Option<[u8; 32]>,
    ) -> Result<(), RatchetError> {
        if shared_secret.len() != 32 {
            return Err(RatchetError::InvalidArgument(
                "sharedSecret must be exactly 32 bytes".into(),
            ));
        }
        // Context is scoped to the conversation only, not the local
        // caller's userId: both the initiator and the responder must
        // derive an identical initial (rootKey, chainKey) pair from the
        // shared secret before any DH-ratchet step has occurred, which a
        // caller-specific context would break (see DESIGN.md).
        let mut context = Vec::with_capacity(conversation_id.len() + 6);
        context.extend_from_slice(conversation_id.as_bytes());
        context.extend_from_slice(b"-init");

        let derived = x25519::derive_keys(shared_secret, &context)
            .map_err(|e| RatchetError::InvalidArgument(e.to_string()))?;

        let self_keypair = x25519::generate_keypair();
        let mut session = RatchetSession {
            root_key: derived.root_key,
            sending_chain_key: derived.chain_key,
            sending_message_number: 0,
            sending_chain_length: 0,
            receiving_chain_key: None,
            receiving_message_number: 0,
            receiving_chain_length: 0,
            self_ratchet_keypair: self_keypair,
            remote_ratchet_public_key: None,
            previous_sending_chain_length: 0,
            previous_receiving_chain_length: 0,
            skipped_keys: SkippedKeyStore::new(),
            initiator: is_initiator,
            last_updated: self.now(),
            sends_since_ratchet: 0,
        };

        if is_initiator {
            if let Some(remote_pk) = remote_ephemeral_pk {
                x25519::validate_public_key(&remote_pk)
                    .map_err(|_| RatchetError::WeakPublicKey)?;
                let dh = x25519::compute_shared_secret(&session.self_ratchet_keypair.secret, &remote_pk)
                    .map_err(|_| RatchetError::WeakPublicKey)?;
                let (new_root, new_chain) = chain::derive_root(&session.root_key, &dh)
                    .map_err(|e| RatchetError::FatalInvariant(e.to_string()))?;
                session.root_key = new_root;
                session.sending_chain_key = new_chain;
                session.remote_ratchet_public_key = Some(remote_pk);
            }
        }

        let key = session_key(conversation_id, user_id);
        self.sessions
            .lock()
            .unwrap()
            .insert(key, Arc::new(AsyncMutex::new(session)));
        Ok(())
    }

    /// `encrypt(conversationId, userId, plaintext)`.
    pub async fn encrypt(
        &self,
        conversation_id: &str,
        user_id: &str,
        plaintext: &[u8],
        mode: EncryptionMode,
    ) -> Result<EncryptedEnvelope, RatchetError> {
        let handle = self
            .session_handle(conversation_id, user_id)
            .ok_or(RatchetError::SessionMissing)?;
        let mut session = handle.lock().await;

        if session.sends_since_ratchet >= RATCHET_STEP_INTERVAL {
            if let Some(remote_pk) = session.remote_ratchet_public_key {
                force_sending_ratchet_step(&mut session, &remote_pk)?;
            }
        }

        let message_number = session.sending_message_number;
        let chain_length = session.sending_chain_length;
        let timestamp = self.now();
        let ephemeral_pk = session.self_ratchet_keypair.public;

        let mk = chain::message_key(&session.sending_chain_key, message_number)
            .map_err(|e| RatchetError::FatalInvariant(e.to_string()))?;

        let aad = build_associated_data(user_id, message_number, chain_length, timestamp, &ephemeral_pk);
        let nonce = aead::generate_nonce();
        let (ciphertext, tag) = aead::encrypt(&mk, &nonce, &aad, plaintext)
            .map_err(|_| RatchetError::FatalInvariant("AEAD encryption failed".into()))?;

        session.sending_chain_key = chain::next(&session.sending_chain_key)
            .map_err(|e| RatchetError::FatalInvariant(e.to_string()))?;
        session.sending_message_number += 1;
        session.sends_since_ratchet += 1;
        session.last_updated = timestamp;

        Ok(EncryptedEnvelope {
            encrypted_text: crate::crypto::encoding::encode(&ciphertext),
            iv: crate::crypto::encoding::encode(&nonce),
            tag: crate::crypto::encoding::encode(&tag),
            key_id: format!("{}-{}", mode.to_string(), conversation_id),
            metadata: EnvelopeMetadata {
                mode,
                ephemeral_public_key: crate::crypto::encoding::encode(&ephemeral_pk),
                message_number,
                chain_length,
                previous_chain_length: session.previous_sending_chain_length,
                timestamp,
                associated_data_b64: crate::crypto::encoding::encode(&aad),
            },
        })
    }

    /// `decrypt(conversationId, userId, senderId, envelope)`. `userId`
    /// selects the local session (as in `encrypt`/`initializeRatchet`);
    /// `senderId` is the remote party's id, the same string they passed as
    /// their own `userId` when they called `encrypt` — the AAD must be
    /// reconstructed with the sender's identity, not the receiver's, or
    /// authentication fails on every cross-party message.
    pub async fn decrypt(
        &self,
        conversation_id: &str,
        user_id: &str,
        sender_id: &str,
        envelope: &EncryptedEnvelope,
    ) -> Result<Vec<u8>, RatchetError> {
        let handle = self
            .session_handle(conversation_id, user_id)
            .ok_or(RatchetError::SessionMissing)?;
        let mut session = handle.lock().await;

        let ephemeral_pk_bytes = envelope
            .ephemeral_public_key_bytes()
            .map_err(|_| RatchetError::InvalidArgument("bad base64 in ephemeralPublicKey".into()))?;
        if ephemeral_pk_bytes.len() != 32 {
            return Err(RatchetError::InvalidArgument("ephemeralPublicKey must be 32 bytes".into()));
        }
        let mut ephemeral_pk = [0u8; 32];
        ephemeral_pk.copy_from_slice(&ephemeral_pk_bytes);
        x25519::validate_public_key(&ephemeral_pk).map_err(|_| RatchetError::WeakPublicKey)?;

        if session.remote_ratchet_public_key != Some(ephemeral_pk) {
            // Pre-validate both the skip cost of abandoning the current
            // receiving chain and the skip cost of reaching this message on
            // the fresh one *before* mutating anything: a DH-ratchet step
            // that succeeds but is immediately followed by a forward-skip
            // failure would otherwise leave the session permanently
            // advanced past a message it never actually decrypted (I3:
            // TooManySkipped must leave state unchanged).
            let old_chain_skip = envelope
                .metadata
                .previous_chain_length
                .saturating_sub(session.receiving_message_number);
            session.skipped_keys.check_budget(old_chain_skip)?;
            session.skipped_keys.check_budget(envelope.metadata.message_number)?;
            dh_ratchet_step(&mut session, &ephemeral_pk, envelope.metadata.previous_chain_length)?;
        }

        let message_number = envelope.metadata.message_number;
        let mk = if message_number < session.receiving_message_number {
            session
                .skipped_keys
                .take(&ephemeral_pk, message_number)
                .ok_or(RatchetError::MessageKeyMissing)?
        } else {
            let to_skip = message_number - session.receiving_message_number;
            session.skipped_keys.check_budget(to_skip)?;
            let receiving_chain_key = session
                .receiving_chain_key
                .ok_or_else(|| RatchetError::FatalInvariant("no receiving chain established".into()))?;
            let mut current = receiving_chain_key;
            let mut derived_mk = None;
            for i in session.receiving_message_number..=message_number {
                let candidate = chain::message_key(&current, i)
                    .map_err(|e| RatchetError::FatalInvariant(e.to_string()))?;
                if i == message_number {
                    derived_mk = Some(candidate);
                } else {
                    session.skipped_keys.insert(ephemeral_pk, i, candidate);
                }
                current = chain::next(&current).map_err(|e| RatchetError::FatalInvariant(e.to_string()))?;
            }
            session.receiving_chain_key = Some(current);
            derived_mk.expect("loop runs at least once since message_number >= receiving_message_number")
        };

        let ciphertext = envelope
            .ciphertext_bytes()
            .map_err(|_| RatchetError::InvalidArgument("bad base64 in encryptedText".into()))?;
        let nonce_bytes = envelope
            .nonce_bytes()
            .map_err(|_| RatchetError::InvalidArgument("bad base64 in iv".into()))?;
        let tag_bytes = envelope
            .tag_bytes()
            .map_err(|_| RatchetError::InvalidArgument("bad base64 in tag".into()))?;
        let aad = build_associated_data(
            sender_id,
            envelope.metadata.message_number,
            envelope.metadata.chain_length,
            envelope.metadata.timestamp,
            &ephemeral_pk,
        );
        // The envelope carries its own associatedDataB64 alongside the
        // fields it was built from (§6); a receiver that only rebuilds AAD
        // locally never notices if that transmitted copy was tampered with
        // in transit, so a bit flip there must still surface as AuthFailure
        // (P5) rather than pass silently.
        let transmitted_aad = envelope
            .associated_data_bytes()
            .map_err(|_| RatchetError::InvalidArgument("bad base64 in associatedDataB64".into()))?;
        if transmitted_aad != aad {
            return Err(RatchetError::AuthFailure);
        }
        if nonce_bytes.len() != aead::NONCE_LEN || tag_bytes.len() != aead::TAG_LEN {
            return Err(RatchetError::InvalidArgument("wrong nonce or tag length".into()));
        }
        let mut nonce = [0u8; aead::NONCE_LEN];
        nonce.copy_from_slice(&nonce_bytes);
        let mut tag = [0u8; aead::TAG_LEN];
        tag.copy_from_slice(&tag_bytes);

        let plaintext = aead::decrypt(&mk, &nonce, &aad, &ciphertext, &tag)
            .map_err(|_| RatchetError::AuthFailure)?;

        if message_number >= session.receiving_message_number {
            session.receiving_message_number = message_number + 1;
        }
        session.last_updated = self.now();

        Ok(plaintext)
    }

    /// This session's own current ratchet public key — the value a peer
    /// needs as `remote_ephemeral_pk` to `initializeRatchet` before
    /// sending the first message to it (out-of-band prekey exchange;
    /// see DESIGN.md).
    pub async fn ratchet_public_key(&self, conversation_id: &str, user_id: &str) -> Option<[u8; 32]> {
        let handle = self.session_handle(conversation_id, user_id)?;
        let session = handle.lock().await;
        Some(session.self_ratchet_keypair.public)
    }

    pub fn has_session(&self, conversation_id: &str, user_id: &str) -> bool {
        self.session_handle(conversation_id, user_id).is_some()
    }

    /// Number of entries currently held in this session's skipped-key
    /// cache (§8 scenario 2's cache-size assertions; §9 MAX_SKIP
    /// accounting).
    pub async fn skipped_key_count(&self, conversation_id: &str, user_id: &str) -> Option<usize> {
        let handle = self.session_handle(conversation_id, user_id)?;
        let session = handle.lock().await;
        Some(session.skipped_keys.len())
    }

    pub fn remove_session(&self, conversation_id: &str, user_id: &str) {
        self.sessions
            .lock()
            .unwrap()
            .remove(&session_key(conversation_id, user_id));
    }
}

/// Receiver-side DH-ratchet step (§4.E step 3). `sender_previous_chain_length`
/// is the incoming envelope's `previousChainLength` — how many messages the
/// sender emitted on the sending chain being abandoned. This, not any local
/// session field, is what tells the receiver how many keys on the chain it's
/// about to replace might still be in flight and need caching before the
/// chain key they'd derive from is gone for good.
fn dh_ratchet_step(
    session: &mut RatchetSession,
    remote_pk: &[u8; 32],
    sender_previous_chain_length: u32,
) -> Result<(), RatchetError> {
    let to_skip = sender_previous_chain_length.saturating_sub(session.receiving_message_number);
    session.skipped_keys.check_budget(to_skip)?;
    if let Some(receiving_chain_key) = session.receiving_chain_key {
        if let Some(old_remote) = session.remote_ratchet_public_key {
            let mut current = receiving_chain_key;
            for i in session.receiving_message_number..sender_previous_chain_length {
                let mk = chain::message_key(&current, i)
                    .map_err(|e| RatchetError::FatalInvariant(e.to_string()))?;
                session.skipped_keys.insert(old_remote, i, mk);
                current = chain::next(&current).map_err(|e| RatchetError::FatalInvariant(e.to_string()))?;
            }
        }
    }

    let dh1 = x25519::compute_shared_secret(&session.self_ratchet_keypair.secret, remote_pk)
        .map_err(|_| RatchetError::WeakPublicKey)?;
    let (root_after_recv, new_receiving_chain) = chain::derive_root(&session.root_key, &dh1)
        .map_err(|e| RatchetError::FatalInvariant(e.to_string()))?;

    let new_self_keypair = x25519::generate_keypair();
    let dh2 = x25519::compute_shared_secret(&new_self_keypair.secret, remote_pk)
        .map_err(|_| RatchetError::WeakPublicKey)?;
    let (root_after_send, new_sending_chain) = chain::derive_root(&root_after_recv, &dh2)
        .map_err(|e| RatchetError::FatalInvariant(e.to_string()))?;

    session.root_key = root_after_send;
    session.receiving_chain_key = Some(new_receiving_chain);
    session.sending_chain_key = new_sending_chain;
    session.self_ratchet_keypair = new_self_keypair;
    session.previous_sending_chain_length = session.sending_message_number;
    session.previous_receiving_chain_length = session.receiving_message_number;
    session.sending_message_number = 0;
    session.receiving_message_number = 0;
    session.sending_chain_length += 1;
    session.receiving_chain_length += 1;
    session.remote_ratchet_public_key = Some(*remote_pk);
    session.sends_since_ratchet = 0;
    Ok(())
}

/// Sender-side forced periodic DH-ratchet (§4.E "Periodic DH-ratchet").
/// Policy, not correctness: rotates the local keypair and resets the
/// sending chain without waiting for a receive to trigger it.
fn force_sending_ratchet_step(session: &mut RatchetSession, remote_pk: &[u8; 32]) -> Result<(), RatchetError> {
    let new_self_keypair = x25519::generate_keypair();
    let dh = x25519::compute_shared_secret(&new_self_keypair.secret, remote_pk)
        .map_err(|_| RatchetError::WeakPublicKey)?;
    let (new_root, new_sending_chain) = chain::derive_root(&session.root_key, &dh)
        .map_err(|e| RatchetError::FatalInvariant(e.to_string()))?;
    session.root_key = new_root;
    session.sending_chain_key = new_sending_chain;
    session.self_ratchet_keypair = new_self_keypair;
    session.previous_sending_chain_length = session.sending_message_number;
    session.sending_message_number = 0;
    session.sending_chain_length += 1;
    session.sends_since_ratchet = 0;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_clock() -> impl Fn() -> u64 + Send + Sync {
        || 1_700_000_000_000
    }

    #[tokio::test]
    async fn test_round_trip_pfs() {
        let shared_secret = [0x01u8; 32];
        let alice = RatchetEngine::new(fixed_clock());
        let bob = RatchetEngine::new(fixed_clock());

        // Bob's session must exist first so Alice can learn his initial
        // ratchet public key out of band (a prekey-bundle fetch in a real
        // deployment) before her first send.
        bob.initialize_ratchet("conv", "bob", &shared_secret, false, None)
            .unwrap();
        let bob_pk = bob.ratchet_public_key("conv", "bob").await.unwrap();
        alice
            .initialize_ratchet("conv", "alice", &shared_secret, true, Some(bob_pk))
            .unwrap();

        let envelope = alice
            .encrypt("conv", "alice", b"Hello, this is a test message with Perfect Forward Secrecy!", EncryptionMode::Pfs)
            .await
            .unwrap();
        assert_eq!(envelope.metadata.message_number, 0);

        let plaintext = bob.decrypt("conv", "bob", "alice", &envelope).await.unwrap();
        assert_eq!(plaintext, b"Hello, this is a test message with Perfect Forward Secrecy!");
    }

    #[tokio::test]
    async fn test_tamper_detection() {
        let shared_secret = [0x02u8; 32];
        let alice = RatchetEngine::new(fixed_clock());
        let bob = RatchetEngine::new(fixed_clock());
        bob.initialize_ratchet("c", "bob", &shared_secret, false, None).unwrap();
        let bob_pk = bob.ratchet_public_key("c", "bob").await.unwrap();
        alice
            .initialize_ratchet("c", "alice", &shared_secret, true, Some(bob_pk))
            .unwrap();

        let mut envelope = alice
            .encrypt("c", "alice", b"Authenticated message", EncryptionMode::Pfs)
            .await
            .unwrap();

        let mut ciphertext = envelope.ciphertext_bytes().unwrap();
        ciphertext[0] ^= 0xFF;
        envelope.encrypted_text = crate::crypto::encoding::encode(&ciphertext);

        let result = bob.decrypt("c", "bob", "alice", &envelope).await;
        assert!(matches!(result, Err(RatchetError::AuthFailure)));
    }
}
