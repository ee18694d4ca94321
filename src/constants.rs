//! Fixed protocol constants (§6). These are policy/security knobs, not
//! runtime configuration — they are compiled in, the way `ratchet.rs`
//! fixes `KEM_RATCHET_INTERVAL` rather than reading it from a config file.

/// Maximum number of skipped message keys retained across all receiving
/// chains of a single session (§9: a security knob, accounted in aggregate).
pub const MAX_SKIP: u32 = 1000;

/// Consecutive sends without an intervening receive after which the sender
/// forces a DH-ratchet step on its next send.
pub const RATCHET_STEP_INTERVAL: u32 = 100;

/// Default generated passphrase length for first-use auto-initialization.
pub const DEFAULT_PASSPHRASE_LEN: usize = 32;

pub const X25519_KEY_LEN: usize = 32;
pub const AEAD_KEY_LEN: usize = 32;
pub const AEAD_NONCE_LEN: usize = 12;
pub const AEAD_TAG_LEN: usize = 16;

pub const KYBER768_PUBLIC_KEY_LEN: usize = 1184;
pub const KYBER768_SECRET_KEY_LEN: usize = 2400;
pub const KYBER768_CIPHERTEXT_LEN: usize = 1088;
pub const KYBER768_SHARED_SECRET_LEN: usize = 32;

pub const DILITHIUM3_PUBLIC_KEY_LEN: usize = 1952;
pub const DILITHIUM3_SECRET_KEY_LEN: usize = 4000;
pub const DILITHIUM3_SIGNATURE_LEN: usize = 3293;

/// Protocol versions this implementation accepts, oldest first.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["1.0.0", "1.1.0", "2.0.0"];
