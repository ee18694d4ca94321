//! Client-side end-to-end secure messaging cryptography engine: an
//! adaptive Double Ratchet running over classical (X25519), post-quantum
//! (Kyber-768 + Dilithium-3 hybrid), and multi-device key exchange, with
//! algorithm negotiation and a host-supplied secure storage boundary.
//!
//! Host applications drive everything through [`orchestrator::Orchestrator`];
//! the lower-level [`ratchet`], [`crypto`], [`framer`], and [`negotiation`]
//! modules are public for advanced callers (protocol inspection, custom
//! storage backends, interop testing) but are not required for ordinary use.

// Crate-level lint configuration — suppress stylistic warnings that don't affect correctness.
// Security-relevant lints (unsafe, unchecked, etc.) remain enforced.
#![allow(
    clippy::too_many_arguments,
    clippy::type_complexity,
    clippy::inherent_to_string,
    clippy::needless_range_loop
)]

pub mod constants;
pub mod crypto;
pub mod error;
pub mod framer;
pub mod negotiation;
pub mod orchestrator;
pub mod ratchet;

pub use error::{CoreError, OrchestratorError, RatchetError, Result, StorageError};
pub use framer::{EncryptedEnvelope, EncryptionMode, EnvelopeMetadata};
pub use orchestrator::{KeyMaterial, Orchestrator};
pub use ratchet::RatchetEngine;

// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version
pub fn get_version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = get_version();
        assert!(!version.is_empty());
    }
}
