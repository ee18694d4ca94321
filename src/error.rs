//! Crate-wide error types.
//!
//! Each subsystem gets its own error enum; they compose into [`CoreError`]
//! via `#[from]`, the same layering the ratchet and encryption modules use
//! internally.

use thiserror::Error;

/// Errors from the Double Ratchet engine (Component E).
#[derive(Error, Debug)]
pub enum RatchetError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("no ratchet session for this conversation/user pair")]
    SessionMissing,
    #[error("AEAD authentication failed")]
    AuthFailure,
    #[error("skip budget exceeded ({0} skipped keys requested)")]
    TooManySkipped(u32),
    #[error("message key not found for this (ephemeral, messageNumber) pair")]
    MessageKeyMissing,
    #[error("remote public key is weak or malformed")]
    WeakPublicKey,
    #[error("internal invariant violated: {0}")]
    FatalInvariant(String),
}

/// Errors from algorithm negotiation (Component F).
#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error("no compatible protocol version")]
    NoCompatibleProtocol,
    #[error("quantum resistance required but unsatisfiable by both sides")]
    QuantumResistanceUnsatisfiable,
    #[error("no compatible encryption algorithm")]
    NoCompatibleEncryption,
    #[error("chosen key exchange cannot meet effective security level")]
    SecurityLevelUnsatisfiable,
}

/// Errors from secure/ordinary key storage backends.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("secure store unavailable: {0}")]
    Unavailable(String),
    #[error("stored value not found")]
    NotFound,
    #[error("stored value failed to deserialize")]
    Corrupt,
}

/// Errors from the Adaptive Orchestrator (Component G).
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("key generation already in progress")]
    KeygenInProgress,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Ratchet(#[from] RatchetError),
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Top-level crate error.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Ratchet(#[from] RatchetError),
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
