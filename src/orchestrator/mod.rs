//! Adaptive Orchestrator (Component G): mode switching, key-material
//! lifecycle, and the encrypt/decrypt entry points host applications call.

pub mod engine;
pub mod hybrid;
pub mod mode;
pub mod storage;

pub use engine::Orchestrator;
pub use mode::{EncryptionMode, KeyMaterial};
pub use storage::{InMemoryStore, KeyValueStore, SecureStore, SecureStoreOptions};
