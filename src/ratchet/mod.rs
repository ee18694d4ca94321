//! Double Ratchet session state and engine (Component E).

pub mod engine;
pub mod session;

pub use engine::RatchetEngine;
pub use session::{EphemeralKeyId, RatchetSession, RatchetSessionSnapshot, SkippedKeyStore};
