pub mod aead;
pub mod chain;
pub mod constant_time;
pub mod dilithium;
pub mod ed25519;
pub mod encoding;
pub mod hashing;
pub mod kyber;
pub mod random;
pub mod x25519;
pub mod zeroize_util;

pub use constant_time::{eq_32, eq_64, eq_slices};
pub use hashing::{hash_handle, hash_password};
