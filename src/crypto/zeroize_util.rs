//! Best-effort zeroization hint (Component A, invariant I5).
//!
//! Most secret-bearing types in this crate derive `Zeroize`/`ZeroizeOnDrop`
//! directly; this function exists for the rare case of a loose byte buffer
//! (e.g. a passphrase read from an FFI boundary) that isn't wrapped in a
//! zeroizing newtype.

use zeroize::Zeroize as _;

pub fn zeroize(buf: &mut [u8]) {
    buf.zeroize();
}
