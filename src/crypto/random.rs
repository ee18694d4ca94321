//! Secure random bytes (Component A).

use rand::RngCore;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RandomError {
    #[error("invalid argument: length must be a non-negative integer")]
    InvalidArgument,
}

pub type Result<T> = std::result::Result<T, RandomError>;

/// Fill a freshly allocated buffer of `n` bytes from the OS CSPRNG.
///
/// `n = 0` returns an empty buffer. There is no non-secure fallback: a
/// platform without a working CSPRNG must fail rather than silently
/// degrade, which `rand::rngs::OsRng` already guarantees by panicking on
/// an unavailable entropy source.
pub fn random_bytes(n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    if n > 0 {
        rand::rngs::OsRng.fill_bytes(&mut buf);
    }
    Ok(buf)
}

pub fn random_array<const N: usize>() -> [u8; N] {
    let mut buf = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_buffer() {
        assert_eq!(random_bytes(0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_length_and_variance() {
        let a = random_bytes(32).unwrap();
        let b = random_bytes(32).unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
